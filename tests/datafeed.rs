//! 数据服务端到端测试（内存版米筐）

mod common;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde_json::Value;
use test_case::test_case;

use common::{bar_row, datafeed, datafeed_with, date, table, FakeVendor, BAR_COLUMNS};
use rqdata_feed::models::{Exchange, HistoryRequest, InstrumentRef, Interval};
use rqdata_feed::services::datafeed::{Credentials, VendorError};
use rqdata_feed::DatafeedError;

fn request(symbol: &str, exchange: Exchange, interval: Interval, start: NaiveDate, end: NaiveDate) -> HistoryRequest {
    HistoryRequest {
        symbol: symbol.to_string(),
        exchange,
        interval,
        start,
        end,
    }
}

fn at(d: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    d.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

#[test]
fn test_cffex_daily_with_evening_row() {
    let vendor = FakeVendor::new().list("IF2406", "CFFEX").serve(
        "IF2406",
        "1d",
        table(
            &BAR_COLUMNS,
            vec![bar_row("2024-06-03", 3600.0), bar_row("2024-06-03 21:00:00", 3610.0)],
        ),
    );
    let (feed, vendor) = datafeed(vendor);

    let bars = feed
        .query_bars(&request("IF2406", Exchange::Cffex, Interval::Daily, date(2024, 6, 1), date(2024, 6, 3)))
        .unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].timestamp.naive_local(), at(date(2024, 6, 3), 0, 0));
    assert_eq!(bars[1].timestamp.naive_local(), at(date(2024, 6, 4), 21, 0));
    assert!(bars[0].timestamp < bars[1].timestamp);
    assert_eq!(bars[1].close, Decimal::from(3610));
    assert_eq!(bars[0].instrument, InstrumentRef::new("IF2406", Exchange::Cffex));

    let requests = vendor.requests();
    assert_eq!(requests.len(), 1);
    let sent = &requests[0].request;
    assert!(!requests[0].dominant);
    assert_eq!(sent.order_book_id, "IF2406");
    assert_eq!(sent.frequency, "1d");
    assert_eq!(sent.start_date, date(2024, 5, 31));
    // 向后多取一个交易日，拿到结束日当晚的夜盘
    assert_eq!(sent.end_date, date(2024, 6, 4));
    assert_eq!(sent.adjust_type, "none");
    assert!(sent.fields.iter().any(|f| f == "open_interest"));
}

#[test]
fn test_no_rows_inside_window_is_empty_not_error() {
    let vendor = FakeVendor::new().list("RB2410", "SHFE").serve(
        "RB2410",
        "1m",
        table(&BAR_COLUMNS, vec![bar_row("2024-06-03 10:01:00", 3500.0)]),
    );
    let (feed, _) = datafeed(vendor);

    let day = date(2024, 6, 4);
    let bars = feed
        .query_bars(&request("rb2410", Exchange::Shfe, Interval::Minute, day, day))
        .unwrap();
    assert!(bars.is_empty());
}

#[test]
fn test_vendor_without_data_gives_empty_sequence() {
    let (feed, _) = datafeed(FakeVendor::new().list("RB2410", "SHFE"));
    let bars = feed
        .query_bars(&request("rb2410", Exchange::Shfe, Interval::Hour, date(2024, 6, 3), date(2024, 6, 7)))
        .unwrap();
    assert!(bars.is_empty());
}

#[test]
fn test_shfe_night_session_minute_bars() {
    let vendor = FakeVendor::new().list("RB2410", "SHFE").serve(
        "RB2410",
        "1m",
        table(
            &BAR_COLUMNS,
            vec![
                bar_row("2024-06-04 09:01:00", 3502.0),
                bar_row("2024-06-03 21:01:00", 3500.0),
                bar_row("2024-06-04 00:01:00", 3501.0),
                bar_row("2024-06-03 14:59:00", 3490.0),
                // 重复推送，以后者为准
                bar_row("2024-06-04 09:01:00", 3503.0),
            ],
        ),
    );
    let (feed, _) = datafeed(vendor);

    let day = date(2024, 6, 4);
    let bars = feed
        .query_bars(&request("rb2410", Exchange::Shfe, Interval::Minute, day, day))
        .unwrap();

    let stamps: Vec<NaiveDateTime> = bars.iter().map(|b| b.timestamp.naive_local()).collect();
    assert_eq!(
        stamps,
        vec![at(day, 0, 0), at(day, 9, 0), at(day, 21, 0)]
    );
    assert_eq!(bars[1].close, Decimal::from(3503));
}

#[test]
fn test_dominant_series_uses_adjusted_endpoint() {
    let vendor = FakeVendor::new().serve(
        "RB",
        "1d",
        table(&BAR_COLUMNS, vec![bar_row("2024-06-03", 3500.0)]),
    );
    let (feed, vendor) = datafeed(vendor);

    let bars = feed
        .query_bars(&request("rb", Exchange::Shfe, Interval::Daily, date(2024, 6, 3), date(2024, 6, 3)))
        .unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].instrument.symbol, "rb");

    let requests = vendor.requests();
    assert!(requests[0].dominant);
    assert_eq!(requests[0].request.adjust_type, "pre");
    assert_eq!(requests[0].request.adjust_method.as_deref(), Some("prev_close_ratio"));
}

#[test]
fn test_etf_bars_carry_iopv() {
    let mut columns = BAR_COLUMNS.to_vec();
    columns.push("iopv");
    let mut row = bar_row("2024-06-03", 3.5);
    row.push(Value::from(3.5012));
    let vendor = FakeVendor::new()
        .list("510300.XSHG", "XSHG")
        .serve("510300.XSHG", "1d", table(&columns, vec![row]));
    let (feed, vendor) = datafeed(vendor);

    let bars = feed
        .query_bars(&request("510300", Exchange::Sse, Interval::Daily, date(2024, 6, 3), date(2024, 6, 3)))
        .unwrap();
    assert_eq!(bars[0].iopv, Some(Decimal::new(35012, 4)));

    let sent = &vendor.requests()[0].request;
    assert_eq!(sent.adjust_type, "pre_volume");
    assert!(sent.fields.iter().any(|f| f == "iopv"));
    assert!(!sent.fields.iter().any(|f| f == "open_interest"));
}

#[test]
fn test_ticks_are_redated() {
    let columns = ["datetime", "last", "volume", "total_turnover", "open_interest", "b1", "b1_v", "a1", "a1_v"];
    let vendor = FakeVendor::new().list("AU2408", "SHFE").serve(
        "AU2408",
        "tick",
        table(
            &columns,
            vec![
                vec![
                    Value::from("2024-06-03 21:00:00.500"),
                    Value::from(560.2),
                    Value::from(10),
                    Value::from(5602000),
                    Value::from(100000),
                    Value::from(560.1),
                    Value::from(3),
                    Value::from(560.3),
                    Value::from(4),
                ],
                vec![
                    Value::from(20240604013000000u64),
                    Value::from(561.0),
                    Value::from(20),
                    Value::from(11212000),
                    Value::from(100010),
                    Value::Null,
                    Value::Null,
                    Value::from(561.1),
                    Value::from(2),
                ],
            ],
        ),
    );
    let (feed, vendor) = datafeed(vendor);

    let day = date(2024, 6, 4);
    let ticks = feed
        .query_ticks(&request("au2408", Exchange::Shfe, Interval::Tick, day, day))
        .unwrap();

    assert_eq!(ticks.len(), 2);
    assert_eq!(ticks[0].timestamp.naive_local(), at(day, 1, 30));
    assert_eq!(
        ticks[1].timestamp.naive_local(),
        day.and_time(NaiveTime::from_hms_milli_opt(21, 0, 0, 500).unwrap())
    );
    assert!(ticks[0].bids.is_empty());
    assert_eq!(ticks[1].bids.len(), 1);
    assert_eq!(vendor.requests()[0].request.frequency, "tick");
}

#[test]
fn test_friday_night_closing_tick_belongs_to_monday() {
    let columns = ["datetime", "last", "volume", "total_turnover", "open_interest"];
    let tick = |datetime: &str, last: f64| {
        vec![
            Value::from(datetime),
            Value::from(last),
            Value::from(1),
            Value::from(last * 1000.0),
            Value::from(100000),
        ]
    };
    let vendor = FakeVendor::new().list("AU2408", "SHFE").serve(
        "AU2408",
        "tick",
        table(
            &columns,
            vec![
                tick("2024-06-01 02:30:00.500", 561.0),
                tick("2024-06-01 02:29:59.500", 560.8),
            ],
        ),
    );
    let (feed, _) = datafeed(vendor);

    let monday = date(2024, 6, 3);
    let ticks = feed
        .query_ticks(&request("au2408", Exchange::Shfe, Interval::Tick, monday, monday))
        .unwrap();

    assert_eq!(ticks.len(), 2);
    assert_eq!(
        ticks[0].timestamp.naive_local(),
        monday.and_time(NaiveTime::from_hms_milli_opt(2, 29, 59, 500).unwrap())
    );
    assert_eq!(
        ticks[1].timestamp.naive_local(),
        monday.and_time(NaiveTime::from_hms_milli_opt(2, 30, 0, 500).unwrap())
    );
}

#[test_case("IF2406", Exchange::Gfex; "unsupported exchange")]
#[test_case("IF24", Exchange::Cffex; "malformed symbol")]
#[test_case("XX(T+D)", Exchange::Sge; "unknown spot contract")]
fn test_unsupported_instrument_fails_before_login(symbol: &str, exchange: Exchange) {
    let (feed, vendor) = datafeed(FakeVendor::new());
    let err = feed
        .query_bars(&request(symbol, exchange, Interval::Daily, date(2024, 6, 3), date(2024, 6, 3)))
        .unwrap_err();
    assert!(matches!(err, DatafeedError::UnsupportedInstrument(_)));
    assert_eq!(vendor.connects(), 0);
}

#[test]
fn test_contract_not_listed_by_vendor() {
    let (feed, vendor) = datafeed(FakeVendor::new().list("IF2406", "CFFEX"));
    let err = feed
        .query_bars(&request("IF2512", Exchange::Cffex, Interval::Daily, date(2024, 6, 3), date(2024, 6, 3)))
        .unwrap_err();
    assert!(matches!(err, DatafeedError::UnsupportedInstrument(_)));
    assert!(vendor.requests().is_empty());
}

#[test_case("rb2410", Interval::Weekly; "weekly bars")]
#[test_case("rb", Interval::Tick; "dominant ticks")]
#[test_case("rb88", Interval::Tick; "continuous ticks")]
fn test_unsupported_interval(symbol: &str, interval: Interval) {
    let (feed, _) = datafeed(FakeVendor::new().list("RB2410", "SHFE"));
    let req = request(symbol, Exchange::Shfe, interval, date(2024, 6, 3), date(2024, 6, 3));
    let err = if interval == Interval::Tick {
        feed.query_ticks(&req).unwrap_err()
    } else {
        feed.query_bars(&req).unwrap_err()
    };
    assert!(matches!(err, DatafeedError::UnsupportedInterval(_)));
}

#[test]
fn test_reversed_window_is_invalid() {
    let (feed, _) = datafeed(FakeVendor::new().list("RB2410", "SHFE"));
    let err = feed
        .query_bars(&request("rb2410", Exchange::Shfe, Interval::Daily, date(2024, 6, 5), date(2024, 6, 3)))
        .unwrap_err();
    assert!(matches!(err, DatafeedError::InvalidRequest(_)));
}

#[test]
fn test_expired_token_is_not_retried() {
    let vendor = FakeVendor::new()
        .list("RB2410", "SHFE")
        .reject_login(VendorError::Unauthorized("license expired".into()));
    let (feed, vendor) = datafeed(vendor);

    let err = feed
        .query_bars(&request("rb2410", Exchange::Shfe, Interval::Daily, date(2024, 6, 3), date(2024, 6, 3)))
        .unwrap_err();
    assert!(matches!(err, DatafeedError::Authentication(_)));
    assert_eq!(vendor.connects(), 1);
}

#[test]
fn test_missing_credentials() {
    let (feed, vendor) = datafeed_with(FakeVendor::new(), Credentials::new("", ""));
    assert!(matches!(feed.init(), Err(DatafeedError::Authentication(_))));
    assert_eq!(vendor.connects(), 0);
}

#[test]
fn test_failed_query_is_not_retried() {
    let vendor = FakeVendor::new()
        .list("RB2410", "SHFE")
        .fail_price(VendorError::Transport("connection reset".into()));
    let (feed, vendor) = datafeed(vendor);

    let err = feed
        .query_bars(&request("rb2410", Exchange::Shfe, Interval::Daily, date(2024, 6, 3), date(2024, 6, 3)))
        .unwrap_err();
    assert!(matches!(err, DatafeedError::Connectivity(_)));
    assert_eq!(vendor.requests().len(), 1);
}

#[test]
fn test_session_is_shared_between_queries() {
    let (feed, vendor) = datafeed(FakeVendor::new().list("RB2410", "SHFE"));
    feed.init().unwrap();
    assert!(feed.is_initialized());
    for _ in 0..3 {
        feed.query_bars(&request("rb2410", Exchange::Shfe, Interval::Daily, date(2024, 6, 3), date(2024, 6, 3)))
            .unwrap();
    }
    assert_eq!(vendor.connects(), 1);
}

#[test]
fn test_list_instruments_by_exchange() {
    let vendor = FakeVendor::new()
        .list("RB2410", "SHFE")
        .list("SR2409", "CZCE")
        .list("AUTD.SGEX", "SGEX")
        .list("600000.XSHG", "XSHG")
        .list("BTC", "CRYPTO");
    let (feed, _) = datafeed(vendor);

    let all = feed.list_instruments(None).unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.contains(&InstrumentRef::new("SR409", Exchange::Czce)));
    assert!(all.contains(&InstrumentRef::new("Au(T+D)", Exchange::Sge)));

    let shfe = feed.list_instruments(Some(Exchange::Shfe)).unwrap();
    assert_eq!(shfe, vec![InstrumentRef::new("rb2410", Exchange::Shfe)]);
}
