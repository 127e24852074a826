//! 集成测试共用的内存版米筐接口

#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rqdata_feed::services::datafeed::{
    Credentials, Datafeed, PriceRequest, RetryPolicy, VendorConnector, VendorError,
    VendorListing, VendorSession, VendorTable,
};

pub const BAR_COLUMNS: [&str; 8] = [
    "datetime",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "total_turnover",
    "open_interest",
];

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 2024年5月至7月的交易日，端午节 6月10日休市
pub fn trading_days() -> Vec<NaiveDate> {
    date(2024, 5, 1)
        .iter_days()
        .take_while(|d| *d <= date(2024, 7, 31))
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .filter(|d| *d != date(2024, 6, 10))
        .collect()
}

pub fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> VendorTable {
    VendorTable::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

/// 一行K线数据
pub fn bar_row(datetime: &str, close: f64) -> Vec<Value> {
    vec![
        Value::from(datetime),
        Value::from(close),
        Value::from(close + 2.0),
        Value::from(close - 2.0),
        Value::from(close),
        Value::from(100),
        Value::from(close * 100.0),
        Value::from(5000),
    ]
}

/// 记录下来的行情请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub dominant: bool,
    pub request: PriceRequest,
}

/// 内存版米筐
#[derive(Default)]
pub struct FakeVendor {
    listings: Vec<VendorListing>,
    days: Vec<NaiveDate>,
    tables: HashMap<(String, String), VendorTable>,
    auth_error: Mutex<Option<VendorError>>,
    price_error: Mutex<Option<VendorError>>,
    connects: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeVendor {
    pub fn new() -> Self {
        Self {
            days: trading_days(),
            ..Self::default()
        }
    }

    pub fn list(mut self, order_book_id: &str, exchange: &str) -> Self {
        self.listings.push(VendorListing::new(order_book_id, exchange));
        self
    }

    /// 指定代码和频率返回的表格
    pub fn serve(mut self, order_book_id: &str, frequency: &str, table: VendorTable) -> Self {
        self.tables
            .insert((order_book_id.to_string(), frequency.to_string()), table);
        self
    }

    pub fn reject_login(self, error: VendorError) -> Self {
        *self.auth_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_price(self, error: VendorError) -> Self {
        *self.price_error.lock().unwrap() = Some(error);
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn answer(&self, request: &PriceRequest, dominant: bool) -> Result<VendorTable, VendorError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            dominant,
            request: request.clone(),
        });
        if let Some(err) = self.price_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self
            .tables
            .get(&(request.order_book_id.clone(), request.frequency.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

impl VendorSession for FakeVendor {
    fn instruments(&self) -> Result<Vec<VendorListing>, VendorError> {
        Ok(self.listings.clone())
    }

    fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, VendorError> {
        Ok(self
            .days
            .iter()
            .copied()
            .filter(|d| start <= *d && *d <= end)
            .collect())
    }

    fn price(&self, request: &PriceRequest) -> Result<VendorTable, VendorError> {
        self.answer(request, false)
    }

    fn dominant_price(&self, request: &PriceRequest) -> Result<VendorTable, VendorError> {
        self.answer(request, true)
    }
}

pub struct FakeConnector(pub Arc<FakeVendor>);

impl VendorConnector for FakeConnector {
    fn connect(&self, _credentials: &Credentials) -> Result<Arc<dyn VendorSession>, VendorError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.0.auth_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.0.clone())
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: std::time::Duration::from_millis(1),
        max_backoff: std::time::Duration::from_millis(2),
    }
}

/// 使用内存版米筐的数据服务
pub fn datafeed(vendor: FakeVendor) -> (Datafeed, Arc<FakeVendor>) {
    datafeed_with(vendor, Credentials::new("license", "secret"))
}

pub fn datafeed_with(vendor: FakeVendor, credentials: Credentials) -> (Datafeed, Arc<FakeVendor>) {
    let vendor = Arc::new(vendor);
    let feed = Datafeed::new(
        credentials,
        Arc::new(FakeConnector(vendor.clone())),
        fast_retry(),
    );
    (feed, vendor)
}
