//! 行情数据标准化
//!
//! 米筐表格 -> 原始记录 -> 标准K线/Tick：
//! 1. 按列名取值，空值按 0 处理，价格保留 6 位小数
//! 2. K线时间由结束时点转换为开始时点
//! 3. 夜盘日期修正
//! 4. 按查询窗口过滤、去重（保留后出现的记录）、按时间稳定排序

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::error::{DatafeedError, Result};
use crate::models::{CanonicalBar, CanonicalTick, InstrumentRef, Interval, PriceLevel, QueryWindow};

use super::calendar::{DateLabel, RowStamp, SessionCorrector};
use super::common::{to_china_time, PRICE_DECIMALS};
use super::vendor::VendorTable;

/// 盘口档数
const LADDER_DEPTH: usize = 5;

/// 带原始时间的记录
#[derive(Debug, Clone, PartialEq)]
pub struct StampedRow<P> {
    pub stamp: RowStamp,
    pub values: P,
}

/// K线数值部分
#[derive(Debug, Clone, PartialEq)]
pub struct BarValues {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub turnover: Decimal,
    pub open_interest: u64,
    pub iopv: Option<Decimal>,
}

/// Tick数值部分
#[derive(Debug, Clone, PartialEq)]
pub struct TickValues {
    pub last_price: Decimal,
    pub volume: u64,
    pub turnover: Decimal,
    pub open_interest: u64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub pre_close: Decimal,
    pub limit_up: Decimal,
    pub limit_down: Decimal,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

// ==================== 表格解析 ====================

/// 按列名读取一行数据
struct RowReader<'t> {
    table: &'t VendorTable,
    row: &'t [Value],
    line: usize,
}

impl<'t> RowReader<'t> {
    fn format_error(&self, message: impl std::fmt::Display) -> DatafeedError {
        DatafeedError::DataFormat(format!("第 {} 行: {}", self.line + 1, message))
    }

    fn cell(&self, column: &str) -> Option<&'t Value> {
        self.table
            .column_index(column)
            .and_then(|idx| self.row.get(idx))
    }

    /// 缺失列和空值返回 None
    fn decimal_opt(&self, column: &str) -> Result<Option<Decimal>> {
        let value = match self.cell(column) {
            None | Some(Value::Null) => return Ok(None),
            Some(v) => v,
        };
        let text = match value {
            Value::Number(n) => n.to_string(),
            Value::String(s) if s.eq_ignore_ascii_case("nan") || s.is_empty() => return Ok(None),
            Value::String(s) => s.clone(),
            other => return Err(self.format_error(format!("{} 不是数值: {}", column, other))),
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map(Some)
            .map_err(|_| self.format_error(format!("{} 不是数值: {}", column, text)))
    }

    fn decimal(&self, column: &str) -> Result<Decimal> {
        Ok(self.decimal_opt(column)?.unwrap_or_default())
    }

    fn price(&self, column: &str) -> Result<Decimal> {
        Ok(self.decimal(column)?.round_dp(PRICE_DECIMALS))
    }

    fn required_price(&self, column: &str) -> Result<Decimal> {
        if self.table.column_index(column).is_none() {
            return Err(DatafeedError::DataFormat(format!("缺少列: {}", column)));
        }
        self.price(column)
    }

    fn non_negative(&self, column: &str) -> Result<Decimal> {
        let value = self.decimal(column)?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(self.format_error(format!("{} 为负数: {}", column, value)));
        }
        Ok(value)
    }

    fn quantity(&self, column: &str) -> Result<u64> {
        let value = self.non_negative(column)?;
        value
            .round()
            .to_u64()
            .ok_or_else(|| self.format_error(format!("{} 超出范围: {}", column, value)))
    }

    fn datetime(&self) -> Result<(NaiveDate, Option<NaiveTime>)> {
        let value = self
            .cell("datetime")
            .or_else(|| self.cell("date"))
            .ok_or_else(|| DatafeedError::DataFormat("缺少 datetime 列".to_string()))?;
        parse_stamp(value).ok_or_else(|| self.format_error(format!("无法解析时间: {}", value)))
    }

    fn trading_date(&self) -> Result<Option<NaiveDate>> {
        match self.cell("trading_date") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => parse_stamp(value)
                .map(|(date, _)| Some(date))
                .ok_or_else(|| self.format_error(format!("无法解析交易日: {}", value))),
        }
    }

    /// 原始时间，`offset` 为K线结束时点到开始时点的偏移
    fn stamp(&self, offset: Duration, date_only_at_midnight: bool) -> Result<RowStamp> {
        let (date, time) = self.datetime()?;
        let (date, time) = match time {
            Some(t) if date_only_at_midnight && t == NaiveTime::default() => (date, None),
            Some(t) => {
                let start = date.and_time(t) - offset;
                (start.date(), Some(start.time()))
            }
            None => (date, None),
        };

        Ok(match self.trading_date()? {
            Some(trading_day) => RowStamp {
                date: trading_day,
                time,
                label: DateLabel::TradingDay,
            },
            None => RowStamp {
                date,
                time,
                label: DateLabel::Calendar,
            },
        })
    }
}

/// 解析时间单元格
///
/// 支持 `2024-06-03`、`2024-06-03 21:00:00[.500]` 以及整数 `20240603210000[500]`
pub fn parse_stamp(value: &Value) -> Option<(NaiveDate, Option<NaiveTime>)> {
    match value {
        Value::String(s) => parse_stamp_text(s.trim()),
        Value::Number(n) => parse_compact(&n.as_u64()?.to_string()),
        _ => None,
    }
}

fn parse_stamp_text(text: &str) -> Option<(NaiveDate, Option<NaiveTime>)> {
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some((dt.date(), Some(dt.time())));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some((date, None));
    }
    if text.chars().all(|c| c.is_ascii_digit()) {
        return parse_compact(text);
    }
    None
}

fn parse_compact(digits: &str) -> Option<(NaiveDate, Option<NaiveTime>)> {
    match digits.len() {
        8 => NaiveDate::parse_from_str(digits, "%Y%m%d")
            .ok()
            .map(|d| (d, None)),
        14 | 17 => {
            let dt = NaiveDateTime::parse_from_str(&digits[..14], "%Y%m%d%H%M%S").ok()?;
            let millis: u32 = if digits.len() == 17 {
                digits[14..].parse().ok()?
            } else {
                0
            };
            let time = dt.time().with_nanosecond(millis * 1_000_000)?;
            Some((dt.date(), Some(time)))
        }
        _ => None,
    }
}

fn readers(table: &VendorTable) -> impl Iterator<Item = Result<RowReader<'_>>> {
    table.rows.iter().enumerate().map(move |(line, row)| {
        if row.len() != table.columns.len() {
            return Err(DatafeedError::DataFormat(format!(
                "第 {} 行列数 {} 与表头 {} 不一致",
                line + 1,
                row.len(),
                table.columns.len()
            )));
        }
        Ok(RowReader { table, row, line })
    })
}

/// 解析K线表格
pub fn parse_bar_table(
    table: &VendorTable,
    interval: Interval,
    bar_start_offset: Duration,
) -> Result<Vec<StampedRow<BarValues>>> {
    let has_iopv = table.column_index("iopv").is_some();
    let date_only_at_midnight = interval == Interval::Daily;

    readers(table)
        .map(|reader| {
            let reader = reader?;
            Ok(StampedRow {
                stamp: reader.stamp(bar_start_offset, date_only_at_midnight)?,
                values: BarValues {
                    open: reader.required_price("open")?,
                    high: reader.required_price("high")?,
                    low: reader.required_price("low")?,
                    close: reader.required_price("close")?,
                    volume: reader.quantity("volume")?,
                    turnover: reader.non_negative("total_turnover")?,
                    open_interest: reader.quantity("open_interest")?,
                    iopv: if has_iopv {
                        Some(reader.price("iopv")?)
                    } else {
                        None
                    },
                },
            })
        })
        .collect()
}

fn ladder(reader: &RowReader<'_>, side: char) -> Result<Vec<PriceLevel>> {
    let mut levels = Vec::with_capacity(LADDER_DEPTH);
    for level in 1..=LADDER_DEPTH {
        let price = reader.price(&format!("{}{}", side, level))?;
        let volume = reader.quantity(&format!("{}{}_v", side, level))?;
        if !price.is_zero() || volume > 0 {
            levels.push(PriceLevel { price, volume });
        }
    }
    Ok(levels)
}

/// 解析Tick表格
pub fn parse_tick_table(table: &VendorTable) -> Result<Vec<StampedRow<TickValues>>> {
    readers(table)
        .map(|reader| {
            let reader = reader?;
            Ok(StampedRow {
                stamp: reader.stamp(Duration::zero(), false)?,
                values: TickValues {
                    last_price: reader.required_price("last")?,
                    volume: reader.quantity("volume")?,
                    turnover: reader.non_negative("total_turnover")?,
                    open_interest: reader.quantity("open_interest")?,
                    open: reader.price("open")?,
                    high: reader.price("high")?,
                    low: reader.price("low")?,
                    pre_close: reader.price("prev_close")?,
                    limit_up: reader.price("limit_up")?,
                    limit_down: reader.price("limit_down")?,
                    bids: ladder(&reader, 'b')?,
                    asks: ladder(&reader, 'a')?,
                },
            })
        })
        .collect()
}

// ==================== 标准化 ====================

/// 修正日期、窗口过滤、排序去重
///
/// 保留 `所属交易日 >= start` 且 `时段开始日 <= end` 的记录，
/// 因此结束日当晚开盘的夜盘会保留并归入下一交易日。
fn normalize<P>(
    rows: Vec<StampedRow<P>>,
    window: &QueryWindow,
    corrector: &SessionCorrector<'_>,
) -> Vec<(NaiveDateTime, P)> {
    let mut kept: Vec<(NaiveDateTime, P)> = rows
        .into_iter()
        .filter_map(|row| {
            let stamp = corrector.correct(&row.stamp);
            let inside = stamp.trading_day >= window.start() && stamp.session_date <= window.end();
            inside.then_some((stamp.timestamp, row.values))
        })
        .collect();

    // 稳定排序，相同时间保持原始顺序
    kept.sort_by_key(|(timestamp, _)| *timestamp);

    let mut result: Vec<(NaiveDateTime, P)> = Vec::with_capacity(kept.len());
    for (timestamp, values) in kept {
        match result.last_mut() {
            // 供应商重发的数据视为更正，保留后者
            Some(last) if last.0 == timestamp => *last = (timestamp, values),
            _ => result.push((timestamp, values)),
        }
    }
    result
}

/// 标准化K线
///
/// 结束日当晚开盘的夜盘同时落在 `[.., end]` 与 `[end + 1, ..]` 两个窗口内，
/// 按相邻日期区间分段查询时，调用方需按时间戳去重。
pub fn normalize_bars(
    rows: Vec<StampedRow<BarValues>>,
    window: &QueryWindow,
    instrument: &InstrumentRef,
    corrector: &SessionCorrector<'_>,
) -> Vec<CanonicalBar> {
    normalize(rows, window, corrector)
        .into_iter()
        .map(|(timestamp, v)| CanonicalBar {
            instrument: instrument.clone(),
            interval: window.interval(),
            timestamp: to_china_time(timestamp),
            open: v.open,
            high: v.high,
            low: v.low,
            close: v.close,
            volume: v.volume,
            turnover: v.turnover,
            open_interest: v.open_interest,
            iopv: v.iopv,
        })
        .collect()
}

/// 标准化Tick
///
/// 窗口规则同 [`normalize_bars`]，分段查询时边界夜盘会重复返回
pub fn normalize_ticks(
    rows: Vec<StampedRow<TickValues>>,
    window: &QueryWindow,
    instrument: &InstrumentRef,
    corrector: &SessionCorrector<'_>,
) -> Vec<CanonicalTick> {
    normalize(rows, window, corrector)
        .into_iter()
        .map(|(timestamp, v)| CanonicalTick {
            instrument: instrument.clone(),
            timestamp: to_china_time(timestamp),
            last_price: v.last_price,
            volume: v.volume,
            turnover: v.turnover,
            open_interest: v.open_interest,
            open: v.open,
            high: v.high,
            low: v.low,
            pre_close: v.pre_close,
            limit_up: v.limit_up,
            limit_down: v.limit_down,
            bids: v.bids,
            asks: v.asks,
        })
        .collect()
}

/// 标准K线还原为按交易日标注的记录
pub fn bar_to_row(bar: &CanonicalBar) -> StampedRow<BarValues> {
    let local = bar.timestamp.naive_local();
    let time = if bar.interval == Interval::Daily && local.time() == NaiveTime::default() {
        None
    } else {
        Some(local.time())
    };
    StampedRow {
        stamp: RowStamp {
            date: local.date(),
            time,
            label: DateLabel::TradingDay,
        },
        values: BarValues {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            turnover: bar.turnover,
            open_interest: bar.open_interest,
            iopv: bar.iopv,
        },
    }
}

/// 标准Tick还原为按交易日标注的记录
pub fn tick_to_row(tick: &CanonicalTick) -> StampedRow<TickValues> {
    let local = tick.timestamp.naive_local();
    StampedRow {
        stamp: RowStamp {
            date: local.date(),
            time: Some(local.time()),
            label: DateLabel::TradingDay,
        },
        values: TickValues {
            last_price: tick.last_price,
            volume: tick.volume,
            turnover: tick.turnover,
            open_interest: tick.open_interest,
            open: tick.open,
            high: tick.high,
            low: tick.low,
            pre_close: tick.pre_close,
            limit_up: tick.limit_up,
            limit_down: tick.limit_down,
            bids: tick.bids.clone(),
            asks: tick.asks.clone(),
        },
    }
}
