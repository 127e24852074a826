//! 历史行情数据模型
//!
//! 定义平台通用的查询类型和标准化后的行情记录：
//! - 交易所、时间周期、合约引用
//! - 历史数据查询请求与查询窗口
//! - 标准K线与标准Tick

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::DatafeedError;

/// 交易所
///
/// 平台侧的交易所枚举。数据服务只支持其中八个交易所，
/// 其余交易所在代码映射阶段返回 `UnsupportedInstrument`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    /// 中国金融期货交易所
    Cffex,
    /// 上海期货交易所
    Shfe,
    /// 大连商品交易所
    Dce,
    /// 郑州商品交易所
    Czce,
    /// 上海国际能源交易中心
    Ine,
    /// 广州期货交易所
    Gfex,
    /// 上海黄金交易所
    Sge,
    /// 上海证券交易所
    Sse,
    /// 深圳证券交易所
    Szse,
    /// 北京证券交易所
    Bse,
    /// 香港期货交易所
    Hkfe,
    /// 智能路由
    Smart,
}

impl Exchange {
    /// 交易所代码
    pub fn code(&self) -> &'static str {
        match self {
            Exchange::Cffex => "CFFEX",
            Exchange::Shfe => "SHFE",
            Exchange::Dce => "DCE",
            Exchange::Czce => "CZCE",
            Exchange::Ine => "INE",
            Exchange::Gfex => "GFEX",
            Exchange::Sge => "SGE",
            Exchange::Sse => "SSE",
            Exchange::Szse => "SZSE",
            Exchange::Bse => "BSE",
            Exchange::Hkfe => "HKFE",
            Exchange::Smart => "SMART",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Exchange {
    type Err = DatafeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let exchange = match s.trim().to_uppercase().as_str() {
            "CFFEX" => Exchange::Cffex,
            "SHFE" => Exchange::Shfe,
            "DCE" => Exchange::Dce,
            "CZCE" => Exchange::Czce,
            "INE" => Exchange::Ine,
            "GFEX" => Exchange::Gfex,
            "SGE" => Exchange::Sge,
            "SSE" => Exchange::Sse,
            "SZSE" => Exchange::Szse,
            "BSE" => Exchange::Bse,
            "HKFE" => Exchange::Hkfe,
            "SMART" => Exchange::Smart,
            _ => {
                return Err(DatafeedError::UnsupportedInstrument(format!(
                    "未知交易所: {}",
                    s
                )))
            }
        };
        Ok(exchange)
    }
}

/// 时间周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// Tick 数据
    #[serde(rename = "tick")]
    Tick,
    /// 1分钟
    #[serde(rename = "1m")]
    Minute,
    /// 1小时
    #[serde(rename = "1h")]
    Hour,
    /// 日线
    #[serde(rename = "d")]
    Daily,
    /// 周线
    #[serde(rename = "w")]
    Weekly,
}

impl Interval {
    pub fn value(&self) -> &'static str {
        match self {
            Interval::Tick => "tick",
            Interval::Minute => "1m",
            Interval::Hour => "1h",
            Interval::Daily => "d",
            Interval::Weekly => "w",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

impl FromStr for Interval {
    type Err = DatafeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tick" => Ok(Interval::Tick),
            "1m" => Ok(Interval::Minute),
            "1h" => Ok(Interval::Hour),
            "d" => Ok(Interval::Daily),
            "w" => Ok(Interval::Weekly),
            other => Err(DatafeedError::UnsupportedInterval(other.to_string())),
        }
    }
}

/// 合约引用（平台通用格式）
///
/// `symbol` 使用交易所自己的合约代码规则，例如 `rb2410`、`SR409`、`IO2406-C-3500`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentRef {
    /// 合约代码
    pub symbol: String,
    /// 交易所
    pub exchange: Exchange,
}

impl InstrumentRef {
    pub fn new(symbol: impl Into<String>, exchange: Exchange) -> Self {
        Self {
            symbol: symbol.into(),
            exchange,
        }
    }

    /// 平台本地代码，如 `rb2410.SHFE`
    pub fn vt_symbol(&self) -> String {
        format!("{}.{}", self.symbol, self.exchange)
    }
}

impl fmt::Display for InstrumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.symbol, self.exchange)
    }
}

/// 历史数据查询请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRequest {
    /// 合约代码
    pub symbol: String,
    /// 交易所
    pub exchange: Exchange,
    /// 时间周期
    pub interval: Interval,
    /// 开始日期（含）
    pub start: NaiveDate,
    /// 结束日期（含）
    pub end: NaiveDate,
}

impl HistoryRequest {
    pub fn instrument(&self) -> InstrumentRef {
        InstrumentRef::new(self.symbol.clone(), self.exchange)
    }

    pub fn window(&self) -> Result<QueryWindow, DatafeedError> {
        QueryWindow::new(self.start, self.end, self.interval)
    }
}

/// 查询窗口
///
/// 起止日期均按交易日计算，且 `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    start: NaiveDate,
    end: NaiveDate,
    interval: Interval,
}

impl QueryWindow {
    pub fn new(start: NaiveDate, end: NaiveDate, interval: Interval) -> Result<Self, DatafeedError> {
        if start > end {
            return Err(DatafeedError::InvalidRequest(format!(
                "开始日期 {} 晚于结束日期 {}",
                start, end
            )));
        }
        Ok(Self {
            start,
            end,
            interval,
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }
}

/// 时间戳按 RFC 3339 输出，如 `2024-06-04T21:00:00+08:00`
fn serialize_timestamp<S: Serializer>(timestamp: &DateTime<Tz>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339())
}

/// 标准K线
///
/// 时间戳为K线开始时点（北京时间），日期部分为K线所属交易日
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalBar {
    /// 合约
    pub instrument: InstrumentRef,
    /// 时间周期
    pub interval: Interval,
    /// K线时间
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Tz>,
    /// 开盘价
    pub open: Decimal,
    /// 最高价
    pub high: Decimal,
    /// 最低价
    pub low: Decimal,
    /// 收盘价
    pub close: Decimal,
    /// 成交量
    pub volume: u64,
    /// 成交额
    pub turnover: Decimal,
    /// 持仓量
    pub open_interest: u64,
    /// ETF 参考净值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iopv: Option<Decimal>,
}

/// 盘口档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub volume: u64,
}

/// 标准Tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalTick {
    /// 合约
    pub instrument: InstrumentRef,
    /// Tick 时间，日期部分为所属交易日
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Tz>,
    /// 最新价
    pub last_price: Decimal,
    /// 累计成交量
    pub volume: u64,
    /// 累计成交额
    pub turnover: Decimal,
    /// 持仓量
    pub open_interest: u64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    /// 昨收盘
    pub pre_close: Decimal,
    /// 涨停价
    pub limit_up: Decimal,
    /// 跌停价
    pub limit_down: Decimal,
    /// 买盘（价格从高到低）
    pub bids: Vec<PriceLevel>,
    /// 卖盘（价格从低到高）
    pub asks: Vec<PriceLevel>,
}
