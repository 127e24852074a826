//! 公共常量和辅助函数

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Shanghai;
use chrono_tz::Tz;

use crate::models::Exchange;

// ==================== RQData API 常量 ====================

/// RQData 默认接入地址
pub const RQDATA_DEFAULT_ENDPOINT: &str = "https://rqdatad-pro.ricequant.com/api/";
/// 认证接口
pub const RQDATA_AUTH_PATH: &str = "auth";
/// 合约列表接口
pub const RQDATA_INSTRUMENTS_PATH: &str = "instruments";
/// 交易日历接口
pub const RQDATA_TRADING_DATES_PATH: &str = "trading_dates";
/// 行情接口（K线和Tick）
pub const RQDATA_PRICE_PATH: &str = "price";
/// 主力连续行情接口
pub const RQDATA_DOMINANT_PRICE_PATH: &str = "dominant_price";

/// 价格保留的小数位数
pub const PRICE_DECIMALS: u32 = 6;

/// 连续合约和指数合约的代码后缀
pub const CONTINUOUS_SUFFIXES: [&str; 5] = ["88", "888", "99", "889", "88A2"];

/// 上海黄金交易所挂牌合约
pub const SGE_INSTRUMENTS: [&str; 17] = [
    "Au(T+D)",
    "mAu(T+D)",
    "Ag(T+D)",
    "Au(T+N1)",
    "Au(T+N2)",
    "Au99.99",
    "Au99.95",
    "Au99.5",
    "Au100g",
    "Pt99.95",
    "Ag99.99",
    "iAu99.99",
    "iAu99.5",
    "iAu100g",
    "NYAuTN06",
    "NYAuTN12",
    "PGC30g",
];

/// 米筐交易所代码转平台交易所
pub fn exchange_from_vendor(code: &str) -> Option<Exchange> {
    match code {
        "XSHG" => Some(Exchange::Sse),
        "XSHE" => Some(Exchange::Szse),
        "CFFEX" => Some(Exchange::Cffex),
        "SHFE" => Some(Exchange::Shfe),
        "DCE" => Some(Exchange::Dce),
        "CZCE" => Some(Exchange::Czce),
        "INE" => Some(Exchange::Ine),
        "SGEX" | "SGE" => Some(Exchange::Sge),
        _ => None,
    }
}

/// 北京时间本地时刻转为带时区时间
///
/// 中国自 1991 年起不再实行夏令时，本地时刻总是唯一的
pub fn to_china_time(dt: NaiveDateTime) -> DateTime<Tz> {
    Shanghai
        .from_local_datetime(&dt)
        .earliest()
        .unwrap_or_else(|| Shanghai.from_utc_datetime(&dt))
}

/// 获取当前北京时间
pub fn get_beijing_time() -> DateTime<Tz> {
    Utc::now().with_timezone(&Shanghai)
}

/// 代码是否全部为数字（股票、基金、股票期权）
pub fn is_numeric_code(symbol: &str) -> bool {
    !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_digit())
}

/// ETF 代码：上交所 51 开头、科创板 58 开头、深交所 159 开头
pub fn is_etf_code(symbol: &str) -> bool {
    symbol.len() == 6
        && is_numeric_code(symbol)
        && (symbol.starts_with("51") || symbol.starts_with("58") || symbol.starts_with("159"))
}

/// 黄金交易所代码去掉括号和加号后转大写
pub fn sge_compact(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '+'))
        .collect::<String>()
        .to_uppercase()
}
