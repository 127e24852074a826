//! 米筐（RQData）历史行情数据服务
//!
//! 将平台通用的历史数据查询转换为米筐接口调用，覆盖八个交易所的
//! 期货、期货期权、黄金现货、股票/ETF 及其期权。
//!
//! ## 模块
//! - `symbol`：合约代码映射
//! - `interval`：时间周期转换
//! - `session`：会话管理（登录、重试、复用）
//! - `calendar`：交易日历与夜盘日期修正
//! - `normalizer`：表格解析与标准化
//! - `facade`：查询入口
//! - `vendor` / `http`：米筐接口约定与 HTTP 实现

mod calendar;
mod common;
mod facade;
mod http;
mod interval;
mod normalizer;
mod session;
mod symbol;
mod vendor;

pub use calendar::{
    night_session, DateLabel, NightSession, RowStamp, SessionCorrector, SessionStamp,
    TradingCalendar,
};
pub use common::{exchange_from_vendor, get_beijing_time, RQDATA_DEFAULT_ENDPOINT};
pub use facade::Datafeed;
pub use http::HttpConnector;
pub use interval::{resolve as resolve_interval, Adjustment, Endpoint, VendorQuerySpec};
pub use normalizer::{
    bar_to_row, normalize_bars, normalize_ticks, parse_bar_table, parse_tick_table, tick_to_row,
    BarValues, StampedRow, TickValues,
};
pub use session::{RetryPolicy, SessionHandle, SessionManager};
pub use symbol::{AssetClass, InstrumentUniverse, ResolvedInstrument, SymbolMapper, VendorCode};
pub use vendor::{
    Credentials, PriceRequest, VendorConnector, VendorError, VendorListing, VendorSession,
    VendorTable,
};
