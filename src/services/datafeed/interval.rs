//! 时间周期转换
//!
//! 平台时间周期 + 品种类别 -> 米筐查询参数

use chrono::Duration;

use crate::error::{DatafeedError, Result};
use crate::models::{Interval, QueryWindow};

use super::symbol::AssetClass;

/// 米筐接口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// get_price K线
    Bars,
    /// get_price Tick
    Ticks,
    /// get_dominant_price 主力连续K线
    DominantBars,
}

/// 复权方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    None,
    /// 股票基金：前复权，成交量同步调整
    PreVolume,
    /// 主力连续：按切换前一日收盘价比例前复权
    PrevCloseRatio,
}

impl Adjustment {
    pub fn adjust_type(&self) -> &'static str {
        match self {
            Adjustment::None => "none",
            Adjustment::PreVolume => "pre_volume",
            Adjustment::PrevCloseRatio => "pre",
        }
    }

    pub fn adjust_method(&self) -> Option<&'static str> {
        match self {
            Adjustment::PrevCloseRatio => Some("prev_close_ratio"),
            _ => None,
        }
    }
}

const BAR_FIELDS: [&str; 6] = ["open", "high", "low", "close", "volume", "total_turnover"];

const TICK_FIELDS: [&str; 29] = [
    "open",
    "high",
    "low",
    "last",
    "prev_close",
    "volume",
    "total_turnover",
    "limit_up",
    "limit_down",
    "b1",
    "b2",
    "b3",
    "b4",
    "b5",
    "a1",
    "a2",
    "a3",
    "a4",
    "a5",
    "b1_v",
    "b2_v",
    "b3_v",
    "b4_v",
    "b5_v",
    "a1_v",
    "a2_v",
    "a3_v",
    "a4_v",
    "a5_v",
];

/// 米筐查询参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorQuerySpec {
    pub endpoint: Endpoint,
    /// 米筐频率，如 1m、60m、1d、tick
    pub frequency: &'static str,
    pub fields: Vec<&'static str>,
    pub adjustment: Adjustment,
    /// 米筐K线时间为结束时点，减去该偏移得到开始时点
    pub bar_start_offset: Duration,
}

/// 根据查询窗口和品种类别生成查询参数
pub fn resolve(window: &QueryWindow, asset_class: AssetClass) -> Result<VendorQuerySpec> {
    let interval = window.interval();
    let unsupported = || {
        DatafeedError::UnsupportedInterval(format!("{} 不支持 {:?}", interval, asset_class))
    };

    let (frequency, bar_start_offset) = match interval {
        Interval::Tick => ("tick", Duration::zero()),
        Interval::Minute => ("1m", Duration::minutes(1)),
        Interval::Hour => ("60m", Duration::hours(1)),
        Interval::Daily => ("1d", Duration::zero()),
        Interval::Weekly => return Err(unsupported()),
    };

    // 合成序列没有逐笔数据
    if interval == Interval::Tick && asset_class.is_synthetic() {
        return Err(unsupported());
    }

    let endpoint = match (interval, asset_class) {
        (Interval::Tick, _) => Endpoint::Ticks,
        (_, AssetClass::Dominant) => Endpoint::DominantBars,
        _ => Endpoint::Bars,
    };

    let mut fields: Vec<&'static str> = if endpoint == Endpoint::Ticks {
        TICK_FIELDS.to_vec()
    } else {
        BAR_FIELDS.to_vec()
    };

    // 只对衍生品合约查询持仓量
    if has_open_interest(asset_class) {
        fields.push("open_interest");
    }
    if asset_class == AssetClass::Fund && endpoint == Endpoint::Bars {
        fields.push("iopv");
    }

    let adjustment = match (endpoint, asset_class) {
        (Endpoint::Ticks, _) => Adjustment::None,
        (_, AssetClass::Equity | AssetClass::Fund) => Adjustment::PreVolume,
        (_, AssetClass::Dominant) => Adjustment::PrevCloseRatio,
        _ => Adjustment::None,
    };

    Ok(VendorQuerySpec {
        endpoint,
        frequency,
        fields,
        adjustment,
        bar_start_offset,
    })
}

/// 代码中含字母的品种才有持仓量
fn has_open_interest(asset_class: AssetClass) -> bool {
    !matches!(
        asset_class,
        AssetClass::Equity | AssetClass::Fund | AssetClass::EquityOption
    )
}
