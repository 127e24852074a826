//! 交易日历与夜盘日期修正
//!
//! 期货夜盘从晚上持续到次日凌晨，归属于下一个交易日。
//! 米筐返回的时间可能是自然日也可能是交易日，这里统一把日期部分
//! 改写为所属交易日，时刻保持不变。
//!
//! 夜盘判定使用固定的分界时刻表（来自各交易所公布的交易时间），
//! 不做推断：
//!
//! | 交易所 | 夜盘开始（含集合竞价） | 跨零点收盘 |
//! |---|---|---|
//! | 上期所、能源中心 | 20:55 | 02:30 |
//! | 大商所、郑商所 | 20:55 | 无（23:00 收盘） |
//! | 中金所 | 20:55（无夜盘交易，晚间记录按夜盘归属） | 无 |
//! | 金交所 | 19:50 | 02:30 |
//! | 上交所、深交所 | 无夜盘 | 无 |

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use std::collections::BTreeSet;
use std::ops::Bound::{Excluded, Unbounded};

use crate::models::Exchange;

/// 夜盘分界时刻
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightSession {
    /// 不早于该时刻的记录属于夜盘
    pub evening_cutoff: NaiveTime,
    /// 夜盘跨零点时，不晚于该分钟（含分钟内的毫秒）的记录属于前一晚的夜盘
    pub morning_cutoff: Option<NaiveTime>,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

/// 各交易所夜盘分界表
pub fn night_session(exchange: Exchange) -> Option<NightSession> {
    match exchange {
        Exchange::Shfe | Exchange::Ine => Some(NightSession {
            evening_cutoff: hm(20, 55),
            morning_cutoff: Some(hm(2, 30)),
        }),
        Exchange::Dce | Exchange::Czce | Exchange::Cffex => Some(NightSession {
            evening_cutoff: hm(20, 55),
            morning_cutoff: None,
        }),
        Exchange::Sge => Some(NightSession {
            evening_cutoff: hm(19, 50),
            morning_cutoff: Some(hm(2, 30)),
        }),
        Exchange::Sse
        | Exchange::Szse
        | Exchange::Gfex
        | Exchange::Bse
        | Exchange::Hkfe
        | Exchange::Smart => None,
    }
}

/// 交易日历
///
/// 由供应商返回的交易日构造；超出已加载范围的日期按工作日推算
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    days: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(days: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            days: days.into_iter().collect(),
        }
    }

    /// 只按周末推算的日历
    pub fn weekdays() -> Self {
        Self::default()
    }

    fn covers(&self, date: NaiveDate) -> bool {
        match (self.days.first(), self.days.last()) {
            (Some(first), Some(last)) => *first <= date && date <= *last,
            _ => false,
        }
    }

    /// 严格晚于 `date` 的第一个交易日
    pub fn next_after(&self, date: NaiveDate) -> NaiveDate {
        if self.covers(date) {
            if let Some(day) = self.days.range((Excluded(date), Unbounded)).next() {
                return *day;
            }
        }
        let mut day = date;
        loop {
            day = day.succ_opt().unwrap_or(day);
            if is_weekday(day) {
                return day;
            }
        }
    }

    /// 严格早于 `date` 的最后一个交易日
    pub fn prev_before(&self, date: NaiveDate) -> NaiveDate {
        if self.covers(date) {
            if let Some(day) = self.days.range(..date).next_back() {
                return *day;
            }
        }
        let mut day = date;
        loop {
            day = day.pred_opt().unwrap_or(day);
            if is_weekday(day) {
                return day;
            }
        }
    }
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// 原始记录日期的含义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLabel {
    /// 自然日
    Calendar,
    /// 交易日
    TradingDay,
}

/// 原始记录的时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowStamp {
    pub date: NaiveDate,
    /// 日线等只有日期的记录为 None
    pub time: Option<NaiveTime>,
    pub label: DateLabel,
}

/// 修正后的时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStamp {
    /// 所属交易日
    pub trading_day: NaiveDate,
    /// 所在交易时段开始的自然日（夜盘为开盘当晚）
    pub session_date: NaiveDate,
    /// 交易日 + 原始时刻
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Day,
    Evening,
    AfterMidnight,
}

/// 夜盘日期修正器
#[derive(Debug, Clone, Copy)]
pub struct SessionCorrector<'a> {
    night: Option<NightSession>,
    calendar: &'a TradingCalendar,
}

impl<'a> SessionCorrector<'a> {
    pub fn new(exchange: Exchange, calendar: &'a TradingCalendar) -> Self {
        Self {
            night: night_session(exchange),
            calendar,
        }
    }

    fn classify(&self, time: NaiveTime) -> Phase {
        let Some(night) = self.night else {
            return Phase::Day;
        };
        if time >= night.evening_cutoff {
            return Phase::Evening;
        }
        match night.morning_cutoff {
            // 收盘 Tick 常带毫秒，按分钟比较
            Some(cutoff) if time < cutoff + Duration::minutes(1) => Phase::AfterMidnight,
            _ => Phase::Day,
        }
    }

    pub fn correct(&self, stamp: &RowStamp) -> SessionStamp {
        let Some(time) = stamp.time else {
            return SessionStamp {
                trading_day: stamp.date,
                session_date: stamp.date,
                timestamp: stamp.date.and_time(NaiveTime::default()),
            };
        };

        let (trading_day, session_date) = match (self.classify(time), stamp.label) {
            (Phase::Day, _) => (stamp.date, stamp.date),
            (Phase::Evening, DateLabel::Calendar) => {
                (self.calendar.next_after(stamp.date), stamp.date)
            }
            (Phase::AfterMidnight, DateLabel::Calendar) => {
                let opened = stamp.date.pred_opt().unwrap_or(stamp.date);
                (self.calendar.next_after(opened), opened)
            }
            (Phase::Evening | Phase::AfterMidnight, DateLabel::TradingDay) => {
                (stamp.date, self.calendar.prev_before(stamp.date))
            }
        };

        SessionStamp {
            trading_day,
            session_date,
            timestamp: trading_day.and_time(time),
        }
    }
}
