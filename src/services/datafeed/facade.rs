//! 米筐数据服务入口
//!
//! 查询流程：
//! 1. 代码映射、时间周期转换（不联网，输入错误直接返回）
//! 2. 获取会话，按会话的合约全集重新映射并检查合约是否存在
//! 3. 加载交易日历，查询区间向后延长一个交易日以取得结束日夜盘
//! 4. 调用米筐接口，解析并标准化

use chrono::{Duration, NaiveDate};
use log::{info, warn};
use std::sync::Arc;

use crate::config::DatafeedConfig;
use crate::error::{DatafeedError, Result};
use crate::models::{
    CanonicalBar, CanonicalTick, Exchange, HistoryRequest, InstrumentRef, Interval, QueryWindow,
};

use super::calendar::{SessionCorrector, TradingCalendar};
use super::common::exchange_from_vendor;
use super::http::HttpConnector;
use super::interval::{self, Endpoint, VendorQuerySpec};
use super::normalizer::{normalize_bars, normalize_ticks, parse_bar_table, parse_tick_table};
use super::session::{RetryPolicy, SessionHandle, SessionManager};
use super::symbol::{AssetClass, ResolvedInstrument, SymbolMapper};
use super::vendor::{Credentials, PriceRequest, VendorConnector, VendorError, VendorTable};

/// 交易日历的加载范围在查询区间两侧各延长的天数（覆盖长假）
const CALENDAR_MARGIN_DAYS: i64 = 20;

/// 单次查询的准备结果
struct PreparedQuery {
    instrument: InstrumentRef,
    window: QueryWindow,
    resolved: ResolvedInstrument,
    spec: VendorQuerySpec,
    handle: SessionHandle,
    calendar: TradingCalendar,
}

/// 米筐数据服务
pub struct Datafeed {
    credentials: Credentials,
    sessions: SessionManager,
}

impl Datafeed {
    pub fn new(
        credentials: Credentials,
        connector: Arc<dyn VendorConnector>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            credentials,
            sessions: SessionManager::new(connector, retry),
        }
    }

    /// 使用 HTTP 接口创建
    pub fn from_config(config: &DatafeedConfig) -> Result<Self> {
        let connector = HttpConnector::new(&config.endpoint, config.timeout())?;
        Ok(Self::new(
            Credentials::new(config.username.clone(), config.password.clone()),
            Arc::new(connector),
            config.retry.policy(),
        ))
    }

    /// 提前建立会话
    pub fn init(&self) -> Result<()> {
        self.session().map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.sessions.is_established()
    }

    /// 查询K线
    ///
    /// 无数据时返回空序列
    pub fn query_bars(&self, request: &HistoryRequest) -> Result<Vec<CanonicalBar>> {
        if request.interval == Interval::Tick {
            return Err(DatafeedError::UnsupportedInterval(
                "Tick 数据请使用 Tick 查询接口".to_string(),
            ));
        }
        let window = request.window()?;
        let query = self.prepare(request.instrument(), window)?;

        let table = self.fetch(&query)?;
        let rows = parse_bar_table(&table, window.interval(), query.spec.bar_start_offset)?;
        let corrector = SessionCorrector::new(query.instrument.exchange, &query.calendar);
        let bars = normalize_bars(rows, &query.window, &query.instrument, &corrector);

        info!(
            "查询K线完成: {} {} {}~{}，共 {} 条",
            query.instrument.vt_symbol(),
            window.interval(),
            window.start(),
            window.end(),
            bars.len()
        );
        Ok(bars)
    }

    /// 查询Tick
    ///
    /// 忽略请求中的时间周期
    pub fn query_ticks(&self, request: &HistoryRequest) -> Result<Vec<CanonicalTick>> {
        let window = QueryWindow::new(request.start, request.end, Interval::Tick)?;
        let query = self.prepare(request.instrument(), window)?;

        let table = self.fetch(&query)?;
        let rows = parse_tick_table(&table)?;
        let corrector = SessionCorrector::new(query.instrument.exchange, &query.calendar);
        let ticks = normalize_ticks(rows, &query.window, &query.instrument, &corrector);

        info!(
            "查询Tick完成: {} {}~{}，共 {} 条",
            query.instrument.vt_symbol(),
            window.start(),
            window.end(),
            ticks.len()
        );
        Ok(ticks)
    }

    /// 米筐支持的合约，可按交易所过滤
    ///
    /// 无法映射为平台代码的合约会被跳过
    pub fn list_instruments(&self, exchange: Option<Exchange>) -> Result<Vec<InstrumentRef>> {
        let handle = self.session()?;
        let mapper = SymbolMapper::with_universe(&handle.universe);

        let instruments: Vec<InstrumentRef> = handle
            .universe
            .listings()
            .iter()
            .filter_map(|listing| {
                let venue = exchange_from_vendor(&listing.exchange)?;
                if exchange.map_or(false, |wanted| wanted != venue) {
                    return None;
                }
                mapper.map_from_vendor(&listing.order_book_id, venue).ok()
            })
            .collect();
        Ok(instruments)
    }

    fn session(&self) -> Result<SessionHandle> {
        self.sessions.ensure_session(&self.credentials)
    }

    fn prepare(&self, instrument: InstrumentRef, window: QueryWindow) -> Result<PreparedQuery> {
        // 先做不联网的检查
        let preliminary = SymbolMapper::new().resolve(&instrument)?;
        interval::resolve(&window, preliminary.asset_class)?;

        let handle = self.session()?;
        let resolved = SymbolMapper::with_universe(&handle.universe).resolve(&instrument)?;
        let spec = interval::resolve(&window, resolved.asset_class)?;

        // 主力连续不在合约列表中
        if resolved.asset_class != AssetClass::Dominant
            && !handle.universe.is_empty()
            && !handle.universe.contains(resolved.code.as_str())
        {
            return Err(DatafeedError::UnsupportedInstrument(format!(
                "{} ({})",
                instrument.vt_symbol(),
                resolved.code
            )));
        }

        let calendar = self.load_calendar(&handle, &window)?;

        Ok(PreparedQuery {
            instrument,
            window,
            resolved,
            spec,
            handle,
            calendar,
        })
    }

    fn load_calendar(&self, handle: &SessionHandle, window: &QueryWindow) -> Result<TradingCalendar> {
        let margin = Duration::days(CALENDAR_MARGIN_DAYS);
        let from = window.start() - margin;
        let to = window.end() + margin;
        let days = handle
            .session
            .trading_dates(from, to)
            .map_err(|err| self.vendor_failure(handle, err))?;
        if days.is_empty() {
            warn!("未获取到交易日历 {}~{}，按工作日推算", from, to);
        }
        Ok(TradingCalendar::new(days))
    }

    fn fetch(&self, query: &PreparedQuery) -> Result<VendorTable> {
        let request = self.price_request(query);
        let session = &query.handle.session;
        let result = match query.spec.endpoint {
            Endpoint::DominantBars => session.dominant_price(&request),
            Endpoint::Bars | Endpoint::Ticks => session.price(&request),
        };
        result.map_err(|err| self.vendor_failure(&query.handle, err))
    }

    /// 开始日向前取一个交易日（前一晚夜盘属于开始日），
    /// 结束日向后取一个交易日（结束日当晚夜盘）
    fn price_request(&self, query: &PreparedQuery) -> PriceRequest {
        let start_date: NaiveDate = query.calendar.prev_before(query.window.start());
        let end_date: NaiveDate = query.calendar.next_after(query.window.end());
        PriceRequest {
            order_book_id: query.resolved.code.to_string(),
            frequency: query.spec.frequency.to_string(),
            fields: query.spec.fields.iter().map(|f| f.to_string()).collect(),
            start_date,
            end_date,
            adjust_type: query.spec.adjustment.adjust_type().to_string(),
            adjust_method: query.spec.adjustment.adjust_method().map(str::to_string),
        }
    }

    /// 查询失败不重试；认证失败时丢弃该会话，下次查询重新登录
    fn vendor_failure(&self, handle: &SessionHandle, err: VendorError) -> DatafeedError {
        warn!("米筐查询失败: {}", err);
        if matches!(err, VendorError::Unauthorized(_)) {
            self.sessions.invalidate(handle);
        }
        DatafeedError::from(err)
    }
}
