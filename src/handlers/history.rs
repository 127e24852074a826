//! 历史行情接口
//!
//! 数据服务是阻塞调用，统一放到 actix 的阻塞线程池执行

use actix_web::{web, HttpResponse, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::DatafeedError;
use crate::models::{ApiResponse, Exchange, HistoryRequest, Interval};
use crate::services::datafeed::Datafeed;

/// Tick 查询参数
#[derive(Debug, Deserialize)]
pub struct TickQuery {
    pub symbol: String,
    pub exchange: Exchange,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// 合约列表查询参数
#[derive(Debug, Deserialize)]
pub struct InstrumentQuery {
    pub exchange: Option<Exchange>,
}

/// 数据服务错误对应的 HTTP 响应
fn error_response(err: &DatafeedError) -> HttpResponse {
    let body = ApiResponse::<()>::error(err.to_string());
    match err {
        e if e.is_client_error() => HttpResponse::BadRequest().json(body),
        DatafeedError::Connectivity(_) => HttpResponse::ServiceUnavailable().json(body),
        _ => HttpResponse::BadGateway().json(body),
    }
}

/// 在阻塞线程池中执行查询并转换为响应
async fn run_blocking<T, F>(job: F) -> Result<HttpResponse>
where
    T: serde::Serialize + Send + 'static,
    F: FnOnce() -> Result<T, DatafeedError> + Send + 'static,
{
    match web::block(job).await {
        Ok(Ok(data)) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Ok(Err(e)) => {
            log::warn!("查询失败: {}", e);
            Ok(error_response(&e))
        }
        Err(e) => {
            log::error!("阻塞任务执行失败: {}", e);
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error(e.to_string())))
        }
    }
}

pub async fn get_bars(
    datafeed: web::Data<Datafeed>,
    query: web::Query<HistoryRequest>,
) -> Result<HttpResponse> {
    let request = query.into_inner();
    log::info!(
        "查询K线: {}.{} {} {}~{}",
        request.symbol,
        request.exchange,
        request.interval,
        request.start,
        request.end
    );
    run_blocking(move || datafeed.query_bars(&request)).await
}

pub async fn get_ticks(
    datafeed: web::Data<Datafeed>,
    query: web::Query<TickQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let request = HistoryRequest {
        symbol: query.symbol,
        exchange: query.exchange,
        interval: Interval::Tick,
        start: query.start,
        end: query.end,
    };
    log::info!(
        "查询Tick: {}.{} {}~{}",
        request.symbol,
        request.exchange,
        request.start,
        request.end
    );
    run_blocking(move || datafeed.query_ticks(&request)).await
}

pub async fn list_instruments(
    datafeed: web::Data<Datafeed>,
    query: web::Query<InstrumentQuery>,
) -> Result<HttpResponse> {
    let exchange = query.into_inner().exchange;
    run_blocking(move || datafeed.list_instruments(exchange)).await
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/history")
            .route("/bars", web::get().to(get_bars))
            .route("/ticks", web::get().to(get_ticks)),
    )
    .route("/instruments", web::get().to(list_instruments));
}
