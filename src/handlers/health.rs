use actix_web::{web, HttpResponse, Result};
use serde::Serialize;

use crate::models::ApiResponse;
use crate::services::datafeed::Datafeed;

/// 服务状态
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    /// 米筐会话是否已建立
    pub datafeed_ready: bool,
}

pub async fn health_check(datafeed: web::Data<Datafeed>) -> Result<HttpResponse> {
    let response = ApiResponse::success(HealthStatus {
        status: "ok",
        datafeed_ready: datafeed.is_initialized(),
    });
    Ok(HttpResponse::Ok().json(response))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}
