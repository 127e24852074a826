//! 米筐历史行情数据服务
//!
//! 提供期货、期权、黄金现货及股票的历史K线和Tick数据 RESTful API
//! 数据来源：米筐 RQData

use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;

use rqdata_feed::config::AppConfig;
use rqdata_feed::handlers;
use rqdata_feed::middleware::ApiKeyMiddleware;
use rqdata_feed::services::datafeed::Datafeed;

/// 应用程序入口
///
/// 加载配置后启动 HTTP 服务器，米筐会话在首次查询时建立
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load();

    // 初始化日志系统，RUST_LOG 优先于配置文件
    env_logger::init_from_env(Env::default().default_filter_or(config.log.level.as_str()));

    config.datafeed.validate()?;
    if config.api.api_key.is_empty() {
        log::warn!("未设置 API_KEY，接口不做认证");
    }

    let datafeed = web::Data::new(Datafeed::from_config(&config.datafeed)?);
    log::info!(
        "启动米筐数据服务，接入地址: {}，监听: {}",
        config.datafeed.endpoint,
        config.bind_addr()
    );

    let api_key = config.api.api_key.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(datafeed.clone())
            .wrap(ApiKeyMiddleware::new(api_key.clone())) // API Key 认证
            .wrap(Logger::default()) // 请求日志
            .configure(handlers::config)
    });
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    server.bind(config.bind_addr())?.run().await?;
    Ok(())
}
