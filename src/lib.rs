//! 米筐历史行情数据服务
//!
//! 将平台通用的历史数据查询（K线、Tick）适配到米筐 RQData 接口，
//! 并以 RESTful API 的形式对外提供。

pub mod config;     // 配置
pub mod error;      // 错误定义
pub mod handlers;   // HTTP 请求处理器
pub mod middleware; // 中间件
pub mod models;     // 数据模型定义
pub mod services;   // 业务逻辑服务

pub use error::{DatafeedError, Result};
pub use services::datafeed::Datafeed;
