//! 业务逻辑服务模块
//!
//! 封装数据获取和处理逻辑

pub mod datafeed; // 米筐历史行情数据服务
