//! 米筐数据接口约定
//!
//! 对外部行情供应商的调用全部经过这里定义的 trait，
//! 真实实现见 `http` 模块，测试中可以替换为内存实现。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::error::DatafeedError;

/// 供应商错误
///
/// 只在数据服务内部使用，出口处转换为 `DatafeedError`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VendorError {
    /// 用户名密码被拒绝、许可过期
    #[error("认证被拒绝: {0}")]
    Unauthorized(String),

    /// 网络、超时等传输层错误
    #[error("传输错误: {0}")]
    Transport(String),

    /// 请求被供应商拒绝（参数错误、无权限的合约等）
    #[error("请求被拒绝: {0}")]
    Rejected(String),

    /// 响应无法解析
    #[error("响应格式错误: {0}")]
    Malformed(String),
}

/// 登录凭据
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 合约列表中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorListing {
    /// 米筐合约代码
    pub order_book_id: String,
    /// 米筐交易所代码（XSHG、XSHE、SHFE、SGEX ...）
    pub exchange: String,
}

impl VendorListing {
    pub fn new(order_book_id: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            order_book_id: order_book_id.into(),
            exchange: exchange.into(),
        }
    }
}

/// 表格形式的行情响应
///
/// 与 DataFrame 对应：列名 + 按行排列的数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorTable {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl VendorTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// 行情查询参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceRequest {
    pub order_book_id: String,
    pub frequency: String,
    pub fields: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub adjust_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjust_method: Option<String>,
}

/// 已建立的供应商会话
///
/// 会话建立后可被多个线程同时使用
pub trait VendorSession: Send + Sync {
    /// 全部合约
    fn instruments(&self) -> Result<Vec<VendorListing>, VendorError>;

    /// 区间内的交易日（含首尾）
    fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, VendorError>;

    /// K线或Tick行情，对应 get_price
    fn price(&self, request: &PriceRequest) -> Result<VendorTable, VendorError>;

    /// 主力连续K线，对应 get_dominant_price
    fn dominant_price(&self, request: &PriceRequest) -> Result<VendorTable, VendorError>;
}

/// 供应商登录入口
pub trait VendorConnector: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn VendorSession>, VendorError>;
}

impl From<VendorError> for DatafeedError {
    fn from(err: VendorError) -> Self {
        match err {
            VendorError::Unauthorized(msg) => DatafeedError::Authentication(msg),
            VendorError::Transport(msg) => DatafeedError::Connectivity(msg),
            VendorError::Rejected(msg) => DatafeedError::InvalidRequest(msg),
            VendorError::Malformed(msg) => DatafeedError::DataFormat(msg),
        }
    }
}
