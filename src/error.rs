//! 数据服务错误定义
//!
//! 供应商返回的所有错误在查询入口处统一转换为 `DatafeedError`，
//! 不会有供应商专属的错误类型泄漏给调用方。
//! “无数据”不是错误，表现为空序列。

use thiserror::Error;

/// 数据服务错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatafeedError {
    /// 用户名密码无效或权限过期，不重试
    #[error("认证失败: {0}")]
    Authentication(String),

    /// 合约代码无法映射
    #[error("不支持的合约代码: {0}")]
    UnsupportedInstrument(String),

    /// 时间周期不支持该品种
    #[error("不支持的时间周期: {0}")]
    UnsupportedInterval(String),

    /// 网络或传输层故障
    #[error("网络连接失败: {0}")]
    Connectivity(String),

    /// 请求参数无效
    #[error("请求参数无效: {0}")]
    InvalidRequest(String),

    /// 供应商返回的数据无法解析
    #[error("数据格式错误: {0}")]
    DataFormat(String),
}

impl DatafeedError {
    /// 调用方修正输入即可解决的错误
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DatafeedError::UnsupportedInstrument(_)
                | DatafeedError::UnsupportedInterval(_)
                | DatafeedError::InvalidRequest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DatafeedError>;
