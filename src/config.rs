//! 配置模块
//!
//! 支持从 JSON 文件加载系统配置，敏感项可由环境变量覆盖：
//! - `API_KEY` -> `api.api_key`
//! - `DATAFEED_USERNAME` -> `datafeed.username`
//! - `DATAFEED_PASSWORD` -> `datafeed.password`

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::services::datafeed::{RetryPolicy, RQDATA_DEFAULT_ENDPOINT};

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 工作线程数（0 表示使用 CPU 核心数）
    #[serde(default)]
    pub workers: usize,
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API Key（为空则不启用认证）
    #[serde(default)]
    pub api_key: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// 会话建立的重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

/// 数据服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatafeedConfig {
    /// 数据服务名称，目前只支持 rqdata
    #[serde(default = "default_datafeed_name")]
    pub name: String,
    /// 米筐用户名（license 模式填 "license"）
    #[serde(default)]
    pub username: String,
    /// 米筐密码或 license
    #[serde(default, skip_serializing)]
    pub password: String,
    /// 接入地址
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// 单次请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// API 配置
    #[serde(default)]
    pub api: ApiConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
    /// 数据服务配置
    #[serde(default)]
    pub datafeed: DatafeedConfig,
}

// 默认值函数
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_timeout() -> u64 { 30 }
fn default_log_level() -> String { "info".to_string() }
fn default_datafeed_name() -> String { "rqdata".to_string() }
fn default_endpoint() -> String { RQDATA_DEFAULT_ENDPOINT.to_string() }
fn default_max_attempts() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 5000 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: 0,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for DatafeedConfig {
    fn default() -> Self {
        Self {
            name: default_datafeed_name(),
            username: String::new(),
            password: String::new(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

impl DatafeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 检查配置项
    ///
    /// 用户名密码为空不在这里报错，首次查询时返回认证错误
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.name.eq_ignore_ascii_case("rqdata") {
            bail!("不支持的数据服务: {}", self.name);
        }
        if self.retry.max_attempts == 0 {
            bail!("datafeed.retry.max_attempts 必须大于 0");
        }
        if self.timeout_secs == 0 {
            bail!("datafeed.timeout_secs 必须大于 0");
        }
        Ok(())
    }
}

impl AppConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件 {} 失败", path.display()))?;
        Self::from_json(&content)
    }

    /// 从 JSON 字符串解析配置
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_json::from_str(content)?;
        config.datafeed.validate()?;
        Ok(config)
    }

    /// 加载配置，优先从文件，失败则使用默认值，最后应用环境变量
    pub fn load() -> Self {
        let config_paths = ["config.json", "config/config.json"];

        let mut config = None;
        for path in config_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(loaded) => {
                        log::info!("从 {} 加载配置成功", path);
                        config = Some(loaded);
                        break;
                    }
                    Err(e) => {
                        log::warn!("加载配置文件 {} 失败: {:#}", path, e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_else(|| {
            log::info!("使用默认配置");
            Self::default()
        });
        config.apply_env(|key| env::var(key).ok());
        config
    }

    /// 用环境变量覆盖敏感配置
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(api_key) = lookup("API_KEY") {
            self.api.api_key = api_key;
        }
        if let Some(username) = lookup("DATAFEED_USERNAME") {
            self.datafeed.username = username;
        }
        if let Some(password) = lookup("DATAFEED_PASSWORD") {
            self.datafeed.password = password;
        }
    }

    /// 获取服务器绑定地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.log.level, "info");
        assert_eq!(config.datafeed.name, "rqdata");
        assert_eq!(config.datafeed.endpoint, RQDATA_DEFAULT_ENDPOINT);
        assert_eq!(config.datafeed.retry.policy(), RetryPolicy::default());
    }

    #[test]
    fn test_datafeed_section() {
        let config = AppConfig::from_json(
            r#"{
                "datafeed": {
                    "name": "rqdata",
                    "username": "license",
                    "password": "abc",
                    "timeout_secs": 5,
                    "retry": { "max_attempts": 5 }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.datafeed.username, "license");
        assert_eq!(config.datafeed.timeout(), Duration::from_secs(5));
        assert_eq!(config.datafeed.retry.max_attempts, 5);
        assert_eq!(config.datafeed.retry.initial_backoff_ms, 500);
    }

    #[test]
    fn test_unknown_datafeed_is_rejected() {
        assert!(AppConfig::from_json(r#"{"datafeed": {"name": "tushare"}}"#).is_err());
        assert!(AppConfig::from_json(r#"{"datafeed": {"retry": {"max_attempts": 0}}}"#).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            "API_KEY" => Some("k".to_string()),
            "DATAFEED_PASSWORD" => Some("p".to_string()),
            _ => None,
        });
        assert_eq!(config.api.api_key, "k");
        assert_eq!(config.datafeed.password, "p");
        assert!(config.datafeed.username.is_empty());
    }

    #[test]
    fn test_password_is_not_serialized() {
        let mut config = AppConfig::default();
        config.datafeed.password = "secret".to_string();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
