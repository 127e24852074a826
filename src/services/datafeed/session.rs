//! 米筐会话管理
//!
//! 整个服务共享一个会话，按用户名密码区分。
//! 首次查询时建立，之后多线程并发复用；初始化过程互斥，
//! 并发调用方只会看到一次初始化。

use log::{info, warn};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use crate::error::{DatafeedError, Result};

use super::symbol::InstrumentUniverse;
use super::vendor::{Credentials, VendorConnector, VendorError, VendorSession};

/// 会话建立的重试策略（指数退避）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后的等待时间（从 1 开始）
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// 执行操作，只对传输错误重试
    fn run<T>(
        &self,
        label: &str,
        mut op: impl FnMut() -> std::result::Result<T, VendorError>,
    ) -> std::result::Result<T, VendorError> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(VendorError::Transport(msg)) if attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "{}失败 (第 {}/{} 次): {}，{}ms 后重试",
                        label,
                        attempt,
                        max_attempts,
                        msg,
                        delay.as_millis()
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// 已建立的会话及其合约全集
#[derive(Clone)]
pub struct SessionHandle {
    pub session: Arc<dyn VendorSession>,
    pub universe: Arc<InstrumentUniverse>,
}

impl SessionHandle {
    /// 是否为同一次登录得到的会话
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.session) as *const (),
            Arc::as_ptr(&other.session) as *const (),
        )
    }
}

struct ActiveSession {
    credentials: Credentials,
    handle: SessionHandle,
}

/// 会话管理器
pub struct SessionManager {
    connector: Arc<dyn VendorConnector>,
    retry: RetryPolicy,
    state: RwLock<Option<ActiveSession>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn VendorConnector>, retry: RetryPolicy) -> Self {
        Self {
            connector,
            retry,
            state: RwLock::new(None),
        }
    }

    /// 获取会话，不存在或凭据变化时重新登录
    pub fn ensure_session(&self, credentials: &Credentials) -> Result<SessionHandle> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(DatafeedError::Authentication(
                "未配置数据服务用户名或密码".to_string(),
            ));
        }

        if let Some(handle) = self.current(credentials) {
            return Ok(handle);
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| DatafeedError::Connectivity("会话状态锁已损坏".to_string()))?;

        // 等锁期间可能已被其他线程初始化
        if let Some(active) = state.as_ref() {
            if active.credentials == *credentials {
                return Ok(active.handle.clone());
            }
        }

        let handle = self.establish(credentials)?;
        *state = Some(ActiveSession {
            credentials: credentials.clone(),
            handle: handle.clone(),
        });
        Ok(handle)
    }

    /// 丢弃失效的会话，下次查询重新登录
    ///
    /// 其他线程已重新登录时保留新会话
    pub fn invalidate(&self, stale: &SessionHandle) {
        if let Ok(mut state) = self.state.write() {
            let current = state
                .as_ref()
                .map_or(false, |active| active.handle.same_session(stale));
            if current {
                *state = None;
                info!("米筐会话已失效");
            }
        }
    }

    pub fn is_established(&self) -> bool {
        self.state.read().map(|s| s.is_some()).unwrap_or(false)
    }

    fn current(&self, credentials: &Credentials) -> Option<SessionHandle> {
        let state = self.state.read().ok()?;
        state
            .as_ref()
            .filter(|active| active.credentials == *credentials)
            .map(|active| active.handle.clone())
    }

    fn establish(&self, credentials: &Credentials) -> Result<SessionHandle> {
        info!("登录米筐数据服务: {}", credentials.username);

        let session = self
            .retry
            .run("米筐登录", || self.connector.connect(credentials))
            .map_err(|err| {
                warn!("米筐登录失败: {}", err);
                DatafeedError::from(err)
            })?;

        let listings = self.retry.run("加载合约列表", || session.instruments())?;
        info!("米筐登录成功，合约数量: {}", listings.len());

        Ok(SessionHandle {
            session,
            universe: Arc::new(InstrumentUniverse::new(listings)),
        })
    }
}
