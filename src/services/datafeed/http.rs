//! 米筐 HTTP 接口
//!
//! 阻塞式客户端，在 actix 的阻塞线程池或普通线程中调用。
//! 登录后获得 token，后续请求通过 `token` 请求头携带。

use chrono::NaiveDate;
use log::debug;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::common::{
    RQDATA_AUTH_PATH, RQDATA_DOMINANT_PRICE_PATH, RQDATA_INSTRUMENTS_PATH, RQDATA_PRICE_PATH,
    RQDATA_TRADING_DATES_PATH,
};
use super::vendor::{
    Credentials, PriceRequest, VendorConnector, VendorError, VendorListing, VendorSession,
    VendorTable,
};

#[derive(Serialize)]
struct AuthRequest<'a> {
    user_name: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

/// HTTP 登录入口
#[derive(Debug, Clone)]
pub struct HttpConnector {
    endpoint: Url,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, VendorError> {
        let mut endpoint = endpoint.to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| VendorError::Rejected(format!("无效的接入地址 {}: {}", endpoint, e)))?;
        Ok(Self { endpoint, timeout })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl VendorConnector for HttpConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn VendorSession>, VendorError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .gzip(true)
            .build()
            .map_err(request_error)?;

        let url = join(&self.endpoint, RQDATA_AUTH_PATH)?;
        debug!("请求米筐认证 URL: {}", url);

        let response = client
            .post(url)
            .json(&AuthRequest {
                user_name: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .map_err(request_error)?;
        let auth: AuthResponse = check_status(response)?.json().map_err(request_error)?;

        if auth.token.is_empty() {
            return Err(VendorError::Unauthorized("认证未返回 token".to_string()));
        }

        Ok(Arc::new(HttpSession {
            client,
            endpoint: self.endpoint.clone(),
            token: auth.token,
        }))
    }
}

/// 已登录的 HTTP 会话
struct HttpSession {
    client: Client,
    endpoint: Url,
    token: String,
}

impl HttpSession {
    fn get<T: DeserializeOwned + Default>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, VendorError> {
        let url = join(&self.endpoint, path)?;
        debug!("请求米筐 URL: {}", url);
        let response = self
            .client
            .get(url)
            .header("token", &self.token)
            .query(query)
            .send()
            .map_err(request_error)?;
        decode(response)
    }

    fn post<B: Serialize, T: DeserializeOwned + Default>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, VendorError> {
        let url = join(&self.endpoint, path)?;
        debug!("请求米筐 URL: {}", url);
        let response = self
            .client
            .post(url)
            .header("token", &self.token)
            .json(body)
            .send()
            .map_err(request_error)?;
        decode(response)
    }
}

impl VendorSession for HttpSession {
    fn instruments(&self) -> Result<Vec<VendorListing>, VendorError> {
        self.get(RQDATA_INSTRUMENTS_PATH, &[])
    }

    fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, VendorError> {
        self.get(
            RQDATA_TRADING_DATES_PATH,
            &[
                ("start_date", start.to_string()),
                ("end_date", end.to_string()),
            ],
        )
    }

    fn price(&self, request: &PriceRequest) -> Result<VendorTable, VendorError> {
        self.post(RQDATA_PRICE_PATH, request)
    }

    fn dominant_price(&self, request: &PriceRequest) -> Result<VendorTable, VendorError> {
        self.post(RQDATA_DOMINANT_PRICE_PATH, request)
    }
}

fn join(endpoint: &Url, path: &str) -> Result<Url, VendorError> {
    endpoint
        .join(path)
        .map_err(|e| VendorError::Rejected(format!("无效的接口路径 {}: {}", path, e)))
}

fn request_error(err: reqwest::Error) -> VendorError {
    if err.is_decode() {
        VendorError::Malformed(err.to_string())
    } else {
        VendorError::Transport(err.to_string())
    }
}

/// 状态码分类：401/403 认证失败，5xx 和 429 视为传输错误，其余 4xx 为请求被拒
fn check_status(response: Response) -> Result<Response, VendorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let message = format!("{} {}", status.as_u16(), body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(VendorError::Unauthorized(message)),
        StatusCode::TOO_MANY_REQUESTS => Err(VendorError::Transport(message)),
        s if s.is_server_error() => Err(VendorError::Transport(message)),
        _ => Err(VendorError::Rejected(message)),
    }
}

/// 204 表示无数据
fn decode<T: DeserializeOwned + Default>(response: Response) -> Result<T, VendorError> {
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(T::default());
    }
    check_status(response)?.json().map_err(request_error)
}
