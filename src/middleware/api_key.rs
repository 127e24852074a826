//! API Key 认证中间件
//!
//! 请求需携带 `Authorization: Bearer <api_key>`。
//! 未配置 API Key 时不做认证；健康检查供负载均衡探活，始终放行。

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpResponse,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::models::ApiResponse;

/// 免认证的接口路径后缀
const OPEN_PATH_SUFFIX: &str = "/health";

/// API Key 中间件
pub struct ApiKeyMiddleware {
    /// None 表示未启用认证
    api_key: Option<Rc<str>>,
}

impl ApiKeyMiddleware {
    pub fn new(api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            api_key: (!api_key.is_empty()).then(|| Rc::from(api_key)),
        }
    }
}

/// 是否放行：未启用认证、免认证接口或 Bearer Token 匹配
fn is_allowed(api_key: Option<&str>, path: &str, authorization: Option<&str>) -> bool {
    let Some(expected) = api_key else {
        return true;
    };
    path.ends_with(OPEN_PATH_SUFFIX)
        || authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .map_or(false, |token| token == expected)
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ApiKeyService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyService {
            service: Rc::new(service),
            api_key: self.api_key.clone(),
        }))
    }
}

pub struct ApiKeyService<S> {
    service: Rc<S>,
    api_key: Option<Rc<str>>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let authorization = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        if !is_allowed(self.api_key.as_deref(), req.path(), authorization) {
            log::warn!("拒绝未认证请求: {} {}", req.method(), req.path());
            let response = HttpResponse::Unauthorized()
                .json(ApiResponse::<()>::error("无效的 Bearer Token".to_string()));
            return Box::pin(ready(Ok(req.into_response(response).map_into_right_body())));
        }

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
