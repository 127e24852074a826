//! REST 接口测试

mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::Value;

use common::{bar_row, datafeed, table, FakeVendor, BAR_COLUMNS};
use rqdata_feed::handlers;
use rqdata_feed::middleware::ApiKeyMiddleware;
use rqdata_feed::services::datafeed::VendorError;

const API_KEY: &str = "test-key";

fn vendor() -> FakeVendor {
    FakeVendor::new()
        .list("IF2406", "CFFEX")
        .list("RB2410", "SHFE")
        .serve(
            "IF2406",
            "1d",
            table(
                &BAR_COLUMNS,
                vec![bar_row("2024-06-03", 3600.0), bar_row("2024-06-03 21:00:00", 3610.0)],
            ),
        )
}

macro_rules! app {
    ($vendor:expr) => {{
        let (feed, _) = datafeed($vendor);
        test::init_service(
            App::new()
                .app_data(web::Data::new(feed))
                .wrap(ApiKeyMiddleware::new(API_KEY.to_string()))
                .configure(handlers::config),
        )
        .await
    }};
}

fn get(uri: &str) -> test::TestRequest {
    test::TestRequest::get()
        .uri(uri)
        .insert_header(("Authorization", format!("Bearer {}", API_KEY)))
}

#[actix_web::test]
async fn test_health_needs_no_key() {
    let app = app!(vendor());
    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["datafeed_ready"], false);
}

#[actix_web::test]
async fn test_missing_key_is_rejected() {
    let app = app!(vendor());
    let req = test::TestRequest::get()
        .uri("/api/v1/instruments")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn test_query_bars() {
    let app = app!(vendor());
    let req = get("/api/v1/history/bars?symbol=IF2406&exchange=CFFEX&interval=d&start=2024-06-01&end=2024-06-03")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let bars = body["data"].as_array().unwrap();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0]["instrument"]["symbol"], "IF2406");
    assert_eq!(bars[0]["interval"], "d");
    assert_eq!(bars[1]["timestamp"], "2024-06-04T21:00:00+08:00");
}

#[actix_web::test]
async fn test_query_ticks_without_data() {
    let app = app!(vendor());
    let req = get("/api/v1/history/ticks?symbol=rb2410&exchange=SHFE&start=2024-06-03&end=2024-06-03")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"], Value::Array(vec![]));
}

#[actix_web::test]
async fn test_client_errors_are_bad_request() {
    let app = app!(vendor());
    for uri in [
        "/api/v1/history/bars?symbol=IF2406&exchange=GFEX&interval=d&start=2024-06-01&end=2024-06-03",
        "/api/v1/history/bars?symbol=IF2406&exchange=CFFEX&interval=w&start=2024-06-01&end=2024-06-03",
        "/api/v1/history/bars?symbol=IF2406&exchange=CFFEX&interval=d&start=2024-06-05&end=2024-06-03",
    ] {
        let resp = test::call_service(&app, get(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[actix_web::test]
async fn test_vendor_failures_map_to_gateway_errors() {
    let app = app!(vendor().fail_price(VendorError::Transport("reset".into())));
    let uri = "/api/v1/history/bars?symbol=IF2406&exchange=CFFEX&interval=d&start=2024-06-01&end=2024-06-03";
    let resp = test::call_service(&app, get(uri).to_request()).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let app = app!(vendor().reject_login(VendorError::Unauthorized("expired".into())));
    let resp = test::call_service(&app, get(uri).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn test_list_instruments() {
    let app = app!(vendor());
    let resp = test::call_service(&app, get("/api/v1/instruments?exchange=SHFE").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"][0]["symbol"], "rb2410");
    assert_eq!(body["data"][0]["exchange"], "SHFE");
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}
