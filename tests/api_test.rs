use axum::body::Body;
use axum::http::{Request, StatusCode};
use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use crosspay_core::adapters::InMemoryOrderStore;
use crosspay_core::config::FeeConfig;
use crosspay_core::domain::{Chain, PaymentRequest, PaymentRequestStatus};
use crosspay_core::providers::http::{ApiKey, HttpSettings};
use crosspay_core::providers::{ChangeNowProvider, SwapProvider};
use crosspay_core::services::RetryPolicy;
use crosspay_core::{create_app, AppState};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const TRON_ADDRESS: &str = "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7";
const EVM_ADDRESS: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

struct TestApp {
    router: axum::Router,
    store: Arc<InMemoryOrderStore>,
    server: ServerGuard,
}

async fn setup_test_app() -> TestApp {
    let server = Server::new_async().await;
    let provider: Arc<dyn SwapProvider> = Arc::new(ChangeNowProvider::new(
        server.url(),
        ApiKey::new("test-key"),
        &HttpSettings::default(),
    ));
    let store = Arc::new(InMemoryOrderStore::new());

    let state = AppState::new(
        store.clone(),
        vec![provider],
        FeeConfig::default(),
        RetryPolicy::immediate(),
    )
    .unwrap();

    TestApp {
        router: create_app(state),
        store,
        server,
    }
}

async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn dec(value: &Value) -> BigDecimal {
    BigDecimal::from_str(value.as_str().unwrap()).unwrap()
}

fn direct_order(amount: &str) -> Value {
    json!({
        "fromChain": "tron",
        "fromAsset": "usdt",
        "amount": amount,
        "toChain": "ethereum",
        "toAsset": "eth",
        "recipientAddress": EVM_ADDRESS
    })
}

fn payment_request(status: PaymentRequestStatus, expires_in: Duration) -> PaymentRequest {
    let now = Utc::now();
    PaymentRequest {
        id: Uuid::new_v4(),
        amount: BigDecimal::from(250),
        currency: "USDC".to_string(),
        chain: Chain::Base,
        recipient_address: EVM_ADDRESS.to_string(),
        description: Some("Invoice 1042".to_string()),
        status,
        created_at: now - Duration::minutes(5),
        expires_at: now + expires_in,
    }
}

#[tokio::test]
async fn test_create_order_and_refresh_status() {
    let mut app = setup_test_app().await;

    let create = app
        .server
        .mock("POST", "/exchange")
        .match_header("x-changenow-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "fromCurrency": "usdt",
            "fromNetwork": "trx",
            "toCurrency": "eth",
            "toNetwork": "eth",
            "address": EVM_ADDRESS
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"id": "cn-77", "payinAddress": TRON_ADDRESS, "toAmount": "0.3"}).to_string())
        .expect(1)
        .create_async()
        .await;

    let (status, body) = send(&app.router, post_json("/create-order", direct_order("1000"))).await;
    create.assert_async().await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["depositAddress"], TRON_ADDRESS);
    assert_eq!(dec(&body["platformFee"]["amount"]), BigDecimal::from(10));
    assert_eq!(dec(&body["platformFee"]["percent"]), BigDecimal::from(1));
    assert_eq!(dec(&body["estimatedAmount"]), BigDecimal::from_str("0.3").unwrap());
    assert_eq!(body["order"]["status"], "awaiting_deposit");
    assert_eq!(body["order"]["provider"], "changenow");
    assert_eq!(body["order"]["exchangeId"], "cn-77");
    assert_eq!(dec(&body["order"]["amount"]), BigDecimal::from(1000));
    assert_eq!(dec(&body["order"]["amountAfterFee"]), BigDecimal::from(990));

    let order_id = body["orderId"].as_str().unwrap().to_string();

    let finished = app
        .server
        .mock("GET", "/exchange/by-id")
        .match_query(Matcher::UrlEncoded("id".into(), "cn-77".into()))
        .with_status(200)
        .with_body(r#"{"status":"finished","payinHash":null,"payoutHash":"0xabc"}"#)
        .expect(1)
        .create_async()
        .await;

    let (status, body) = send(&app.router, get(&format!("/status/{}", order_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["swapTxHash"], "0xabc");
    assert_eq!(body["depositTxHash"], Value::Null);
    assert_eq!(body["paymentRequest"], Value::Null);

    // Terminal orders are served from the store without polling.
    let (status, body) = send(&app.router, get(&format!("/status/{}", order_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    finished.assert_async().await;
}

#[tokio::test]
async fn test_status_refresh_failure_serves_cached_order() {
    let mut app = setup_test_app().await;

    app.server
        .mock("POST", "/exchange")
        .with_status(200)
        .with_body(json!({"id": "cn-5", "payinAddress": TRON_ADDRESS, "toAmount": 0.01}).to_string())
        .create_async()
        .await;
    app.server
        .mock("GET", "/exchange/by-id")
        .match_query(Matcher::Any)
        .with_status(502)
        .create_async()
        .await;

    let (_, body) = send(&app.router, post_json("/create-order", direct_order("50"))).await;
    let order_id = body["orderId"].as_str().unwrap().to_string();

    let (status, body) = send(&app.router, get(&format!("/status/{}", order_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "awaiting_deposit");
}

#[tokio::test]
async fn test_create_order_for_payment_request() {
    let mut app = setup_test_app().await;
    let request = payment_request(PaymentRequestStatus::Pending, Duration::hours(1));
    app.store.insert_request(request.clone()).await;

    app.server
        .mock("POST", "/exchange")
        .match_body(Matcher::PartialJson(json!({
            "toCurrency": "usdc",
            "toNetwork": "base",
            "address": EVM_ADDRESS
        })))
        .with_status(200)
        .with_body(json!({"id": "cn-9", "payinAddress": TRON_ADDRESS, "toAmount": "24.6"}).to_string())
        .create_async()
        .await;

    let body = json!({
        "requestId": request.id,
        "fromChain": "tron",
        "fromAsset": "USDT",
        "amount": "25",
        "refundAddress": TRON_ADDRESS
    });
    let (status, created) = send(&app.router, post_json("/create-order", body)).await;
    assert_eq!(status, StatusCode::OK, "{}", created);
    assert_eq!(created["order"]["requestId"], request.id.to_string());
    assert_eq!(created["order"]["refundAddress"], TRON_ADDRESS);

    let (status, orders) = send(&app.router, get(&format!("/orders/{}", request.id))).await;
    assert_eq!(status, StatusCode::OK);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], created["orderId"]);
}

#[tokio::test]
async fn test_unknown_payment_request_is_not_found() {
    let app = setup_test_app().await;
    let body = json!({
        "requestId": Uuid::new_v4(),
        "fromChain": "tron",
        "fromAsset": "USDT",
        "amount": "25"
    });

    let (status, body) = send(&app.router, post_json("/create-order", body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_expired_payment_request_is_rejected() {
    let app = setup_test_app().await;
    let request = payment_request(PaymentRequestStatus::Pending, Duration::minutes(-1));
    app.store.insert_request(request.clone()).await;

    let body = json!({
        "requestId": request.id,
        "fromChain": "tron",
        "fromAsset": "USDT",
        "amount": "25"
    });
    let (status, body) = send(&app.router, post_json("/create-order", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no longer open"));
}

#[tokio::test]
async fn test_same_asset_same_chain_never_reaches_provider() {
    let mut app = setup_test_app().await;
    let mock = app.server.mock("POST", "/exchange").expect(0).create_async().await;

    let body = json!({
        "fromChain": "tron",
        "fromAsset": "USDT",
        "amount": "100",
        "toChain": "trc20",
        "toAsset": "usdt",
        "recipientAddress": TRON_ADDRESS
    });
    let (status, body) = send(&app.router, post_json("/create-order", body)).await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("USDT/tron -> USDT/tron"));
}

#[tokio::test]
async fn test_invalid_body_is_bad_request() {
    let app = setup_test_app().await;

    let (status, body) = send(&app.router, post_json("/create-order", json!({"amount": "10"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, _) = send(&app.router, post_json("/create-order", direct_order("-5"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provider_outage_returns_service_unavailable() {
    let mut app = setup_test_app().await;
    let mock = app
        .server
        .mock("POST", "/exchange")
        .with_status(503)
        .with_body(r#"{"error":"maintenance"}"#)
        .expect(5)
        .create_async()
        .await;

    let (status, body) = send(&app.router, post_json("/create-order", direct_order("100"))).await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("USDT/tron -> ETH/ethereum"));
}

#[tokio::test]
async fn test_provider_auth_failure_is_unauthorized() {
    let mut app = setup_test_app().await;
    let mock = app
        .server
        .mock("POST", "/exchange")
        .with_status(401)
        .with_body(r#"{"error":"unauthorized"}"#)
        .expect(1)
        .create_async()
        .await;

    let (status, body) = send(&app.router, post_json("/create-order", direct_order("100"))).await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("CHANGENOW_API_KEY"));
    assert!(!message.contains("test-key"));
}

#[tokio::test]
async fn test_forward_and_reverse_rates() {
    let mut app = setup_test_app().await;
    app.server
        .mock("GET", "/exchange/estimated-amount")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"toAmount":"0.3"}"#)
        .create_async()
        .await;
    app.server
        .mock("GET", "/exchange/range")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"minAmount":"10","maxAmount":null}"#)
        .create_async()
        .await;

    let forward = json!({
        "fromChain": "tron",
        "fromAsset": "USDT",
        "toChain": "ethereum",
        "toAsset": "ETH",
        "amount": "1000",
        "direction": "forward"
    });
    let (status, body) = send(&app.router, post_json("/exchange-rate", forward)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["direction"], "forward");
    assert_eq!(dec(&body["fromAmount"]), BigDecimal::from(1000));
    assert_eq!(dec(&body["estimatedToAmount"]), BigDecimal::from_str("0.3").unwrap());
    assert_eq!(dec(&body["minAmount"]), BigDecimal::from(10));
    assert_eq!(body["maxAmount"], Value::Null);

    let reverse = json!({
        "fromChain": "tron",
        "fromAsset": "USDT",
        "toChain": "ethereum",
        "toAsset": "ETH",
        "amount": "0.3",
        "direction": "reverse"
    });
    let (status, body) = send(&app.router, post_json("/exchange-rate", reverse)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["direction"], "reverse");
    assert_eq!(dec(&body["estimatedToAmount"]), BigDecimal::from_str("0.3").unwrap());
    assert!(dec(&body["fromAmount"]) > BigDecimal::from(0));
}

#[tokio::test]
async fn test_unknown_order_status_is_not_found() {
    let app = setup_test_app().await;
    let (status, body) = send(&app.router, get(&format!("/status/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);

    let (status, _) = send(&app.router, get("/status/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_providers() {
    let app = setup_test_app().await;
    let (status, body) = send(&app.router, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "connected");
    assert_eq!(body["providers"][0]["name"], "changenow");
    assert_eq!(body["providers"][0]["circuit"], "closed");
}

#[tokio::test]
async fn test_responses_carry_cors_and_request_id() {
    let app = setup_test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("origin", "https://shop.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert!(response.headers().contains_key("x-request-id"));
}
