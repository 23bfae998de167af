//! End-to-end coverage of `OkxGateway::connect`/`shutdown` against a
//! mocked REST server: the gateway accepts new work normally, then
//! rejects it once `shutdown` has been called.

use std::time::Duration;

use okx_gateway::{Environment, Order, OkxConfigBuilder, OkxGateway, OrderType, Side, TimeInForce};
use rust_decimal_macros::dec;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn connected_gateway(server: &MockServer) -> OkxGateway {
    Mock::given(method("GET"))
        .and(path("/api/v5/public/time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": "0",
            "msg": "",
            "data": [{"ts": "1700000000000"}],
        })))
        .mount(server)
        .await;

    // `get_instruments` failure is tolerated by `connect`, so no mock is
    // needed for `/api/v5/public/instruments`.

    let config = OkxConfigBuilder::new()
        .api_key("k")
        .api_secret("s")
        .passphrase("p")
        .environment(Environment::Sandbox)
        .rest_base_url_override(server.uri())
        .build()
        .unwrap();

    OkxGateway::connect(config, Vec::new()).await.unwrap()
}

#[tokio::test]
async fn place_order_is_rejected_with_a_brokerage_message_once_shutdown_is_in_progress() {
    let server = MockServer::start().await;
    let mut gateway = connected_gateway(&server).await;

    let mut messages = gateway.subscribe_messages();

    // Cancel in the background without waiting for the (possibly long)
    // drain window, so the order placed right after observes the
    // already-cancelled token.
    gateway.shutdown(Duration::from_millis(0)).await;

    let mut order = Order::new(
        "eng-1",
        "BTC-USDT",
        Side::Buy,
        dec!(1),
        OrderType::Limit,
        TimeInForce::GoodTilCanceled,
    )
    .with_limit_price(dec!(30000));

    let accepted = gateway.place_order(&mut order).await;
    assert!(accepted, "place_order always returns true by contract");
    assert!(order.exchange_order_id.is_none());

    let message = messages.recv().await.unwrap();
    assert_eq!(message.code, "GATEWAY_SHUTTING_DOWN");
}

#[tokio::test]
async fn subscribe_is_rejected_once_shutdown_is_in_progress() {
    let server = MockServer::start().await;
    let mut gateway = connected_gateway(&server).await;

    gateway.shutdown(Duration::from_millis(0)).await;

    let request = okx_gateway::DataRequest {
        symbol: "BTC-USDT".into(),
        kind: okx_gateway::DataKind::Tick(okx_gateway::TickType::Quote),
    };
    let err = gateway
        .subscribe(&request, std::sync::Arc::new(|_, _| {}))
        .unwrap_err();
    assert!(err.to_string().contains("shutting down"));
}
