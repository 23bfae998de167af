//! End-to-end coverage of the REST transport's envelope decoding and
//! signing against a mocked exchange, exercised through
//! `history::fetch_history`'s backward-walking pagination rather than by
//! calling `RestClient` internals directly.

use std::sync::Arc;

use okx_gateway::types::enums::CandleResolution;
use okx_gateway::{fetch_history, HistoryRequest, OkxConfigBuilder, RestClient};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn row(ts_ms: i64) -> serde_json::Value {
    serde_json::json!([ts_ms.to_string(), "1", "1", "1", "1", "1"])
}

async fn client_against(server: &MockServer) -> Arc<RestClient> {
    let config = OkxConfigBuilder::new()
        .api_key("k")
        .api_secret("s")
        .passphrase("p")
        .rest_base_url_override(server.uri())
        .build()
        .unwrap();
    Arc::new(RestClient::new(config).unwrap())
}

#[tokio::test]
async fn fetch_history_walks_pages_backward_and_dedups_the_boundary_row() {
    let server = MockServer::start().await;

    // First page: no `after` param, newest rows down to ts=3000 (the oldest
    // of this page, which becomes the next page's `after` bound).
    Mock::given(method("GET"))
        .and(path("/api/v5/market/history-candles"))
        .and(query_param("instId", "BTC-USDT"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "0",
                "msg": "",
                "data": [row(5000), row(4000), row(3000)],
            })),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    // Second page: `after=3000`, overlapping the boundary row (ts=3000) and
    // reaching back to ts=1000, at or before `start_ms`.
    Mock::given(method("GET"))
        .and(path("/api/v5/market/history-candles"))
        .and(query_param("after", "3000"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "0",
                "msg": "",
                "data": [row(3000), row(2000), row(1000)],
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let rest = client_against(&server).await;
    let request = HistoryRequest {
        inst_id: "BTC-USDT".into(),
        resolution: CandleResolution::OneMinute,
        start_ms: 1000,
        max_candles: 100,
    };

    let candles = fetch_history(&rest, &request).await.unwrap();
    let timestamps: Vec<i64> = candles.iter().map(|c| c.timestamp_ms).collect();
    assert_eq!(timestamps, vec![1000, 2000, 3000, 4000, 5000]);
}

#[tokio::test]
async fn fetch_history_stops_once_max_candles_is_reached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v5/market/history-candles"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "0",
                "msg": "",
                "data": [row(5000), row(4000), row(3000)],
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let rest = client_against(&server).await;
    let request = HistoryRequest {
        inst_id: "BTC-USDT".into(),
        resolution: CandleResolution::OneMinute,
        start_ms: 0,
        max_candles: 2,
    };

    let candles = fetch_history(&rest, &request).await.unwrap();
    assert_eq!(candles.len(), 3);
    assert_eq!(candles.last().unwrap().timestamp_ms, 5000);
}

#[tokio::test]
async fn fetch_history_propagates_an_envelope_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v5/market/history-candles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": "51001",
            "msg": "Instrument ID does not exist",
            "data": [],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rest = client_against(&server).await;
    let request = HistoryRequest {
        inst_id: "NOPE-USDT".into(),
        resolution: CandleResolution::OneMinute,
        start_ms: 0,
        max_candles: 10,
    };

    let err = fetch_history(&rest, &request).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("51001"), "unexpected error message: {message}");
}
