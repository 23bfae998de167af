//! Signed REST transport (C2): envelope decoding, HMAC signing, rate
//! gating and pagination. Keeps `nord::rest::NordHttpClient`'s wrapper
//! shape (a `reqwest::Client` plus a base URL) but layers OKX's envelope,
//! signing headers and per-group rate gate on top.

pub mod endpoints;
pub mod rate_limit;
pub mod signing;

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::OkxConfig;
use crate::error::{OkxError, Result};
use rate_limit::{EndpointGroup, RateGate};

/// The envelope shared by every OKX v5 REST response: `{code, msg, data}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: String,
    pub msg: String,
    #[serde(default)]
    pub data: Vec<T>,
}

impl<T> Envelope<T> {
    /// A response is successful iff the envelope code is `"0"`.
    pub fn is_ok(&self) -> bool {
        self.code == "0"
    }

    pub fn into_result(self) -> Result<Vec<T>> {
        if self.is_ok() {
            Ok(self.data)
        } else {
            Err(OkxError::Envelope {
                code: self.code,
                msg: self.msg,
            })
        }
    }
}

/// Per-item order acknowledgement, carrying the trading-engine-level
/// `sCode`/`sMsg` alongside the transport envelope. A response is
/// successful only when both the envelope code and every item's `sCode`
/// are `"0"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    #[serde(default)]
    pub ord_id: String,
    #[serde(default)]
    pub cl_ord_id: String,
    pub s_code: String,
    pub s_msg: String,
}

impl OrderAck {
    pub fn is_ok(&self) -> bool {
        self.s_code == "0"
    }
}

/// The signed REST client. Owns the HTTP client, base URL, credentials and
/// the rate gate; every signed call goes through [`RestClient::signed`].
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    config: OkxConfig,
    rate_gate: std::sync::Arc<RateGate>,
}

impl RestClient {
    pub fn new(config: OkxConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(OkxError::Request)?;
        let base_url = config
            .rest_base_url_override
            .clone()
            .unwrap_or_else(|| config.environment.rest_base_url().to_string());
        Ok(Self {
            base_url,
            http,
            config,
            rate_gate: std::sync::Arc::new(RateGate::new()),
        })
    }

    pub fn rate_gate(&self) -> &RateGate {
        &self.rate_gate
    }

    /// An unsigned GET against a public endpoint.
    pub async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        self.rate_gate.acquire(EndpointGroup::Public).await;
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).query(query).send().await?;
        self.decode_envelope(resp).await
    }

    /// A signed GET, gated under `group`.
    pub async fn signed_get<T: DeserializeOwned>(
        &self,
        group: EndpointGroup,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        self.rate_gate.acquire(group).await;
        let full_path = if query.is_empty() {
            path.to_string()
        } else {
            let qs = query
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&");
            format!("{path}?{qs}")
        };
        let headers = signing::sign_request(&self.config, "GET", &full_path, "");
        let url = format!("{}{}", self.base_url, full_path);
        let resp = self.apply_headers(self.http.get(&url), &headers).send().await?;
        self.decode_envelope(resp).await
    }

    /// A signed POST with a JSON body, gated under `group`.
    pub async fn signed_post<B: Serialize, T: DeserializeOwned>(
        &self,
        group: EndpointGroup,
        path: &str,
        body: &B,
    ) -> Result<Vec<T>> {
        self.rate_gate.acquire(group).await;
        let body_str = serde_json::to_string(body).map_err(OkxError::Json)?;
        let headers = signing::sign_request(&self.config, "POST", path, &body_str);
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .apply_headers(self.http.post(&url), &headers)
            .header("content-type", "application/json")
            .body(body_str)
            .send()
            .await?;
        self.decode_envelope(resp).await
    }

    fn apply_headers(
        &self,
        builder: reqwest::RequestBuilder,
        headers: &signing::SignedHeaders,
    ) -> reqwest::RequestBuilder {
        let builder = builder
            .header("OK-ACCESS-KEY", &headers.api_key)
            .header("OK-ACCESS-SIGN", &headers.signature)
            .header("OK-ACCESS-TIMESTAMP", &headers.timestamp)
            .header("OK-ACCESS-PASSPHRASE", &headers.passphrase);
        if headers.simulated {
            builder.header("x-simulated-trading", "1")
        } else {
            builder
        }
    }

    async fn decode_envelope<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<Vec<T>> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(OkxError::Envelope {
                code: status.to_string(),
                msg: body,
            });
        }
        let envelope: Envelope<T> = resp.json().await.map_err(OkxError::Request)?;
        envelope.into_result()
    }

    /// Fetches the exchange server time and compares it against the local
    /// wall clock, warning if skew exceeds 30s.
    pub async fn check_clock_skew(&self) -> Result<Duration> {
        #[derive(Deserialize)]
        struct ServerTime {
            #[serde(deserialize_with = "crate::wire::millis_from_str")]
            ts: i64,
        }
        let rows: Vec<ServerTime> = self
            .public_get("/api/v5/public/time", &[])
            .await?;
        let server_ms = rows
            .first()
            .ok_or_else(|| OkxError::Envelope {
                code: "0".into(),
                msg: "empty server time response".into(),
            })?
            .ts;
        let local_ms = chrono::Utc::now().timestamp_millis();
        let skew = (local_ms - server_ms).unsigned_abs();
        let skew = Duration::from_millis(skew);
        if skew > Duration::from_secs(30) {
            tracing::warn!(skew_ms = skew.as_millis() as u64, "client/server clock skew exceeds 30s");
        }
        Ok(skew)
    }
}
