//! HMAC-SHA256 request signing (C2). Generalizes `nord::actions::signing`'s
//! boxed-closure `SignFn` shape to OKX's REST/WS signing scheme instead of
//! ed25519/Solana framing.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::OkxConfig;

type HmacSha256 = Hmac<Sha256>;

/// ISO-8601 UTC timestamp with millisecond precision, as REST signing
/// requires.
pub fn rest_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Unix-seconds timestamp as a string, as the WS login signature requires.
pub fn ws_login_timestamp() -> String {
    Utc::now().timestamp().to_string()
}

/// `signature = base64(HMAC_SHA256(secret, timestamp || method || path || body))`.
pub fn sign(secret: &str, timestamp: &str, method: &str, path: &str, body: &str) -> String {
    let prehash = format!("{timestamp}{method}{path}{body}");
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(prehash.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// The headers a signed REST request must carry.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub api_key: String,
    pub signature: String,
    pub timestamp: String,
    pub passphrase: String,
    pub simulated: bool,
}

/// Signs one REST request given its method/path/body.
pub fn sign_request(config: &OkxConfig, method: &str, path: &str, body: &str) -> SignedHeaders {
    let timestamp = rest_timestamp();
    let signature = sign(&config.api_secret, &timestamp, method, path, body);
    SignedHeaders {
        api_key: config.api_key.clone(),
        signature,
        timestamp,
        passphrase: config.passphrase.clone(),
        simulated: config.environment.is_simulated(),
    }
}

/// Signs the WS login args: `sign(secret, timestamp + "GET" + "/users/self/verify")`.
pub fn sign_ws_login(config: &OkxConfig) -> (String, String) {
    let timestamp = ws_login_timestamp();
    let signature = sign(&config.api_secret, &timestamp, "GET", "/users/self/verify", "");
    (timestamp, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccountMode, Environment};

    fn test_config() -> OkxConfig {
        OkxConfig {
            api_key: "key".into(),
            api_secret: "secret".into(),
            passphrase: "pass".into(),
            environment: Environment::Demo,
            account_mode: AccountMode::Spot,
            request_timeout: std::time::Duration::from_secs(10),
            connect_timeout: std::time::Duration::from_secs(10),
            rest_base_url_override: None,
        }
    }

    #[test]
    fn signature_is_deterministic_for_identical_inputs() {
        let a = sign("secret", "2020-12-08T09:08:57.715Z", "GET", "/users/self/verify", "");
        let b = sign("secret", "2020-12-08T09:08:57.715Z", "GET", "/users/self/verify", "");
        assert_eq!(a, b);
    }

    #[test]
    fn signature_changes_with_body() {
        let a = sign("secret", "ts", "POST", "/api/v5/trade/order", r#"{"a":1}"#);
        let b = sign("secret", "ts", "POST", "/api/v5/trade/order", r#"{"a":2}"#);
        assert_ne!(a, b);
    }

    #[test]
    fn sign_request_carries_simulated_flag_in_demo() {
        let headers = sign_request(&test_config(), "GET", "/api/v5/account/balance", "");
        assert!(headers.simulated);
        assert_eq!(headers.api_key, "key");
    }
}
