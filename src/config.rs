use crate::error::{OkxError, Result};

/// Which OKX deployment a gateway talks to. `Sandbox` has no real endpoint
/// of its own (OKX publishes only live and demo hosts) and is reserved for
/// local mocks in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Live,
    Demo,
    Sandbox,
}

impl Environment {
    /// REST base URL. Demo and live share a host; demo is signaled by the
    /// `x-simulated-trading` header rather than a distinct URL.
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            Environment::Live | Environment::Demo => "https://www.okx.com",
            Environment::Sandbox => "http://127.0.0.1:0",
        }
    }

    /// WebSocket base URL for the public/private/business endpoint groups.
    pub fn ws_base_url(&self) -> &'static str {
        match self {
            Environment::Live | Environment::Demo => "wss://ws.okx.com:8443/ws/v5",
            Environment::Sandbox => "ws://127.0.0.1:0",
        }
    }

    /// Whether requests should carry the simulated-trading header.
    pub fn is_simulated(&self) -> bool {
        matches!(self, Environment::Demo | Environment::Sandbox)
    }
}

/// Which margin pool funds a trade. `Spot` maps to trade-mode `cash`; the
/// unified-account modes map to `cross`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountMode {
    Spot,
    SingleCurrency,
    MultiCurrency,
    Portfolio,
}

impl AccountMode {
    pub fn trade_mode(&self) -> &'static str {
        match self {
            AccountMode::Spot => "cash",
            AccountMode::SingleCurrency | AccountMode::MultiCurrency | AccountMode::Portfolio => {
                "cross"
            }
        }
    }
}

/// Configuration for the OKX gateway. `api_key`, `api_secret` and
/// `passphrase` are required; construction fails with
/// [`OkxError::MissingConfig`] naming every missing field at once rather
/// than stopping at the first one found.
#[derive(Debug, Clone)]
pub struct OkxConfig {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
    pub environment: Environment,
    pub account_mode: AccountMode,
    /// Per-call REST timeout. Defaults to 10s.
    pub request_timeout: std::time::Duration,
    /// Connection-establishment timeout (REST and WS). Defaults to 10s.
    pub connect_timeout: std::time::Duration,
    /// Overrides [`Environment::rest_base_url`], pointing the REST client
    /// at a local mock server instead. `Environment::Sandbox`'s own URL
    /// isn't a real bindable host, so tests that need a live HTTP
    /// endpoint (e.g. a `wiremock` server) set this explicitly.
    pub rest_base_url_override: Option<String>,
}

/// Builder mirroring the recognized configuration options; fields start
/// empty/unset and are validated on [`build`](OkxConfigBuilder::build).
#[derive(Debug, Clone, Default)]
pub struct OkxConfigBuilder {
    api_key: Option<String>,
    api_secret: Option<String>,
    passphrase: Option<String>,
    environment: Option<Environment>,
    account_mode: Option<AccountMode>,
    request_timeout: Option<std::time::Duration>,
    connect_timeout: Option<std::time::Duration>,
    rest_base_url_override: Option<String>,
}

impl OkxConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, v: impl Into<String>) -> Self {
        self.api_key = Some(v.into());
        self
    }

    pub fn api_secret(mut self, v: impl Into<String>) -> Self {
        self.api_secret = Some(v.into());
        self
    }

    pub fn passphrase(mut self, v: impl Into<String>) -> Self {
        self.passphrase = Some(v.into());
        self
    }

    pub fn environment(mut self, v: Environment) -> Self {
        self.environment = Some(v);
        self
    }

    pub fn account_mode(mut self, v: AccountMode) -> Self {
        self.account_mode = Some(v);
        self
    }

    pub fn request_timeout(mut self, v: std::time::Duration) -> Self {
        self.request_timeout = Some(v);
        self
    }

    pub fn connect_timeout(mut self, v: std::time::Duration) -> Self {
        self.connect_timeout = Some(v);
        self
    }

    /// Points the REST client at `url` instead of the environment's own
    /// host. Intended for tests running a local mock server.
    pub fn rest_base_url_override(mut self, url: impl Into<String>) -> Self {
        self.rest_base_url_override = Some(url.into());
        self
    }

    pub fn build(self) -> Result<OkxConfig> {
        let mut missing = Vec::new();
        if self.api_key.is_none() {
            missing.push("okx-api-key");
        }
        if self.api_secret.is_none() {
            missing.push("okx-api-secret");
        }
        if self.passphrase.is_none() {
            missing.push("okx-passphrase");
        }
        if !missing.is_empty() {
            return Err(OkxError::MissingConfig(missing));
        }

        if let Some(override_url) = &self.rest_base_url_override {
            url::Url::parse(override_url)
                .map_err(|e| OkxError::Validation(format!("rest_base_url_override {override_url:?} is not a valid URL: {e}")))?;
        }

        Ok(OkxConfig {
            api_key: self.api_key.unwrap(),
            api_secret: self.api_secret.unwrap(),
            passphrase: self.passphrase.unwrap(),
            environment: self.environment.unwrap_or(Environment::Live),
            account_mode: self.account_mode.unwrap_or(AccountMode::Spot),
            request_timeout: self
                .request_timeout
                .unwrap_or(std::time::Duration::from_secs(10)),
            connect_timeout: self
                .connect_timeout
                .unwrap_or(std::time::Duration::from_secs(10)),
            rest_base_url_override: self.rest_base_url_override,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_all_required_fields_names_each() {
        let err = OkxConfigBuilder::new().build().unwrap_err();
        match err {
            OkxError::MissingConfig(keys) => {
                assert_eq!(
                    keys,
                    vec!["okx-api-key", "okx-api-secret", "okx-passphrase"]
                );
            }
            other => panic!("expected MissingConfig, got {other:?}"),
        }
    }

    #[test]
    fn missing_one_field_names_only_that_one() {
        let err = OkxConfigBuilder::new()
            .api_key("k")
            .api_secret("s")
            .build()
            .unwrap_err();
        match err {
            OkxError::MissingConfig(keys) => assert_eq!(keys, vec!["okx-passphrase"]),
            other => panic!("expected MissingConfig, got {other:?}"),
        }
    }

    #[test]
    fn defaults_to_live_spot_cash() {
        let cfg = OkxConfigBuilder::new()
            .api_key("k")
            .api_secret("s")
            .passphrase("p")
            .build()
            .unwrap();
        assert_eq!(cfg.environment, Environment::Live);
        assert_eq!(cfg.account_mode.trade_mode(), "cash");
    }

    #[test]
    fn portfolio_mode_maps_to_cross() {
        assert_eq!(AccountMode::Portfolio.trade_mode(), "cross");
        assert_eq!(AccountMode::MultiCurrency.trade_mode(), "cross");
        assert_eq!(AccountMode::SingleCurrency.trade_mode(), "cross");
    }

    #[test]
    fn demo_and_sandbox_are_simulated() {
        assert!(!Environment::Live.is_simulated());
        assert!(Environment::Demo.is_simulated());
        assert!(Environment::Sandbox.is_simulated());
    }

    #[test]
    fn malformed_rest_base_url_override_is_rejected() {
        let err = OkxConfigBuilder::new()
            .api_key("k")
            .api_secret("s")
            .passphrase("p")
            .rest_base_url_override("not a url")
            .build()
            .unwrap_err();
        match err {
            OkxError::Validation(msg) => assert!(msg.contains("not a url")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn well_formed_rest_base_url_override_is_accepted() {
        let cfg = OkxConfigBuilder::new()
            .api_key("k")
            .api_secret("s")
            .passphrase("p")
            .rest_base_url_override("http://127.0.0.1:9999")
            .build()
            .unwrap();
        assert_eq!(cfg.rest_base_url_override.as_deref(), Some("http://127.0.0.1:9999"));
    }
}
