use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, OkxError>;

/// Errors are grouped into the five categories named by the error-handling
/// taxonomy: transport, protocol, state, user and rate. Transport and rate
/// errors are retried with backoff by the caller; protocol and state errors
/// trigger local recovery (resync) and only surface after recovery is
/// exhausted; user errors fail fast.
#[derive(Error, Debug)]
pub enum OkxError {
    // -- Transport --
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(String),

    // -- Protocol --
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unparseable frame: {0}")]
    UnparseableFrame(String),

    #[error("exchange returned code {code}: {msg}")]
    Envelope { code: String, msg: String },

    #[error("order rejected, sCode {s_code}: {s_msg}")]
    OrderRejected { s_code: String, s_msg: String },

    // -- State --
    #[error("checksum mismatch for {instrument}: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        instrument: String,
        expected: i32,
        computed: i32,
    },

    #[error("sequence gap for {instrument}: last applied {last_seq}, frame carried {frame_seq}")]
    SequenceGap {
        instrument: String,
        last_seq: u64,
        frame_seq: u64,
    },

    #[error("baseline fetch timed out for {0}")]
    BaselineTimeout(String),

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("synchronizer for {0} has failed after repeated resync attempts")]
    SynchronizerFailed(String),

    // -- Order semantics --
    #[error("insufficient order-book data for {0}")]
    InsufficientData(String),

    #[error("no liquidity available for {0}")]
    NoLiquidity(String),

    // -- User --
    #[error("missing required configuration: {0:?}")]
    MissingConfig(Vec<&'static str>),

    #[error("unsupported order type: {0}")]
    UnsupportedOrderType(String),

    #[error("unsupported candle resolution: {0}")]
    UnsupportedResolution(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("validation error: {0}")]
    Validation(String),

    // -- Rate --
    #[error("rate limited, backoff required: {0}")]
    RateLimited(String),
}

/// A structured brokerage-facing message: carries both the transport-level
/// and the trading-engine-level code/message. Order-management failures
/// surface this way rather than by returning an `Err` to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerageError {
    pub transport_code: String,
    pub transport_message: String,
    pub engine_code: Option<String>,
    pub engine_message: Option<String>,
}

impl std::fmt::Display for BrokerageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}){}",
            self.transport_message,
            self.transport_code,
            self.engine_message
                .as_ref()
                .map(|m| format!(" / engine: {m}"))
                .unwrap_or_default()
        )
    }
}
