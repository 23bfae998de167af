use serde::{Deserialize, Serialize};

/// Order side. Rendered lowercase on the wire (`"buy"`/`"sell"`), matching
/// OKX's REST and WS conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// An instrument's security category. Spot symbols are `BASE-QUOTE`;
/// perpetuals and delivery futures carry a `-SWAP` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityCategory {
    Spot,
    #[serde(rename = "SWAP")]
    Perpetual,
    #[serde(rename = "FUTURES")]
    DeliveryFuture,
}

/// Order type. `StopMarket` is accepted by the type system but rejected at
/// placement time — the order pipeline has no conversion for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
}

impl OrderType {
    pub fn is_supported(&self) -> bool {
        !matches!(self, OrderType::StopMarket)
    }
}

/// Time-in-force. `PostOnly` maps to OKX's `post_only` order type rather
/// than a time-in-force flag, but is modeled here alongside the others
/// because the engine treats it as one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[serde(rename = "gtc")]
    GoodTilCanceled,
    #[serde(rename = "ioc")]
    ImmediateOrCancel,
    #[serde(rename = "fok")]
    FillOrKill,
    #[serde(rename = "post_only")]
    PostOnly,
}

/// Candle / bar resolution. Only resolutions of one minute or coarser are
/// supported for history retrieval; sub-minute bars are out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleResolution {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "4H")]
    FourHours,
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl std::fmt::Display for CandleResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CandleResolution::OneMinute => "1m",
            CandleResolution::ThreeMinutes => "3m",
            CandleResolution::FiveMinutes => "5m",
            CandleResolution::FifteenMinutes => "15m",
            CandleResolution::ThirtyMinutes => "30m",
            CandleResolution::OneHour => "1H",
            CandleResolution::FourHours => "4H",
            CandleResolution::OneDay => "1D",
            CandleResolution::OneWeek => "1W",
            CandleResolution::OneMonth => "1M",
        };
        write!(f, "{s}")
    }
}

/// Execution status. Forms a DAG rooted at `Submitted`, terminating at one
/// of `Filled`/`Canceled`/`Invalid`/`Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Submitted,
    PartialFill,
    Filled,
    Canceled,
    Invalid,
    Rejected,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Filled
                | ExecutionStatus::Canceled
                | ExecutionStatus::Invalid
                | ExecutionStatus::Rejected
        )
    }
}
