//! Typed WebSocket push events (C3), dispatched by channel tag rather than
//! by class hierarchy. Every data push shares the
//! `{"arg":{...},"data":[...]}` envelope; `WsArg` captures the routing key
//! a [`Session`](crate::ws::Session) uses to pick the handler for it.

use serde::Deserialize;

use crate::types::orderbook::FrameKind;

/// The routing key of a data push: `channel` plus the instrument it's
/// scoped to (absent for account-wide channels), plus the sibling
/// `action` field order-book frames carry (`snapshot`/`update`). `action`
/// lives outside `arg` on the wire, so it's populated by the dispatcher
/// after deserializing `arg` rather than derived directly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsArg {
    pub channel: String,
    #[serde(default)]
    pub inst_id: Option<String>,
    #[serde(skip)]
    pub action: Option<FrameKind>,
}

/// An order/fill row from the private `orders` channel, as consumed by
/// the execution reconciler (C7).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPush {
    pub inst_id: String,
    pub ord_id: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub cl_ord_id: Option<String>,
    pub state: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub trade_id: Option<String>,
    #[serde(deserialize_with = "crate::wire::decimal_lenient")]
    pub acc_fill_sz: rust_decimal::Decimal,
    #[serde(default, deserialize_with = "crate::wire::decimal_lenient_opt")]
    pub fill_px: Option<rust_decimal::Decimal>,
    #[serde(default, deserialize_with = "crate::wire::decimal_lenient_opt")]
    pub fill_sz: Option<rust_decimal::Decimal>,
    #[serde(default, deserialize_with = "crate::wire::decimal_lenient_opt")]
    pub fee: Option<rust_decimal::Decimal>,
    #[serde(default)]
    pub fee_ccy: Option<String>,
    #[serde(rename = "uTime", deserialize_with = "crate::wire::millis_from_str")]
    pub updated_ms: i64,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(if s.is_empty() { None } else { Some(s) })
}

/// Event-type control frames OKX sends outside the data-push envelope
/// (`{"event":"subscribe"|"unsubscribe"|"login"|"error", ...}`).
#[derive(Debug, Clone, Deserialize)]
pub struct WsEvent {
    pub event: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub arg: Option<WsArg>,
}

impl WsEvent {
    pub fn is_login_success(&self) -> bool {
        self.event == "login" && self.code.as_deref() == Some("0")
    }
}
