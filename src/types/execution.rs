use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::enums::ExecutionStatus;

/// An execution event for one order. `filled_qty_cumulative` is the running
/// total across all fills seen so far; `last_fill_*` describe only the most
/// recent fill (absent for status-only transitions).
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionEvent {
    pub engine_order_id: String,
    pub exchange_order_id: Option<String>,
    pub status: ExecutionStatus,
    pub filled_qty_cumulative: Decimal,
    pub last_fill_price: Option<Decimal>,
    pub last_fill_qty: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub fee_currency: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,
}

impl ExecutionEvent {
    pub fn is_fill(&self) -> bool {
        self.last_fill_qty.is_some()
    }
}

/// A recoverable warning or error surfaced alongside order-status events,
/// carrying both the transport-level and trading-engine-level detail. Codes
/// like `ORDER_UPDATE_ERROR`/`ORDER_CANCEL_ERROR` are caller-defined; this
/// type only carries them.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerageMessage {
    pub code: String,
    pub message: String,
    pub engine_order_id: Option<String>,
    pub recoverable: bool,
}
