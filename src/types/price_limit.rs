use rust_decimal::Decimal;
use serde::Deserialize;

use crate::wire::decimal_lenient;

/// Per-instrument price-limit band enforced by the exchange. When
/// `enabled`, no ask above `buy_limit` and no bid below `sell_limit` is
/// executable; the market-buy-as-FOK transformation truncates its walked
/// price against `buy_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceLimit {
    #[serde(rename = "buyLmt", deserialize_with = "decimal_lenient")]
    pub buy_limit: Decimal,
    #[serde(rename = "sellLmt", deserialize_with = "decimal_lenient")]
    pub sell_limit: Decimal,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl PriceLimit {
    pub fn disabled() -> Self {
        PriceLimit {
            buy_limit: Decimal::ZERO,
            sell_limit: Decimal::ZERO,
            enabled: false,
        }
    }
}
