use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::enums::Side;
use crate::wire::decimal_lenient;

/// A currency balance, one row of `/api/v5/account/balance`'s nested
/// `details` array, as returned by `get_cash_balance()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    #[serde(rename = "ccy")]
    pub currency: String,
    #[serde(rename = "availBal", deserialize_with = "decimal_lenient")]
    pub available: Decimal,
    #[serde(rename = "frozenBal", deserialize_with = "decimal_lenient")]
    pub frozen: Decimal,
    #[serde(rename = "cashBal", deserialize_with = "decimal_lenient")]
    pub total: Decimal,
}

/// A position, one row of `/api/v5/account/positions`, as returned by
/// `get_account_holdings()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(rename = "instId")]
    pub symbol: String,
    #[serde(rename = "posSide")]
    pub side: Side,
    #[serde(rename = "pos", deserialize_with = "decimal_lenient")]
    pub quantity: Decimal,
    #[serde(rename = "avgPx", deserialize_with = "decimal_lenient")]
    pub average_price: Decimal,
    #[serde(rename = "upl", deserialize_with = "decimal_lenient")]
    pub unrealized_pnl: Decimal,
}

/// Either a currency balance or a derivatives position; `get_account_holdings`
/// returns a mix depending on account mode.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountHolding {
    Balance(Balance),
    Position(Position),
}

/// An order as returned by `get_open_orders()` (`/api/v5/trade/orders-pending`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrderView {
    #[serde(rename = "ordId")]
    pub exchange_order_id: String,
    #[serde(rename = "clOrdId", default, deserialize_with = "empty_string_as_none")]
    pub client_order_id: Option<String>,
    #[serde(rename = "instId")]
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "px", deserialize_with = "decimal_lenient")]
    pub price: Decimal,
    #[serde(rename = "sz", deserialize_with = "decimal_lenient")]
    pub size: Decimal,
    #[serde(rename = "accFillSz", deserialize_with = "decimal_lenient")]
    pub filled_size: Decimal,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(if s.is_empty() { None } else { Some(s) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_wire_fields_map_onto_lean_names() {
        let json = r#"{"ccy":"USDT","availBal":"100.5","frozenBal":"1","cashBal":"101.5"}"#;
        let balance: Balance = serde_json::from_str(json).unwrap();
        assert_eq!(balance.currency, "USDT");
        assert_eq!(balance.available, rust_decimal::Decimal::new(1005, 1));
    }

    #[test]
    fn open_order_blank_client_id_is_none() {
        let json = r#"{"ordId":"1","clOrdId":"","instId":"BTC-USDT","side":"buy","px":"1","sz":"1","accFillSz":"0"}"#;
        let order: OpenOrderView = serde_json::from_str(json).unwrap();
        assert_eq!(order.client_order_id, None);
    }
}
