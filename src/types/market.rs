use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::enums::CandleResolution;
use crate::wire::{decimal_lenient, millis_from_str};

/// A best-bid/best-ask snapshot from the `tickers` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub inst_id: String,
    #[serde(deserialize_with = "decimal_lenient")]
    pub best_bid: Decimal,
    #[serde(deserialize_with = "decimal_lenient")]
    pub best_bid_size: Decimal,
    #[serde(deserialize_with = "decimal_lenient")]
    pub best_ask: Decimal,
    #[serde(deserialize_with = "decimal_lenient")]
    pub best_ask_size: Decimal,
    #[serde(deserialize_with = "decimal_lenient")]
    pub last: Decimal,
    #[serde(rename = "ts", deserialize_with = "millis_from_str")]
    pub timestamp_ms: i64,
}

/// A single print from the `trades` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub inst_id: String,
    pub trade_id: String,
    #[serde(deserialize_with = "decimal_lenient")]
    pub price: Decimal,
    #[serde(deserialize_with = "decimal_lenient")]
    pub size: Decimal,
    pub side: crate::types::enums::Side,
    #[serde(rename = "ts", deserialize_with = "millis_from_str")]
    pub timestamp_ms: i64,
}

/// A single OHLCV bar, from either the candle channel or the history REST
/// endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp_ms: i64,
    pub resolution: CandleResolution,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// OKX candle REST/WS rows arrive as a flat array:
    /// `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`.
    pub fn from_wire_row(row: &[String], resolution: CandleResolution) -> Option<Self> {
        if row.len() < 6 {
            return None;
        }
        Some(Candle {
            timestamp_ms: row[0].parse().ok()?,
            resolution,
            open: row[1].parse().ok()?,
            high: row[2].parse().ok()?,
            low: row[3].parse().ok()?,
            close: row[4].parse().ok()?,
            volume: row[5].parse().ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_candle_row() {
        let row = vec![
            "1597026383085".to_string(),
            "8533.02".to_string(),
            "8553.69".to_string(),
            "8527.17".to_string(),
            "8548.26".to_string(),
            "45247".to_string(),
            "529.5858".to_string(),
        ];
        let candle = Candle::from_wire_row(&row, CandleResolution::OneMinute).unwrap();
        assert_eq!(candle.timestamp_ms, 1597026383085);
        assert_eq!(candle.open, dec!(8533.02));
        assert_eq!(candle.volume, dec!(45247));
    }

    #[test]
    fn rejects_short_row() {
        assert!(Candle::from_wire_row(&["1".to_string()], CandleResolution::OneMinute).is_none());
    }
}
