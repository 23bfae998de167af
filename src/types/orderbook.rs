use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{OkxError, Result};

/// One level of an order-book frame, as OKX sends it: a 4-element array
/// `[price, size, deprecated, numOrders]`. Both the parsed `Decimal` and
/// the raw lexical strings are kept — the checksum protocol is defined
/// over the string exactly as received ("preserving trailing zeros and
/// decimal placement; do not re-format"), so re-deriving it from the
/// `Decimal` alone would be lossy.
#[derive(Debug, Clone, PartialEq)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
    pub price_raw: String,
    pub size_raw: String,
}

impl BookLevel {
    /// Parses a level, returning `None` for malformed rows (non-parseable
    /// price/size, too few fields) per the "silently drops malformed rows"
    /// contract on `apply_snapshot`/`apply_delta`.
    pub fn parse(row: &[String]) -> Option<Self> {
        let price_raw = row.first()?.clone();
        let size_raw = row.get(1)?.clone();
        let price = Decimal::from_str(&price_raw).ok()?;
        let size = Decimal::from_str(&size_raw).ok()?;
        Some(BookLevel {
            price,
            size,
            price_raw,
            size_raw,
        })
    }

    /// The canonical "price:size" encoding for the checksum, using the
    /// lexical form as received.
    pub fn checksum_fragment(&self) -> String {
        format!("{}:{}", self.price_raw, self.size_raw)
    }
}

impl<'de> Deserialize<'de> for BookLevel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let row: Vec<String> = Vec::deserialize(deserializer)?;
        BookLevel::parse(&row)
            .ok_or_else(|| serde::de::Error::custom("malformed order-book level"))
    }
}

impl Serialize for BookLevel {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        [self.price_raw.clone(), self.size_raw.clone()].serialize(serializer)
    }
}

/// Whether a books-channel data element is a full replacement or an
/// incremental update. The first frame after (re)subscription is always
/// `Snapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Snapshot,
    #[serde(rename = "update")]
    Delta,
}

/// One order-book update frame, as carried by the `books`/`books5`/
/// `books-l2-tbt` channels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderbookFrame {
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
    #[serde(rename = "ts")]
    pub timestamp_ms_raw: String,
    pub checksum: Option<i64>,
    pub seq_id: u64,
    #[serde(default, rename = "prevSeqId")]
    pub prev_seq_id: Option<i64>,
}

impl OrderbookFrame {
    pub fn timestamp_ms(&self) -> Result<i64> {
        self.timestamp_ms_raw
            .parse()
            .map_err(|_| OkxError::UnparseableFrame(format!("bad ts {:?}", self.timestamp_ms_raw)))
    }

    /// OKX's keep-alive heartbeat: an empty-delta frame where `seqId ==
    /// prevSeqId`.
    pub fn is_heartbeat(&self) -> bool {
        self.bids.is_empty()
            && self.asks.is_empty()
            && self.prev_seq_id == Some(self.seq_id as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_preserving_lexical_form() {
        let row = vec!["8476.980".to_string(), "415".to_string()];
        let level = BookLevel::parse(&row).unwrap();
        assert_eq!(level.checksum_fragment(), "8476.980:415");
    }

    #[test]
    fn malformed_level_rejected() {
        assert!(BookLevel::parse(&["not-a-number".to_string(), "1".to_string()]).is_none());
        assert!(BookLevel::parse(&["1".to_string()]).is_none());
    }

    #[test]
    fn deserializes_full_frame() {
        let json = r#"{
            "asks": [["8476.98","415","0","13"]],
            "bids": [["8476.97","256","0","12"]],
            "ts": "1597026383085",
            "checksum": -855196043,
            "prevSeqId": 123456,
            "seqId": 123457
        }"#;
        let frame: OrderbookFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.asks[0].price_raw, "8476.98");
        assert_eq!(frame.checksum, Some(-855196043));
        assert_eq!(frame.timestamp_ms().unwrap(), 1597026383085);
    }
}
