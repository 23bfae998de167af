//! Lenient numeric parsing for OKX's wire format: every price/size field can
//! arrive as a JSON string, a JSON number, an empty string, or `null`, and
//! all four must normalize to a [`Decimal`] (or to zero).

use rust_decimal::Decimal;
use serde::de::{self, Deserialize, Deserializer};
use serde::Serializer;
use std::str::FromStr;

/// Parses a JSON value that may be a string, a number, empty, or null into
/// a `Decimal`, defaulting missing/blank values to zero. OKX represents
/// every quantity as a string in practice, but this accepts numbers too so
/// that hand-written test fixtures and other producers aren't penalized.
pub fn decimal_lenient<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(decimal_lenient_opt(deserializer)?.unwrap_or_default())
}

/// As [`decimal_lenient`], but preserves the distinction between "absent"
/// and "zero".
pub fn decimal_lenient_opt<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(f64),
        Null,
    }

    let raw = Option::<StrOrNum>::deserialize(deserializer)?;
    match raw {
        None | Some(StrOrNum::Null) => Ok(None),
        Some(StrOrNum::Str(s)) if s.is_empty() => Ok(None),
        Some(StrOrNum::Str(s)) => Decimal::from_str(&s)
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid decimal {s:?}: {e}"))),
        Some(StrOrNum::Num(n)) => Decimal::try_from(n)
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid decimal {n}: {e}"))),
    }
}

/// Serializes a `Decimal` back to the lexical string form OKX expects in
/// request bodies.
pub fn decimal_as_str<S>(value: &Decimal, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

/// Parses a millisecond-epoch string (OKX's `ts` convention) into a decimal
/// number of milliseconds; kept as `i64` rather than `Decimal` since
/// timestamps never participate in checksums.
pub fn millis_from_str<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<i64>()
        .map_err(|e| de::Error::custom(format!("invalid timestamp {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Wrap {
        #[serde(deserialize_with = "decimal_lenient")]
        v: Decimal,
    }

    #[test]
    fn parses_string_number() {
        let w: Wrap = serde_json::from_str(r#"{"v":"1.2300"}"#).unwrap();
        assert_eq!(w.v, dec!(1.2300));
    }

    #[test]
    fn parses_json_number() {
        let w: Wrap = serde_json::from_str(r#"{"v":1.5}"#).unwrap();
        assert_eq!(w.v, dec!(1.5));
    }

    #[test]
    fn empty_string_is_zero() {
        let w: Wrap = serde_json::from_str(r#"{"v":""}"#).unwrap();
        assert_eq!(w.v, Decimal::ZERO);
    }

    #[test]
    fn null_is_zero() {
        let w: Wrap = serde_json::from_str(r#"{"v":null}"#).unwrap();
        assert_eq!(w.v, Decimal::ZERO);
    }

    #[test]
    fn preserves_exact_value_through_string_round_trip() {
        let d = dec!(3366.10);
        let s = d.to_string();
        let back = Decimal::from_str(&s).unwrap();
        assert_eq!(d, back);
    }
}
