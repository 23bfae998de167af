use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{OkxError, Result};
use crate::types::enums::SecurityCategory;

/// Immutable instrument properties, resolved once from a static database
/// (external collaborator; see [`InstrumentRegistry::load_from`]) or from
/// the exchange's own instrument list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub symbol: String,
    pub category: SecurityCategory,
    pub min_size: Decimal,
    pub lot_step: Decimal,
    pub tick_size: Decimal,
    pub contract_multiplier: Decimal,
}

/// One row of the CSV instrument database this crate consumes as an
/// external interface (market, symbol, type, description, quote-currency,
/// contract-multiplier, minimum-price-variation, lot-size, market-ticker).
/// Parsing the CSV itself is out of scope; callers hand in already-parsed
/// records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub market: String,
    pub symbol: String,
    pub security_type: SecurityCategory,
    pub description: String,
    pub quote_currency: String,
    pub contract_multiplier: Decimal,
    pub minimum_price_variation: Decimal,
    pub lot_size: Decimal,
    pub market_ticker: String,
}

impl From<&InstrumentRecord> for InstrumentInfo {
    fn from(r: &InstrumentRecord) -> Self {
        InstrumentInfo {
            symbol: r.symbol.clone(),
            category: r.security_type,
            min_size: r.lot_size,
            lot_step: r.lot_size,
            tick_size: r.minimum_price_variation,
            contract_multiplier: r.contract_multiplier,
        }
    }
}

/// OKX's own `/api/v5/public/instruments` row, used to dynamically register
/// symbols unknown to the CSV database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInstrument {
    pub inst_type: String,
    pub inst_id: String,
    #[serde(default, deserialize_with = "crate::wire::decimal_lenient_opt")]
    pub tick_sz: Option<Decimal>,
    #[serde(default, deserialize_with = "crate::wire::decimal_lenient_opt")]
    pub lot_sz: Option<Decimal>,
    #[serde(default, deserialize_with = "crate::wire::decimal_lenient_opt")]
    pub min_sz: Option<Decimal>,
    #[serde(default, deserialize_with = "crate::wire::decimal_lenient_opt")]
    pub ct_mult: Option<Decimal>,
}

impl ExchangeInstrument {
    fn category(&self) -> SecurityCategory {
        match self.inst_type.as_str() {
            "SWAP" => SecurityCategory::Perpetual,
            "FUTURES" => SecurityCategory::DeliveryFuture,
            _ => SecurityCategory::Spot,
        }
    }
}

impl From<&ExchangeInstrument> for InstrumentInfo {
    fn from(e: &ExchangeInstrument) -> Self {
        InstrumentInfo {
            symbol: e.inst_id.clone(),
            category: e.category(),
            min_size: e.min_sz.unwrap_or_default(),
            lot_step: e.lot_sz.unwrap_or_default(),
            tick_size: e.tick_sz.unwrap_or_default(),
            contract_multiplier: e.ct_mult.unwrap_or(Decimal::ONE),
        }
    }
}

/// Thread-safe symbol -> instrument map, seeded from a CSV-shaped database
/// and refreshable from the exchange's live instrument list. Lean/broker
/// symbol resolution is the identity on the `symbol` field: this registry
/// doesn't rename symbols, it only resolves their properties.
#[derive(Debug, Default)]
pub struct InstrumentRegistry {
    inner: RwLock<HashMap<String, InstrumentInfo>>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry from an already-parsed CSV instrument database.
    pub fn load_from(records: impl IntoIterator<Item = InstrumentRecord>) -> Self {
        let registry = Self::new();
        let mut map = registry.inner.write().unwrap();
        for record in records {
            map.insert(record.symbol.clone(), InstrumentInfo::from(&record));
        }
        drop(map);
        registry
    }

    /// Merge in instruments from the exchange's own list without discarding
    /// existing entries.
    pub fn refresh(&self, instruments: impl IntoIterator<Item = ExchangeInstrument>) {
        let mut map = self.inner.write().unwrap();
        for inst in instruments {
            map.insert(inst.inst_id.clone(), InstrumentInfo::from(&inst));
        }
    }

    /// Resolve a symbol to its immutable properties, or a structured error
    /// if unknown to both the loaded database and any exchange refresh.
    pub fn resolve(&self, symbol: &str) -> Result<InstrumentInfo> {
        self.inner
            .read()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or_else(|| OkxError::UnknownInstrument(symbol.to_string()))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.inner.read().unwrap().contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_record(symbol: &str) -> InstrumentRecord {
        InstrumentRecord {
            market: "OKX".into(),
            symbol: symbol.into(),
            security_type: SecurityCategory::Spot,
            description: "Bitcoin/Tether".into(),
            quote_currency: "USDT".into(),
            contract_multiplier: Decimal::ONE,
            minimum_price_variation: dec!(0.1),
            lot_size: dec!(0.00001),
            market_ticker: symbol.into(),
        }
    }

    #[test]
    fn resolves_loaded_symbol() {
        let registry = InstrumentRegistry::load_from(vec![sample_record("BTC-USDT")]);
        let info = registry.resolve("BTC-USDT").unwrap();
        assert_eq!(info.tick_size, dec!(0.1));
    }

    #[test]
    fn unknown_symbol_is_an_error() {
        let registry = InstrumentRegistry::new();
        assert!(matches!(
            registry.resolve("DOES-NOTEXIST"),
            Err(OkxError::UnknownInstrument(_))
        ));
    }

    #[test]
    fn refresh_adds_without_discarding() {
        let registry = InstrumentRegistry::load_from(vec![sample_record("BTC-USDT")]);
        registry.refresh(vec![ExchangeInstrument {
            inst_type: "SWAP".into(),
            inst_id: "BTC-USDT-SWAP".into(),
            tick_sz: Some(dec!(0.1)),
            lot_sz: Some(dec!(1)),
            min_sz: Some(dec!(1)),
            ct_mult: Some(dec!(0.01)),
        }]);
        assert!(registry.contains("BTC-USDT"));
        assert!(registry.contains("BTC-USDT-SWAP"));
        assert_eq!(registry.resolve("BTC-USDT-SWAP").unwrap().category, SecurityCategory::Perpetual);
    }
}
