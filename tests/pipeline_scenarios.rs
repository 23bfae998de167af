//! End-to-end scenarios for the market-buy-as-FOK transformation and the
//! symbol round-trip property, exercised through the public crate surface
//! rather than pipeline internals.

use okx_gateway::types::enums::SecurityCategory;
use okx_gateway::types::instrument::InstrumentRecord;
use okx_gateway::types::orderbook::BookLevel;
use okx_gateway::{market_buy_fok, InstrumentRegistry, Ladder, PriceLimit};
use rust_decimal_macros::dec;

fn ladder_with_asks(levels: &[(&str, &str)]) -> Ladder {
    let mut ladder = Ladder::default();
    let rows: Vec<BookLevel> = levels
        .iter()
        .map(|(p, s)| BookLevel::parse(&[p.to_string(), s.to_string()]).unwrap())
        .collect();
    ladder.apply_snapshot(&[], &rows);
    ladder
}

#[test]
fn scenario_1_fok_single_level_sufficient() {
    let ladder = ladder_with_asks(&[("0.500", "50")]);
    let price = market_buy_fok(&ladder, dec!(30), None).unwrap();
    assert_eq!(price, dec!(0.500));
}

#[test]
fn scenario_2_fok_multi_level_walk() {
    let ladder = ladder_with_asks(&[("0.500", "50"), ("0.502", "100"), ("0.510", "500")]);
    let price = market_buy_fok(&ladder, dec!(120), None).unwrap();
    assert_eq!(price, dec!(0.502));
}

#[test]
fn scenario_3_fok_truncation_against_enabled_price_limit() {
    let ladder = ladder_with_asks(&[("0.500", "50"), ("0.502", "100"), ("0.510", "500")]);
    let limit = PriceLimit { buy_limit: dec!(0.508), sell_limit: dec!(0.300), enabled: true };
    let price = market_buy_fok(&ladder, dec!(200), Some(limit)).unwrap();
    assert_eq!(price, dec!(0.508));
}

#[test]
fn symbol_round_trip_is_the_identity_for_a_loaded_instrument() {
    let registry = InstrumentRegistry::load_from(vec![InstrumentRecord {
        market: "OKX".into(),
        symbol: "BTC-USDT".into(),
        security_type: SecurityCategory::Spot,
        description: "Bitcoin/Tether".into(),
        quote_currency: "USDT".into(),
        contract_multiplier: dec!(1),
        minimum_price_variation: dec!(0.1),
        lot_size: dec!(0.00001),
        market_ticker: "BTC-USDT".into(),
    }]);

    let resolved = registry.resolve("BTC-USDT").unwrap();
    // lean -> brokerage -> lean is the identity: this crate never renames
    // symbols, so the round trip is resolving the same key twice.
    let resolved_again = registry.resolve(&resolved.symbol).unwrap();
    assert_eq!(resolved, resolved_again);
    assert_eq!(resolved.symbol, "BTC-USDT");
}
