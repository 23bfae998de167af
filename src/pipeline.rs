//! The order pipeline (C6): maps engine orders to signed exchange
//! requests, mints client order ids, and implements the market-buy-as-FOK
//! transformation. Place/amend/cancel all follow the
//! "always-true return, events carry truth" convention — failures never
//! reach the caller as an `Err`, only as an [`ExecutionEvent`] or
//! [`BrokerageMessage`] on the shared event stream.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::book::Ladder;
use crate::config::AccountMode;
use crate::error::{OkxError, Result};
use crate::events::EventSinks;
use crate::market_state::MarketState;
use crate::rest::endpoints::{self, AmendOrderBody, CancelOrderBody, PlaceOrderBody};
use crate::rest::RestClient;
use crate::types::enums::{ExecutionStatus, OrderType, Side, TimeInForce};
use crate::types::execution::{BrokerageMessage, ExecutionEvent};
use crate::types::order::{ClientOrderIdFactory, Order, OrderMutation};
use crate::types::price_limit::PriceLimit;

/// Walks the live ask ladder to synthesize a FOK limit price that emulates
/// a spot market buy for `quantity` base units.
///
/// Returns `NoLiquidity` for an empty ask side, `InsufficientData` if the
/// ladder itself carries no levels to walk on either side (malformed/stale
/// state). Deterministic: depends only on `ladder` and `price_limit` as
/// passed in, never on wall-clock time.
pub fn market_buy_fok(ladder: &Ladder, quantity: Decimal, price_limit: Option<PriceLimit>) -> Result<Decimal> {
    let depth = ladder.to_depth_view();
    if depth.asks.is_empty() {
        return Err(OkxError::NoLiquidity("no asks in live ladder".to_string()));
    }

    let mut cumulative = Decimal::ZERO;
    let mut walked_price = depth.asks.last().map(|(price, _)| *price).unwrap();
    for (price, size) in &depth.asks {
        cumulative += size;
        walked_price = *price;
        if cumulative >= quantity {
            break;
        }
        // exhausted all levels without reaching quantity: ceiling at the
        // deepest (highest) ask, already assigned above on the last pass.
    }

    let mut price = walked_price;
    if let Some(limit) = price_limit {
        if limit.enabled && limit.buy_limit < price {
            price = limit.buy_limit;
        }
    }
    Ok(price)
}

/// Owns everything needed to turn an [`Order`] into a signed REST request:
/// a rate-gated [`RestClient`], the live market state it reads for the FOK
/// transformation, a client-id minter, and the shared event sink.
pub struct OrderPipeline {
    rest: Arc<RestClient>,
    account_mode: AccountMode,
    market: Arc<MarketState>,
    id_factory: ClientOrderIdFactory,
    events: EventSinks,
}

impl OrderPipeline {
    pub fn new(
        rest: Arc<RestClient>,
        account_mode: AccountMode,
        market: Arc<MarketState>,
        client_id_prefix: impl Into<String>,
        events: EventSinks,
    ) -> Self {
        Self {
            rest,
            account_mode,
            market,
            id_factory: ClientOrderIdFactory::new(client_id_prefix),
            events,
        }
    }

    /// Places `order`. Always returns `Ok(true)`; every failure mode
    /// (unsupported type, no liquidity, exchange rejection) is reported
    /// as an `Invalid` execution event instead.
    pub async fn place_order(&self, order: &mut Order) -> bool {
        if !order.order_type.is_supported() {
            self.emit_invalid(order, "unsupported order type".to_string());
            return true;
        }

        let client_order_id = self.id_factory.next();
        OrderMutation::AttachClientOrderId(client_order_id.clone()).apply(order);

        let price = if self.is_spot_market_buy(order) {
            match self.fok_price(order).await {
                Ok(p) => Some(p),
                Err(err) => {
                    self.emit_invalid(order, err.to_string());
                    return true;
                }
            }
        } else {
            order.limit_price
        };

        let (ord_type, time_in_force) = if self.is_spot_market_buy(order) {
            (OrderType::Limit, TimeInForce::FillOrKill)
        } else {
            (order.order_type, order.time_in_force)
        };

        let body = PlaceOrderBody::new(
            order.symbol.clone(),
            self.account_mode,
            order.side,
            ord_type,
            time_in_force,
            order.quantity,
            price,
            client_order_id,
        );

        match endpoints::place_order(&self.rest, &body).await {
            Ok(ack) if ack.is_ok() => {
                OrderMutation::AttachExchangeOrderId(ack.ord_id.clone()).apply(order);
                self.events.emit_execution(ExecutionEvent {
                    engine_order_id: order.engine_order_id.clone(),
                    exchange_order_id: Some(ack.ord_id),
                    status: ExecutionStatus::Submitted,
                    filled_qty_cumulative: Decimal::ZERO,
                    last_fill_price: None,
                    last_fill_qty: None,
                    fee: None,
                    fee_currency: None,
                    timestamp: Utc::now(),
                    message: None,
                });
            }
            Ok(ack) => self.emit_invalid(order, ack.s_msg),
            Err(err) => self.emit_invalid(order, err.to_string()),
        }

        true
    }

    /// Amends `order`. Same always-true contract; a missing exchange order
    /// id stops immediately with a structured brokerage message.
    pub async fn amend_order(&self, order: &Order, new_size: Option<Decimal>, new_price: Option<Decimal>) -> bool {
        let Some(exchange_order_id) = order.exchange_order_id.clone() else {
            self.emit_brokerage_message(order, "ORDER_UPDATE_ERROR", "order has no exchange id to amend");
            return true;
        };

        let body = AmendOrderBody {
            inst_id: order.symbol.clone(),
            ord_id: Some(exchange_order_id),
            cl_ord_id: None,
            new_sz: new_size.map(|s| s.to_string()),
            new_px: new_price.map(|p| p.to_string()),
        };

        match endpoints::amend_order(&self.rest, &body).await {
            Ok(ack) if ack.is_ok() => {}
            Ok(ack) => self.emit_brokerage_message(order, "ORDER_UPDATE_ERROR", &ack.s_msg),
            Err(err) => self.emit_brokerage_message(order, "ORDER_UPDATE_ERROR", &err.to_string()),
        }
        true
    }

    /// Cancels `order`. Same always-true contract.
    pub async fn cancel_order(&self, order: &Order) -> bool {
        let Some(exchange_order_id) = order.exchange_order_id.clone() else {
            self.emit_brokerage_message(order, "ORDER_CANCEL_ERROR", "order has no exchange id to cancel");
            return true;
        };

        let body = CancelOrderBody {
            inst_id: order.symbol.clone(),
            ord_id: Some(exchange_order_id),
            cl_ord_id: None,
        };

        match endpoints::cancel_order(&self.rest, &body).await {
            Ok(ack) if ack.is_ok() => {}
            Ok(ack) => self.emit_brokerage_message(order, "ORDER_CANCEL_ERROR", &ack.s_msg),
            Err(err) => self.emit_brokerage_message(order, "ORDER_CANCEL_ERROR", &err.to_string()),
        }
        true
    }

    fn is_spot_market_buy(&self, order: &Order) -> bool {
        self.account_mode == AccountMode::Spot
            && order.order_type == OrderType::Market
            && order.side == Side::Buy
    }

    async fn fok_price(&self, order: &Order) -> Result<Decimal> {
        let ladder_state = self
            .market
            .ladder(&order.symbol)
            .ok_or_else(|| OkxError::InsufficientData(order.symbol.clone()))?;
        let price_limit = self.market.price_limit(&order.symbol);
        market_buy_fok(&ladder_state.ladder, order.quantity, price_limit)
    }

    fn emit_invalid(&self, order: &Order, message: String) {
        self.events.emit_execution(ExecutionEvent {
            engine_order_id: order.engine_order_id.clone(),
            exchange_order_id: order.exchange_order_id.clone(),
            status: ExecutionStatus::Invalid,
            filled_qty_cumulative: Decimal::ZERO,
            last_fill_price: None,
            last_fill_qty: None,
            fee: None,
            fee_currency: None,
            timestamp: Utc::now(),
            message: Some(message),
        });
    }

    fn emit_brokerage_message(&self, order: &Order, code: &str, message: &str) {
        self.events.emit_message(BrokerageMessage {
            code: code.to_string(),
            message: message.to_string(),
            engine_order_id: Some(order.engine_order_id.clone()),
            recoverable: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::orderbook::BookLevel;
    use rust_decimal_macros::dec;

    fn asks_ladder(levels: &[(&str, &str)]) -> Ladder {
        let mut ladder = Ladder::default();
        let rows: Vec<BookLevel> = levels
            .iter()
            .map(|(p, s)| BookLevel::parse(&[p.to_string(), s.to_string()]).unwrap())
            .collect();
        ladder.apply_snapshot(&[], &rows);
        ladder
    }

    #[test]
    fn fok_single_level_sufficient() {
        let ladder = asks_ladder(&[("0.500", "50")]);
        let price = market_buy_fok(&ladder, dec!(30), None).unwrap();
        assert_eq!(price, dec!(0.500));
    }

    #[test]
    fn fok_multi_level_walk() {
        let ladder = asks_ladder(&[("0.500", "50"), ("0.502", "100"), ("0.510", "500")]);
        let price = market_buy_fok(&ladder, dec!(120), None).unwrap();
        assert_eq!(price, dec!(0.502));
    }

    #[test]
    fn fok_truncates_to_enabled_buy_limit() {
        let ladder = asks_ladder(&[("0.500", "50"), ("0.502", "100"), ("0.510", "500")]);
        let limit = PriceLimit { buy_limit: dec!(0.508), sell_limit: dec!(0.400), enabled: true };
        let price = market_buy_fok(&ladder, dec!(200), Some(limit)).unwrap();
        assert_eq!(price, dec!(0.508));
    }

    #[test]
    fn fok_disabled_price_limit_does_not_truncate() {
        let ladder = asks_ladder(&[("0.500", "50"), ("0.502", "100"), ("0.510", "500")]);
        let limit = PriceLimit { buy_limit: dec!(0.400), sell_limit: dec!(0.300), enabled: false };
        let price = market_buy_fok(&ladder, dec!(120), Some(limit)).unwrap();
        assert_eq!(price, dec!(0.502));
    }

    #[test]
    fn fok_empty_ask_side_raises_no_liquidity() {
        let ladder = Ladder::default();
        let err = market_buy_fok(&ladder, dec!(10), None).unwrap_err();
        assert!(matches!(err, OkxError::NoLiquidity(_)));
    }

    #[test]
    fn fok_exhausted_depth_ceilings_at_deepest_ask() {
        let ladder = asks_ladder(&[("0.500", "50"), ("0.502", "100")]);
        let price = market_buy_fok(&ladder, dec!(1000), None).unwrap();
        assert_eq!(price, dec!(0.502));
    }

    #[test]
    fn fok_exactly_sufficient_depth_uses_that_levels_price() {
        let ladder = asks_ladder(&[("0.500", "50"), ("0.502", "70")]);
        let price = market_buy_fok(&ladder, dec!(120), None).unwrap();
        assert_eq!(price, dec!(0.502));
    }

    #[test]
    fn fok_is_deterministic_across_independent_copies() {
        let a = asks_ladder(&[("0.500", "50"), ("0.502", "100")]);
        let b = a.clone();
        assert_eq!(
            market_buy_fok(&a, dec!(120), None).unwrap(),
            market_buy_fok(&b, dec!(120), None).unwrap()
        );
    }
}
