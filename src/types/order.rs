use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::enums::{OrderType, Side, TimeInForce};

/// An order as the engine sees it. Fields attached after placement
/// (exchange order id, client order id) are mutated only through
/// [`OrderMutation`] rather than reflection, matching the "builder or
/// explicit mutator" design called for in place of test-only reflection
/// mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub engine_order_id: String,
    pub symbol: String,
    pub side: Side,
    /// Signed quantity; positive means buy. Stored unsigned alongside
    /// `side` to avoid sign/side disagreement; callers pass quantity as a
    /// magnitude.
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub created_at: DateTime<Utc>,
    pub client_order_id: Option<String>,
    pub exchange_order_id: Option<String>,
}

impl Order {
    pub fn new(
        engine_order_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        order_type: OrderType,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            engine_order_id: engine_order_id.into(),
            symbol: symbol.into(),
            side,
            quantity,
            order_type,
            limit_price: None,
            time_in_force,
            created_at: Utc::now(),
            client_order_id: None,
            exchange_order_id: None,
        }
    }

    pub fn with_limit_price(mut self, price: Decimal) -> Self {
        self.limit_price = Some(price);
        self
    }
}

/// A mutator applied to an order after a round-trip to the exchange.
/// Keeps the "attach exchange id(s) on placement" invariant explicit and
/// auditable instead of mutating fields ad hoc.
pub enum OrderMutation {
    AttachClientOrderId(String),
    AttachExchangeOrderId(String),
}

impl OrderMutation {
    pub fn apply(self, order: &mut Order) {
        match self {
            OrderMutation::AttachClientOrderId(id) => order.client_order_id = Some(id),
            OrderMutation::AttachExchangeOrderId(id) => order.exchange_order_id = Some(id),
        }
    }
}

/// Mints monotonically increasing client order ids, scoped to one gateway
/// instance. OKX's `clOrdId` must be unique and alphanumeric; this factory
/// produces a short prefixed counter value.
#[derive(Debug)]
pub struct ClientOrderIdFactory {
    prefix: String,
    counter: AtomicU64,
}

impl ClientOrderIdFactory {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}{n}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn mutation_attaches_exchange_order_id() {
        let mut order = Order::new(
            "e1",
            "BTC-USDT",
            Side::Buy,
            dec!(1),
            OrderType::Limit,
            TimeInForce::GoodTilCanceled,
        )
        .with_limit_price(dec!(100));
        OrderMutation::AttachExchangeOrderId("12345".into()).apply(&mut order);
        assert_eq!(order.exchange_order_id, Some("12345".into()));
    }

    #[test]
    fn client_order_id_factory_is_monotonic_and_unique() {
        let factory = ClientOrderIdFactory::new("eng-");
        let ids: Vec<_> = (0..5).map(|_| factory.next()).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
        assert!(ids[0].starts_with("eng-"));
    }
}
