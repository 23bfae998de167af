//! The execution reconciler (C7): consumes pushes from the private
//! `orders` channel and maps each one to an [`ExecutionEvent`], deduped by
//! `(orderId, tradeId)`. Order pushes can race the place-response (the
//! fill arrives over the WS channel before the REST response attaches the
//! exchange order id locally); such orphans are held in a bounded pending
//! map for a grace window rather than dropped.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use crate::events::EventSinks;
use crate::types::enums::ExecutionStatus;
use crate::types::execution::ExecutionEvent;
use crate::ws::events::OrderPush;

const DEFAULT_ORPHAN_CAPACITY: usize = 4096;
const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(5);

fn map_status(push: &OrderPush) -> Option<ExecutionStatus> {
    match push.state.as_str() {
        "live" => Some(ExecutionStatus::Submitted),
        "partially_filled" => Some(ExecutionStatus::PartialFill),
        "filled" => Some(ExecutionStatus::Filled),
        "canceled" => Some(ExecutionStatus::Canceled),
        "rejected" | "mmp_canceled" => Some(ExecutionStatus::Rejected),
        _ => None,
    }
}

struct OrphanEntry {
    pushes: Vec<OrderPush>,
    first_seen: Instant,
}

struct Inner {
    /// exchange order id -> engine order id, registered by the pipeline
    /// once a place response attaches the exchange id.
    order_ids: HashMap<String, String>,
    /// (exchange order id, trade id) already emitted.
    seen: HashSet<(String, String)>,
    /// pushes for an exchange order id not yet registered, held for
    /// `grace_window` in case the REST place-response is still in flight.
    orphans: HashMap<String, OrphanEntry>,
    orphan_order: VecDeque<String>,
    /// per-order running total of confirmed fills, so cumulative totals
    /// survive across multiple pushes.
    filled_cumulative: HashMap<String, Decimal>,
    /// whether `Submitted` has already been emitted for this order (the
    /// first `live`/`partially_filled` sighting only).
    submitted_emitted: HashSet<String>,
}

/// Maps private-channel order pushes onto the shared execution-event
/// stream. One instance serves every instrument; state is keyed by
/// exchange order id.
pub struct Reconciler {
    inner: Mutex<Inner>,
    events: EventSinks,
    orphan_capacity: usize,
    grace_window: Duration,
}

impl Reconciler {
    pub fn new(events: EventSinks) -> Self {
        Self::with_limits(events, DEFAULT_ORPHAN_CAPACITY, DEFAULT_GRACE_WINDOW)
    }

    pub fn with_limits(events: EventSinks, orphan_capacity: usize, grace_window: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                order_ids: HashMap::new(),
                seen: HashSet::new(),
                orphans: HashMap::new(),
                orphan_order: VecDeque::new(),
                filled_cumulative: HashMap::new(),
                submitted_emitted: HashSet::new(),
            }),
            events,
            orphan_capacity,
            grace_window,
        }
    }

    /// Registers the mapping from an exchange order id to the engine's own
    /// id, called by the order pipeline immediately after a successful
    /// place response. Replays any orphaned pushes that arrived first.
    pub fn register_order(&self, exchange_order_id: &str, engine_order_id: &str) {
        let orphaned = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .order_ids
                .insert(exchange_order_id.to_string(), engine_order_id.to_string());
            inner.orphans.remove(exchange_order_id).map(|e| e.pushes)
        };
        if let Some(pushes) = orphaned {
            for push in pushes {
                self.handle(push);
            }
        }
    }

    /// Processes one push from the `orders` channel, emitting at most one
    /// execution event (or none, for a duplicate/unmapped state).
    pub fn handle(&self, push: OrderPush) {
        let engine_order_id = {
            let mut inner = self.inner.lock().unwrap();
            self.evict_stale_orphans(&mut inner);
            match inner.order_ids.get(&push.ord_id).cloned() {
                Some(id) => id,
                None => {
                    self.buffer_orphan(&mut inner, push);
                    return;
                }
            }
        };

        let Some(status) = map_status(&push) else {
            return;
        };

        // Fills dedup on (ordId, tradeId) per spec §4.6. Status-only pushes
        // carry no tradeId, so they dedup on (ordId, state) instead —
        // keying them on a shared empty tradeId would collapse every
        // distinct status transition (e.g. live then canceled) onto the
        // same key and silently drop all but the first.
        let dedup_key = match &push.trade_id {
            Some(trade_id) => (push.ord_id.clone(), format!("trade:{trade_id}")),
            None => (push.ord_id.clone(), format!("state:{}", push.state)),
        };
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.seen.insert(dedup_key) {
                return;
            }
        }

        let status = self.resolve_submitted_vs_partial(&engine_order_id, status);

        let is_fill = push.trade_id.is_some();
        let cumulative = {
            let mut inner = self.inner.lock().unwrap();
            let entry = inner.filled_cumulative.entry(push.ord_id.clone()).or_insert(Decimal::ZERO);
            if is_fill {
                *entry = push.acc_fill_sz;
            }
            *entry
        };

        let timestamp = Utc
            .timestamp_millis_opt(push.updated_ms)
            .single()
            .unwrap_or_else(Utc::now);

        self.events.emit_execution(ExecutionEvent {
            engine_order_id,
            exchange_order_id: Some(push.ord_id),
            status,
            filled_qty_cumulative: cumulative,
            last_fill_price: if is_fill { push.fill_px } else { None },
            last_fill_qty: if is_fill { push.fill_sz } else { None },
            fee: push.fee,
            fee_currency: push.fee_ccy,
            timestamp,
            message: push.msg,
        });
    }

    /// `live`/`partially_filled` maps to `Submitted` only on first sighting
    /// for this order, `PartialFill` thereafter.
    fn resolve_submitted_vs_partial(&self, engine_order_id: &str, status: ExecutionStatus) -> ExecutionStatus {
        if status != ExecutionStatus::Submitted {
            return status;
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.submitted_emitted.insert(engine_order_id.to_string()) {
            ExecutionStatus::Submitted
        } else {
            ExecutionStatus::PartialFill
        }
    }

    fn buffer_orphan(&self, inner: &mut Inner, push: OrderPush) {
        let key = push.ord_id.clone();
        match inner.orphans.get_mut(&key) {
            Some(entry) => entry.pushes.push(push),
            None => {
                if inner.orphans.len() >= self.orphan_capacity {
                    if let Some(oldest) = inner.orphan_order.pop_front() {
                        inner.orphans.remove(&oldest);
                    }
                }
                inner.orphan_order.push_back(key.clone());
                inner.orphans.insert(key, OrphanEntry { pushes: vec![push], first_seen: Instant::now() });
            }
        }
    }

    fn evict_stale_orphans(&self, inner: &mut Inner) {
        let grace_window = self.grace_window;
        while let Some(oldest) = inner.orphan_order.front().cloned() {
            let expired = inner
                .orphans
                .get(&oldest)
                .map(|e| e.first_seen.elapsed() > grace_window)
                .unwrap_or(true);
            if expired {
                inner.orphan_order.pop_front();
                inner.orphans.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn push(ord_id: &str, state: &str, trade_id: Option<&str>, acc_fill: Decimal) -> OrderPush {
        OrderPush {
            inst_id: "BTC-USDT".into(),
            ord_id: ord_id.to_string(),
            cl_ord_id: None,
            state: state.to_string(),
            trade_id: trade_id.map(str::to_string),
            acc_fill_sz: acc_fill,
            fill_px: trade_id.map(|_| dec!(100)),
            fill_sz: trade_id.map(|_| dec!(1)),
            fee: None,
            fee_ccy: None,
            updated_ms: 1_700_000_000_000,
            code: None,
            msg: None,
        }
    }

    #[test]
    fn first_live_sighting_emits_submitted_then_partial_fill() {
        let events = EventSinks::new();
        let mut rx = events.subscribe_executions();
        let reconciler = Reconciler::new(events);
        reconciler.register_order("ex-1", "eng-1");

        reconciler.handle(push("ex-1", "live", None, dec!(0)));
        let first = rx.try_recv().unwrap();
        assert_eq!(first.status, ExecutionStatus::Submitted);

        reconciler.handle(push("ex-1", "partially_filled", Some("t-1"), dec!(1)));
        let second = rx.try_recv().unwrap();
        assert_eq!(second.status, ExecutionStatus::PartialFill);
        assert_eq!(second.filled_qty_cumulative, dec!(1));
        assert!(second.is_fill());
    }

    #[test]
    fn duplicate_order_trade_pair_is_dropped() {
        let events = EventSinks::new();
        let mut rx = events.subscribe_executions();
        let reconciler = Reconciler::new(events);
        reconciler.register_order("ex-1", "eng-1");

        reconciler.handle(push("ex-1", "filled", Some("t-1"), dec!(5)));
        reconciler.handle(push("ex-1", "filled", Some("t-1"), dec!(5)));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err(), "duplicate (ordId, tradeId) must not re-emit");
    }

    #[test]
    fn orphan_push_is_buffered_and_replayed_on_registration() {
        let events = EventSinks::new();
        let mut rx = events.subscribe_executions();
        let reconciler = Reconciler::new(events);

        // fill races the place-response: arrives before register_order.
        reconciler.handle(push("ex-1", "filled", Some("t-1"), dec!(5)));
        assert!(rx.try_recv().is_err(), "no mapping yet, must not emit");

        reconciler.register_order("ex-1", "eng-1");
        let event = rx.try_recv().unwrap();
        assert_eq!(event.engine_order_id, "eng-1");
        assert_eq!(event.status, ExecutionStatus::Filled);
    }

    #[test]
    fn live_then_canceled_emits_both_status_only_transitions() {
        let events = EventSinks::new();
        let mut rx = events.subscribe_executions();
        let reconciler = Reconciler::new(events);
        reconciler.register_order("ex-1", "eng-1");

        reconciler.handle(push("ex-1", "live", None, dec!(0)));
        let submitted = rx.try_recv().unwrap();
        assert_eq!(submitted.status, ExecutionStatus::Submitted);

        reconciler.handle(push("ex-1", "canceled", None, dec!(0)));
        let canceled = rx
            .try_recv()
            .expect("canceled must not be swallowed by the live sighting's dedup key");
        assert_eq!(canceled.status, ExecutionStatus::Canceled);
    }

    #[test]
    fn canceled_state_maps_directly() {
        let events = EventSinks::new();
        let mut rx = events.subscribe_executions();
        let reconciler = Reconciler::new(events);
        reconciler.register_order("ex-1", "eng-1");

        reconciler.handle(push("ex-1", "canceled", None, dec!(0)));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.status, ExecutionStatus::Canceled);
        assert!(!event.is_fill());
    }
}
