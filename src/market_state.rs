//! Wires the generic [`Synchronizer`](crate::sync::Synchronizer) to the two
//! concrete states it maintains for this gateway: the order-book ladder
//! (C4) and per-instrument price-limit state. Both are keyed by instrument
//! symbol.

use std::sync::Arc;
use std::time::Duration;

use crate::book::{DepthView, Ladder};
use crate::error::Result;
use crate::rest::endpoints;
use crate::rest::RestClient;
use crate::sync::{ResyncPolicy, SyncDelta, SyncState, Synchronizer};
use crate::types::orderbook::OrderbookFrame;
use crate::types::price_limit::PriceLimit;

/// One order-book update, tagged as a snapshot or incremental delta for
/// the synchronizer's state machine.
#[derive(Debug, Clone)]
pub struct OrderbookDelta {
    pub frame: OrderbookFrame,
    pub snapshot: bool,
}

impl SyncDelta for OrderbookDelta {
    fn seq(&self) -> u64 {
        self.frame.seq_id
    }
    fn is_snapshot(&self) -> bool {
        self.snapshot
    }
}

/// The ladder plus its last observed checksum, so callers can verify it
/// without re-deriving which frame produced the current state.
#[derive(Debug, Clone, Default)]
pub struct LadderState {
    pub ladder: Ladder,
}

impl SyncState for LadderState {
    type Delta = OrderbookDelta;

    fn apply(&mut self, delta: &Self::Delta) {
        if delta.snapshot {
            self.ladder.apply_snapshot(&delta.frame.bids, &delta.frame.asks);
        } else {
            self.ladder.apply_delta(&delta.frame.bids, &delta.frame.asks);
        }
    }
}

impl LadderState {
    pub fn to_depth_view(&self) -> DepthView {
        self.ladder.to_depth_view()
    }
}

/// Price-limit state carries no sequence id of its own on the wire; each
/// push is treated as a fresh snapshot, and `seq` is a locally assigned
/// monotonic counter purely so the synchronizer's gap logic never fires
/// for this key (every push is `seq = last + 1`, by construction below).
#[derive(Debug, Clone)]
pub struct PriceLimitDelta {
    pub limit: PriceLimit,
    pub seq: u64,
}

impl SyncDelta for PriceLimitDelta {
    fn seq(&self) -> u64 {
        self.seq
    }
    fn is_snapshot(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct PriceLimitState {
    pub limit: PriceLimit,
}

impl Default for PriceLimitState {
    fn default() -> Self {
        Self { limit: PriceLimit::disabled() }
    }
}

impl SyncState for PriceLimitState {
    type Delta = PriceLimitDelta;

    fn apply(&mut self, delta: &Self::Delta) {
        self.limit = delta.limit;
    }
}

/// Bundles the two synchronizers this gateway needs, each seeded with a
/// REST baseline fetcher bound to a shared [`RestClient`].
pub struct MarketState {
    pub orderbooks: Arc<Synchronizer<String, LadderState>>,
    pub price_limits: Arc<Synchronizer<String, PriceLimitState>>,
}

impl MarketState {
    pub fn new(rest: Arc<RestClient>) -> Self {
        let ob_rest = rest.clone();
        let orderbooks = Synchronizer::<String, LadderState>::new(
            move |inst_id: String| {
                let rest = ob_rest.clone();
                async move {
                    let frame = endpoints::get_orderbook_snapshot(&rest, &inst_id, 25).await?;
                    let mut state = LadderState::default();
                    state.ladder.apply_snapshot(&frame.bids, &frame.asks);
                    Ok((frame.seq_id, state))
                }
            },
            ResyncPolicy::default(),
        );

        let limit_rest = rest.clone();
        let price_limits = Synchronizer::<String, PriceLimitState>::new(
            move |inst_id: String| {
                let rest = limit_rest.clone();
                async move {
                    let limit = endpoints::get_price_limit(&rest, &inst_id).await?;
                    Ok((0, PriceLimitState { limit }))
                }
            },
            ResyncPolicy::default(),
        );

        Self { orderbooks, price_limits }
    }

    pub fn subscribe_orderbook(&self, inst_id: &str) {
        self.orderbooks.subscribe(inst_id.to_string());
    }

    pub fn subscribe_price_limit(&self, inst_id: &str) {
        self.price_limits.subscribe(inst_id.to_string());
    }

    /// Feeds one order-book WS push through the synchronizer, verifying
    /// its checksum and forcing a resync on mismatch. An empty ladder with
    /// a present checksum is treated as a silent no-op.
    pub fn on_orderbook_push(&self, inst_id: &str, frame: OrderbookFrame, snapshot: bool) {
        let delta = OrderbookDelta { frame: frame.clone(), snapshot };
        self.orderbooks.on_message(&inst_id.to_string(), delta);

        if let Some(checksum) = frame.checksum {
            if let Some(state) = self.orderbooks.get_state(&inst_id.to_string()) {
                if !state.ladder.checksum_matches(checksum as i32) {
                    tracing::warn!(inst_id, "orderbook checksum mismatch, forcing resync");
                    self.orderbooks.force_resync(&inst_id.to_string());
                }
            }
        }
    }

    pub fn on_price_limit_push(&self, inst_id: &str, limit: PriceLimit) {
        // monotonic local sequence: a single dispatch thread drives every
        // price-limit push for one instrument, so a global atomic counter
        // is enough to keep each push's SyncDelta ordered.
        let next_seq = local_seq_tick();
        self.price_limits
            .on_message(&inst_id.to_string(), PriceLimitDelta { limit, seq: next_seq });
    }

    pub fn orderbook_depth(&self, inst_id: &str) -> Option<DepthView> {
        self.orderbooks
            .get_state(&inst_id.to_string())
            .map(|s| s.to_depth_view())
    }

    pub fn ladder(&self, inst_id: &str) -> Option<LadderState> {
        self.orderbooks.get_state(&inst_id.to_string())
    }

    pub fn price_limit(&self, inst_id: &str) -> Option<PriceLimit> {
        self.price_limits.get_state(&inst_id.to_string()).map(|s| s.limit)
    }

    pub async fn await_orderbook(&self, inst_id: &str, timeout: Duration) -> Result<LadderState> {
        self.orderbooks.await_state(&inst_id.to_string(), timeout).await
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
static LOCAL_SEQ: AtomicU64 = AtomicU64::new(1);
fn local_seq_tick() -> u64 {
    LOCAL_SEQ.fetch_add(1, Ordering::Relaxed)
}
