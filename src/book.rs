//! The order-book ladder (C4): a per-instrument sorted bid/ask depth map,
//! mutated by snapshots and deltas, checksummed against the exchange's
//! CRC32 digest.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::types::orderbook::BookLevel;

const CHECKSUM_DEPTH: usize = 25;

#[derive(Debug, Clone, PartialEq)]
struct Level {
    size: Decimal,
    price_raw: String,
    size_raw: String,
}

/// One side of the ladder (bids or asks). Bids are read in descending
/// price order, asks ascending; both are backed by the same `BTreeMap`
/// structure and differ only in iteration direction.
#[derive(Debug, Clone, Default)]
pub struct LadderSide {
    levels: BTreeMap<Decimal, Level>,
    is_bid: bool,
}

impl LadderSide {
    fn new(is_bid: bool) -> Self {
        Self {
            levels: BTreeMap::new(),
            is_bid,
        }
    }

    fn clear(&mut self) {
        self.levels.clear();
    }

    /// Applies a batch of levels: size 0 removes the price, otherwise the
    /// price is set to that size. Malformed rows (caught upstream by
    /// [`BookLevel::parse`] returning `None`) never reach here. Returns
    /// whether the best price on this side changed.
    fn apply(&mut self, rows: &[BookLevel]) -> bool {
        let before = self.best();
        for row in rows {
            if row.size.is_zero() {
                self.levels.remove(&row.price);
            } else {
                self.levels.insert(
                    row.price,
                    Level {
                        size: row.size,
                        price_raw: row.price_raw.clone(),
                        size_raw: row.size_raw.clone(),
                    },
                );
            }
        }
        before != self.best()
    }

    fn replace(&mut self, rows: &[BookLevel]) {
        self.levels.clear();
        for row in rows {
            if !row.size.is_zero() {
                self.levels.insert(
                    row.price,
                    Level {
                        size: row.size,
                        price_raw: row.price_raw.clone(),
                        size_raw: row.size_raw.clone(),
                    },
                );
            }
        }
    }

    /// Best price: the maximum key for bids, the minimum for asks. Zero
    /// when the side is empty.
    pub fn best(&self) -> Decimal {
        self.best_price().unwrap_or_default()
    }

    fn best_price(&self) -> Option<Decimal> {
        if self.is_bid {
            self.levels.keys().next_back().copied()
        } else {
            self.levels.keys().next().copied()
        }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Up to `n` (price, size) pairs in best-first order.
    pub fn top_n(&self, n: usize) -> Vec<(Decimal, Decimal)> {
        self.iter_best_first()
            .take(n)
            .map(|(p, l)| (p, l.size))
            .collect()
    }

    fn iter_best_first(&self) -> Box<dyn Iterator<Item = (Decimal, &Level)> + '_> {
        if self.is_bid {
            Box::new(self.levels.iter().rev().map(|(p, l)| (*p, l)))
        } else {
            Box::new(self.levels.iter().map(|(p, l)| (*p, l)))
        }
    }

    fn checksum_fragments(&self) -> Vec<String> {
        self.iter_best_first()
            .take(CHECKSUM_DEPTH)
            .map(|(_, l)| format!("{}:{}", l.price_raw, l.size_raw))
            .collect()
    }
}

/// An immutable point-in-time view of a ladder, safe to hand to readers
/// without exposing the underlying mutable structure.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthView {
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
    pub mid_price: Decimal,
    pub spread: Decimal,
    pub level_count: usize,
}

/// The order-book ladder for one instrument. Owned exclusively by its
/// synchronizer; observers only ever see a [`DepthView`] snapshot.
#[derive(Debug, Clone)]
pub struct Ladder {
    pub bids: LadderSide,
    pub asks: LadderSide,
}

impl Default for Ladder {
    fn default() -> Self {
        Self::new()
    }
}

impl Ladder {
    pub fn new() -> Self {
        Self {
            bids: LadderSide::new(true),
            asks: LadderSide::new(false),
        }
    }

    /// Clears both sides (used on gap/resync — the ladder is cleared, not
    /// destroyed).
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// A complete replacement of the ladder. Drops zero-size rows and
    /// fires no change notification itself — callers compare `best_bid`/
    /// `best_ask` before and after to decide whether to notify.
    pub fn apply_snapshot(&mut self, bids: &[BookLevel], asks: &[BookLevel]) {
        self.bids.replace(bids);
        self.asks.replace(asks);
    }

    /// An incremental update. Returns whether either side's best price
    /// changed, which callers use to decide whether to fire a
    /// best-bid-ask change event.
    pub fn apply_delta(&mut self, bids: &[BookLevel], asks: &[BookLevel]) -> bool {
        let bid_changed = self.bids.apply(bids);
        let ask_changed = self.asks.apply(asks);
        bid_changed || ask_changed
    }

    pub fn best_bid(&self) -> Decimal {
        self.bids.best()
    }

    pub fn best_ask(&self) -> Decimal {
        self.asks.best()
    }

    /// CRC32/IEEE checksum over the canonical interleaved top-25 encoding.
    /// Reinterprets the unsigned 32-bit digest as signed, matching what
    /// the exchange emits on the wire.
    pub fn checksum(&self) -> i32 {
        let bid_fragments = self.bids.checksum_fragments();
        let ask_fragments = self.asks.checksum_fragments();
        let depth = bid_fragments.len().max(ask_fragments.len());

        let mut parts = Vec::with_capacity(depth * 2);
        for i in 0..depth {
            if let Some(b) = bid_fragments.get(i) {
                parts.push(b.clone());
            }
            if let Some(a) = ask_fragments.get(i) {
                parts.push(a.clone());
            }
        }
        let encoded = parts.join(":");

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(encoded.as_bytes());
        hasher.finalize() as i32
    }

    /// Whether the checksum matches, treating an empty ladder with a
    /// present checksum as a silent no-op (per the resolved open question
    /// on that ambiguity) rather than a mismatch.
    pub fn checksum_matches(&self, expected: i32) -> bool {
        if self.bids.is_empty() && self.asks.is_empty() {
            return true;
        }
        self.checksum() == expected
    }

    pub fn to_depth_view(&self) -> DepthView {
        let bids = self.bids.top_n(usize::MAX);
        let asks = self.asks.top_n(usize::MAX);
        let best_bid = self.best_bid();
        let best_ask = self.best_ask();
        let mid_price = if best_bid.is_zero() || best_ask.is_zero() {
            Decimal::ZERO
        } else {
            (best_bid + best_ask) / Decimal::TWO
        };
        let spread = if best_bid.is_zero() || best_ask.is_zero() {
            Decimal::ZERO
        } else {
            best_ask - best_bid
        };
        DepthView {
            level_count: bids.len().max(asks.len()),
            bids,
            asks,
            mid_price,
            spread,
        }
    }
}
