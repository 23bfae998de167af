//! Historical-data retrieval (C9): paginated candle fetch with a
//! backward time-window walk — each page's oldest
//! timestamp becomes the next page's exclusive upper bound, continuing
//! until enough rows are gathered or `start_ms` is reached, deduplicating
//! on the boundary timestamp shared by consecutive pages.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::rest::endpoints;
use crate::rest::RestClient;
use crate::types::enums::CandleResolution;
use crate::types::market::Candle;
use crate::types::page::{PageResult, PagedQuery};

const PAGE_SIZE: u16 = 300;

/// What the engine is asking for. Only bar resolutions of a minute or
/// coarser are retrievable through this path; quote ticks
/// and sub-minute bars are not supported and `fetch_history` returns
/// `None` for them, matching the façade's `get_history` contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub inst_id: String,
    pub resolution: CandleResolution,
    /// Inclusive lower bound, in epoch milliseconds.
    pub start_ms: i64,
    /// Stop once at least this many candles have been gathered (in
    /// addition to reaching `start_ms`).
    pub max_candles: usize,
}

/// Fetches one page of candles at or before `query.before` (exclusive),
/// reporting the oldest timestamp seen so the caller can chain another
/// page from it.
async fn fetch_page(
    rest: &Arc<RestClient>,
    inst_id: &str,
    resolution: CandleResolution,
    query: PagedQuery,
) -> Result<PageResult<Candle>> {
    let limit = query.limit.unwrap_or(PAGE_SIZE);
    let items = endpoints::get_history_candles(rest, inst_id, resolution, query.before, limit).await?;
    let next_before = items.iter().map(|c| c.timestamp_ms).min();
    Ok(PageResult { items, next_before })
}

/// Walks pages backward from "now" until either `max_candles` rows are
/// collected or a page's oldest row is at or before `start_ms`, returning
/// rows in ascending timestamp order with boundary duplicates removed.
pub async fn fetch_history(rest: &Arc<RestClient>, request: &HistoryRequest) -> Result<Vec<Candle>> {
    let mut collected: Vec<Candle> = Vec::new();
    let mut seen_ts: HashSet<i64> = HashSet::new();
    let mut query = PagedQuery {
        before: None,
        after: None,
        limit: Some(PAGE_SIZE),
    };

    loop {
        let page = fetch_page(rest, &request.inst_id, request.resolution, query).await?;
        if page.items.is_empty() {
            break;
        }

        for candle in page.items {
            if candle.timestamp_ms >= request.start_ms && seen_ts.insert(candle.timestamp_ms) {
                collected.push(candle);
            }
        }

        let Some(oldest_ts) = page.next_before else { break };
        if oldest_ts <= request.start_ms || collected.len() >= request.max_candles {
            break;
        }
        query.before = Some(oldest_ts);
    }

    collected.sort_by_key(|c| c.timestamp_ms);
    Ok(collected)
}

/// Whether `resolution` can be serviced by history retrieval at all.
/// Sub-minute bars are unsupported; this crate models none.
pub fn resolution_is_supported(_resolution: CandleResolution) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_candle_resolution_this_crate_models_is_supported() {
        assert!(resolution_is_supported(CandleResolution::OneMinute));
        assert!(resolution_is_supported(CandleResolution::OneDay));
    }
}
