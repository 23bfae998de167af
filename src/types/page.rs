/// Result of one paginated fetch. `next_before` is the oldest timestamp
/// seen in this page, to be used as the next backward-walking upper bound;
/// `None` once the requested start time has been reached or no data
/// remains.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub next_before: Option<i64>,
}

/// A backward-walking time-window query: `before` narrows the upper bound
/// on timestamps (exclusive), `after` is the earliest timestamp the caller
/// still wants, and `limit` caps the page size (OKX's REST endpoints cap
/// at 100 or 300 depending on endpoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PagedQuery {
    pub before: Option<i64>,
    pub after: Option<i64>,
    pub limit: Option<u16>,
}
