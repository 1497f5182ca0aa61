//! Page/limit/offset derivation for listing endpoints.

use serde::Serialize;

use crate::params::extract::QueryParams;

/// Largest page number a client may ask for.
pub const MAX_PAGE: i64 = 1_000_000;

/// Clamped pagination window. `offset` is always derived, never read from
/// the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub offset: u64,
}

impl Pagination {
    /// Read `page` and `limit` from the query.
    ///
    /// `limit` always lands in `[1, max_limit]`; an unusable `max_limit`
    /// (below 1) is treated as 1.
    pub fn from_params(params: &QueryParams, default_limit: i64, max_limit: i64) -> Self {
        let max_limit = max_limit.max(1);
        let page = params.int("page", 1, Some(1), Some(MAX_PAGE));
        let limit = params.int("limit", default_limit, Some(1), Some(max_limit));
        // A misconfigured default is the only way to get here out of range.
        let limit = limit.clamp(1, max_limit);

        let page = page as u64;
        let limit = limit as u64;
        Self {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }

    /// Number of pages needed for `total` items (at least one).
    pub fn total_pages(&self, total: usize) -> u64 {
        (total as u64).div_ceil(self.limit).max(1)
    }
}
