//! Query parameter sanitation.
//!
//! # Data Flow
//! ```text
//! raw query string
//!     → extract.rs (decode, typed accessors with defaults and clamps)
//!     → pagination.rs (page / limit / offset for listings)
//!     → route handler
//! ```
//!
//! # Design Decisions
//! - Accessors never fail; bad input degrades to the default
//! - Bounds are applied to parsed values only, defaults pass through
//! - Listing endpoints always go through `Pagination`

pub mod extract;
pub mod pagination;

pub use extract::{is_truthy, parse_iso8601, Pattern, QueryParams};
pub use pagination::Pagination;
