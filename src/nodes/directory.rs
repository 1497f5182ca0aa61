//! In-memory node directory.
//!
//! # Responsibilities
//! - Load the node list once at startup
//! - Filter, sort and slice it for the listing endpoints
//!
//! # Design Decisions
//! - Read-only after load; shared via Arc without locking
//! - A missing or broken data file yields an empty directory, never a
//!   startup failure

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::params::{Pagination, Pattern, QueryParams};

/// Nodes heard within this window count as active.
pub const ACTIVE_WINDOW_SECS: f64 = 24.0 * 3600.0;

/// Longest accepted search term.
pub const SEARCH_MAX_LEN: usize = 64;

/// Characters a search term may contain.
pub const SEARCH_PATTERN: &str = r"[A-Za-z0-9 _!.\-]*";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: u32,
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub hw_model: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Epoch seconds of the last packet heard from this node.
    #[serde(default)]
    pub last_heard: Option<f64>,
    #[serde(default)]
    pub snr: Option<f64>,
}

impl Node {
    /// Canonical `!xxxxxxxx` form.
    pub fn hex_id(&self) -> String {
        format!("!{:08x}", self.node_id)
    }

    pub fn display_name(&self) -> String {
        self.long_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.hex_id())
    }

    fn matches_search(&self, needle: &str) -> bool {
        let hit = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains(needle))
        };
        hit(&self.long_name) || hit(&self.short_name) || self.hex_id().contains(needle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    NodeId,
    LongName,
    ShortName,
    LastHeard,
}

impl SortKey {
    pub const ALLOWED: [&'static str; 4] = ["node_id", "long_name", "short_name", "last_heard"];

    fn parse(raw: &str) -> Self {
        match raw {
            "node_id" => SortKey::NodeId,
            "long_name" => SortKey::LongName,
            "short_name" => SortKey::ShortName,
            _ => SortKey::LastHeard,
        }
    }

    fn compare(self, a: &Node, b: &Node) -> Ordering {
        match self {
            SortKey::NodeId => a.node_id.cmp(&b.node_id),
            SortKey::LongName => a.long_name.cmp(&b.long_name),
            SortKey::ShortName => a.short_name.cmp(&b.short_name),
            SortKey::LastHeard => a
                .last_heard
                .unwrap_or(f64::NEG_INFINITY)
                .total_cmp(&b.last_heard.unwrap_or(f64::NEG_INFINITY)),
        }
    }
}

/// Filters and ordering for a node listing.
#[derive(Debug, Clone)]
pub struct NodeQuery {
    pub search: String,
    pub sort_by: SortKey,
    pub descending: bool,
    /// Only nodes heard at or after this instant (epoch seconds).
    pub heard_after: Option<f64>,
    pub min_snr: Option<f64>,
}

impl Default for NodeQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort_by: SortKey::LastHeard,
            descending: true,
            heard_after: None,
            min_snr: None,
        }
    }
}

impl NodeQuery {
    /// Build from the query string. `now` is epoch seconds.
    pub fn from_params(params: &QueryParams, search_pattern: &Pattern, now: f64) -> Self {
        let search = params
            .string("search", "", SEARCH_MAX_LEN, Some(search_pattern))
            .to_lowercase();
        let sort_by = SortKey::parse(&params.one_of("sort_by", &SortKey::ALLOWED, "last_heard"));
        let descending = params.one_of("order", &["asc", "desc"], "desc") == "desc";

        let since = params.timestamp("since");
        let active_cutoff = params
            .bool("active_only", false)
            .then_some(now - ACTIVE_WINDOW_SECS);
        let heard_after = match (since, active_cutoff) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        let min_snr = params.get("min_snr").map(|_| {
            params.float("min_snr", f64::NEG_INFINITY, Some(-50.0), Some(50.0))
        });

        Self {
            search,
            sort_by,
            descending,
            heard_after,
            min_snr,
        }
    }

    fn accepts(&self, node: &Node) -> bool {
        if !self.search.is_empty() && !node.matches_search(&self.search) {
            return false;
        }
        if let Some(cutoff) = self.heard_after {
            if !node.last_heard.is_some_and(|t| t >= cutoff) {
                return false;
            }
        }
        if let Some(min) = self.min_snr {
            if node.snr.unwrap_or(f64::NEG_INFINITY) < min {
                return false;
            }
        }
        true
    }
}

/// One page of a listing.
#[derive(Debug)]
pub struct NodePage<'a> {
    pub nodes: Vec<&'a Node>,
    pub total_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct NodeDirectory {
    nodes: Vec<Node>,
}

impl NodeDirectory {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Read a JSON array of nodes.
    pub fn load_json(path: &Path) -> Result<Self, DirectoryError> {
        let content = fs::read_to_string(path)?;
        let nodes: Vec<Node> = serde_json::from_str(&content)?;
        Ok(Self::new(nodes))
    }

    /// Load `path` if given; fall back to an empty directory on any error.
    pub fn load_or_empty(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::info!("No node data file configured, starting with an empty directory");
            return Self::default();
        };

        match Self::load_json(path) {
            Ok(directory) => {
                tracing::info!(path = %path.display(), nodes = directory.len(), "Loaded node data");
                directory
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load node data, starting empty");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Filter, sort and slice.
    pub fn query(&self, query: &NodeQuery, page: &Pagination) -> NodePage<'_> {
        let mut matched: Vec<&Node> = self.nodes.iter().filter(|n| query.accepts(n)).collect();
        matched.sort_by(|a, b| {
            let ord = query.sort_by.compare(a, b);
            if query.descending {
                ord.reverse()
            } else {
                ord
            }
        });

        let total_count = matched.len();
        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
        let nodes = matched.into_iter().skip(offset).take(limit).collect();

        NodePage { nodes, total_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u32, name: &str, last_heard: f64, snr: f64) -> Node {
        Node {
            node_id: id,
            long_name: Some(name.to_string()),
            short_name: Some(name.chars().take(4).collect()),
            hw_model: None,
            role: None,
            last_heard: Some(last_heard),
            snr: Some(snr),
        }
    }

    fn directory() -> NodeDirectory {
        NodeDirectory::new(vec![
            node(0x1, "Hilltop Relay", 1_000.0, 5.0),
            node(0x2, "Base Camp", 3_000.0, -2.5),
            node(0xabcd, "Rover", 2_000.0, 9.0),
        ])
    }

    fn pattern() -> Pattern {
        Pattern::new(SEARCH_PATTERN).unwrap()
    }

    fn run(query: &str, now: f64) -> (Vec<u32>, usize) {
        let params = QueryParams::from_query(Some(query));
        let q = NodeQuery::from_params(&params, &pattern(), now);
        let page = Pagination::from_params(&params, 100, 200);
        let dir = directory();
        let result = dir.query(&q, &page);
        (result.nodes.iter().map(|n| n.node_id).collect(), result.total_count)
    }

    #[test]
    fn test_default_sort_is_most_recent_first() {
        assert_eq!(run("", 0.0).0, vec![0x2, 0xabcd, 0x1]);
    }

    #[test]
    fn test_sort_and_order() {
        assert_eq!(run("sort_by=node_id&order=asc", 0.0).0, vec![0x1, 0x2, 0xabcd]);
        assert_eq!(run("sort_by=long_name&order=asc", 0.0).0, vec![0x2, 0x1, 0xabcd]);
        // Unknown values fall back to the defaults.
        assert_eq!(run("sort_by=snr;DROP&order=sideways", 0.0).0, vec![0x2, 0xabcd, 0x1]);
    }

    #[test]
    fn test_search() {
        assert_eq!(run("search=relay", 0.0).0, vec![0x1]);
        assert_eq!(run("search=0000abcd", 0.0).0, vec![0xabcd]);
        // Filtered-out terms become empty and match everything.
        assert_eq!(run("search=%3Cscript%3E", 0.0).1, 3);
    }

    #[test]
    fn test_time_and_snr_filters() {
        assert_eq!(run("since=1970-01-01T00:30:00Z", 0.0).0, vec![0x2, 0xabcd]);
        assert_eq!(run("active_only=1", 3_000.0 + ACTIVE_WINDOW_SECS - 1_500.0).0, vec![0x2, 0xabcd]);
        assert_eq!(run("min_snr=0", 0.0).0, vec![0xabcd, 0x1]);
        assert_eq!(run("min_snr=abc", 0.0).1, 3);
    }

    #[test]
    fn test_pagination_slices_after_filtering() {
        let (ids, total) = run("limit=2&page=2", 0.0);
        assert_eq!(ids, vec![0x1]);
        assert_eq!(total, 3);

        let (ids, total) = run("page=50", 0.0);
        assert!(ids.is_empty());
        assert_eq!(total, 3);
    }

    #[test]
    fn test_load_or_empty_tolerates_missing_file() {
        let dir = NodeDirectory::load_or_empty(Some(Path::new("/nonexistent/nodes.json")));
        assert!(dir.is_empty());
    }

    #[test]
    fn test_node_json() {
        let nodes: Vec<Node> = serde_json::from_str(r#"[{"node_id": 305419896, "long_name": "Relay"}]"#).unwrap();
        assert_eq!(nodes[0].hex_id(), "!12345678");
        assert_eq!(nodes[0].display_name(), "Relay");
        assert!(nodes[0].last_heard.is_none());
    }
}
