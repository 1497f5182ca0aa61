//! Mesh node data served by the listing endpoints.

pub mod directory;

pub use directory::{Node, NodeDirectory, NodePage, NodeQuery, SortKey};
