//! Page and API handlers.

use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::response::AppError;
use crate::http::server::AppState;
use crate::nodes::{Node, NodeQuery};
use crate::params::{Pagination, QueryParams};

pub const SERVICE_NAME: &str = "mesh-health-web";

/// Current time as epoch seconds.
pub fn epoch_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Escape text for HTML element and attribute content.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} - Mesh Health</title>\n</head>\n<body>\n\
         <nav class=\"navbar\"><a href=\"/\">Mesh Health</a> | <a href=\"/nodes\">Nodes</a> | \
         <a href=\"/api/nodes/data\">API</a> | <a href=\"/health\">Health</a></nav>\n\
         <main>\n{body}\n</main>\n</body>\n</html>\n",
        title = escape_html(title),
    ))
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    page(
        "Dashboard",
        &format!(
            "<h1>Mesh Health</h1>\n<p>{} nodes known.</p>",
            state.nodes.len()
        ),
    )
}

/// Listing window and filters shared by the HTML and JSON node views.
fn node_query(state: &AppState, params: &QueryParams) -> (NodeQuery, Pagination) {
    let query = NodeQuery::from_params(params, &state.search_pattern, epoch_now());
    let pagination = Pagination::from_params(
        params,
        state.nodes_config.default_page_size,
        state.nodes_config.max_page_size,
    );
    (query, pagination)
}

pub async fn nodes_page(State(state): State<AppState>, params: QueryParams) -> Html<String> {
    let (query, pagination) = node_query(&state, &params);
    let result = state.nodes.query(&query, &pagination);

    let rows: String = result
        .nodes
        .iter()
        .map(|n| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape_html(&n.hex_id()),
                escape_html(&n.display_name()),
                escape_html(n.short_name.as_deref().unwrap_or("")),
                escape_html(n.hw_model.as_deref().unwrap_or("")),
            )
        })
        .collect();

    page(
        "Nodes",
        &format!(
            "<h1>Nodes</h1>\n<p>Page {} of {} ({} per page, {} total)</p>\n\
             <table>\n<thead><tr><th>ID</th><th>Name</th><th>Short</th><th>Hardware</th></tr></thead>\n\
             <tbody>\n{rows}</tbody>\n</table>",
            pagination.page,
            pagination.total_pages(result.total_count),
            pagination.limit,
            result.total_count,
        ),
    )
}

#[derive(Serialize)]
struct NodeEntry<'a> {
    #[serde(flatten)]
    node: &'a Node,
    hex_id: String,
}

#[derive(Serialize)]
struct NodeListing<'a> {
    nodes: Vec<NodeEntry<'a>>,
    total_count: usize,
    page: u64,
    limit: u64,
    per_page: u64,
    offset: u64,
    total_pages: u64,
}

pub async fn nodes_data(State(state): State<AppState>, params: QueryParams) -> Response {
    let (query, pagination) = node_query(&state, &params);
    let result = state.nodes.query(&query, &pagination);

    let listing = NodeListing {
        nodes: result
            .nodes
            .iter()
            .map(|node| NodeEntry {
                node,
                hex_id: node.hex_id(),
            })
            .collect(),
        total_count: result.total_count,
        page: pagination.page,
        limit: pagination.limit,
        per_page: pagination.limit,
        offset: pagination.offset,
        total_pages: pagination.total_pages(result.total_count),
    };
    Json(listing).into_response()
}

/// Packet port numbers understood by the UI.
const PACKET_TYPES: [(u16, &str); 15] = [
    (1, "TEXT_MESSAGE_APP"),
    (2, "REMOTE_HARDWARE_APP"),
    (3, "POSITION_APP"),
    (4, "NODEINFO_APP"),
    (5, "ROUTING_APP"),
    (6, "ADMIN_APP"),
    (7, "TEXT_MESSAGE_COMPRESSED_APP"),
    (8, "WAYPOINT_APP"),
    (10, "DETECTION_SENSOR_APP"),
    (32, "REPLY_APP"),
    (66, "RANGE_TEST_APP"),
    (67, "TELEMETRY_APP"),
    (70, "TRACEROUTE_APP"),
    (71, "NEIGHBORINFO_APP"),
    (73, "MAP_REPORT_APP"),
];

pub async fn packet_types() -> Json<Value> {
    let types: Vec<Value> = PACKET_TYPES
        .iter()
        .map(|(portnum, name)| json!({ "portnum": portnum, "name": name }))
        .collect();
    Json(json!({ "packet_types": types }))
}

/// Liveness. Independent of data availability.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn info(State(state): State<AppState>) -> Json<Value> {
    let mut payload = json!({
        "name": "Mesh Health Web UI",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Web interface for monitoring mesh network health",
        "components": {
            "nodes": "In-memory node directory",
            "params": "Query parameter sanitation and pagination",
            "security": "Host allowlist, body limits, rate limiting, security headers",
            "http": "Routing and error shaping",
        },
    });

    // Filesystem paths only in debug-like mode.
    if state.snapshot.debug_like {
        if let Some(path) = &state.data_file {
            payload["data_file"] = Value::String(path.display().to_string());
        }
    }
    Json(payload)
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
