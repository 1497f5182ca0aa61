//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use mesh_health_web::config::AppConfig;
use mesh_health_web::nodes::{Node, NodeDirectory};
use mesh_health_web::HttpServer;
use tower::ServiceExt;

/// Three-node fixture with distinct names, ages and SNR.
pub fn sample_nodes() -> NodeDirectory {
    let node = |id: u32, name: &str, last_heard: f64, snr: f64| Node {
        node_id: id,
        long_name: Some(name.to_string()),
        short_name: Some(name.chars().take(4).collect()),
        hw_model: Some("TBEAM".to_string()),
        role: Some("CLIENT".to_string()),
        last_heard: Some(last_heard),
        snr: Some(snr),
    };
    NodeDirectory::new(vec![
        node(0x1, "Hilltop Relay", 1_000.0, 5.0),
        node(0x2, "Base Camp", 3_000.0, -2.5),
        node(0xabcd, "Rover <b>", 2_000.0, 9.0),
    ])
}

/// Directory with `n` generated nodes.
pub fn many_nodes(n: u32) -> NodeDirectory {
    NodeDirectory::new(
        (1..=n)
            .map(|id| Node {
                node_id: id,
                long_name: Some(format!("Node {id}")),
                short_name: None,
                hw_model: None,
                role: None,
                last_heard: Some(f64::from(id)),
                snr: None,
            })
            .collect(),
    )
}

pub fn app(config: AppConfig, nodes: NodeDirectory) -> Router {
    HttpServer::new(config, nodes).router()
}

pub fn debug_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.security.debug = true;
    config
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
