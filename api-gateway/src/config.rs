//! API gateway configuration.
//!
//! Node identity and networking are read from environment variables so a
//! fleet of processes on one host (or one per container) can be told
//! apart; everything else falls back to the documented defaults.

use std::net::SocketAddr;

/// Configuration for the API gateway HTTP server and the node it hosts.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
    /// This node's externally-reachable id, ip, and port (used to build
    /// its own `url` and to tell peers how to reach it).
    pub node_id: String,
    pub node_ip: String,
    pub node_port: u16,
    /// URL of a bootstrap node to join through on startup.
    pub bootstrap_node_url: String,
    /// Address to bind the Prometheus `/metrics` exporter to.
    pub metrics_listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let node_port: u16 = std::env::var("NODE_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);
        let node_ip = std::env::var("NODE_IP").unwrap_or_else(|_| "127.0.0.1".to_string());
        let node_id = std::env::var("NODE_ID").unwrap_or_else(|_| format!("node-{node_port}"));
        let bootstrap_node_url =
            std::env::var("BOOTSTRAP_NODE_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());

        // Bind to all interfaces so the container port mapping is reachable
        // from the host when running under docker-compose.
        let listen_addr: SocketAddr = format!("0.0.0.0:{node_port}")
            .parse()
            .expect("NODE_PORT should form a valid listen address");

        let metrics_listen_addr: SocketAddr = std::env::var("METRICS_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| "127.0.0.1:9898".parse().expect("hard-coded metrics address should parse"));

        Self { listen_addr, node_id, node_ip, node_port, bootstrap_node_url, metrics_listen_addr }
    }
}
