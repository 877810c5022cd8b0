//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed node metrics, and an async HTTP
//! exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{self, Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

/// Node-level Prometheus metrics: consensus round outcomes and chain
/// growth, updated from `chain::node`.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Latency of a full consensus round (key exchange through score
    /// evaluation), in seconds.
    pub round_seconds: Histogram,
    /// Total blocks committed to the local chain (mined or received).
    pub blocks_committed: IntCounter,
    /// Total consensus rounds that had to restart because the score fell
    /// outside the validation band.
    pub rounds_retried: IntCounter,
    /// Total inbound prediction/score messages rejected as a peer penalty.
    pub messages_penalized: IntCounter,
}

impl NodeMetrics {
    /// Registers node metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let round_seconds = Histogram::with_opts(
            HistogramOpts::new("node_consensus_round_seconds", "Time to complete one consensus round in seconds")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(round_seconds.clone()))?;

        let blocks_committed = IntCounter::with_opts(Opts::new(
            "node_blocks_committed_total",
            "Total number of block pairs committed to the local chain",
        ))?;
        registry.register(Box::new(blocks_committed.clone()))?;

        let rounds_retried = IntCounter::with_opts(Opts::new(
            "node_rounds_retried_total",
            "Total number of consensus rounds restarted due to an out-of-band score",
        ))?;
        registry.register(Box::new(rounds_retried.clone()))?;

        let messages_penalized = IntCounter::with_opts(Opts::new(
            "node_messages_penalized_total",
            "Total number of inbound prediction/score messages rejected as a peer penalty",
        ))?;
        registry.register(Box::new(messages_penalized.clone()))?;

        Ok(Self {
            round_seconds,
            blocks_committed,
            rounds_retried,
            messages_penalized,
        })
    }
}

/// Wrapper around a Prometheus registry and the node metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub node: NodeMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the node metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let node = NodeMetrics::register(&registry)?;
        Ok(Self { registry, node })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn node_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = NodeMetrics::register(&registry).expect("register metrics");

        metrics.round_seconds.observe(0.123);
        metrics.blocks_committed.inc();
        metrics.rounds_retried.inc();
        metrics.messages_penalized.inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.node.round_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("node_consensus_round_seconds"));
    }
}
