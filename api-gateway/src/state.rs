//! Shared application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use chain::{MetricsRegistry, Node};

use crate::config::ApiConfig;
use crate::peer_client::HttpPeerClient;

/// The concrete node type this binary hosts: the orchestrator generic
/// over the `reqwest`-backed peer client.
pub type DefaultNode = Node<HttpPeerClient>;

/// Shared state held by the API and background tasks.
///
/// `node` is behind a single `tokio::sync::Mutex` — every handler that
/// touches node state acquires it for the duration of the request, giving
/// the single-writer discipline the orchestrator itself does not enforce.
pub struct AppState {
    pub node: Mutex<DefaultNode>,
    pub metrics: Arc<MetricsRegistry>,
    pub config: ApiConfig,
    /// Guards `/run_node` so the bootstrap sequence only executes once.
    pub bootstrapped: AtomicBool,
}

impl AppState {
    /// Marks the node as bootstrapped, returning `true` if this call is the
    /// one that made the transition (i.e. `/run_node` should proceed).
    pub fn start_bootstrap(&self) -> bool {
        self.bootstrapped.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
    }
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
