//! Application state for API handlers

use std::sync::Arc;
use std::time::Instant;
use xform_core::Dispatcher;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Evaluation dispatcher, built once and shared read-only
    pub dispatcher: Arc<Dispatcher>,

    /// Server version
    pub version: &'static str,

    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    /// Create application state around a dispatcher
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            version: env!("CARGO_PKG_VERSION"),
            started_at: Instant::now(),
        }
    }

    /// Human-readable uptime
    pub fn uptime(&self) -> String {
        let secs = self.started_at.elapsed().as_secs();
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
