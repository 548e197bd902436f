//! Application state for the API server.

use std::sync::Arc;
use std::time::Instant;

use twin_orchestrator::{TwinConfig, TwinOrchestrator};

/// Shared application state for the API server.
pub struct AppState {
    pub orchestrator: Arc<TwinOrchestrator>,

    /// Server start time (for health checks)
    pub start_time: Instant,
}

impl AppState {
    /// Wire the orchestrator from configuration.
    pub fn new(config: &TwinConfig) -> twin_common::Result<Self> {
        Ok(Self::from_orchestrator(TwinOrchestrator::from_config(config)?))
    }

    /// Serve an already-built orchestrator.
    pub fn from_orchestrator(orchestrator: TwinOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
