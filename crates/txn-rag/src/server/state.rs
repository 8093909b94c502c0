//! Application state for the HTTP server

use parking_lot::RwLock;
use std::sync::Arc;

use super::admission::AdmissionGate;
use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::service::RagService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Set once ingestion has completed
    service: RwLock<Option<Arc<RagService>>>,
    /// Concurrency limit for queries
    admission: AdmissionGate,
}

impl AppState {
    /// Create state with no service yet; queries fail as not ready
    pub fn new(config: RagConfig) -> Self {
        let admission = AdmissionGate::new(&config.admission);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                service: RwLock::new(None),
                admission,
            }),
        }
    }

    /// Create state that is ready immediately
    pub fn with_service(config: RagConfig, service: Arc<RagService>) -> Self {
        let state = Self::new(config);
        state.set_service(service);
        state
    }

    /// Publish the ingested service and mark the state ready
    pub fn set_service(&self, service: Arc<RagService>) {
        tracing::info!("Service ready: {:?}", service);
        *self.inner.service.write() = Some(service);
    }

    /// The service, or `NotReady` while ingestion is running
    pub fn service(&self) -> Result<Arc<RagService>> {
        self.inner.service.read().clone().ok_or(Error::NotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.service.read().is_some()
    }

    pub fn admission(&self) -> &AdmissionGate {
        &self.inner.admission
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }
}
