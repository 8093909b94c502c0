//! HTTP server for the transaction RAG service

pub mod admission;
pub mod routes;
pub mod state;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinError;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::service::RagService;
use state::AppState;

pub use admission::{AdmissionGate, AdmissionPermit};

/// RAG HTTP Server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a server; the service is built when [`RagServer::start`] runs
    pub fn new(config: RagConfig) -> Self {
        let state = AppState::new(config.clone());
        Self { config, state }
    }

    /// Create a server around an already ingested service
    pub fn with_service(config: RagConfig, service: Arc<RagService>) -> Self {
        let state = AppState::with_service(config.clone(), service);
        Self { config, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .route("/query", post(routes::query::query_rag))
            .nest("/api", routes::api_routes())
            .with_state(self.state.clone())
            .layer(DefaultBodyLimit::max(self.config.server.max_body_size))
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.config.server.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Bind, ingest in the background and serve until ctrl-c.
    /// Returns an error if ingestion fails.
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!("Starting transaction RAG server on http://{}", addr);

        let ingestion = (!self.state.is_ready()).then(|| {
            let state = self.state.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                tracing::info!("Ingesting {}", config.data.path.display());
                let service = RagService::from_config(&config).await?;
                state.set_service(Arc::new(service));
                Ok::<(), Error>(())
            })
        });

        let (error_tx, mut error_rx) = oneshot::channel::<Error>();
        let shutdown = async move {
            let failed = async move {
                match ingestion {
                    Some(handle) => match ingestion_failure(handle.await) {
                        Some(e) => e,
                        None => std::future::pending().await,
                    },
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                }
                e = failed => {
                    tracing::error!("Ingestion failed: {}", e);
                    let _ = error_tx.send(e);
                }
            }
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        match error_rx.try_recv() {
            Ok(e) => Err(e),
            Err(_) => Ok(()),
        }
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// A background ingestion that returned an error or panicked
fn ingestion_failure(joined: std::result::Result<Result<()>, JoinError>) -> Option<Error> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(e) => Some(Error::internal(format!("Ingestion task failed: {}", e))),
    }
}
