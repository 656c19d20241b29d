//! Container gateway: a small HTTP surface over the local Docker daemon.

pub mod config;
pub mod error;
pub mod handlers;

pub use config::GatewayConfig;
pub use error::AppError;

use axum::{
    routing::{get, post},
    Router,
};
use dockpanel_runtime::ContainerRuntime;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    /// `None` when the daemon could not be reached at startup.
    runtime: Option<Arc<dyn ContainerRuntime>>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(runtime: Option<Arc<dyn ContainerRuntime>>, config: GatewayConfig) -> Self {
        Self {
            runtime,
            config: Arc::new(config),
        }
    }

    pub fn runtime(&self) -> Result<&Arc<dyn ContainerRuntime>, AppError> {
        self.runtime.as_ref().ok_or(AppError::NotConnected)
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Landing page
        .route("/", get(handlers::index))
        .route("/static/script.js", get(handlers::script))
        // Container endpoints
        .route(
            "/api/containers",
            get(handlers::list_containers).post(handlers::create_container),
        )
        .route("/api/containers/:id/action", post(handlers::container_action))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
