//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/queue/registry wiring and the worker pool
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent JSON error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use benchrun_engine::{RetryPolicy, WorkerPoolHandle};
use benchrun_storage::StorageConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen: String,
    /// Worker threads; 0 runs the API with no execution (useful in tests).
    pub workers: usize,
    /// Postgres connection URL; runs live in memory when unset.
    pub database_url: Option<String>,
    pub storage: StorageConfig,
    pub retry: RetryPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            workers: 2,
            database_url: None,
            storage: StorageConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen: std::env::var("BENCHRUN_LISTEN").unwrap_or(defaults.listen),
            workers: std::env::var("BENCHRUN_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.workers),
            database_url: std::env::var("BENCHRUN_DATABASE_URL").ok(),
            storage: StorageConfig::from_env(),
            retry: defaults.retry,
        }
    }
}

/// Build the full router plus the worker pool behind it. The caller owns the
/// pool handle; dropping it detaches the workers, shutting it down stops
/// them gracefully.
pub fn build_app(config: AppConfig) -> anyhow::Result<(Router, Option<WorkerPoolHandle>)> {
    let (services, workers) = services::build_services(&config)?;

    let router = Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", routes::router())
        .layer(ServiceBuilder::new().layer(Extension(Arc::new(services))));

    Ok((router, workers))
}
