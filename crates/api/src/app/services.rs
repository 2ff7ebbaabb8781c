//! Service wiring: stores, queue, registry, submission, workers.

use std::sync::Arc;

use anyhow::Context;

use benchrun_engine::{ExecutionEngine, SubmissionService, WorkerConfig, WorkerPool, WorkerPoolHandle};
use benchrun_queue::InMemoryTaskQueue;
use benchrun_runs::catalog::InMemoryCatalog;
use benchrun_runs::postgres::PostgresRunStore;
use benchrun_runs::store::{InMemoryRunStore, RunStore};
use benchrun_storage::{InMemoryObjectStore, StorageConfig};
use benchrun_tools::imaging::PgmImagingGateway;
use benchrun_tools::ToolRegistry;

use super::AppConfig;

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub runs: Arc<dyn RunStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub objects: Arc<InMemoryObjectStore>,
    pub storage: StorageConfig,
    pub registry: Arc<ToolRegistry>,
    pub submission:
        SubmissionService<Arc<dyn RunStore>, Arc<InMemoryCatalog>, Arc<InMemoryTaskQueue>>,
}

/// Wire stores, queue, registry, and (optionally) the worker pool.
pub fn build_services(config: &AppConfig) -> anyhow::Result<(AppServices, Option<WorkerPoolHandle>)> {
    let runs: Arc<dyn RunStore> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresRunStore::connect_lazy(url)
                .context("failed to initialize postgres run store")?;
            store.ensure_schema_in_background();
            tracing::info!("run store: postgres");
            Arc::new(store)
        }
        None => {
            tracing::info!("run store: in-memory");
            InMemoryRunStore::arc()
        }
    };
    let catalog = InMemoryCatalog::arc();
    let queue = Arc::new(InMemoryTaskQueue::new());
    let objects = InMemoryObjectStore::arc(config.storage.clone());

    // The imaging backend is expensive to bring up in real deployments, so
    // it is constructed exactly once here and shared into the registry.
    let gateway = Arc::new(PgmImagingGateway::new());
    let registry = Arc::new(ToolRegistry::builtin(gateway));

    let submission = SubmissionService::new(
        runs.clone(),
        catalog.clone(),
        queue.clone(),
        registry.clone(),
    );

    let workers = (config.workers > 0).then(|| {
        let engine = Arc::new(ExecutionEngine::new(
            runs.clone(),
            objects.clone(),
            registry.clone(),
            config.storage.clone(),
            config.retry,
        ));
        WorkerPool::spawn(config.workers, &*queue, engine, WorkerConfig::default())
    });

    let services = AppServices {
        runs,
        catalog,
        objects,
        storage: config.storage.clone(),
        registry,
        submission,
    };
    Ok((services, workers))
}
