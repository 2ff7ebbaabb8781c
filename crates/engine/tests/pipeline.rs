//! End-to-end pipeline: submit through the service, execute on a worker
//! pool, observe the terminal record.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use benchrun_core::UserId;
use benchrun_engine::{
    ExecutionEngine, RetryPolicy, SubmissionService, WorkerConfig, WorkerPool,
};
use benchrun_queue::InMemoryTaskQueue;
use benchrun_runs::catalog::{CatalogStore, Dataset, InMemoryCatalog, Project};
use benchrun_runs::run::{AnalysisRun, RunStatus};
use benchrun_runs::store::{InMemoryRunStore, RunStore};
use benchrun_storage::keys::dataset_key;
use benchrun_storage::{InMemoryObjectStore, ObjectStore, StorageConfig};
use benchrun_tools::imaging::PgmImagingGateway;
use benchrun_tools::registry::{HEATMAP_TOOL_ID, VOLCANO_TOOL_ID};
use benchrun_tools::ToolRegistry;

struct Harness {
    runs: Arc<InMemoryRunStore>,
    service: SubmissionService<Arc<InMemoryRunStore>, Arc<InMemoryCatalog>, Arc<InMemoryTaskQueue>>,
    queue: Arc<InMemoryTaskQueue>,
    engine: Arc<ExecutionEngine<Arc<InMemoryRunStore>, Arc<InMemoryObjectStore>>>,
    project: Project,
    dataset: Dataset,
}

fn harness(dataset_body: &[u8], file_name: &str) -> Harness {
    let runs = InMemoryRunStore::arc();
    let catalog = InMemoryCatalog::arc();
    let queue = Arc::new(InMemoryTaskQueue::new());
    let config = StorageConfig::default();
    let objects = InMemoryObjectStore::arc(config.clone());
    let registry = Arc::new(ToolRegistry::builtin(Arc::new(PgmImagingGateway::new())));

    let owner = UserId::new();
    let project = Project::new("pipeline study", owner);
    catalog.insert_project(project.clone()).unwrap();

    let mut dataset = Dataset::new(project.id, "counts", file_name, "", owner);
    dataset.object_key = dataset_key(project.id, dataset.id, file_name);
    objects
        .upload(&config.datasets_bucket, &dataset.object_key, dataset_body)
        .unwrap();
    catalog.insert_dataset(dataset.clone()).unwrap();

    let service = SubmissionService::new(runs.clone(), catalog, queue.clone(), registry.clone());
    let engine = Arc::new(ExecutionEngine::new(
        runs.clone(),
        objects,
        registry,
        config,
        RetryPolicy::fixed(1, Duration::ZERO),
    ));

    Harness {
        runs,
        service,
        queue,
        engine,
        project,
        dataset,
    }
}

fn counts_csv(n_genes: usize, n_samples: usize) -> Vec<u8> {
    let mut body = String::from("Gene");
    for s in 0..n_samples {
        body.push_str(&format!(",S{s}"));
    }
    body.push('\n');
    for g in 0..n_genes {
        body.push_str(&format!("GENE{g}"));
        for s in 0..n_samples {
            let noise = ((g * 13 + (s + 1) * 7) % 19) as f64;
            body.push_str(&format!(",{}", g as f64 * (s + 1) as f64 + noise));
        }
        body.push('\n');
    }
    body.into_bytes()
}

fn wait_for_terminal(runs: &Arc<InMemoryRunStore>, run: &AnalysisRun) -> AnalysisRun {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let current = runs.get(run.id).unwrap().unwrap();
        if current.status.is_terminal() {
            return current;
        }
        assert!(Instant::now() < deadline, "run never reached a terminal state");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn heatmap_submission_runs_to_completion_on_the_pool() {
    let harness = harness(&counts_csv(80, 4), "counts.csv");
    let pool = WorkerPool::spawn(
        2,
        &*harness.queue,
        harness.engine.clone(),
        WorkerConfig::default(),
    );

    let run = harness
        .service
        .submit(benchrun_engine::SubmitRequest {
            tool_id: HEATMAP_TOOL_ID.to_string(),
            project_id: harness.project.id,
            dataset_id: harness.dataset.id,
            name: Some("pipeline heatmap".to_string()),
            parameters: json!({"top_n_genes": 50}),
            created_by: UserId::new(),
        })
        .unwrap();
    assert_eq!(run.status, RunStatus::Pending);

    let finished = wait_for_terminal(&harness.runs, &run);
    pool.shutdown();

    assert_eq!(finished.status, RunStatus::Completed);
    let artifacts = finished.output_artifacts.unwrap();
    assert_eq!(artifacts["summary_stats"]["genes_plotted"], 50);
    assert!(
        artifacts["results_json_location"]
            .as_str()
            .unwrap()
            .contains(&format!("analysis_runs/{}", finished.id))
    );
    assert!(finished.run_log.contains("worker claimed task"));
}

#[test]
fn volcano_without_required_columns_fails_without_retry() {
    // Plain counts table, no logFC/PValue columns.
    let harness = harness(&counts_csv(10, 3), "counts.csv");
    let pool = WorkerPool::spawn(
        1,
        &*harness.queue,
        harness.engine.clone(),
        WorkerConfig::default(),
    );

    let run = harness
        .service
        .submit(benchrun_engine::SubmitRequest {
            tool_id: VOLCANO_TOOL_ID.to_string(),
            project_id: harness.project.id,
            dataset_id: harness.dataset.id,
            name: None,
            parameters: json!({}),
            created_by: UserId::new(),
        })
        .unwrap();

    let finished = wait_for_terminal(&harness.runs, &run);
    pool.shutdown();

    assert_eq!(finished.status, RunStatus::Failed);
    assert!(finished.error_message.unwrap().contains("missing expected columns"));
    assert_eq!(finished.output_artifacts.unwrap()["stage"], "process");
}

#[test]
fn pool_stats_track_outcomes() {
    let harness = harness(&counts_csv(60, 4), "counts.csv");
    let pool = WorkerPool::spawn(
        2,
        &*harness.queue,
        harness.engine.clone(),
        WorkerConfig::default(),
    );

    let run = harness
        .service
        .submit(benchrun_engine::SubmitRequest {
            tool_id: HEATMAP_TOOL_ID.to_string(),
            project_id: harness.project.id,
            dataset_id: harness.dataset.id,
            name: None,
            parameters: json!({}),
            created_by: UserId::new(),
        })
        .unwrap();
    wait_for_terminal(&harness.runs, &run);

    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.stats().tasks_processed == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    let stats = pool.stats();
    pool.shutdown();

    assert_eq!(stats.tasks_processed, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);
}
