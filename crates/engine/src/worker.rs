//! Worker pool: threads that drain the task queue into the engine.

use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use benchrun_queue::TaskQueue;
use benchrun_runs::store::RunStore;
use benchrun_storage::ObjectStore;

use crate::execute::{ExecutionEngine, TaskOutcome};

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Thread name prefix, for logging.
    pub name: String,
    /// How long a worker blocks on the queue before re-checking shutdown.
    pub tick: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "analysis-worker".to_string(),
            tick: Duration::from_millis(100),
        }
    }
}

/// Pool-wide counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WorkerStats {
    pub tasks_processed: u64,
    pub completed: u64,
    pub failed: u64,
    pub duplicates: u64,
    pub dropped: u64,
}

/// Handle to a running pool.
#[derive(Debug)]
pub struct WorkerPoolHandle {
    shutdown: Vec<mpsc::Sender<()>>,
    joins: Vec<thread::JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerPoolHandle {
    /// Request graceful shutdown and wait for every worker to finish its
    /// current task.
    pub fn shutdown(mut self) {
        for tx in &self.shutdown {
            let _ = tx.send(());
        }
        for join in self.joins.drain(..) {
            let _ = join.join();
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().unwrap().clone()
    }
}

pub struct WorkerPool;

impl WorkerPool {
    /// Spawn `count` worker threads, each with its own queue subscription.
    pub fn spawn<S, O, Q>(
        count: usize,
        queue: &Q,
        engine: Arc<ExecutionEngine<S, O>>,
        config: WorkerConfig,
    ) -> WorkerPoolHandle
    where
        S: RunStore + 'static,
        O: ObjectStore + 'static,
        Q: TaskQueue,
    {
        let stats = Arc::new(Mutex::new(WorkerStats::default()));
        let mut shutdown = Vec::with_capacity(count);
        let mut joins = Vec::with_capacity(count);

        for i in 0..count {
            let (tx, rx) = mpsc::channel::<()>();
            shutdown.push(tx);

            let name = format!("{}-{i}", config.name);
            let subscription = queue.subscribe();
            let engine = engine.clone();
            let stats = stats.clone();
            let tick = config.tick;

            let join = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    info!(worker = %name, "worker started");
                    loop {
                        if rx.try_recv().is_ok() {
                            break;
                        }
                        match subscription.recv_timeout(tick) {
                            Ok(message) => {
                                debug!(worker = %name, run_id = %message.run_id, "task received");
                                let outcome = engine.handle_task(&message);
                                let mut s = stats.lock().unwrap();
                                s.tasks_processed += 1;
                                match outcome {
                                    TaskOutcome::Completed => s.completed += 1,
                                    TaskOutcome::Failed => s.failed += 1,
                                    TaskOutcome::Duplicate => s.duplicates += 1,
                                    TaskOutcome::Dropped => s.dropped += 1,
                                }
                            }
                            Err(mpsc::RecvTimeoutError::Timeout) => continue,
                            Err(mpsc::RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    info!(worker = %name, "worker stopped");
                })
                .expect("failed to spawn worker thread");
            joins.push(join);
        }

        WorkerPoolHandle {
            shutdown,
            joins,
            stats,
        }
    }
}
