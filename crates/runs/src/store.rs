//! Run persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use benchrun_core::{ProjectId, RunId, UserId};

use crate::run::{AnalysisRun, RunStatus};

/// Run store abstraction.
///
/// Row-scoped reads and writes only: the engine loads a record by id,
/// mutates it through the record's own methods, and writes it back. No
/// long-held locks, no cross-record transactions.
pub trait RunStore: Send + Sync {
    /// Persist a newly created run.
    fn create(&self, run: AnalysisRun) -> Result<RunId, RunStoreError>;

    /// Load a run by id.
    fn get(&self, run_id: RunId) -> Result<Option<AnalysisRun>, RunStoreError>;

    /// Write back a mutated run.
    fn update(&self, run: &AnalysisRun) -> Result<(), RunStoreError>;

    /// Overwrite only the cosmetic fields. The execution-owned fields
    /// (status, timestamps, artifacts, log) are untouched, so this cannot
    /// clobber a concurrent engine transition.
    fn update_cosmetic(
        &self,
        run_id: RunId,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<AnalysisRun, RunStoreError>;

    /// Cancel a run no worker has claimed yet. The check-and-transition is
    /// a single store operation for the same reason.
    fn cancel(&self, run_id: RunId) -> Result<AnalysisRun, RunStoreError>;

    /// Runs belonging to a project, most recently updated first.
    fn list_by_project(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<AnalysisRun>, RunStoreError>;

    /// Runs created by a user, most recently updated first.
    fn list_by_user(&self, user_id: UserId, limit: usize)
    -> Result<Vec<AnalysisRun>, RunStoreError>;

    /// Per-status counts.
    fn stats(&self) -> Result<RunStats, RunStoreError>;
}

/// Run store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RunStoreError {
    #[error("run not found: {0}")]
    NotFound(RunId),
    #[error("run already exists: {0}")]
    AlreadyExists(RunId),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Per-status run counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl RunStats {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed + self.cancelled
    }

    pub fn count(&mut self, status: RunStatus) {
        match status {
            RunStatus::Pending => self.pending += 1,
            RunStatus::Running => self.running += 1,
            RunStatus::Completed => self.completed += 1,
            RunStatus::Failed => self.failed += 1,
            RunStatus::Cancelled => self.cancelled += 1,
        }
    }
}

/// In-memory run store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<RunId, AnalysisRun>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl RunStore for InMemoryRunStore {
    fn create(&self, run: AnalysisRun) -> Result<RunId, RunStoreError> {
        let mut runs = self.runs.write().unwrap();
        if runs.contains_key(&run.id) {
            return Err(RunStoreError::AlreadyExists(run.id));
        }
        let id = run.id;
        runs.insert(id, run);
        Ok(id)
    }

    fn get(&self, run_id: RunId) -> Result<Option<AnalysisRun>, RunStoreError> {
        Ok(self.runs.read().unwrap().get(&run_id).cloned())
    }

    fn update(&self, run: &AnalysisRun) -> Result<(), RunStoreError> {
        let mut runs = self.runs.write().unwrap();
        if !runs.contains_key(&run.id) {
            return Err(RunStoreError::NotFound(run.id));
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    fn update_cosmetic(
        &self,
        run_id: RunId,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<AnalysisRun, RunStoreError> {
        let mut runs = self.runs.write().unwrap();
        let run = runs
            .get_mut(&run_id)
            .ok_or(RunStoreError::NotFound(run_id))?;
        run.update_cosmetic(name, description);
        Ok(run.clone())
    }

    fn cancel(&self, run_id: RunId) -> Result<AnalysisRun, RunStoreError> {
        let mut runs = self.runs.write().unwrap();
        let run = runs
            .get_mut(&run_id)
            .ok_or(RunStoreError::NotFound(run_id))?;
        run.cancel()
            .map_err(|e| RunStoreError::Conflict(e.to_string()))?;
        Ok(run.clone())
    }

    fn list_by_project(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<AnalysisRun>, RunStoreError> {
        let runs = self.runs.read().unwrap();
        let mut result: Vec<_> = runs
            .values()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);
        Ok(result)
    }

    fn list_by_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<AnalysisRun>, RunStoreError> {
        let runs = self.runs.read().unwrap();
        let mut result: Vec<_> = runs
            .values()
            .filter(|r| r.created_by == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);
        Ok(result)
    }

    fn stats(&self) -> Result<RunStats, RunStoreError> {
        let runs = self.runs.read().unwrap();
        let mut stats = RunStats::default();
        for run in runs.values() {
            stats.count(run.status);
        }
        Ok(stats)
    }
}

impl<S> RunStore for Arc<S>
where
    S: RunStore + ?Sized,
{
    fn create(&self, run: AnalysisRun) -> Result<RunId, RunStoreError> {
        (**self).create(run)
    }

    fn get(&self, run_id: RunId) -> Result<Option<AnalysisRun>, RunStoreError> {
        (**self).get(run_id)
    }

    fn update(&self, run: &AnalysisRun) -> Result<(), RunStoreError> {
        (**self).update(run)
    }

    fn update_cosmetic(
        &self,
        run_id: RunId,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<AnalysisRun, RunStoreError> {
        (**self).update_cosmetic(run_id, name, description)
    }

    fn cancel(&self, run_id: RunId) -> Result<AnalysisRun, RunStoreError> {
        (**self).cancel(run_id)
    }

    fn list_by_project(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<AnalysisRun>, RunStoreError> {
        (**self).list_by_project(project_id, limit)
    }

    fn list_by_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<AnalysisRun>, RunStoreError> {
        (**self).list_by_user(user_id, limit)
    }

    fn stats(&self) -> Result<RunStats, RunStoreError> {
        (**self).stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_run(project_id: ProjectId, user_id: UserId) -> AnalysisRun {
        AnalysisRun::new(
            "volcano",
            None,
            json!({}),
            "projects/p/datasets/d/de.csv",
            project_id,
            user_id,
        )
    }

    #[test]
    fn create_get_update_round_trip() {
        let store = InMemoryRunStore::new();
        let run = sample_run(ProjectId::new(), UserId::new());
        let id = store.create(run).unwrap();

        let mut loaded = store.get(id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Pending);

        loaded.begin_running().unwrap();
        store.update(&loaded).unwrap();

        let reloaded = store.get(id).unwrap().unwrap();
        assert_eq!(reloaded.status, RunStatus::Running);
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let store = InMemoryRunStore::new();
        let run = sample_run(ProjectId::new(), UserId::new());
        store.create(run.clone()).unwrap();
        assert!(matches!(
            store.create(run),
            Err(RunStoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn update_of_unknown_run_is_not_found() {
        let store = InMemoryRunStore::new();
        let run = sample_run(ProjectId::new(), UserId::new());
        assert!(matches!(
            store.update(&run),
            Err(RunStoreError::NotFound(_))
        ));
    }

    #[test]
    fn list_by_project_filters_and_limits() {
        let store = InMemoryRunStore::new();
        let project = ProjectId::new();
        let other = ProjectId::new();
        let user = UserId::new();

        for _ in 0..3 {
            store.create(sample_run(project, user)).unwrap();
        }
        store.create(sample_run(other, user)).unwrap();

        assert_eq!(store.list_by_project(project, 10).unwrap().len(), 3);
        assert_eq!(store.list_by_project(project, 2).unwrap().len(), 2);
        assert_eq!(store.list_by_user(user, 10).unwrap().len(), 4);
    }

    #[test]
    fn cosmetic_update_does_not_clobber_execution_fields() {
        let store = InMemoryRunStore::new();
        let id = store
            .create(sample_run(ProjectId::new(), UserId::new()))
            .unwrap();

        // A worker transitions the run while a user holds a stale copy.
        let mut claimed = store.get(id).unwrap().unwrap();
        claimed.begin_running().unwrap();
        store.update(&claimed).unwrap();

        let updated = store
            .update_cosmetic(id, Some("renamed".to_string()), None)
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("renamed"));
        assert_eq!(updated.status, RunStatus::Running);
        assert_eq!(updated.started_at, claimed.started_at);

        let reloaded = store.get(id).unwrap().unwrap();
        assert_eq!(reloaded.status, RunStatus::Running);
    }

    #[test]
    fn cancel_is_atomic_and_pending_only() {
        let store = InMemoryRunStore::new();
        let id = store
            .create(sample_run(ProjectId::new(), UserId::new()))
            .unwrap();

        let cancelled = store.cancel(id).unwrap();
        assert_eq!(cancelled.status, RunStatus::Cancelled);
        assert!(matches!(store.cancel(id), Err(RunStoreError::Conflict(_))));

        let id = store
            .create(sample_run(ProjectId::new(), UserId::new()))
            .unwrap();
        let mut claimed = store.get(id).unwrap().unwrap();
        claimed.begin_running().unwrap();
        store.update(&claimed).unwrap();
        assert!(matches!(store.cancel(id), Err(RunStoreError::Conflict(_))));
        assert!(matches!(
            store.cancel(RunId::new()),
            Err(RunStoreError::NotFound(_))
        ));
    }

    #[test]
    fn stats_count_statuses() {
        let store = InMemoryRunStore::new();
        let project = ProjectId::new();
        let user = UserId::new();

        let pending = sample_run(project, user);
        store.create(pending).unwrap();

        let mut failed = sample_run(project, user);
        failed.fail("queue unavailable", None).unwrap();
        store.create(failed).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
    }
}
