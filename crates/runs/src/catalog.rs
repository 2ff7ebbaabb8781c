//! Project/dataset catalog: the reference data submission validates against.
//!
//! Only the lookups the submission path needs live here. Full CRUD for
//! projects, datasets, and users is ordinary persistence handled elsewhere.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use benchrun_core::{DatasetId, ProjectId, UserId};

/// A project: the ownership scope for datasets and runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, created_by: UserId) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// An uploaded dataset, resolved to its object-store key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub project_id: ProjectId,
    pub name: String,
    /// Original filename as uploaded; processors use its extension.
    pub file_name: String,
    /// Key of the stored bytes in the datasets bucket.
    pub object_key: String,
    pub uploaded_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Dataset {
    pub fn new(
        project_id: ProjectId,
        name: impl Into<String>,
        file_name: impl Into<String>,
        object_key: impl Into<String>,
        uploaded_by: UserId,
    ) -> Self {
        Self {
            id: DatasetId::new(),
            project_id,
            name: name.into(),
            file_name: file_name.into(),
            object_key: object_key.into(),
            uploaded_by,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog storage error: {0}")]
    Storage(String),
}

/// Reference-data lookups for submission validation.
pub trait CatalogStore: Send + Sync {
    fn insert_project(&self, project: Project) -> Result<(), CatalogError>;
    fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>, CatalogError>;
    fn insert_dataset(&self, dataset: Dataset) -> Result<(), CatalogError>;
    fn get_dataset(&self, dataset_id: DatasetId) -> Result<Option<Dataset>, CatalogError>;
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    projects: RwLock<HashMap<ProjectId, Project>>,
    datasets: RwLock<HashMap<DatasetId, Dataset>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl CatalogStore for InMemoryCatalog {
    fn insert_project(&self, project: Project) -> Result<(), CatalogError> {
        self.projects.write().unwrap().insert(project.id, project);
        Ok(())
    }

    fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>, CatalogError> {
        Ok(self.projects.read().unwrap().get(&project_id).cloned())
    }

    fn insert_dataset(&self, dataset: Dataset) -> Result<(), CatalogError> {
        self.datasets.write().unwrap().insert(dataset.id, dataset);
        Ok(())
    }

    fn get_dataset(&self, dataset_id: DatasetId) -> Result<Option<Dataset>, CatalogError> {
        Ok(self.datasets.read().unwrap().get(&dataset_id).cloned())
    }
}

impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    fn insert_project(&self, project: Project) -> Result<(), CatalogError> {
        (**self).insert_project(project)
    }

    fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>, CatalogError> {
        (**self).get_project(project_id)
    }

    fn insert_dataset(&self, dataset: Dataset) -> Result<(), CatalogError> {
        (**self).insert_dataset(dataset)
    }

    fn get_dataset(&self, dataset_id: DatasetId) -> Result<Option<Dataset>, CatalogError> {
        (**self).get_dataset(dataset_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_and_dataset_lookups() {
        let catalog = InMemoryCatalog::new();
        let user = UserId::new();

        let project = Project::new("rnaseq-2026", user);
        let project_id = project.id;
        catalog.insert_project(project).unwrap();

        let dataset = Dataset::new(
            project_id,
            "expression matrix",
            "expr.csv",
            "projects/x/datasets/y/expr.csv",
            user,
        );
        let dataset_id = dataset.id;
        catalog.insert_dataset(dataset).unwrap();

        assert!(catalog.get_project(project_id).unwrap().is_some());
        let loaded = catalog.get_dataset(dataset_id).unwrap().unwrap();
        assert_eq!(loaded.project_id, project_id);
        assert_eq!(loaded.file_name, "expr.csv");

        assert!(catalog.get_project(ProjectId::new()).unwrap().is_none());
        assert!(catalog.get_dataset(DatasetId::new()).unwrap().is_none());
    }
}
