//! Analysis run records: the durable job entity, its status protocol,
//! and the stores that persist it.

pub mod catalog;
pub mod postgres;
pub mod run;
pub mod store;

pub use catalog::{CatalogError, CatalogStore, Dataset, InMemoryCatalog, Project};
pub use postgres::PostgresRunStore;
pub use run::{AnalysisRun, RunStatus};
pub use store::{InMemoryRunStore, RunStats, RunStore, RunStoreError};
