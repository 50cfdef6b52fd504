pub mod pipeline;
pub mod sql;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use pipeline::PipelineStage;

/// Entity collections visible to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Projects,
    Tasks,
}

impl Collection {
    pub fn table(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Projects => "projects",
            Collection::Tasks => "tasks",
        }
    }
}

/// Logical entity fields addressable in filters and pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Username,
    Email,
    Role,
    Name,
    Members,
    Title,
    Status,
    DueDate,
    Project,
    AssignedTo,
}

/// Filter applied by `find_many` / `count_matching`.
#[derive(Debug, Clone)]
pub enum ListFilter {
    All,
    /// Case-insensitive substring match on a text field; `%`, `_` and `\`
    /// in the needle are matched literally.
    Contains { field: Field, needle: String },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable")]
    Unavailable(#[from] sea_orm::DbErr),
    #[error("pipeline execution exceeded {0:?}")]
    Timeout(Duration),
    #[error("unsupported pipeline: {0}")]
    UnsupportedPipeline(String),
    #[error("malformed stored record: {0}")]
    Decode(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Read seam between the core and storage. "Nothing matched" is a valid
/// empty result, never an error; `Unavailable` signals a transient
/// data-access failure the caller may retry.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_by_id(&self, collection: Collection, id: Uuid) -> StorageResult<Option<Value>>;

    /// Returns the requested window plus the total matching count. Order is
    /// deterministic: display field, then id.
    async fn find_many(
        &self,
        collection: Collection,
        filter: &ListFilter,
        skip: u64,
        limit: u64,
    ) -> StorageResult<(Vec<Value>, u64)>;

    async fn count_matching(&self, collection: Collection, filter: &ListFilter)
        -> StorageResult<u64>;

    async fn exists(&self, collection: Collection, id: Uuid) -> StorageResult<bool>;

    /// Compiles the staged pipeline to a single statement and executes it
    /// server-side; rows come back as JSON objects keyed by the projected
    /// column names. Full collections are never materialized client-side.
    async fn run_pipeline(
        &self,
        collection: Collection,
        stages: &[PipelineStage],
    ) -> StorageResult<Vec<Value>>;
}
