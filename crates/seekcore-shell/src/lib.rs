mod directory;
mod search;

use std::sync::Arc;

use async_trait::async_trait;
use seekcore_index::{DirectoryListing, Disk, Entry};
use seekcore_query::SearchRequest;

pub use directory::LocalDirectoryService;
pub use search::LocalSearchService;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("cannot read {path}: {reason}")]
    DirectoryUnreadable { path: String, reason: String },
    #[error("cannot modify {path}: {reason}")]
    MutationFailed { path: String, reason: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
    #[error("backend failure: {0}")]
    Backend(String),
}

impl ServiceError {
    pub(crate) fn unreadable(path: &str, reason: impl ToString) -> Self {
        Self::DirectoryUnreadable {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn mutation(path: &str, reason: impl ToString) -> Self {
        Self::MutationFailed {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<Disk>, ServiceError>;

    /// Lists `path`. The returned listing carries the backend-normalized path,
    /// which may differ from the one requested.
    async fn list_directory(
        &self,
        path: &str,
        use_cache: bool,
    ) -> Result<DirectoryListing, ServiceError>;

    /// Creates an empty file or directory named `name` inside `parent`.
    async fn create_entry(
        &self,
        parent: &str,
        name: &str,
        is_dir: bool,
    ) -> Result<Entry, ServiceError>;

    /// Renames `path` within its parent directory. Never replaces an
    /// existing entry.
    async fn rename_entry(&self, path: &str, new_name: &str) -> Result<Entry, ServiceError>;

    /// Removes a file or an empty directory.
    async fn delete_entry(&self, path: &str) -> Result<(), ServiceError>;
}

/// Search backends publish their results on the stream channel; the calls
/// below only report whether the stream could be opened.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn start_stream(&self, request: SearchRequest) -> Result<(), ServiceError>;

    async fn start_llm_stream(&self, request: SearchRequest) -> Result<(), ServiceError>;
}

pub type SharedDirectoryService = Arc<dyn DirectoryService>;
pub type SharedSearchService = Arc<dyn SearchService>;
