//! The engine's only I/O boundary.
//!
//! Every call is asynchronous and fails with an opaque message; the engine
//! never looks inside an [`FsError`] beyond displaying it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::fs::node::FileNode;

/// Opaque failure reported by a filesystem service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FsError {
    message: String,
}

impl FsError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        FsError::new(err.to_string())
    }
}

pub type FsResult<T> = std::result::Result<T, FsError>;

/// Request/response interface to the filesystem backend.
#[async_trait]
pub trait FsService: Send + Sync {
    /// Recursive tree scan rooted at `path`.
    async fn scan_directory(&self, path: &Path) -> FsResult<FileNode>;

    /// Create a directory; the service picks a name when `name` is `None`.
    async fn create_directory(&self, parent: &Path, name: Option<&str>) -> FsResult<PathBuf>;

    /// Create a note file; the service picks a name when `name` is `None`.
    async fn create_file(&self, parent: &Path, name: Option<&str>) -> FsResult<PathBuf>;

    async fn delete_file_or_directory(&self, path: &Path) -> FsResult<()>;

    async fn rename_file_or_directory(&self, old_path: &Path, new_name: &str)
        -> FsResult<PathBuf>;

    async fn move_file_or_directory(&self, source: &Path, target_parent: &Path)
        -> FsResult<PathBuf>;

    /// Create `relative` under `root`, making intermediate directories.
    ///
    /// A trailing separator means only directories are created.
    async fn create_nested_path(&self, root: &Path, relative: &str) -> FsResult<PathBuf>;
}
