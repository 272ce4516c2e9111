use std::path::PathBuf;

use thiserror::Error;

use crate::fs::service::FsError;
use crate::fs::validate::ValidationError;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// A move that would put a node inside itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// Source and target are the same node.
    #[error("cannot move an item into itself")]
    SelfDrop,
    /// Target lies inside the source directory.
    #[error("cannot move a folder into one of its own subfolders")]
    IntoDescendant,
}

/// Workspace engine error types.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Name or path rejected before any I/O.
    #[error("Invalid name: {0}")]
    Validation(#[from] ValidationError),

    /// The filesystem service failed a scan or mutation.
    #[error("Operation failed: {0}")]
    Operation(String),

    /// Self-drop or drop into a descendant.
    #[error("{0}")]
    Structural(#[from] StructuralError),

    /// The path is not under any open workspace root.
    #[error("Not inside an open workspace: {}", .0.display())]
    NotInWorkspace(PathBuf),

    /// I/O errors from config or session files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration or session file could not be used.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<FsError> for WorkspaceError {
    fn from(err: FsError) -> Self {
        WorkspaceError::Operation(err.to_string())
    }
}

impl WorkspaceError {
    /// Whether the presentation layer should show this error to the user.
    ///
    /// Structural rejections are already prevented by the drop affordance,
    /// so they stay silent.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, WorkspaceError::Structural(_))
    }
}
