//! Workspace tree model for a notes app.
//!
//! [`workspace::Workspace`] mirrors a notes directory as a cached tree and
//! applies create, rename, move and delete through an [`fs::FsService`],
//! re-scanning after each change. [`dnd::DragDrop`] turns drag gestures into
//! validated moves.

pub mod config;
pub mod dnd;
pub mod error;
pub mod fs;
pub mod logging;
pub mod session;
pub mod workspace;

pub use error::{Result, WorkspaceError};
pub use workspace::{Workspace, WorkspaceOptions};
