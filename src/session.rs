//! The last opened workspace, kept in `workspace.json` next to the config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WorkspaceError};

pub const SESSION_FILE: &str = "workspace.json";

/// Most recent roots kept in [`Session::recent`].
pub const MAX_RECENT: usize = 10;

/// `<config_dir>/nws/workspace.json`
pub fn default_session_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nws").join(SESSION_FILE))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub workspace_path: Option<PathBuf>,
    /// Previously opened roots, most recent first.
    #[serde(default)]
    pub recent: Vec<PathBuf>,
}

impl Session {
    /// Read the session at `path`. A missing or empty file is a fresh
    /// session; unparseable JSON is an error and the file is left alone.
    pub fn load(path: &Path) -> Result<Session> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Session::default()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Session::default());
        }
        serde_json::from_str(&content)
            .map_err(|e| WorkspaceError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| WorkspaceError::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "session saved");
        Ok(())
    }

    /// Remove the session file, if any.
    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// True unless `path` holds a readable session with a workspace set.
    pub fn is_first_run(path: &Path) -> bool {
        Session::load(path)
            .map(|session| session.last_workspace().is_none())
            .unwrap_or(true)
    }

    /// The remembered workspace, ignoring a blank entry.
    pub fn last_workspace(&self) -> Option<&Path> {
        self.workspace_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Make `root` the current workspace and the head of `recent`.
    pub fn remember(&mut self, root: &Path) {
        self.workspace_path = Some(root.to_path_buf());
        self.recent.retain(|p| p != root);
        self.recent.insert(0, root.to_path_buf());
        self.recent.truncate(MAX_RECENT);
    }
}
