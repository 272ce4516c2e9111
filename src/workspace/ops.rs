//! Create, rename, move and delete.
//!
//! Each public operation returns `Some(path)` on success and `None` on
//! failure, with the failure readable through [`Workspace::last_error`]. A
//! successful mutation force-refreshes its owning root before returning, so
//! the cache already reflects it; a failed one leaves the cache untouched.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, StructuralError, WorkspaceError};
use crate::fs::node::{display_name, is_descendant};
use crate::fs::validate::{validate_name, validate_relative_path};
use crate::workspace::Workspace;

/// Reject moves that would drop a node onto itself or into its own subtree.
pub fn check_move(
    source: &Path,
    target_parent: &Path,
    is_directory: bool,
) -> std::result::Result<(), StructuralError> {
    if source == target_parent {
        return Err(StructuralError::SelfDrop);
    }
    if is_directory && is_descendant(target_parent, source) {
        return Err(StructuralError::IntoDescendant);
    }
    Ok(())
}

/// Candidate names in order: `base.ext`, `base 1.ext`, `base 2.ext`, ...
fn numbered_name(base: &str, ext: Option<&str>, n: usize) -> String {
    let stem = if n == 0 {
        base.to_string()
    } else {
        format!("{} {}", base, n)
    };
    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

impl Workspace {
    /// Create a note under `parent`. Without a name, a free default name is
    /// picked from the cached children.
    pub async fn create_file(&self, parent: &Path, name: Option<&str>) -> Option<PathBuf> {
        let result = self.try_create(parent, name, false).await;
        self.record(result)
    }

    /// Create a folder under `parent`. Without a name, a free default name is
    /// picked from the cached children.
    pub async fn create_directory(&self, parent: &Path, name: Option<&str>) -> Option<PathBuf> {
        let result = self.try_create(parent, name, true).await;
        self.record(result)
    }

    /// Quick create from a relative path such as `journal/2024/today.md`.
    ///
    /// A trailing separator creates directories only.
    pub async fn create_at_path(&self, root: &Path, relative: &str) -> Option<PathBuf> {
        let result = self.try_create_at_path(root, relative).await;
        self.record(result)
    }

    /// Rename the node at `old_path` to `new_name`.
    ///
    /// Renaming to the current name returns `old_path` without any I/O.
    pub async fn rename(&self, old_path: &Path, new_name: &str) -> Option<PathBuf> {
        let result = self.try_rename(old_path, new_name).await;
        self.record(result)
    }

    /// Move `source` into `target_parent`.
    pub async fn move_item(&self, source: &Path, target_parent: &Path) -> Option<PathBuf> {
        let result = self.try_move(source, target_parent, None).await;
        self.record(result)
    }

    /// Move with the source kind already known, as carried by a drag payload.
    pub(crate) async fn move_known(
        &self,
        source: &Path,
        target_parent: &Path,
        is_directory: bool,
    ) -> Option<PathBuf> {
        let result = self.try_move(source, target_parent, Some(is_directory)).await;
        self.record(result)
    }

    /// Delete `path` and everything beneath it. Returns the removed path.
    ///
    /// The caller confirms destructive intent before calling.
    pub async fn delete(&self, path: &Path) -> Option<PathBuf> {
        let result = self.try_delete(path).await;
        self.record(result)
    }

    /// Kind used for the move checks on `source`.
    ///
    /// A claimed kind, as carried by a drag payload, can only make the check
    /// stricter when the cached tree knows the path. Unknown paths with no
    /// claim are checked as directories.
    pub(crate) fn source_kind(&self, source: &Path, claimed: Option<bool>) -> bool {
        match (self.is_directory(source), claimed) {
            (Some(cached), claimed) => cached || claimed == Some(true),
            (None, Some(claimed)) => claimed,
            (None, None) => true,
        }
    }

    /// Force-refresh `root` after a change to `changed` reached the disk.
    ///
    /// A failure here means the change stands but the cache is stale, and the
    /// error says so.
    async fn refresh_after_change(&self, root: &Path, changed: &Path) -> Result<()> {
        match self.refresh(root, true).await {
            Ok(_) => Ok(()),
            Err(err) => {
                let reason = match err {
                    WorkspaceError::Operation(message) => message,
                    other => other.to_string(),
                };
                Err(WorkspaceError::Operation(format!(
                    "{} was applied, but refreshing the tree failed: {}",
                    changed.display(),
                    reason
                )))
            }
        }
    }

    /// Free default name under `parent`, if its children are cached.
    fn default_name(&self, parent: &Path, is_directory: bool) -> Option<String> {
        let root = self.cache.owning_root(parent)?;
        let tree = self.cache.tree(&root)?;
        let taken: Vec<String> = tree
            .find(parent)?
            .child_names()?
            .into_iter()
            .map(str::to_lowercase)
            .collect();

        let (base, ext) = if is_directory {
            (self.options.folder_name.as_str(), None)
        } else {
            (
                self.options.note_name.as_str(),
                Some(self.options.note_extension.as_str()),
            )
        };
        (0..)
            .map(|n| numbered_name(base, ext, n))
            .find(|candidate| !taken.contains(&candidate.to_lowercase()))
    }

    async fn try_create(
        &self,
        parent: &Path,
        name: Option<&str>,
        is_directory: bool,
    ) -> Result<PathBuf> {
        if let Some(name) = name {
            validate_name(name)?;
        }
        let root = self.owning_root(parent)?;

        let synthesized = match name {
            Some(_) => None,
            None => self.default_name(parent, is_directory),
        };
        let name = name.or(synthesized.as_deref());

        let created = if is_directory {
            self.service.create_directory(parent, name).await?
        } else {
            self.service.create_file(parent, name).await?
        };
        info!(path = %created.display(), "created");

        self.refresh_after_change(&root, &created).await?;
        Ok(created)
    }

    async fn try_create_at_path(&self, root: &Path, relative: &str) -> Result<PathBuf> {
        validate_relative_path(relative)?;
        if !self.cache.contains_root(root) {
            return Err(WorkspaceError::NotInWorkspace(root.to_path_buf()));
        }
        let created = self.service.create_nested_path(root, relative).await?;
        info!(path = %created.display(), "created from relative path");

        self.refresh_after_change(root, &created).await?;
        Ok(created)
    }

    async fn try_rename(&self, old_path: &Path, new_name: &str) -> Result<PathBuf> {
        validate_name(new_name)?;
        let root = self.owning_root(old_path)?;
        if display_name(old_path) == new_name {
            debug!(path = %old_path.display(), "rename to same name skipped");
            return Ok(old_path.to_path_buf());
        }
        if root == old_path {
            return Err(WorkspaceError::Operation(
                "cannot rename the workspace root".to_string(),
            ));
        }

        let renamed = self
            .service
            .rename_file_or_directory(old_path, new_name)
            .await?;
        info!(from = %old_path.display(), to = %renamed.display(), "renamed");

        self.rebase_selection(old_path, &renamed);
        self.refresh_after_change(&root, &renamed).await?;
        Ok(renamed)
    }

    async fn try_move(
        &self,
        source: &Path,
        target_parent: &Path,
        is_directory: Option<bool>,
    ) -> Result<PathBuf> {
        let is_directory = self.source_kind(source, is_directory);
        check_move(source, target_parent, is_directory)?;

        let source_root = self.owning_root(source)?;
        let target_root = self.owning_root(target_parent)?;
        if source == source_root {
            return Err(WorkspaceError::Operation(
                "cannot move the workspace root".to_string(),
            ));
        }
        if source.parent() == Some(target_parent) {
            debug!(path = %source.display(), "move to current parent skipped");
            return Ok(source.to_path_buf());
        }

        let moved = self
            .service
            .move_file_or_directory(source, target_parent)
            .await?;
        info!(from = %source.display(), to = %moved.display(), "moved");

        self.rebase_selection(source, &moved);
        self.refresh_after_change(&source_root, &moved).await?;
        if target_root != source_root {
            self.refresh_after_change(&target_root, &moved).await?;
        }
        Ok(moved)
    }

    async fn try_delete(&self, path: &Path) -> Result<PathBuf> {
        let root = self.owning_root(path)?;
        if root == path {
            return Err(WorkspaceError::Operation(
                "cannot delete the workspace root".to_string(),
            ));
        }

        self.service.delete_file_or_directory(path).await?;
        warn!(path = %path.display(), "deleted");

        self.drop_selection_under(path);
        self.refresh_after_change(&root, path).await?;
        Ok(path.to_path_buf())
    }
}
