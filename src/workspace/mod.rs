//! The workspace engine: tree cache, scan controller, mutations, editing
//! overlay and the current selection, composed around one filesystem service.

pub mod cache;
pub mod editing;
pub mod ops;
pub mod scan;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, WorkspaceError};
use crate::fs::node::{rebase, FileNode};
use crate::fs::service::FsService;

pub use cache::{CacheEntry, TreeCache};
pub use editing::{EditingOverlay, RenameDraft};
pub use ops::check_move;
pub use scan::{ScanController, DEFAULT_DEBOUNCE};

/// Called with the new selection when the engine changes it.
pub type SelectionCallback = Arc<dyn Fn(Option<&Path>) + Send + Sync>;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct WorkspaceOptions {
    /// Window in which unforced refreshes reuse the cached tree.
    pub debounce: Duration,
    /// Base name for notes created without a name.
    pub note_name: String,
    /// Base name for folders created without a name.
    pub folder_name: String,
    /// Extension given to synthesized note names.
    pub note_extension: String,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            note_name: "Untitled".to_string(),
            folder_name: "New Folder".to_string(),
            note_extension: "md".to_string(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory model of the open workspaces.
pub struct Workspace {
    service: Arc<dyn FsService>,
    cache: Arc<TreeCache>,
    scanner: ScanController,
    editing: Arc<EditingOverlay>,
    options: WorkspaceOptions,
    active_root: Mutex<Option<PathBuf>>,
    selection: Mutex<Option<PathBuf>>,
    on_selection_change: Mutex<Option<SelectionCallback>>,
    last_error: Mutex<Option<WorkspaceError>>,
}

impl Workspace {
    pub fn new(service: Arc<dyn FsService>, options: WorkspaceOptions) -> Self {
        Self::with_parts(
            service,
            Arc::new(TreeCache::new()),
            Arc::new(EditingOverlay::new()),
            options,
        )
    }

    /// Build around an existing cache and overlay shared with other readers.
    pub fn with_parts(
        service: Arc<dyn FsService>,
        cache: Arc<TreeCache>,
        editing: Arc<EditingOverlay>,
        options: WorkspaceOptions,
    ) -> Self {
        let scanner = ScanController::new(service.clone(), cache.clone(), options.debounce);
        Self {
            service,
            cache,
            scanner,
            editing,
            options,
            active_root: Mutex::new(None),
            selection: Mutex::new(None),
            on_selection_change: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<TreeCache> {
        &self.cache
    }

    pub fn editing(&self) -> &Arc<EditingOverlay> {
        &self.editing
    }

    pub fn options(&self) -> &WorkspaceOptions {
        &self.options
    }

    // ── Roots ───────────────────────────────────────────────────────────────

    /// Register `root`, make it active, and scan it.
    ///
    /// The root stays registered when the scan fails so it can be retried.
    pub async fn open(&self, root: &Path) -> Option<Arc<FileNode>> {
        info!(root = %root.display(), "opening workspace");
        self.cache.register(root);
        *lock(&self.active_root) = Some(root.to_path_buf());
        self.refresh(root, true).await.ok()
    }

    /// Make another root active. Already cached roots keep their trees.
    pub async fn switch(&self, root: &Path) -> Option<Arc<FileNode>> {
        self.open(root).await
    }

    /// Forget `root` and its cached tree.
    pub fn close(&self, root: &Path) {
        if self.cache.remove(root) {
            info!(root = %root.display(), "closed workspace");
        }
        let mut active = lock(&self.active_root);
        if active.as_deref() == Some(root) {
            *active = None;
        }
    }

    pub fn active_root(&self) -> Option<PathBuf> {
        lock(&self.active_root).clone()
    }

    /// Cached tree for `root`.
    pub fn tree(&self, root: &Path) -> Option<Arc<FileNode>> {
        self.cache.tree(root)
    }

    /// Cached tree for the active root.
    pub fn active_tree(&self) -> Option<Arc<FileNode>> {
        self.active_root().and_then(|root| self.cache.tree(&root))
    }

    /// Refresh the tree for `root`; failures are also kept as the last error.
    pub async fn refresh(&self, root: &Path, force: bool) -> Result<Arc<FileNode>> {
        match self.scanner.refresh(root, force).await {
            Ok(tree) => {
                *lock(&self.last_error) = None;
                Ok(tree)
            }
            Err(err) => {
                *lock(&self.last_error) = Some(err.clone().into());
                Err(err.into())
            }
        }
    }

    /// Deepest open root containing `path`.
    pub fn owning_root(&self, path: &Path) -> Result<PathBuf> {
        self.cache
            .owning_root(path)
            .ok_or_else(|| WorkspaceError::NotInWorkspace(path.to_path_buf()))
    }

    /// Whether `path` is a directory according to the cached tree.
    pub fn is_directory(&self, path: &Path) -> Option<bool> {
        let root = self.cache.owning_root(path)?;
        let tree = self.cache.tree(&root)?;
        tree.find(path).map(|node| node.is_directory)
    }

    // ── Last error ──────────────────────────────────────────────────────────

    /// Message of the most recent failure, cleared when an operation succeeds.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).as_ref().map(|e| e.to_string())
    }

    /// Take the most recent failure out of the slot.
    pub fn take_last_error(&self) -> Option<WorkspaceError> {
        lock(&self.last_error).take()
    }

    /// Store the failure, if any, and turn the result into an option.
    pub(crate) fn record<T>(&self, result: Result<T>) -> Option<T> {
        let mut slot = lock(&self.last_error);
        match result {
            Ok(value) => {
                *slot = None;
                Some(value)
            }
            Err(err) => {
                if err.is_user_facing() {
                    warn!(error = %err, "workspace operation failed");
                } else {
                    debug!(error = %err, "workspace operation rejected");
                }
                *slot = Some(err);
                None
            }
        }
    }

    // ── Selection ───────────────────────────────────────────────────────────

    /// Currently open file.
    pub fn selection(&self) -> Option<PathBuf> {
        lock(&self.selection).clone()
    }

    /// Set the open file without notifying the callback.
    pub fn select(&self, path: Option<PathBuf>) {
        *lock(&self.selection) = path;
    }

    pub fn on_selection_change<F>(&self, callback: F)
    where
        F: Fn(Option<&Path>) + Send + Sync + 'static,
    {
        *lock(&self.on_selection_change) = Some(Arc::new(callback));
    }

    pub fn has_selection_callback(&self) -> bool {
        lock(&self.on_selection_change).is_some()
    }

    /// Change the selection and fire the callback if it actually changed.
    pub(crate) fn change_selection(&self, path: Option<PathBuf>) {
        {
            let mut selection = lock(&self.selection);
            if *selection == path {
                return;
            }
            selection.clone_from(&path);
        }
        let callback = lock(&self.on_selection_change).clone();
        if let Some(callback) = callback {
            callback(path.as_deref());
        }
    }

    /// Follow the selection through a rename or move of `from` to `to`.
    pub(crate) fn rebase_selection(&self, from: &Path, to: &Path) {
        let rebased = self
            .selection()
            .and_then(|selected| rebase(&selected, from, to));
        if let Some(rebased) = rebased {
            self.change_selection(Some(rebased));
        }
    }

    /// Clear the selection if it was `removed` or lay beneath it.
    pub(crate) fn drop_selection_under(&self, removed: &Path) {
        if self
            .selection()
            .is_some_and(|selected| selected.starts_with(removed))
        {
            self.change_selection(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::memory::MemoryFs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn workspace() -> (Workspace, Arc<MemoryFs>) {
        let fs = Arc::new(MemoryFs::new(
            "/ws",
            &["/ws/notes"],
            &["/ws/notes/a.md", "/ws/todo.md"],
        ));
        (Workspace::new(fs.clone(), WorkspaceOptions::default()), fs)
    }

    #[tokio::test]
    async fn test_open_scans_and_activates() {
        let (ws, fs) = workspace();
        let tree = ws.open(Path::new("/ws")).await.unwrap();
        assert_eq!(ws.active_root(), Some(PathBuf::from("/ws")));
        assert_eq!(ws.active_tree(), Some(tree));
        assert_eq!(fs.scan_count(), 1);
        assert_eq!(ws.is_directory(Path::new("/ws/notes")), Some(true));
        assert_eq!(ws.is_directory(Path::new("/ws/todo.md")), Some(false));
    }

    #[tokio::test]
    async fn test_open_failure_keeps_root_and_reports() {
        let (ws, fs) = workspace();
        fs.set_fail_scans(true);
        assert!(ws.open(Path::new("/ws")).await.is_none());
        assert_eq!(ws.last_error().as_deref(), Some("Operation failed: scan failed"));
        assert!(ws.cache().contains_root(Path::new("/ws")));

        fs.set_fail_scans(false);
        assert!(ws.refresh(Path::new("/ws"), true).await.is_ok());
        assert!(ws.last_error().is_none());
    }

    #[tokio::test]
    async fn test_close_discards_entry() {
        let (ws, _fs) = workspace();
        ws.open(Path::new("/ws")).await.unwrap();
        ws.close(Path::new("/ws"));
        assert!(ws.tree(Path::new("/ws")).is_none());
        assert!(ws.active_root().is_none());
        assert!(matches!(
            ws.owning_root(Path::new("/ws/todo.md")),
            Err(WorkspaceError::NotInWorkspace(_))
        ));
    }

    #[tokio::test]
    async fn test_roots_are_independent() {
        let fs = Arc::new(MemoryFs::new("/one", &["/two"], &["/one/a.md", "/two/b.md"]));
        let ws = Workspace::new(fs.clone(), WorkspaceOptions::default());
        ws.open(Path::new("/one")).await.unwrap();
        ws.open(Path::new("/two")).await.unwrap();
        assert_eq!(ws.active_root(), Some(PathBuf::from("/two")));
        assert!(ws.tree(Path::new("/one")).unwrap().contains(Path::new("/one/a.md")));
        assert!(ws.tree(Path::new("/two")).unwrap().contains(Path::new("/two/b.md")));
    }

    #[test]
    fn test_selection_callback_fires_only_on_change() {
        let (ws, _fs) = workspace();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        ws.on_selection_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        ws.select(Some(PathBuf::from("/ws/todo.md")));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        ws.change_selection(Some(PathBuf::from("/ws/todo.md")));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        ws.rebase_selection(Path::new("/ws"), Path::new("/archive/ws"));
        assert_eq!(ws.selection(), Some(PathBuf::from("/archive/ws/todo.md")));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        ws.drop_selection_under(Path::new("/archive"));
        assert!(ws.selection().is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
