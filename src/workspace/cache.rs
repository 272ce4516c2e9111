//! Last-known tree per workspace root.
//!
//! Readers may look at any entry at any time. Writes go through the scan
//! controller only, and only the completion of the most recently issued scan
//! for a root replaces that root's tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};
use tracing::debug;

use crate::fs::node::FileNode;
use crate::fs::service::FsError;

/// Result of one scan, shared by every caller joined to it.
pub(crate) type ScanOutcome = std::result::Result<Arc<FileNode>, FsError>;

/// A scan that several refreshes can await together.
pub(crate) type SharedScan = Shared<BoxFuture<'static, ScanOutcome>>;

/// Snapshot of one root's cache entry.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    /// Last successfully scanned tree, if any.
    pub tree: Option<Arc<FileNode>>,
    /// When `tree` was stored.
    pub refreshed_at: Option<Instant>,
    /// Message of the latest scan failure, cleared by the next success.
    pub last_scan_error: Option<String>,
}

struct InFlight {
    token: u64,
    scan: SharedScan,
}

#[derive(Default)]
struct RootState {
    entry: CacheEntry,
    /// Identifier of the most recently issued scan; 0 before the first.
    latest_token: u64,
    in_flight: Option<InFlight>,
}

/// What a refresh should do, decided atomically under the cache lock.
pub(crate) enum RefreshPlan {
    /// Cached tree is within the debounce window.
    Fresh(Arc<FileNode>),
    /// Wait on a scan that is already running.
    Join { token: u64, scan: SharedScan },
    /// A new scan was registered and must be awaited.
    Issued { token: u64, scan: SharedScan },
}

/// State of a scan after it resolved.
pub(crate) enum Superseded {
    /// The scan was the latest; its result stands.
    No,
    /// A newer scan is still running.
    InFlight { token: u64, scan: SharedScan },
    /// A newer scan already finished.
    Settled,
}

/// Keyed store of the last-known tree per root.
#[derive(Default)]
pub struct TreeCache {
    roots: Mutex<HashMap<PathBuf, RootState>>,
    /// Source of scan tokens for every root. Never reset, so a root that is
    /// closed and reopened cannot mistake an old scan for its own.
    next_token: AtomicU64,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, RootState>> {
        self.roots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current tree for `root`.
    pub fn tree(&self, root: &Path) -> Option<Arc<FileNode>> {
        self.lock().get(root).and_then(|s| s.entry.tree.clone())
    }

    /// Full entry for `root`.
    pub fn entry(&self, root: &Path) -> Option<CacheEntry> {
        self.lock().get(root).map(|s| s.entry.clone())
    }

    pub fn refreshed_at(&self, root: &Path) -> Option<Instant> {
        self.lock().get(root).and_then(|s| s.entry.refreshed_at)
    }

    pub fn last_scan_error(&self, root: &Path) -> Option<String> {
        self.lock()
            .get(root)
            .and_then(|s| s.entry.last_scan_error.clone())
    }

    /// Registered roots, sorted.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.lock().keys().cloned().collect();
        roots.sort();
        roots
    }

    pub fn contains_root(&self, root: &Path) -> bool {
        self.lock().contains_key(root)
    }

    /// Deepest registered root that is `path` or one of its ancestors.
    pub fn owning_root(&self, path: &Path) -> Option<PathBuf> {
        self.lock()
            .keys()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .cloned()
    }

    /// Whether a scan is running for `root`.
    pub fn is_scanning(&self, root: &Path) -> bool {
        self.lock()
            .get(root)
            .is_some_and(|s| s.in_flight.is_some())
    }

    pub(crate) fn register(&self, root: &Path) {
        self.lock().entry(root.to_path_buf()).or_default();
    }

    /// Drop the entry for `root`. A scan still running for it is discarded.
    pub(crate) fn remove(&self, root: &Path) -> bool {
        self.lock().remove(root).is_some()
    }

    /// Decide between the cached tree, joining a running scan, or issuing a
    /// new one built by `start`.
    pub(crate) fn plan_refresh<F>(
        &self,
        root: &Path,
        force: bool,
        debounce: Duration,
        start: F,
    ) -> RefreshPlan
    where
        F: FnOnce(u64) -> BoxFuture<'static, ScanOutcome>,
    {
        let mut roots = self.lock();
        let state = roots.entry(root.to_path_buf()).or_default();

        if !force {
            if let (Some(tree), Some(at)) = (&state.entry.tree, state.entry.refreshed_at) {
                if at.elapsed() < debounce {
                    return RefreshPlan::Fresh(tree.clone());
                }
            }
            if let Some(running) = &state.in_flight {
                return RefreshPlan::Join {
                    token: running.token,
                    scan: running.scan.clone(),
                };
            }
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        state.latest_token = token;
        let scan = futures::FutureExt::shared(start(token));
        state.in_flight = Some(InFlight {
            token,
            scan: scan.clone(),
        });
        RefreshPlan::Issued { token, scan }
    }

    /// Apply a finished scan if `token` is still the latest for `root`.
    pub(crate) fn complete_scan(&self, root: &Path, token: u64, outcome: &ScanOutcome) {
        let mut roots = self.lock();
        let Some(state) = roots.get_mut(root) else {
            debug!(root = %root.display(), "scan finished for a closed root");
            return;
        };
        if state.latest_token != token {
            debug!(
                root = %root.display(),
                token,
                latest = state.latest_token,
                "discarding stale scan result"
            );
            return;
        }

        state.in_flight = None;
        match outcome {
            Ok(tree) => {
                state.entry.tree = Some(tree.clone());
                state.entry.refreshed_at = Some(Instant::now());
                state.entry.last_scan_error = None;
            }
            Err(err) => {
                state.entry.last_scan_error = Some(err.to_string());
            }
        }
    }

    /// After scan `token` resolved, report whether a newer one replaced it.
    pub(crate) fn superseded(&self, root: &Path, token: u64) -> Superseded {
        let roots = self.lock();
        let Some(state) = roots.get(root) else {
            return Superseded::No;
        };
        if state.latest_token == token {
            return Superseded::No;
        }
        match &state.in_flight {
            Some(running) => Superseded::InFlight {
                token: running.token,
                scan: running.scan.clone(),
            },
            None => Superseded::Settled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn ready_scan(tree: FileNode) -> BoxFuture<'static, ScanOutcome> {
        async move { Ok(Arc::new(tree)) }.boxed()
    }

    #[test]
    fn test_owning_root_prefers_deepest() {
        let cache = TreeCache::new();
        cache.register(Path::new("/ws"));
        cache.register(Path::new("/ws/nested"));
        assert_eq!(
            cache.owning_root(Path::new("/ws/nested/a.md")),
            Some(PathBuf::from("/ws/nested"))
        );
        assert_eq!(
            cache.owning_root(Path::new("/ws/b.md")),
            Some(PathBuf::from("/ws"))
        );
        assert_eq!(cache.owning_root(Path::new("/wsx/b.md")), None);
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let cache = TreeCache::new();
        let root = Path::new("/ws");
        let old = FileNode::directory("/ws", vec![]);
        let new = FileNode::directory("/ws", vec![FileNode::file("/ws/a.md")]);

        let first = match cache.plan_refresh(root, true, Duration::ZERO, |_| ready_scan(old.clone())) {
            RefreshPlan::Issued { token, .. } => token,
            _ => panic!("expected a new scan"),
        };
        let second = match cache.plan_refresh(root, true, Duration::ZERO, |_| ready_scan(new.clone())) {
            RefreshPlan::Issued { token, .. } => token,
            _ => panic!("expected a new scan"),
        };
        assert!(second > first);

        cache.complete_scan(root, second, &Ok(Arc::new(new.clone())));
        cache.complete_scan(root, first, &Ok(Arc::new(old)));
        assert_eq!(cache.tree(root).as_deref(), Some(&new));
        assert!(matches!(cache.superseded(root, first), Superseded::Settled));
        assert!(matches!(cache.superseded(root, second), Superseded::No));
    }

    #[test]
    fn test_failed_scan_keeps_tree() {
        let cache = TreeCache::new();
        let root = Path::new("/ws");
        let tree = FileNode::directory("/ws", vec![]);
        let RefreshPlan::Issued { token, .. } =
            cache.plan_refresh(root, true, Duration::ZERO, |_| ready_scan(tree.clone()))
        else {
            panic!("expected a new scan");
        };
        cache.complete_scan(root, token, &Ok(Arc::new(tree.clone())));

        let RefreshPlan::Issued { token, .. } =
            cache.plan_refresh(root, true, Duration::ZERO, |_| ready_scan(tree.clone()))
        else {
            panic!("expected a new scan");
        };
        cache.complete_scan(root, token, &Err(FsError::new("permission denied")));

        let entry = cache.entry(root).unwrap();
        assert_eq!(entry.tree.as_deref(), Some(&tree));
        assert_eq!(entry.last_scan_error.as_deref(), Some("permission denied"));
        assert!(!cache.is_scanning(root));
    }

    #[test]
    fn test_fresh_entry_short_circuits_unforced_refresh() {
        let cache = TreeCache::new();
        let root = Path::new("/ws");
        let tree = FileNode::directory("/ws", vec![]);
        let RefreshPlan::Issued { token, .. } =
            cache.plan_refresh(root, false, Duration::from_secs(60), |_| ready_scan(tree.clone()))
        else {
            panic!("expected a new scan");
        };
        cache.complete_scan(root, token, &Ok(Arc::new(tree.clone())));
        assert!(matches!(
            cache.plan_refresh(root, false, Duration::from_secs(60), |_| ready_scan(tree.clone())),
            RefreshPlan::Fresh(_)
        ));
        assert!(matches!(
            cache.plan_refresh(root, true, Duration::from_secs(60), |_| ready_scan(tree.clone())),
            RefreshPlan::Issued { .. }
        ));
    }

    #[test]
    fn test_remove_forgets_root() {
        let cache = TreeCache::new();
        cache.register(Path::new("/ws"));
        assert!(cache.contains_root(Path::new("/ws")));
        assert!(cache.remove(Path::new("/ws")));
        assert!(!cache.contains_root(Path::new("/ws")));
        assert!(cache.tree(Path::new("/ws")).is_none());
    }

    #[test]
    fn test_scan_from_before_close_is_discarded_after_reopen() {
        let cache = TreeCache::new();
        let root = Path::new("/ws");
        let old = FileNode::directory("/ws", vec![FileNode::file("/ws/gone.md")]);
        let new = FileNode::directory("/ws", vec![]);

        cache.register(root);
        let RefreshPlan::Issued { token: before_close, .. } =
            cache.plan_refresh(root, true, Duration::ZERO, |_| ready_scan(old.clone()))
        else {
            panic!("expected a new scan");
        };
        assert!(cache.remove(root));

        cache.register(root);
        let RefreshPlan::Issued { token: after_reopen, .. } =
            cache.plan_refresh(root, true, Duration::ZERO, |_| ready_scan(new.clone()))
        else {
            panic!("expected a new scan");
        };
        assert_ne!(before_close, after_reopen);

        cache.complete_scan(root, before_close, &Ok(Arc::new(old)));
        assert!(cache.tree(root).is_none());
        assert!(cache.is_scanning(root));
        assert!(matches!(
            cache.plan_refresh(root, false, Duration::ZERO, |_| ready_scan(new.clone())),
            RefreshPlan::Join { token, .. } if token == after_reopen
        ));

        cache.complete_scan(root, after_reopen, &Ok(Arc::new(new.clone())));
        assert_eq!(cache.tree(root).as_deref(), Some(&new));
        assert!(!cache.is_scanning(root));
    }
}
