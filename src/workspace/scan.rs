use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::fs::node::FileNode;
use crate::fs::service::{FsError, FsService};
use crate::workspace::cache::{RefreshPlan, ScanOutcome, Superseded, TreeCache};

/// Default window in which an unforced refresh reuses the cached tree.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Requests scans from the filesystem service and writes them to the cache.
pub struct ScanController {
    service: Arc<dyn FsService>,
    cache: Arc<TreeCache>,
    debounce: Duration,
}

impl ScanController {
    pub fn new(service: Arc<dyn FsService>, cache: Arc<TreeCache>, debounce: Duration) -> Self {
        Self {
            service,
            cache,
            debounce,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Return a current tree for `root`.
    ///
    /// Unforced calls reuse a tree refreshed within the debounce window and
    /// otherwise join a running scan. Forced calls always issue a scan. A
    /// caller whose scan was superseded waits for the newer one, so the tree
    /// it gets back is never older than its own request.
    pub async fn refresh(&self, root: &Path, force: bool) -> Result<Arc<FileNode>, FsError> {
        let plan = self.cache.plan_refresh(root, force, self.debounce, |token| {
            let service = self.service.clone();
            let cache = self.cache.clone();
            let root = root.to_path_buf();
            async move {
                debug!(root = %root.display(), token, "scan issued");
                let outcome: ScanOutcome = service.scan_directory(&root).await.map(Arc::new);
                if let Err(err) = &outcome {
                    warn!(root = %root.display(), error = %err, "scan failed");
                }
                cache.complete_scan(&root, token, &outcome);
                outcome
            }
            .boxed()
        });

        let (mut token, mut outcome) = match plan {
            RefreshPlan::Fresh(tree) => {
                debug!(root = %root.display(), "refresh debounced");
                return Ok(tree);
            }
            RefreshPlan::Join { token, scan } => {
                debug!(root = %root.display(), token, "joining scan in flight");
                (token, scan.await)
            }
            RefreshPlan::Issued { token, scan } => (token, scan.await),
        };

        loop {
            match self.cache.superseded(root, token) {
                Superseded::No => return outcome,
                Superseded::InFlight { token: newer, scan } => {
                    debug!(root = %root.display(), token, newer, "waiting for newer scan");
                    token = newer;
                    outcome = scan.await;
                }
                Superseded::Settled => {
                    return match self.cache.entry(root) {
                        Some(entry) => match (entry.last_scan_error, entry.tree) {
                            (Some(message), _) => Err(FsError::new(message)),
                            (None, Some(tree)) => Ok(tree),
                            (None, None) => outcome,
                        },
                        None => outcome,
                    };
                }
            }
        }
    }
}
