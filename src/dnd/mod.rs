//! Drag-and-drop reparenting.
//!
//! One gesture runs `Idle -> Dragging -> DraggedOver(target)* -> Dropped |
//! Cancelled -> Idle`. Drops resolve to a single move through the workspace.

pub mod transfer;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::workspace::{check_move, Workspace};

pub use transfer::{DataTransfer, DragPayload};

/// Hint reflected back to the host cursor while dragging over a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropEffect {
    Move,
    Rejected,
}

/// Where the current gesture stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging,
    DraggedOver(PathBuf),
}

#[derive(Debug)]
struct DragSession {
    payload: DragPayload,
    current_drop_target: Option<PathBuf>,
    /// Enter events not yet matched by a leave.
    depth: usize,
}

/// Drag state machine bound to one workspace.
pub struct DragDrop {
    workspace: Arc<Workspace>,
    session: Mutex<Option<DragSession>>,
}

impl DragDrop {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            workspace,
            session: Mutex::new(None),
        }
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    fn lock(&self) -> MutexGuard<'_, Option<DragSession>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Begin dragging `source` and write its payload into `transfer`.
    ///
    /// A gesture already in progress is replaced.
    pub fn start(&self, source: &Path, is_directory: bool, transfer: &mut DataTransfer) -> DragPayload {
        let payload = DragPayload::new(source, is_directory);
        transfer::encode(&payload, transfer);
        debug!(source = %source.display(), "drag started");
        *self.lock() = Some(DragSession {
            payload: payload.clone(),
            current_drop_target: None,
            depth: 0,
        });
        payload
    }

    /// Pointer entered a drop region for `target`.
    pub fn enter(&self, target: &Path) {
        if let Some(session) = self.lock().as_mut() {
            session.depth += 1;
            session.current_drop_target = Some(target.to_path_buf());
        }
    }

    /// Pointer left a drop region. Nested regions keep the hover until the
    /// outermost one is left.
    pub fn leave(&self) {
        if let Some(session) = self.lock().as_mut() {
            session.depth = session.depth.saturating_sub(1);
            if session.depth == 0 {
                session.current_drop_target = None;
            }
        }
    }

    /// Whether `target` is the hovered drop target.
    pub fn is_hovered(&self, target: &Path) -> bool {
        self.lock().as_ref().is_some_and(|session| {
            session.depth > 0 && session.current_drop_target.as_deref() == Some(target)
        })
    }

    /// Verdict for hovering over `target`. Never cancels the gesture.
    pub fn over(&self, target: &Path) -> DropEffect {
        if self.workspace.is_directory(target) == Some(false) {
            return DropEffect::Rejected;
        }
        let session = self.lock();
        let Some(session) = session.as_ref() else {
            // Foreign drag; its payload is only readable on drop.
            return DropEffect::Move;
        };
        let payload = &session.payload;
        let is_directory = self
            .workspace
            .source_kind(&payload.source_path, Some(payload.is_directory));
        match check_move(&payload.source_path, target, is_directory) {
            Ok(()) => DropEffect::Move,
            Err(_) => DropEffect::Rejected,
        }
    }

    /// Resolve a drop onto `target` into one move.
    ///
    /// The session ends first, whatever happens next. A payload that cannot be
    /// recovered from `transfer` is ignored. When a file moves and a selection
    /// callback is registered, the selection follows it to its new path.
    pub async fn drop_on(&self, target: &Path, transfer: &DataTransfer) -> Option<PathBuf> {
        let session = self.lock().take();

        let payload = if transfer.is_empty() {
            session.map(|s| s.payload)
        } else {
            transfer::decode(transfer, |path| self.workspace.is_directory(path))
        };
        let Some(payload) = payload else {
            debug!(target = %target.display(), "drop ignored: no recognizable payload");
            return None;
        };
        if self.workspace.is_directory(target) == Some(false) {
            debug!(target = %target.display(), "drop ignored: target is a file");
            return None;
        }

        // The cached tree has the last word on what the payload names.
        let is_directory = self
            .workspace
            .source_kind(&payload.source_path, Some(payload.is_directory));
        let moved = self
            .workspace
            .move_known(&payload.source_path, target, is_directory)
            .await?;
        info!(from = %payload.source_path.display(), to = %moved.display(), "dropped");

        if !is_directory && self.workspace.has_selection_callback() {
            self.workspace.change_selection(Some(moved.clone()));
        }
        Some(moved)
    }

    /// Drag ended, dropped or not.
    pub fn end(&self) {
        if self.lock().take().is_some() {
            debug!("drag ended");
        }
    }

    pub fn phase(&self) -> DragPhase {
        match self.lock().as_ref() {
            None => DragPhase::Idle,
            Some(session) => match (&session.current_drop_target, session.depth) {
                (Some(target), depth) if depth > 0 => DragPhase::DraggedOver(target.clone()),
                _ => DragPhase::Dragging,
            },
        }
    }
}
