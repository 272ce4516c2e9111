//! The single "being renamed" slot.
//!
//! Kept apart from the tree cache so a refresh elsewhere never drops edit
//! focus. The overlay does not watch the cache: when the edited node is
//! deleted, the caller must call [`EditingOverlay::end_edit`].

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::fs::node::display_name;
use crate::fs::validate::{validate_name, ValidationError};

/// Text buffer of an inline rename input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameDraft {
    pub input: String,
    /// Byte offset of the cursor, always on a char boundary.
    pub cursor: usize,
}

impl RenameDraft {
    /// Draft seeded with `name`, cursor at the end.
    pub fn new(name: &str) -> Self {
        Self {
            input: name.to_string(),
            cursor: name.len(),
        }
    }

    /// Insert a character at the current cursor position.
    pub fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Delete the character before the cursor (backspace).
    pub fn delete_char(&mut self) {
        if let Some(prev) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= prev.len_utf8();
            self.input.remove(self.cursor);
        }
    }

    pub fn move_left(&mut self) {
        if let Some(prev) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= prev.len_utf8();
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = self.input[self.cursor..].chars().next() {
            self.cursor += next.len_utf8();
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.input.len();
    }

    /// Run the single-name validator on the current input.
    pub fn validation(&self) -> Result<(), ValidationError> {
        validate_name(&self.input)
    }
}

#[derive(Debug, Default)]
struct EditState {
    path: Option<PathBuf>,
    draft: Option<RenameDraft>,
}

/// At most one path in rename mode.
#[derive(Debug, Default)]
pub struct EditingOverlay {
    state: Mutex<EditState>,
}

impl EditingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EditState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Put `path` in edit mode, ending any previous edit.
    pub fn begin_edit(&self, path: &Path) {
        let mut state = self.lock();
        state.path = Some(path.to_path_buf());
        state.draft = None;
    }

    /// Like [`begin_edit`](Self::begin_edit), with a draft holding the
    /// current name.
    pub fn begin_rename(&self, path: &Path) -> RenameDraft {
        let draft = RenameDraft::new(&display_name(path));
        let mut state = self.lock();
        state.path = Some(path.to_path_buf());
        state.draft = Some(draft.clone());
        draft
    }

    pub fn end_edit(&self) {
        let mut state = self.lock();
        state.path = None;
        state.draft = None;
    }

    pub fn is_editing(&self, path: &Path) -> bool {
        self.lock().path.as_deref() == Some(path)
    }

    pub fn editing_path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    pub fn draft(&self) -> Option<RenameDraft> {
        self.lock().draft.clone()
    }

    /// Validator verdict for the current draft, if one is active.
    pub fn draft_validation(&self) -> Option<Result<(), ValidationError>> {
        self.lock().draft.as_ref().map(RenameDraft::validation)
    }

    /// Apply a keystroke to the draft and validate the result.
    ///
    /// Returns `None` when no rename draft is active.
    pub fn update_draft<F>(&self, edit: F) -> Option<Result<(), ValidationError>>
    where
        F: FnOnce(&mut RenameDraft),
    {
        let mut state = self.lock();
        let draft = state.draft.as_mut()?;
        edit(draft);
        Some(draft.validation())
    }
}
