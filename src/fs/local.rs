//! Local-disk implementation of [`FsService`].
//!
//! All disk work is blocking `std::fs` code run on tokio's blocking pool.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::fs::node::{display_name, FileNode};
use crate::fs::service::{FsError, FsResult, FsService};

/// Extensions included in scans by default.
pub const DEFAULT_NOTE_EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "mkd"];

/// Upper bound on `Name N` disambiguation attempts.
const MAX_COLLISION_ATTEMPTS: usize = 9999;

/// Naming and filtering settings for [`LocalFs`].
#[derive(Debug, Clone)]
pub struct LocalFsOptions {
    /// Lowercase extensions (without the dot) shown in the tree.
    pub extensions: Vec<String>,
    /// Base name for notes created without a name.
    pub note_name: String,
    /// Base name for folders created without a name.
    pub folder_name: String,
    /// Extension appended to note names that have none.
    pub note_extension: String,
}

impl Default for LocalFsOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_NOTE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            note_name: "Untitled".to_string(),
            folder_name: "New Folder".to_string(),
            note_extension: "md".to_string(),
        }
    }
}

/// Filesystem service backed by the local disk.
#[derive(Debug, Clone, Default)]
pub struct LocalFs {
    options: LocalFsOptions,
}

impl LocalFs {
    pub fn new(options: LocalFsOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LocalFsOptions {
        &self.options
    }
}

/// Run blocking disk work off the async executor.
async fn blocking<T, F>(work: F) -> FsResult<T>
where
    F: FnOnce() -> FsResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| FsError::new(format!("background task failed: {}", e)))?
}

#[async_trait]
impl FsService for LocalFs {
    async fn scan_directory(&self, path: &Path) -> FsResult<FileNode> {
        let path = path.to_path_buf();
        let extensions = self.options.extensions.clone();
        blocking(move || scan(&path, &extensions)).await
    }

    async fn create_directory(&self, parent: &Path, name: Option<&str>) -> FsResult<PathBuf> {
        let parent = parent.to_path_buf();
        let name = name.unwrap_or(&self.options.folder_name).to_string();
        blocking(move || create_dir(&parent, &name)).await
    }

    async fn create_file(&self, parent: &Path, name: Option<&str>) -> FsResult<PathBuf> {
        let parent = parent.to_path_buf();
        let name = name.unwrap_or(&self.options.note_name).to_string();
        let ext = self.options.note_extension.clone();
        blocking(move || create_note(&parent, &name, &ext)).await
    }

    async fn delete_file_or_directory(&self, path: &Path) -> FsResult<()> {
        let path = path.to_path_buf();
        blocking(move || delete(&path)).await
    }

    async fn rename_file_or_directory(
        &self,
        old_path: &Path,
        new_name: &str,
    ) -> FsResult<PathBuf> {
        let old_path = old_path.to_path_buf();
        let new_name = new_name.to_string();
        blocking(move || rename(&old_path, &new_name)).await
    }

    async fn move_file_or_directory(
        &self,
        source: &Path,
        target_parent: &Path,
    ) -> FsResult<PathBuf> {
        let source = source.to_path_buf();
        let target_parent = target_parent.to_path_buf();
        blocking(move || move_item(&source, &target_parent)).await
    }

    async fn create_nested_path(&self, root: &Path, relative: &str) -> FsResult<PathBuf> {
        let root = root.to_path_buf();
        let relative = relative.to_string();
        let ext = self.options.note_extension.clone();
        blocking(move || create_nested(&root, &relative, &ext)).await
    }
}

fn reject_traversal(path: &Path) -> FsResult<()> {
    if path.to_string_lossy().contains("..") {
        return Err(FsError::new("Path traversal not allowed"));
    }
    Ok(())
}

fn require_dir(path: &Path) -> FsResult<()> {
    reject_traversal(path)?;
    if !path.is_dir() {
        return Err(FsError::new(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    Ok(())
}

fn has_note_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| extensions.iter().any(|x| *x == e))
}

/// Recursive scan: directories plus note files, directories first.
pub fn scan(root: &Path, extensions: &[String]) -> FsResult<FileNode> {
    require_dir(root)?;
    fs::read_dir(root).map_err(|e| FsError::new(format!("Cannot read directory: {}", e)))?;
    let tree = build_tree(root, extensions)?;
    debug!(root = %root.display(), nodes = tree.count(), "scanned directory");
    Ok(tree)
}

fn build_tree(path: &Path, extensions: &[String]) -> FsResult<FileNode> {
    let mut children = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let entry_path = entry.path();
        let is_symlink = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);

        // Symlinked directories are skipped so a link cycle cannot recurse forever.
        if entry_path.is_dir() && !is_symlink {
            if let Ok(child) = build_tree(&entry_path, extensions) {
                children.push(child);
            }
        } else if entry_path.is_file() && has_note_extension(&entry_path, extensions) {
            children.push(FileNode::file(entry_path));
        }
    }

    sort_children(&mut children);
    Ok(FileNode::directory(path, children))
}

/// Directories before files, each alphabetical ignoring case.
fn sort_children(children: &mut [FileNode]) {
    children.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// First free path among `stem.ext`, `stem 1.ext`, `stem 2.ext`, ...
pub fn unique_path(parent: &Path, stem: &str, ext: Option<&str>) -> FsResult<PathBuf> {
    let file_name = |suffix: Option<usize>| {
        let base = match suffix {
            Some(n) => format!("{} {}", stem, n),
            None => stem.to_string(),
        };
        match ext {
            Some(e) => format!("{}.{}", base, e),
            None => base,
        }
    };

    let first = parent.join(file_name(None));
    if !first.exists() {
        return Ok(first);
    }
    for n in 1..=MAX_COLLISION_ATTEMPTS {
        let candidate = parent.join(file_name(Some(n)));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(FsError::new("Too many similar files exist"))
}

/// Split a note name into stem and extension, defaulting the extension.
fn split_note_name<'a>(name: &'a str, default_ext: &'a str) -> (&'a str, &'a str) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, ext),
        _ => (name, default_ext),
    }
}

/// Create a note with a heading template, disambiguating the name.
pub fn create_note(parent: &Path, name: &str, default_ext: &str) -> FsResult<PathBuf> {
    require_dir(parent)?;
    let (stem, ext) = split_note_name(name, default_ext);
    let path = unique_path(parent, stem, Some(ext))?;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| FsError::new(format!("Failed to create file: {}", e)))?;
    writeln!(file, "# {}\n", stem)?;
    Ok(path)
}

/// Create a folder, disambiguating the name.
pub fn create_dir(parent: &Path, name: &str) -> FsResult<PathBuf> {
    require_dir(parent)?;
    let path = unique_path(parent, name, None)?;
    fs::create_dir(&path).map_err(|e| FsError::new(format!("Failed to create directory: {}", e)))?;
    Ok(path)
}

/// Delete a file or directory. Directories are removed recursively.
pub fn delete(path: &Path) -> FsResult<()> {
    reject_traversal(path)?;
    if path.parent().is_none() {
        return Err(FsError::new("Cannot delete a filesystem root"));
    }
    if path.is_dir() {
        fs::remove_dir_all(path)
            .map_err(|e| FsError::new(format!("Failed to delete directory: {}", e)))?;
    } else {
        fs::remove_file(path).map_err(|e| FsError::new(format!("Failed to delete file: {}", e)))?;
    }
    Ok(())
}

/// Rename in place. Files keep their extension when `new_name` has none.
pub fn rename(old_path: &Path, new_name: &str) -> FsResult<PathBuf> {
    reject_traversal(old_path)?;
    if !old_path.exists() {
        return Err(FsError::new(format!(
            "{} does not exist",
            old_path.display()
        )));
    }
    let parent = old_path
        .parent()
        .ok_or_else(|| FsError::new("Cannot determine parent directory"))?;

    let new_path = match old_path.extension() {
        Some(ext) if old_path.is_file() && Path::new(new_name).extension().is_none() => {
            parent.join(format!("{}.{}", new_name, ext.to_string_lossy()))
        }
        _ => parent.join(new_name),
    };

    if new_path.exists() {
        return Err(FsError::new(
            "A file or directory with this name already exists",
        ));
    }

    fs::rename(old_path, &new_path).map_err(|e| FsError::new(format!("Failed to rename: {}", e)))?;
    Ok(new_path)
}

/// Move a file or directory into `dest_dir`.
///
/// Uses `fs::rename` first (fast, same-device). Falls back to copy+delete
/// if rename fails (cross-device). Returns the final path.
pub fn move_item(src: &Path, dest_dir: &Path) -> FsResult<PathBuf> {
    reject_traversal(src)?;
    require_dir(dest_dir)?;
    if dest_dir.starts_with(src) {
        return Err(FsError::new("Cannot move a folder into itself"));
    }
    let name = display_name(src);
    let dest = if src.is_dir() {
        unique_path(dest_dir, &name, None)?
    } else {
        let (stem, ext) = split_note_name(&name, "");
        if ext.is_empty() {
            unique_path(dest_dir, stem, None)?
        } else {
            unique_path(dest_dir, stem, Some(ext))?
        }
    };

    if fs::rename(src, &dest).is_err() {
        if src.is_dir() {
            copy_dir_recursive(src, &dest)?;
            fs::remove_dir_all(src)?;
        } else {
            fs::copy(src, &dest)?;
            fs::remove_file(src)?;
        }
    }
    Ok(dest)
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> FsResult<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dest_path)?;
        } else {
            fs::copy(&src_path, &dest_path)?;
        }
    }
    Ok(())
}

/// Create a relative path under `root`, making intermediate directories.
///
/// Ends in a separator: directories only. Otherwise the last segment is an
/// empty note file, which must not already exist.
pub fn create_nested(root: &Path, relative: &str, default_ext: &str) -> FsResult<PathBuf> {
    require_dir(root)?;
    if relative.contains("..") {
        return Err(FsError::new("Path traversal not allowed"));
    }
    let dir_only = relative.ends_with(['/', '\\']);
    let mut segments: Vec<&str> = relative
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect();
    let file_segment = if dir_only { None } else { segments.pop() };

    let mut dir = root.to_path_buf();
    for segment in &segments {
        dir.push(segment);
    }
    fs::create_dir_all(&dir)
        .map_err(|e| FsError::new(format!("Failed to create directory: {}", e)))?;

    let Some(file_segment) = file_segment else {
        return Ok(dir);
    };

    let (stem, ext) = split_note_name(file_segment, default_ext);
    let path = dir.join(format!("{}.{}", stem, ext));
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| FsError::new(format!("Failed to create file: {}", e)))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exts() -> Vec<String> {
        LocalFsOptions::default().extensions
    }

    fn setup_workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("beta")).unwrap();
        fs::create_dir(dir.path().join("Alpha")).unwrap();
        fs::write(dir.path().join("zeta.md"), "").unwrap();
        fs::write(dir.path().join("image.png"), "").unwrap();
        fs::write(dir.path().join("Alpha").join("inner.MD"), "").unwrap();
        dir
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let tmp = setup_workspace();
        let tree = scan(tmp.path(), &exts()).unwrap();
        let names = tree.child_names().unwrap();
        assert_eq!(names, vec!["Alpha", "beta", "zeta.md"]);
        let alpha = tree.find(&tmp.path().join("Alpha")).unwrap();
        assert_eq!(alpha.child_names().unwrap(), vec!["inner.MD"]);
        let beta = tree.find(&tmp.path().join("beta")).unwrap();
        assert_eq!(beta.children, Some(vec![]));
    }

    #[test]
    fn test_scan_rejects_files_and_traversal() {
        let tmp = setup_workspace();
        assert!(scan(&tmp.path().join("zeta.md"), &exts()).is_err());
        assert!(scan(&tmp.path().join("beta/../Alpha"), &exts()).is_err());
    }

    #[test]
    fn test_create_note_disambiguates() {
        let tmp = TempDir::new().unwrap();
        let first = create_note(tmp.path(), "Untitled", "md").unwrap();
        let second = create_note(tmp.path(), "Untitled", "md").unwrap();
        let third = create_note(tmp.path(), "Untitled", "md").unwrap();
        assert_eq!(first, tmp.path().join("Untitled.md"));
        assert_eq!(second, tmp.path().join("Untitled 1.md"));
        assert_eq!(third, tmp.path().join("Untitled 2.md"));
        assert_eq!(fs::read_to_string(&second).unwrap(), "# Untitled 1\n\n");
    }

    #[test]
    fn test_create_note_keeps_explicit_extension() {
        let tmp = TempDir::new().unwrap();
        let path = create_note(tmp.path(), "readme.markdown", "md").unwrap();
        assert_eq!(path, tmp.path().join("readme.markdown"));
    }

    #[test]
    fn test_create_dir_disambiguates() {
        let tmp = TempDir::new().unwrap();
        let a = create_dir(tmp.path(), "New Folder").unwrap();
        let b = create_dir(tmp.path(), "New Folder").unwrap();
        assert_eq!(a, tmp.path().join("New Folder"));
        assert_eq!(b, tmp.path().join("New Folder 1"));
        assert!(b.is_dir());
    }

    #[test]
    fn test_rename_preserves_file_extension() {
        let tmp = TempDir::new().unwrap();
        let old = tmp.path().join("draft.md");
        fs::write(&old, "x").unwrap();
        let new = rename(&old, "final").unwrap();
        assert_eq!(new, tmp.path().join("final.md"));
        assert!(!old.exists());
        assert_eq!(fs::read_to_string(&new).unwrap(), "x");
    }

    #[test]
    fn test_rename_refuses_existing_target() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "").unwrap();
        fs::write(tmp.path().join("b.md"), "").unwrap();
        assert!(rename(&tmp.path().join("a.md"), "b.md").is_err());
    }

    #[test]
    fn test_rename_nonexistent_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(rename(&tmp.path().join("ghost.md"), "other").is_err());
    }

    #[test]
    fn test_move_file_and_directory() {
        let tmp = setup_workspace();
        let moved = move_item(&tmp.path().join("zeta.md"), &tmp.path().join("beta")).unwrap();
        assert_eq!(moved, tmp.path().join("beta").join("zeta.md"));
        assert!(moved.exists());

        let moved_dir = move_item(&tmp.path().join("Alpha"), &tmp.path().join("beta")).unwrap();
        assert!(moved_dir.join("inner.MD").exists());
        assert!(!tmp.path().join("Alpha").exists());
    }

    #[test]
    fn test_move_with_collision() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("note.md"), "new").unwrap();
        let dest = tmp.path().join("dest");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("note.md"), "existing").unwrap();

        let moved = move_item(&tmp.path().join("note.md"), &dest).unwrap();
        assert_eq!(moved, dest.join("note 1.md"));
        assert_eq!(fs::read_to_string(dest.join("note.md")).unwrap(), "existing");
    }

    #[test]
    fn test_move_into_own_subfolder_fails() {
        let tmp = setup_workspace();
        let src = tmp.path().join("Alpha");
        fs::create_dir(src.join("child")).unwrap();
        assert!(move_item(&src, &src.join("child")).is_err());
        assert!(src.exists());
    }

    #[test]
    fn test_delete_file_and_directory() {
        let tmp = setup_workspace();
        delete(&tmp.path().join("zeta.md")).unwrap();
        delete(&tmp.path().join("Alpha")).unwrap();
        assert!(!tmp.path().join("zeta.md").exists());
        assert!(!tmp.path().join("Alpha").exists());
        assert!(delete(&tmp.path().join("zeta.md")).is_err());
    }

    #[test]
    fn test_delete_refuses_filesystem_root() {
        assert!(delete(Path::new("/")).is_err());
    }

    #[test]
    fn test_create_nested_file_and_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = create_nested(tmp.path(), "projects/2024/plan", "md").unwrap();
        assert_eq!(path, tmp.path().join("projects").join("2024").join("plan.md"));
        assert!(path.is_file());
        // Same file again is refused.
        assert!(create_nested(tmp.path(), "projects/2024/plan", "md").is_err());
    }

    #[test]
    fn test_create_nested_directory_only() {
        let tmp = TempDir::new().unwrap();
        let path = create_nested(tmp.path(), "archive\\old/", "md").unwrap();
        assert_eq!(path, tmp.path().join("archive").join("old"));
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn test_service_round_trip() {
        let tmp = TempDir::new().unwrap();
        let service = LocalFs::default();
        let note = service.create_file(tmp.path(), None).await.unwrap();
        let folder = service.create_directory(tmp.path(), None).await.unwrap();
        let moved = service.move_file_or_directory(&note, &folder).await.unwrap();
        let tree = service.scan_directory(tmp.path()).await.unwrap();
        assert!(tree.contains(&moved));
        assert_eq!(moved, tmp.path().join("New Folder").join("Untitled.md"));
    }
}
