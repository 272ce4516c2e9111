//! In-memory [`FsService`] for engine tests. Records every request.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::fs::node::{display_name, rebase, FileNode};
use crate::fs::service::{FsError, FsResult, FsService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Scan(PathBuf),
    CreateDirectory(PathBuf, Option<String>),
    CreateFile(PathBuf, Option<String>),
    Delete(PathBuf),
    Rename(PathBuf, String),
    Move(PathBuf, PathBuf),
    CreateNested(PathBuf, String),
}

#[derive(Default)]
struct Entries {
    dirs: BTreeSet<PathBuf>,
    files: BTreeSet<PathBuf>,
}

impl Entries {
    fn exists(&self, path: &Path) -> bool {
        self.dirs.contains(path) || self.files.contains(path)
    }

    fn rebase_all(&mut self, from: &Path, to: &Path) {
        let remap = |set: &BTreeSet<PathBuf>| -> BTreeSet<PathBuf> {
            set.iter()
                .map(|p| rebase(p, from, to).unwrap_or_else(|| p.clone()))
                .collect()
        };
        self.dirs = remap(&self.dirs);
        self.files = remap(&self.files);
    }

    fn build(&self, dir: &Path) -> FileNode {
        let mut children: Vec<FileNode> = self
            .dirs
            .iter()
            .filter(|d| d.parent() == Some(dir))
            .map(|d| self.build(d))
            .collect();
        children.extend(
            self.files
                .iter()
                .filter(|f| f.parent() == Some(dir))
                .map(|f| FileNode::file(f.clone())),
        );
        FileNode::directory(dir, children)
    }
}

/// Workspace held in memory. Does not disambiguate names: creating over an
/// existing entry fails, so tests see whether the caller picked a free name.
#[derive(Default)]
pub struct MemoryFs {
    entries: Mutex<Entries>,
    calls: Mutex<Vec<Call>>,
    fail_scans: AtomicBool,
    fail_mutations: AtomicBool,
    scan_yields: AtomicUsize,
}

impl MemoryFs {
    pub fn new(root: &str, dirs: &[&str], files: &[&str]) -> Self {
        let fs = Self::default();
        {
            let mut entries = fs.entries.lock().unwrap();
            entries.dirs.insert(PathBuf::from(root));
            entries.dirs.extend(dirs.iter().map(PathBuf::from));
            entries.files.extend(files.iter().map(PathBuf::from));
        }
        fs
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scan_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Scan(_)))
            .count()
    }

    pub fn mutation_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Scan(_)))
            .collect()
    }

    pub fn set_fail_scans(&self, fail: bool) {
        self.fail_scans.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Keep each scan pending for this many executor turns.
    pub fn set_scan_yields(&self, yields: usize) {
        self.scan_yields.store(yields, Ordering::SeqCst);
    }

    pub fn add_file(&self, path: &str) {
        self.entries.lock().unwrap().files.insert(PathBuf::from(path));
    }

    fn record(&self, call: Call) -> FsResult<()> {
        let is_scan = matches!(call, Call::Scan(_));
        self.calls.lock().unwrap().push(call);
        if !is_scan && self.fail_mutations.load(Ordering::SeqCst) {
            return Err(FsError::new("backend unavailable"));
        }
        Ok(())
    }

    fn create(&self, parent: &Path, name: &str, is_dir: bool) -> FsResult<PathBuf> {
        let mut entries = self.entries.lock().unwrap();
        if !entries.dirs.contains(parent) {
            return Err(FsError::new("parent does not exist"));
        }
        let path = parent.join(name);
        if entries.exists(&path) {
            return Err(FsError::new("already exists"));
        }
        if is_dir {
            entries.dirs.insert(path.clone());
        } else {
            entries.files.insert(path.clone());
        }
        Ok(path)
    }
}

#[async_trait]
impl FsService for MemoryFs {
    async fn scan_directory(&self, path: &Path) -> FsResult<FileNode> {
        self.record(Call::Scan(path.to_path_buf()))?;
        for _ in 0..self.scan_yields.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        if self.fail_scans.load(Ordering::SeqCst) {
            return Err(FsError::new("scan failed"));
        }
        let entries = self.entries.lock().unwrap();
        if !entries.dirs.contains(path) {
            return Err(FsError::new("Directory does not exist"));
        }
        Ok(entries.build(path))
    }

    async fn create_directory(&self, parent: &Path, name: Option<&str>) -> FsResult<PathBuf> {
        self.record(Call::CreateDirectory(
            parent.to_path_buf(),
            name.map(str::to_string),
        ))?;
        self.create(parent, name.unwrap_or("New Folder"), true)
    }

    async fn create_file(&self, parent: &Path, name: Option<&str>) -> FsResult<PathBuf> {
        self.record(Call::CreateFile(parent.to_path_buf(), name.map(str::to_string)))?;
        self.create(parent, name.unwrap_or("Untitled.md"), false)
    }

    async fn delete_file_or_directory(&self, path: &Path) -> FsResult<()> {
        self.record(Call::Delete(path.to_path_buf()))?;
        let mut entries = self.entries.lock().unwrap();
        if !entries.exists(path) {
            return Err(FsError::new("not found"));
        }
        entries.dirs.retain(|d| !d.starts_with(path));
        entries.files.retain(|f| !f.starts_with(path));
        Ok(())
    }

    async fn rename_file_or_directory(
        &self,
        old_path: &Path,
        new_name: &str,
    ) -> FsResult<PathBuf> {
        self.record(Call::Rename(old_path.to_path_buf(), new_name.to_string()))?;
        let mut entries = self.entries.lock().unwrap();
        let parent = old_path
            .parent()
            .ok_or_else(|| FsError::new("no parent"))?;
        let new_path = parent.join(new_name);
        if !entries.exists(old_path) {
            return Err(FsError::new("not found"));
        }
        if entries.exists(&new_path) {
            return Err(FsError::new("already exists"));
        }
        entries.rebase_all(old_path, &new_path);
        Ok(new_path)
    }

    async fn move_file_or_directory(
        &self,
        source: &Path,
        target_parent: &Path,
    ) -> FsResult<PathBuf> {
        self.record(Call::Move(source.to_path_buf(), target_parent.to_path_buf()))?;
        let mut entries = self.entries.lock().unwrap();
        if !entries.exists(source) || !entries.dirs.contains(target_parent) {
            return Err(FsError::new("not found"));
        }
        let new_path = target_parent.join(display_name(source));
        if entries.exists(&new_path) {
            return Err(FsError::new("already exists"));
        }
        entries.rebase_all(source, &new_path);
        Ok(new_path)
    }

    async fn create_nested_path(&self, root: &Path, relative: &str) -> FsResult<PathBuf> {
        self.record(Call::CreateNested(root.to_path_buf(), relative.to_string()))?;
        let mut entries = self.entries.lock().unwrap();
        let dir_only = relative.ends_with('/');
        let mut current = root.to_path_buf();
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        for (i, segment) in segments.iter().enumerate() {
            current.push(segment);
            if i + 1 == segments.len() && !dir_only {
                if entries.exists(&current) {
                    return Err(FsError::new("already exists"));
                }
                entries.files.insert(current.clone());
            } else {
                entries.dirs.insert(current.clone());
            }
        }
        Ok(current)
    }
}
