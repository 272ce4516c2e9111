use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A node in a scanned workspace tree.
///
/// `children` is `None` for files and for directories whose contents have not
/// been scanned; `Some(vec![])` means the directory is known to be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

/// A flattened representation of a tree node for painting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    pub depth: usize,
    pub is_last_sibling: bool,
    /// Children are known (a scanned directory).
    pub is_loaded: bool,
}

impl FileNode {
    /// A file leaf.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: display_name(&path),
            path,
            is_directory: false,
            children: None,
        }
    }

    /// A scanned directory with the given children.
    pub fn directory(path: impl Into<PathBuf>, children: Vec<FileNode>) -> Self {
        let path = path.into();
        Self {
            name: display_name(&path),
            path,
            is_directory: true,
            children: Some(children),
        }
    }

    /// Find a node by path.
    pub fn find(&self, target: &Path) -> Option<&FileNode> {
        if self.path == target {
            return Some(self);
        }
        if !target.starts_with(&self.path) {
            return None;
        }
        self.children
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find_map(|child| child.find(target))
    }

    /// Whether `target` is this node or anywhere beneath it.
    pub fn contains(&self, target: &Path) -> bool {
        self.find(target).is_some()
    }

    /// Names of the immediate children, if known.
    pub fn child_names(&self) -> Option<Vec<&str>> {
        self.children
            .as_ref()
            .map(|children| children.iter().map(|c| c.name.as_str()).collect())
    }

    /// Total number of nodes in this subtree, including itself.
    pub fn count(&self) -> usize {
        1 + self
            .children
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(FileNode::count)
            .sum::<usize>()
    }

    /// Depth-first list of every node, with depth and sibling position.
    ///
    /// The root is always included at depth 0.
    pub fn flatten(&self) -> Vec<FlatItem> {
        let mut items = Vec::with_capacity(self.count());
        Self::flatten_node(self, &mut items, 0, true);
        items
    }

    fn flatten_node(node: &FileNode, items: &mut Vec<FlatItem>, depth: usize, is_last: bool) {
        items.push(FlatItem {
            name: node.name.clone(),
            path: node.path.clone(),
            is_directory: node.is_directory,
            depth,
            is_last_sibling: is_last,
            is_loaded: node.children.is_some(),
        });

        if let Some(children) = &node.children {
            for (i, child) in children.iter().enumerate() {
                let is_last_child = i == children.len() - 1;
                Self::flatten_node(child, items, depth + 1, is_last_child);
            }
        }
    }
}

/// Last path segment as shown in the tree.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Whether `candidate` lies strictly beneath `ancestor`.
pub fn is_descendant(candidate: &Path, ancestor: &Path) -> bool {
    candidate != ancestor && candidate.starts_with(ancestor)
}

/// Prefix substitution: map `path` from under `from` to under `to`.
///
/// Returns `None` when `path` is not `from` or one of its descendants.
pub fn rebase(path: &Path, from: &Path, to: &Path) -> Option<PathBuf> {
    let rest = path.strip_prefix(from).ok()?;
    if rest.as_os_str().is_empty() {
        Some(to.to_path_buf())
    } else {
        Some(to.join(rest))
    }
}
