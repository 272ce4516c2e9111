pub mod local;
#[cfg(test)]
pub mod memory;
pub mod node;
pub mod service;
pub mod validate;

pub use node::{FileNode, FlatItem};
pub use service::{FsError, FsResult, FsService};
