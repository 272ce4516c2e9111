//! Drag payload and its encodings on a host data-transfer object.
//!
//! The engine only ever handles [`DragPayload`]. Hosts differ in which
//! transfer slots survive a drag, so [`encode`] writes the payload into every
//! slot it knows and [`decode`] reads back the first one that parses, in
//! [`PREFERENCE`] order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fs::node::display_name;

pub const FORMAT_JSON: &str = "application/json";
pub const FORMAT_URI_LIST: &str = "text/uri-list";
pub const FORMAT_TEXT: &str = "text/plain";

/// Order in which slots are tried on drop.
pub const PREFERENCE: [&str; 3] = [FORMAT_JSON, FORMAT_URI_LIST, FORMAT_TEXT];

const FILE_SCHEME: &str = "file://";

/// What is being dragged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragPayload {
    pub source_path: PathBuf,
    pub is_directory: bool,
    pub display_name: String,
}

impl DragPayload {
    pub fn new(source_path: impl Into<PathBuf>, is_directory: bool) -> Self {
        let source_path = source_path.into();
        let display_name = display_name(&source_path);
        Self {
            source_path,
            is_directory,
            display_name,
        }
    }
}

/// Format-keyed string slots, as carried by a host drag event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTransfer {
    slots: BTreeMap<String, String>,
}

impl DataTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_data(&mut self, format: &str, data: impl Into<String>) {
        self.slots.insert(format.to_string(), data.into());
    }

    /// Data in `format`; empty slots count as absent.
    pub fn get_data(&self, format: &str) -> Option<&str> {
        self.slots
            .get(format)
            .map(String::as_str)
            .filter(|data| !data.trim().is_empty())
    }

    pub fn clear_data(&mut self) {
        self.slots.clear();
    }

    /// Whether no slot holds any data.
    pub fn is_empty(&self) -> bool {
        self.slots.values().all(|data| data.trim().is_empty())
    }

    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }
}

/// Write `payload` into every supported slot of `transfer`.
pub fn encode(payload: &DragPayload, transfer: &mut DataTransfer) {
    match serde_json::to_string(payload) {
        Ok(json) => transfer.set_data(FORMAT_JSON, json),
        Err(e) => warn!(error = %e, "could not serialize drag payload"),
    }
    transfer.set_data(FORMAT_URI_LIST, to_file_uri(&payload.source_path));
    transfer.set_data(FORMAT_TEXT, payload.source_path.to_string_lossy());
}

/// Recover a payload from the first slot that parses.
///
/// URI and plain-text slots carry only a path; `kind_of` supplies whether it
/// names a directory, and a path it does not know is rejected.
pub fn decode<F>(transfer: &DataTransfer, kind_of: F) -> Option<DragPayload>
where
    F: Fn(&Path) -> Option<bool>,
{
    for format in PREFERENCE {
        let Some(data) = transfer.get_data(format) else {
            continue;
        };
        let parsed = match format {
            FORMAT_JSON => parse_json(data),
            FORMAT_URI_LIST => parse_uri_list(data).and_then(|path| with_kind(path, &kind_of)),
            _ => parse_text(data).and_then(|path| with_kind(path, &kind_of)),
        };
        match parsed {
            Some(payload) => return Some(payload),
            None => debug!(format, "transfer slot did not yield a payload"),
        }
    }
    None
}

fn with_kind<F>(path: PathBuf, kind_of: &F) -> Option<DragPayload>
where
    F: Fn(&Path) -> Option<bool>,
{
    let is_directory = kind_of(&path)?;
    Some(DragPayload::new(path, is_directory))
}

fn parse_json(data: &str) -> Option<DragPayload> {
    let payload: DragPayload = serde_json::from_str(data).ok()?;
    payload.source_path.is_absolute().then_some(payload)
}

/// First `file://` entry of a URI list, percent-decoded.
fn parse_uri_list(data: &str) -> Option<PathBuf> {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .find_map(from_file_uri)
}

fn parse_text(data: &str) -> Option<PathBuf> {
    let mut lines = data.lines().map(str::trim).filter(|line| !line.is_empty());
    let line = lines.next()?;
    if lines.next().is_some() {
        return None;
    }
    if line.starts_with(FILE_SCHEME) {
        return from_file_uri(line);
    }
    let path = PathBuf::from(line);
    path.is_absolute().then_some(path)
}

/// `file://` URI for an absolute path, each segment percent-encoded.
pub fn to_file_uri(path: &Path) -> String {
    let text = path.to_string_lossy();
    let encoded: Vec<String> = text
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}{}", FILE_SCHEME, encoded.join("/"))
}

/// Path named by a `file://` URI. Only local hosts are accepted.
pub fn from_file_uri(uri: &str) -> Option<PathBuf> {
    let rest = uri.strip_prefix(FILE_SCHEME)?;
    let rest = match rest.find('/') {
        Some(0) => rest,
        Some(slash) if &rest[..slash] == "localhost" => &rest[slash..],
        _ => return None,
    };
    let decoded = urlencoding::decode(rest).ok()?;
    let path = PathBuf::from(decoded.into_owned());
    path.is_absolute().then_some(path)
}
