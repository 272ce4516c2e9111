//! Name and path checks run before any create or rename reaches the disk.
//!
//! The rules are the union of what Windows and Unix reject, applied on every
//! host so that a workspace stays portable. Checks run in a fixed order and
//! the first failing rule is reported.

use thiserror::Error;

/// Longest accepted single segment, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Longest accepted multi-segment relative path, in characters.
pub const MAX_RELATIVE_PATH_LEN: usize = 200;

/// Characters rejected anywhere in a name.
pub const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Legacy device names, matched case-insensitively against the part of a
/// segment before its first dot.
pub const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// What shape of input is being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// A single file or folder name (rename, create with a name).
    Segment,
    /// A relative path that may contain separators (quick create).
    RelativePath,
}

impl NameKind {
    fn max_len(self) -> usize {
        match self {
            NameKind::Segment => MAX_NAME_LEN,
            NameKind::RelativePath => MAX_RELATIVE_PATH_LEN,
        }
    }
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name cannot be empty")]
    Empty,
    #[error("parent directory references (..) are not allowed")]
    ParentTraversal,
    #[error("name cannot contain a path separator")]
    Separator,
    #[error("path must be relative to the workspace")]
    Absolute,
    #[error("path contains an empty segment")]
    EmptySegment,
    #[error("name is longer than {max} characters")]
    TooLong { max: usize },
    #[error("character {0:?} is not allowed")]
    ReservedCharacter(char),
    #[error("{0:?} is a reserved name")]
    ReservedName(String),
    #[error("names cannot end with a dot or a space")]
    TrailingDotOrSpace,
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Validate a candidate name or relative path.
pub fn validate(candidate: &str, kind: NameKind) -> Result<(), ValidationError> {
    if candidate.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    if candidate.contains("..") {
        return Err(ValidationError::ParentTraversal);
    }

    let segments = match kind {
        NameKind::Segment => {
            if candidate.contains(is_separator) {
                return Err(ValidationError::Separator);
            }
            vec![candidate]
        }
        NameKind::RelativePath => relative_segments(candidate)?,
    };

    if candidate.chars().count() > kind.max_len() {
        return Err(ValidationError::TooLong {
            max: kind.max_len(),
        });
    }

    if let Some(c) = candidate
        .chars()
        .find(|c| RESERVED_CHARS.contains(c) || c.is_control())
    {
        return Err(ValidationError::ReservedCharacter(c));
    }

    for segment in &segments {
        let base = segment.split('.').next().unwrap_or_default();
        if RESERVED_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(base))
        {
            return Err(ValidationError::ReservedName(segment.to_string()));
        }
    }

    if segments
        .iter()
        .any(|s| s.ends_with('.') || s.ends_with(' '))
    {
        return Err(ValidationError::TrailingDotOrSpace);
    }

    Ok(())
}

/// Split a relative path into its segments.
///
/// A single trailing separator is allowed and marks a directory-only path.
fn relative_segments(candidate: &str) -> Result<Vec<&str>, ValidationError> {
    if candidate.starts_with(is_separator) {
        return Err(ValidationError::Absolute);
    }
    let trimmed = candidate
        .strip_suffix(is_separator)
        .unwrap_or(candidate);
    let segments: Vec<&str> = trimmed.split(is_separator).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ValidationError::EmptySegment);
    }
    Ok(segments)
}

/// Validate a single file or folder name.
pub fn validate_name(candidate: &str) -> Result<(), ValidationError> {
    validate(candidate, NameKind::Segment)
}

/// Validate a workspace-relative path for quick create.
pub fn validate_relative_path(candidate: &str) -> Result<(), ValidationError> {
    validate(candidate, NameKind::RelativePath)
}

/// Whether a relative path asks for a directory only (ends in a separator).
pub fn is_directory_only(relative: &str) -> bool {
    relative.ends_with(is_separator)
}
