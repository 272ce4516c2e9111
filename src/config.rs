//! Configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--root`, `--log`)
//! 2. `$NWS_CONFIG` environment variable (path to config file)
//! 3. Project-local `.nws.toml` in the current working directory
//! 4. Global `~/.config/nws/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, WorkspaceError};
use crate::fs::local::{LocalFsOptions, DEFAULT_NOTE_EXTENSIONS};
use crate::workspace::WorkspaceOptions;

// ── Section configs ──────────────────────────────────────────────────────────

/// Which workspace to open.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Root opened when none is given on the command line.
    pub default_root: Option<String>,
}

/// Tree scanning.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    /// Window in which unforced refreshes reuse the cached tree.
    pub debounce_ms: Option<u64>,
    /// Note extensions shown in the tree, without the dot.
    pub extensions: Option<Vec<String>>,
}

/// Default names for new items.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CreateConfig {
    pub note_name: Option<String>,
    pub folder_name: Option<String>,
    /// Extension appended to note names that have none.
    pub note_extension: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive such as `info` or `note_workspace=debug`.
    pub level: Option<String>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub workspace: WorkspaceConfig,
    pub scan: ScanConfig,
    pub create: CreateConfig,
    pub logging: LoggingConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_NOTE_NAME: &str = "Untitled";
pub const DEFAULT_FOLDER_NAME: &str = "New Folder";
pub const DEFAULT_NOTE_EXTENSION: &str = "md";
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path, which is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("NWS_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".nws.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("nws").join("config.toml"));
    }

    paths
}

/// Read and parse one config file.
fn read_file(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str::<AppConfig>(&content)
        .map_err(|e| WorkspaceError::Config(format!("{}: {}", path.display(), e)))
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning printed to stderr).
fn load_file(path: &Path) -> Option<AppConfig> {
    match read_file(path) {
        Ok(cfg) => Some(cfg),
        Err(WorkspaceError::Io(_)) => None,
        Err(e) => {
            eprintln!("Warning: skipping config file: {}", e);
            None
        }
    }
}

fn or_list(over: &Option<Vec<String>>, base: Option<Vec<String>>) -> Option<Vec<String>> {
    over.clone().or(base)
}

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            workspace: WorkspaceConfig {
                default_root: other
                    .workspace
                    .default_root
                    .clone()
                    .or(self.workspace.default_root),
            },
            scan: ScanConfig {
                debounce_ms: other.scan.debounce_ms.or(self.scan.debounce_ms),
                extensions: or_list(&other.scan.extensions, self.scan.extensions),
            },
            create: CreateConfig {
                note_name: other.create.note_name.clone().or(self.create.note_name),
                folder_name: other.create.folder_name.clone().or(self.create.folder_name),
                note_extension: other
                    .create
                    .note_extension
                    .clone()
                    .or(self.create.note_extension),
            },
            logging: LoggingConfig {
                level: other.logging.level.clone().or(self.logging.level),
            },
        }
    }

    fn merge_candidates(mut config: AppConfig) -> AppConfig {
        // Lowest priority first so that higher ones overwrite.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }
        config
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = Self::merge_candidates(AppConfig::default());

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    /// Like [`load`](Self::load), but a `--config` file that is missing or
    /// malformed is an error instead of being skipped.
    pub fn try_load(
        cli_config_path: Option<&Path>,
        cli_overrides: Option<&AppConfig>,
    ) -> Result<AppConfig> {
        let mut config = Self::merge_candidates(AppConfig::default());

        if let Some(cli_path) = cli_config_path {
            let file_cfg = read_file(cli_path).map_err(|e| match e {
                WorkspaceError::Io(io) => {
                    WorkspaceError::Config(format!("{}: {}", cli_path.display(), io))
                }
                other => other,
            })?;
            config = config.merge(&file_cfg);
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        Ok(config)
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn default_root(&self) -> Option<PathBuf> {
        self.workspace.default_root.as_ref().map(PathBuf::from)
    }

    pub fn debounce_ms(&self) -> u64 {
        self.scan.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms())
    }

    /// Lowercased note extensions, leading dots stripped.
    pub fn extensions(&self) -> Vec<String> {
        match &self.scan.extensions {
            Some(list) => list
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
            None => DEFAULT_NOTE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn note_name(&self) -> &str {
        self.create.note_name.as_deref().unwrap_or(DEFAULT_NOTE_NAME)
    }

    pub fn folder_name(&self) -> &str {
        self.create.folder_name.as_deref().unwrap_or(DEFAULT_FOLDER_NAME)
    }

    pub fn note_extension(&self) -> &str {
        self.create
            .note_extension
            .as_deref()
            .map(|ext| ext.trim_start_matches('.'))
            .unwrap_or(DEFAULT_NOTE_EXTENSION)
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Engine settings derived from this config.
    pub fn workspace_options(&self) -> WorkspaceOptions {
        WorkspaceOptions {
            debounce: self.debounce(),
            note_name: self.note_name().to_string(),
            folder_name: self.folder_name().to_string(),
            note_extension: self.note_extension().to_string(),
        }
    }

    /// Disk service settings derived from this config.
    pub fn local_fs_options(&self) -> LocalFsOptions {
        LocalFsOptions {
            extensions: self.extensions(),
            note_name: self.note_name().to_string(),
            folder_name: self.folder_name().to_string(),
            note_extension: self.note_extension().to_string(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
