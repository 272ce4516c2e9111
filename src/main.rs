use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;

use note_workspace::config::{AppConfig, LoggingConfig, WorkspaceConfig};
use note_workspace::fs::local::LocalFs;
use note_workspace::fs::node::FileNode;
use note_workspace::fs::validate::{validate, NameKind};
use note_workspace::session::{default_session_path, Session};
use note_workspace::{logging, Result, Workspace, WorkspaceError};

/// Inspect and edit a notes workspace.
#[derive(Parser, Debug)]
#[command(name = "nws", version, about)]
struct Cli {
    /// Config file, applied over the discovered ones
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root (defaults to the configured or last opened one)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Log filter such as `debug`; NWS_LOG takes precedence
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a name or relative path without touching the disk
    Check {
        candidate: String,
        /// Validate as a multi-segment relative path
        #[arg(long)]
        path: bool,
    },

    #[command(flatten)]
    Workspace(WorkspaceCommand),
}

/// Commands that open the workspace. Paths are relative to its root.
#[derive(Subcommand, Debug)]
enum WorkspaceCommand {
    /// Print the tree
    Tree,
    /// Create a note
    NewNote {
        parent: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Create a folder
    NewFolder {
        parent: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Create a note, or folders when it ends in `/`, creating parents as needed
    Quick { relative: String },
    /// Rename a note or folder
    Rename { path: PathBuf, name: String },
    /// Move a note or folder into another folder
    Mv { source: PathBuf, dest: PathBuf },
    /// Delete a note or folder and everything in it
    Rm {
        path: PathBuf,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let overrides = AppConfig {
        workspace: WorkspaceConfig {
            default_root: cli.root.as_ref().map(|p| p.display().to_string()),
        },
        logging: LoggingConfig {
            level: cli.log.clone(),
        },
        ..Default::default()
    };
    let config = match AppConfig::try_load(cli.config.as_deref(), Some(&overrides)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(config.log_level());

    let result = match cli.command {
        Command::Check { candidate, path } => check(&candidate, path),
        Command::Workspace(command) => run(command, &config).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn check(candidate: &str, as_path: bool) -> Result<()> {
    let kind = if as_path {
        NameKind::RelativePath
    } else {
        NameKind::Segment
    };
    validate(candidate, kind)?;
    println!("ok");
    Ok(())
}

async fn run(command: WorkspaceCommand, config: &AppConfig) -> Result<()> {
    let root = resolve_root(config)?;
    let service = Arc::new(LocalFs::new(config.local_fs_options()));
    let workspace = Workspace::new(service, config.workspace_options());

    let Some(tree) = workspace.open(&root).await else {
        return Err(failure(&workspace));
    };
    remember(&root);

    let changed = match command {
        WorkspaceCommand::Tree => {
            print!("{}", render_tree(&tree));
            return Ok(());
        }
        WorkspaceCommand::NewNote { parent, name } => {
            workspace
                .create_file(&under(&root, &parent), name.as_deref())
                .await
        }
        WorkspaceCommand::NewFolder { parent, name } => {
            workspace
                .create_directory(&under(&root, &parent), name.as_deref())
                .await
        }
        WorkspaceCommand::Quick { relative } => workspace.create_at_path(&root, &relative).await,
        WorkspaceCommand::Rename { path, name } => {
            workspace.rename(&under(&root, &path), &name).await
        }
        WorkspaceCommand::Mv { source, dest } => {
            workspace
                .move_item(&under(&root, &source), &under(&root, &dest))
                .await
        }
        WorkspaceCommand::Rm { path, yes } => {
            if !yes {
                return Err(WorkspaceError::Operation(
                    "refusing to delete without --yes".to_string(),
                ));
            }
            workspace.delete(&under(&root, &path)).await
        }
    };

    match changed {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => Err(failure(&workspace)),
    }
}

/// `--root`/config, else the last opened workspace, else the current dir.
fn resolve_root(config: &AppConfig) -> Result<PathBuf> {
    let root = config
        .default_root()
        .or_else(|| {
            let session = Session::load(&default_session_path()?).ok()?;
            session.last_workspace().map(Path::to_path_buf)
        })
        .unwrap_or_else(|| PathBuf::from("."));
    root.canonicalize()
        .map_err(|e| WorkspaceError::Operation(format!("{}: {}", root.display(), e)))
}

/// `path` joined onto `root` unless absolute, with `.` segments dropped.
fn under(root: &Path, path: &Path) -> PathBuf {
    root.join(path).components().collect()
}

fn failure(workspace: &Workspace) -> WorkspaceError {
    workspace
        .take_last_error()
        .unwrap_or_else(|| WorkspaceError::Operation("unknown failure".to_string()))
}

fn remember(root: &Path) {
    let Some(path) = default_session_path() else {
        return;
    };
    match Session::load(&path) {
        Ok(mut session) => {
            session.remember(root);
            if let Err(e) = session.save(&path) {
                warn!(error = %e, "could not save session");
            }
        }
        Err(e) => warn!(error = %e, "session file unreadable, leaving it as is"),
    }
}

fn render_tree(tree: &FileNode) -> String {
    let mut out = String::new();
    // Whether each open ancestor level was the last of its siblings.
    let mut lasts: Vec<bool> = Vec::new();
    for item in tree.flatten() {
        if item.depth == 0 {
            out.push_str(&format!("{}\n", item.path.display()));
            continue;
        }
        lasts.truncate(item.depth - 1);
        for &last in &lasts {
            out.push_str(if last { "    " } else { "│   " });
        }
        out.push_str(if item.is_last_sibling { "└── " } else { "├── " });
        out.push_str(&item.name);
        if item.is_directory {
            out.push('/');
        }
        out.push('\n');
        lasts.push(item.is_last_sibling);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_flattened_subcommands() {
        let cli = Cli::try_parse_from(["nws", "--root", "/notes", "mv", "a.md", "folder"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/notes")));
        assert!(matches!(
            cli.command,
            Command::Workspace(WorkspaceCommand::Mv { .. })
        ));
        let cli = Cli::try_parse_from(["nws", "check", "a/b", "--path"]).unwrap();
        assert!(matches!(cli.command, Command::Check { path: true, .. }));
    }

    #[test]
    fn test_relative_args_resolve_under_root() {
        let root = Path::new("/notes");
        assert_eq!(under(root, Path::new(".")), PathBuf::from("/notes"));
        assert_eq!(under(root, Path::new("./a/b.md")), PathBuf::from("/notes/a/b.md"));
        assert_eq!(under(root, Path::new("/elsewhere")), PathBuf::from("/elsewhere"));
    }

    #[test]
    fn test_tree_rendering_uses_connectors() {
        let tree = FileNode::directory(
            "/ws",
            vec![
                FileNode::directory(
                    "/ws/journal",
                    vec![FileNode::file("/ws/journal/mon.md"), FileNode::file("/ws/journal/tue.md")],
                ),
                FileNode::file("/ws/todo.md"),
            ],
        );
        let expected = "/ws\n\
                        ├── journal/\n\
                        │   ├── mon.md\n\
                        │   └── tue.md\n\
                        └── todo.md\n";
        assert_eq!(render_tree(&tree), expected);
    }
}
