use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use pathguard_core::types::LogLevel;
use pathguard_core::{FilePath, NativeFileSystem, PathConfig, PathError};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pathguard")]
#[command(about = "Inspect and manipulate files through traversal-safe paths")]
#[command(version)]
struct Cli {
    /// JSON file with path settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what is on disk at a path
    Stat {
        path: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or set permission bits
    Perms {
        path: String,

        /// New mode, in octal
        #[arg(long)]
        set: Option<String>,
    },

    /// Resolve segments under a root, refusing anything that escapes it
    Child {
        root: String,
        segments: Vec<String>,
    },

    /// List a tree depth-first
    Walk {
        path: String,

        /// Do not descend into directories whose name starts with a dot
        #[arg(long)]
        skip_hidden: bool,
    },

    /// Print the path with all symbolic links expanded
    Realpath { path: String },

    /// Print a file's content
    Cat { path: String },

    /// Atomically replace a file's content with standard input
    Write {
        path: String,

        /// Extension of the temporary file used while writing
        #[arg(long)]
        extension: Option<String>,
    },

    /// Copy a file or tree
    Copy {
        source: String,
        destination: String,

        /// Recreate symbolic links instead of copying what they point to
        #[arg(long)]
        no_follow: bool,
    },

    /// Move a file or tree, copying across devices when needed
    Move {
        source: String,
        destination: String,

        #[arg(long)]
        no_follow: bool,
    },

    /// Create a directory
    Mkdir {
        path: String,

        /// Create missing parents too
        #[arg(short, long)]
        parents: bool,

        /// Succeed if the directory already exists
        #[arg(long)]
        exist_ok: bool,
    },

    /// Remove a file, link or tree
    Rm { path: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(format!("pathguard={}", level)),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pathguard=info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let paths = Paths::new(load_config(cli.config.as_ref())?);

    match cli.command {
        Commands::Stat { path, json } => show_stat(&paths.open(&path)?, json)?,
        Commands::Perms { path, set } => permissions(&paths.open(&path)?, set.as_deref())?,
        Commands::Child { root, segments } => {
            let root = paths.open(&root)?;
            let child = root.descendant(&segments).map_err(|e| match e {
                PathError::InsecurePath { .. } => anyhow::Error::new(e).context("refusing to resolve"),
                other => other.into(),
            })?;
            println!("{}", child);
        }
        Commands::Walk { path, skip_hidden } => walk(&paths.open(&path)?, skip_hidden)?,
        Commands::Realpath { path } => println!("{}", paths.open(&path)?.realpath()?),
        Commands::Cat { path } => {
            let content = paths.open(&path)?.get_content()?;
            std::io::stdout().write_all(&content)?;
        }
        Commands::Write { path, extension } => {
            let target = paths.open(&path)?;
            let mut content = Vec::new();
            std::io::stdin()
                .read_to_end(&mut content)
                .context("reading standard input")?;
            match extension {
                Some(ext) => target.set_content_with_extension(&content, ext)?,
                None => target.set_content(&content)?,
            }
            info!("Wrote {} bytes to {}", content.len(), target);
        }
        Commands::Copy { source, destination, no_follow } => {
            let (source, destination) = (paths.open(&source)?, paths.open(&destination)?);
            source.copy_to(&destination, !no_follow)?;
            info!("Copied {} to {}", source, destination);
        }
        Commands::Move { source, destination, no_follow } => {
            let (source, destination) = (paths.open(&source)?, paths.open(&destination)?);
            source.move_to(&destination, !no_follow)?;
            info!("Moved {} to {}", source, destination);
        }
        Commands::Mkdir { path, parents, exist_ok } => {
            let dir = paths.open(&path)?;
            if parents {
                dir.create_directory_path(exist_ok)?;
            } else {
                match dir.create_directory() {
                    Err(e) if exist_ok && e.is_already_exists() && dir.is_dir()? => {}
                    other => other?,
                }
            }
        }
        Commands::Rm { path } => {
            let target = paths.open(&path)?;
            if !target.is_symbolic_link()? && !target.exists()? {
                bail!("{} does not exist", target);
            }
            target.remove()?;
            info!("Removed {}", target);
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<PathConfig> {
    let Some(path) = path else {
        return Ok(PathConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: PathConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    if let Err(problems) = config.validate() {
        bail!("invalid config {}: {}", path.display(), problems.join("; "));
    }
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Builds paths on the native filesystem with the loaded settings.
struct Paths {
    provider: Arc<NativeFileSystem>,
    config: PathConfig,
}

impl Paths {
    fn new(config: PathConfig) -> Self {
        Self { provider: Arc::new(NativeFileSystem::new()), config }
    }

    fn open(&self, path: &str) -> Result<FilePath> {
        Ok(FilePath::with_options(path, self.provider.clone(), self.config.clone())?)
    }
}

fn format_time(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|t| t.with_timezone(&Local).to_rfc3339())
        .unwrap_or_else(|| seconds.to_string())
}

fn kind(path: &FilePath) -> Result<&'static str> {
    Ok(if path.is_symbolic_link()? {
        "symlink"
    } else if path.is_dir()? {
        "directory"
    } else if path.is_file()? {
        "file"
    } else if path.is_socket()? {
        "socket"
    } else if path.is_block_device()? {
        "block device"
    } else {
        "other"
    })
}

fn show_stat(path: &FilePath, as_json: bool) -> Result<()> {
    if !path.exists()? && !path.is_symbolic_link()? {
        bail!("{} does not exist", path);
    }

    let inode = path.inode().ok();
    let owner = path.user_id().ok().zip(path.group_id().ok());
    let report = json!({
        "path": path.to_string(),
        "kind": kind(path)?,
        "size": path.size()?,
        "permissions": path.permissions()?.shorthand(),
        "modified": format_time(path.mtime()?),
        "accessed": format_time(path.atime()?),
        "changed": format_time(path.ctime()?),
        "inode": inode,
        "links": path.hard_link_count().ok(),
        "uid": owner.map(|(uid, _)| uid),
        "gid": owner.map(|(_, gid)| gid),
    });

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Path:        {}", path);
    println!("Kind:        {}", report["kind"].as_str().unwrap_or("other"));
    println!("Size:        {}", path.size()?);
    println!("Permissions: {}", path.permissions()?);
    println!("Modified:    {}", format_time(path.mtime()?));
    println!("Accessed:    {}", format_time(path.atime()?));
    if let Some(inode) = inode {
        println!("Inode:       {}", inode);
    }
    if let Some((uid, gid)) = owner {
        println!("Owner:       {}:{}", uid, gid);
    }
    Ok(())
}

fn permissions(path: &FilePath, set: Option<&str>) -> Result<()> {
    if let Some(mode) = set {
        let mode = u32::from_str_radix(mode.trim_start_matches("0o"), 8)
            .with_context(|| format!("invalid octal mode: {}", mode))?;
        path.chmod(mode)?;
        info!("Set mode of {} to {:o}", path, mode);
    }
    let perms = path.permissions()?;
    println!("{} {:04o} {}", perms.shorthand(), perms.mode(), path);
    Ok(())
}

fn walk(root: &FilePath, skip_hidden: bool) -> Result<()> {
    let entries = if skip_hidden {
        root.walk_with(|dir: &FilePath| {
            dir == root || !dir.basename().as_bytes().starts_with(b".")
        })
    } else {
        root.walk()
    };
    for entry in entries {
        println!("{}", entry?);
    }
    Ok(())
}
