//! Command line surface for the demonstration binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ceud")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drives the component update engine against a local registry")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Parser)]
pub struct GlobalArgs {
    /// Enable debug-level tracing.
    #[arg(long, global = true)]
    pub debug: bool,

    /// JSON file mapping component id to its `CrxComponent` configuration.
    #[arg(long, global = true, default_value = "ceu-registry.json")]
    pub registry: PathBuf,

    /// Directory holding the cached artifact store.
    #[arg(long, global = true, default_value = "/var/cache/ceu/crx")]
    pub cache_root: PathBuf,

    /// Directory where installed components land.
    #[arg(long, global = true, default_value = "/var/lib/ceu/installed")]
    pub install_root: PathBuf,

    /// Scratch directory for in-flight downloads/unpacks.
    #[arg(long, global = true, default_value = "/var/lib/ceu/work")]
    pub work_dir: PathBuf,

    /// `SQLite` database backing `PersistedData`/`PingManager`.
    #[arg(long, global = true, default_value = "/var/lib/ceu/ceu.db")]
    pub db_path: PathBuf,

    /// Update-check endpoint url.
    #[arg(long, global = true, default_value = "https://localhost/update-check")]
    pub endpoint: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check for updates and install any that are found.
    Update {
        /// Component ids to update (empty = every id in the registry).
        ids: Vec<String>,
    },
    /// Install a single component unconditionally.
    Install {
        id: String,
    },
    /// Run the check phase only; never downloads or installs.
    Check {
        ids: Vec<String>,
    },
}
