//! ceud - demonstration host for the component update engine.
//!
//! Wires the `ceu-net` and `ceu-persist` collaborators plus the
//! filesystem-only reference unpacker/patcher/installer/action-handler
//! together behind `UpdateClient`, drives one batch from the CLI, and
//! prints every observed `CrxUpdateItem` as it arrives.

mod cli;
mod data_source;

use std::collections::HashMap;
use std::process;
use std::sync::Arc;

use ceu_engine::{
    client::CompletionCode, collaborators::fs::{FsInstaller, FsPatcher, FsUnpacker, NoopActionHandler},
    Collaborators, StatvfsDiskSpaceProbe, UpdateClient,
};
use ceu_net::{HttpClient, HttpCrxDownloader, JsonUpdateChecker};
use ceu_types::CrxUpdateItem;
use clap::Parser;
use tracing::{error, info};

use crate::cli::{Cli, Commands};
use crate::data_source::FileDataSource;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("ceud failed: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ceu_errors::Error> {
    let config = ceu_config::EngineConfig::default();

    let data_source = Arc::new(FileDataSource::load(&cli.global.registry).await?);

    let http = HttpClient::new(&config.network)
        .map_err(|e| ceu_errors::Error::internal(format!("building http client: {e}")))?;
    let checker = Arc::new(JsonUpdateChecker::new(http.clone(), cli.global.endpoint.clone()));
    let downloader = Arc::new(HttpCrxDownloader::new(http));

    tokio::fs::create_dir_all(&cli.global.install_root).await.ok();
    let installer: Arc<dyn ceu_engine::Installer> =
        Arc::new(FsInstaller::new(cli.global.install_root.clone()));
    let mut installers: HashMap<String, Arc<dyn ceu_engine::Installer>> = HashMap::new();
    installers.insert("fs".to_string(), installer);

    let mut action_handlers: HashMap<String, Arc<dyn ceu_engine::ActionHandler>> = HashMap::new();
    action_handlers.insert("noop".to_string(), Arc::new(NoopActionHandler));

    if let Some(parent) = cli.global.db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    let pool = ceu_persist::create_pool(&cli.global.db_path).await?;
    ceu_persist::run_migrations(&pool).await?;
    let store = Arc::new(ceu_persist::SqliteStore::new(pool));

    let collaborators = Arc::new(Collaborators {
        checker,
        downloader,
        unpacker: Arc::new(FsUnpacker),
        patcher: Arc::new(FsPatcher),
        installers,
        action_handlers,
        persisted_data: store.clone(),
        ping_manager: store,
        disk_probe: Arc::new(StatvfsDiskSpaceProbe),
    });

    let client = UpdateClient::new(collaborators, cli.global.cache_root.clone(), cli.global.work_dir.clone());
    client.add_observer(Arc::new(print_item));

    let (completion_tx, completion_rx) = tokio::sync::oneshot::channel();
    let on_complete = move |code: CompletionCode| {
        let _ = completion_tx.send(code);
    };

    match cli.command {
        Commands::Update { ids } => {
            let ids = if ids.is_empty() { data_source.ids() } else { ids };
            client.update(ids, data_source, None, false, on_complete);
        }
        Commands::Install { id } => {
            client.install(id, data_source, None, on_complete);
        }
        Commands::Check { ids } => {
            let ids = if ids.is_empty() { data_source.ids() } else { ids };
            let id = ids.into_iter().next().ok_or_else(|| {
                ceu_errors::Error::internal("no component ids available to check".to_string())
            })?;
            client.check_for_update(id, data_source, None, false, on_complete);
        }
    }

    match completion_rx.await {
        Ok(code) => info!(?code, "batch finished"),
        Err(_) => error!("completion callback dropped without firing"),
    }

    Ok(())
}

fn print_item(item: &CrxUpdateItem) {
    info!(
        id = %item.id,
        state = ?item.state,
        error_category = ?item.error_category,
        error_code = item.error_code,
        "component state changed"
    );
}

fn init_tracing(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}
