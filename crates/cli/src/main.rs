mod cli;
mod render;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use demoset_core::{
    distinct_teams, load_config, load_manifest, metrics, validate_config, Config, EventManifest,
    Indexer, IndexerOptions, RegistryConfig, SqliteCatalog, TeamRegistry,
};

use cli::{Cli, Command, IndexArgs, TeamsArgs};
use render::render_report;

/// Exit code when at least one event failed to index.
const EXIT_EVENT_FAILURES: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config_path();

    match cli.command {
        Command::Index(args) => {
            let config = load_validated_config(&config_path)?;
            index(config, &config_path, args).await
        }
        Command::Teams(args) => teams(&config_path, args),
    }
}

fn load_validated_config(path: &Path) -> Result<Config> {
    info!("Loading configuration from {:?}", path);
    let config =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

/// Build the team registry, reading a registry file relative to the
/// configuration file's directory.
fn load_registry(config: &RegistryConfig, config_path: &Path) -> Result<TeamRegistry> {
    let mut config = config.clone();
    if let Some(file) = config.file.as_mut() {
        if file.is_relative() {
            if let Some(dir) = config_path.parent() {
                *file = dir.join(&*file);
            }
        }
    }
    let registry = TeamRegistry::from_config(&config).context("Failed to load team registry")?;
    info!("Team registry: {} teams", registry.len());
    Ok(registry)
}

async fn index(config: Config, config_path: &Path, args: IndexArgs) -> Result<i32> {
    let registry = load_registry(&config.registry, config_path)?;

    let root: PathBuf = args
        .root
        .clone()
        .or_else(|| config.dataset.root.clone())
        .ok_or_else(|| anyhow!("No dataset root given (argument or dataset.root)"))?;
    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.database.path_for(&root));

    info!("Dataset root: {:?}", root);
    info!("Catalog path: {:?}", db_path);

    let catalog = SqliteCatalog::new(&db_path)
        .with_context(|| format!("Failed to open catalog at {:?}", db_path))?;
    let options = IndexerOptions::from(&config.dataset);

    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let mut worker = tokio::task::spawn_blocking(move || {
        let report = Indexer::new(&catalog, &registry, options)
            .with_cancel_flag(worker_cancel)
            .run(&root)?;
        let stats = catalog.stats()?;
        anyhow::Ok((report, stats))
    });

    let (report, stats) = tokio::select! {
        joined = &mut worker => joined.context("Indexing task panicked")??,
        _ = shutdown_signal() => {
            warn!("Shutdown requested, stopping after the current event");
            cancel.store(true, Ordering::Relaxed);
            worker.await.context("Indexing task panicked")??
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report, &stats));
    }

    if let Some(path) = &args.metrics_out {
        let text = metrics::encode_metrics().context("Failed to encode metrics")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write metrics to {:?}", path))?;
        info!("Metrics written to {:?}", path);
    }

    Ok(if report.has_failures() {
        EXIT_EVENT_FAILURES
    } else {
        0
    })
}

fn teams(config_path: &Path, args: TeamsArgs) -> Result<i32> {
    let manifest_path = &args.manifest;
    let (dir, file_name) = match (manifest_path.parent(), manifest_path.file_name()) {
        (Some(dir), Some(name)) => (dir, name.to_string_lossy()),
        _ => bail!("Invalid manifest path {:?}", manifest_path),
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    let manifest = load_manifest(dir, &file_name)?;
    let registry = if args.missing {
        let config = load_validated_config(config_path)?;
        Some(load_registry(&config.registry, config_path)?)
    } else {
        None
    };

    for name in select_teams(&manifest, registry.as_ref()) {
        println!("{}", name);
    }

    Ok(0)
}

/// Distinct lineup names of `manifest`, limited to those missing from
/// `registry` when one is given.
fn select_teams(manifest: &EventManifest, registry: Option<&TeamRegistry>) -> Vec<String> {
    let mut names = distinct_teams(manifest);
    if let Some(registry) = registry {
        names.retain(|name| !registry.contains(name));
    }
    names
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
