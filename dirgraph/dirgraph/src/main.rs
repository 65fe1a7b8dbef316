//! dirgraph - keep a directory's files mirrored as metadata graphs.
//!
//! # Usage
//!
//! ```bash
//! # Write a starter configuration
//! dirgraph init-config --directory /srv/landing
//!
//! # Poll until interrupted
//! dirgraph run
//!
//! # Run a single cycle and print what it did
//! dirgraph scan --directory /srv/landing
//!
//! # Show the metadata types a cycle needs
//! dirgraph types
//! ```

mod shutdown;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dirgraph_core::config::{DirGraphConfig, EmbeddedStoreConfig};
use dirgraph_sync::catalog::TypeCatalog;
use dirgraph_sync::scheduler::{PollingScheduler, SchedulerState};
use dirgraph_sync::schema::{required_types, StaticSchemaProvider};
use dirgraph_sync::sinks::sink_from_config;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dirgraph")]
#[command(about = "dirgraph - mirror a directory as metadata graphs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the directory until interrupted
    Run {
        /// Directory to synchronize (overrides the configuration)
        #[arg(short, long)]
        directory: Option<PathBuf>,
    },

    /// Run one synchronization cycle and print its report
    Scan {
        /// Directory to synchronize (overrides the configuration)
        #[arg(short, long)]
        directory: Option<PathBuf>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Directory to synchronize
        #[arg(short, long)]
        directory: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// List the metadata types a cycle resolves
    Types,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(DirGraphConfig::config_path);

    match cli.command {
        Commands::Run { directory } => {
            let config = load_config(&config_path, directory).await?;
            init_logging(cli.verbose, &config.general.log_level);
            run_scheduler(config).await?;
        }

        Commands::Scan { directory } => {
            let config = load_config(&config_path, directory).await?;
            init_logging(cli.verbose, &config.general.log_level);
            let scheduler = build_scheduler(config)?;
            let report = scheduler.run_once().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::InitConfig { directory, force } => {
            init_logging(cli.verbose, "info");
            if config_path.exists() && !force {
                bail!(
                    "{} already exists, pass --force to overwrite it",
                    config_path.display()
                );
            }
            DirGraphConfig::for_directory(directory)
                .save_to_path(&config_path)
                .await?;
            println!("Wrote {}", config_path.display());
        }

        Commands::Types => {
            init_logging(cli.verbose, "info");
            let catalog = TypeCatalog::new(Arc::new(StaticSchemaProvider::with_open_metadata_types()));
            match catalog.try_resolve(required_types()) {
                Ok(snapshot) => {
                    for descriptor in snapshot.iter() {
                        println!("{:<24} {}", descriptor.name, descriptor.id);
                    }
                }
                Err(missing) => bail!("Unresolved types: {}", missing.join(", ")),
            }
        }
    }

    Ok(())
}

/// Load the configuration file, falling back to defaults when it is absent
async fn load_config(path: &Path, directory: Option<PathBuf>) -> Result<DirGraphConfig> {
    let mut config = if path.exists() {
        DirGraphConfig::load_from_path(path).await?
    } else {
        let mut config = DirGraphConfig::default();
        config.embedded_stores.push(EmbeddedStoreConfig::memory());
        config.merge_env_vars()?;
        config
    };

    if let Some(directory) = directory {
        config.connector.directory = Some(directory);
    }
    config.validate()?;
    Ok(config)
}

fn build_scheduler(config: DirGraphConfig) -> Result<PollingScheduler> {
    let sink = sink_from_config(&config.sink)?;
    let schema = Arc::new(StaticSchemaProvider::with_open_metadata_types());
    Ok(PollingScheduler::new(config, schema, sink))
}

async fn run_scheduler(config: DirGraphConfig) -> Result<()> {
    let scheduler = build_scheduler(config)?;
    scheduler
        .start()
        .await
        .context("Failed to start the directory synchronizer")?;

    tokio::select! {
        result = shutdown::wait_for_signal() => {
            result?;
            scheduler.stop().await?;
        }
        _ = stopped_on_its_own(&scheduler) => {
            let status = scheduler.status().await;
            let reason = status.last_error.unwrap_or_else(|| "unknown error".to_string());
            bail!("Directory synchronizer stopped: {}", reason);
        }
    }

    let status = scheduler.status().await;
    if status.persistent_failure {
        warn!(
            "Exited with a persistent failure after {} consecutive failed cycles",
            status.consecutive_failures
        );
    }
    info!(
        "Completed {} cycles, {} failed",
        status.cycles_completed, status.cycles_failed
    );
    Ok(())
}

async fn stopped_on_its_own(scheduler: &PollingScheduler) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        if scheduler.state().await == SchedulerState::Stopped {
            return;
        }
    }
}

fn init_logging(verbose: bool, level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("dirgraph=debug,dirgraph_core=debug,dirgraph_storage=debug,dirgraph_sync=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "dirgraph={level},dirgraph_core={level},dirgraph_storage={level},dirgraph_sync={level},warn"
            ))
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
