//! mirrorsync CLI - periodic one-way directory mirroring.
//!
//! Keeps a replica directory identical to a source directory by running a
//! synchronization pass at a fixed interval until interrupted.

mod logging;

use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use mirrorsync_storage::LocalStorage;
use mirrorsync_sync::{
    FailurePolicy, SchedulerConfig, SchedulerHandle, SyncScheduler, TracingReporter,
    TreeSynchronizer,
};

#[derive(Parser, Debug)]
#[command(name = "mirrorsync")]
#[command(about = "mirrorsync - Mirror a source directory onto a replica directory")]
#[command(version)]
struct Cli {
    /// Directory to mirror from.
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
    source: String,

    /// Directory kept identical to the source.
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
    replica: String,

    /// Seconds between the starts of consecutive passes.
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// File that receives a copy of all log output.
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
    log: String,

    /// Keep the schedule running after a failed pass.
    #[arg(short, long)]
    keep_going: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn scheduler_config(&self) -> SchedulerConfig {
        let policy = if self.keep_going {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Stop
        };
        SchedulerConfig::new(Duration::from_secs(self.interval)).with_failure_policy(policy)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(Path::new(&cli.log), cli.verbose)?;

    let source = PathBuf::from(&cli.source);
    let replica = PathBuf::from(&cli.replica);
    let config = cli.scheduler_config();

    info!(
        "mirrorsync initialized: '{}' -> '{}' every {} seconds, logging to '{}'.",
        source.display(),
        replica.display(),
        cli.interval,
        cli.log
    );
    println!("Press Ctrl+C to exit.");

    let storage = Arc::new(LocalStorage::new());
    let engine = Arc::new(TreeSynchronizer::new(
        storage,
        Arc::new(TracingReporter::new()),
    ));

    let (scheduler, handle) = SyncScheduler::new(config);
    spawn_ctrl_c_listener(handle.clone());

    let result = scheduler
        .run(|| {
            let engine = engine.clone();
            let source = source.clone();
            let replica = replica.clone();
            async move { engine.synchronize(&source, &replica).await }
        })
        .await;

    match result {
        Ok(()) => {
            info!(
                "Exiting after {} completed passes ({} failed).",
                handle.passes_completed(),
                handle.passes_failed()
            );
            Ok(())
        }
        Err(e) => {
            error!("Synchronization was interrupted. Exiting application.");
            Err(e).context("Synchronization was interrupted")
        }
    }
}

fn spawn_ctrl_c_listener(handle: SchedulerHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, stopping.");
                handle.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });
}
