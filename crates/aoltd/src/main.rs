//! aoltd - Abstract OLT Chassis Registry Daemon
//!
//! Entry point for the aoltd daemon. Loads configuration, restores stored
//! chassis snapshots, runs the flusher and shuts down cleanly on Ctrl-C.

use anyhow::Context;
use aoltd::{
    DaemonConfig, DirectorySink, DryRunProvisioner, Flusher, MemorySink, Registry, SinkKind,
    SnapshotSink,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Abstract OLT chassis registry
#[derive(Parser, Debug)]
#[command(name = "aoltd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = aoltd::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Snapshot backup directory (overrides the config file)
    #[arg(short = 'b', long)]
    backup_dir: Option<PathBuf>,

    /// Snapshot sink: directory or memory (overrides the config file)
    #[arg(long)]
    sink: Option<SinkKind>,

    /// Flush interval in seconds (overrides the config file)
    #[arg(short = 'i', long)]
    flush_interval: Option<u64>,

    /// Start empty instead of loading stored snapshots
    #[arg(long)]
    no_restore: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, mut config: DaemonConfig) -> DaemonConfig {
        if let Some(dir) = self.backup_dir {
            config.backup_dir = dir;
        }
        if let Some(sink) = self.sink {
            config.sink = sink;
        }
        if let Some(secs) = self.flush_interval {
            config.flush_interval_secs = secs;
        }
        if self.no_restore {
            config.restore_on_start = false;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config
    }
}

/// Initializes tracing/logging subsystem
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {e}"))
}

async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let sink: Arc<dyn SnapshotSink> = match config.sink {
        SinkKind::Directory => Arc::new(DirectorySink::new(&config.backup_dir)),
        SinkKind::Memory => Arc::new(MemorySink::new()),
    };
    info!(
        sink = config.sink.as_str(),
        backup_dir = %config.backup_dir.display(),
        "snapshot sink ready"
    );

    let registry = Arc::new(Registry::new(Arc::new(DryRunProvisioner)));
    if config.restore_on_start {
        let report = registry
            .restore(sink.as_ref())
            .await
            .context("restoring stored snapshots")?;
        info!(restored = report.restored, skipped = report.skipped, "snapshots restored");
    }

    let (flush, task) = Flusher::new(registry.clone(), sink, config.flush_interval()).spawn();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("received shutdown signal");

    flush.shutdown();
    let report = task.await.context("flusher task panicked")?;
    if report.failed > 0 {
        anyhow::bail!("{} site(s) could not be flushed on shutdown", report.failed);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match DaemonConfig::load_or_default(&args.config) {
        Ok(config) => args.apply(config),
        Err(e) => {
            eprintln!("aoltd: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("aoltd: {e}");
        return ExitCode::FAILURE;
    }
    if let Err(e) = init_logging(&config.log_level) {
        eprintln!("aoltd: {e}");
        return ExitCode::FAILURE;
    }

    info!("--- Starting aoltd ---");
    match run(config).await {
        Ok(()) => {
            info!("aoltd shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "aoltd exiting with error");
            ExitCode::FAILURE
        }
    }
}
