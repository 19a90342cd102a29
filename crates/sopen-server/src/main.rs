//! Sopen publishing service binary.
//!
//! Parses arguments, initializes logging, wires the concrete collaborators,
//! and runs the boot sequence. A fatal boot failure propagates out of
//! `main`, terminating the process with a non-zero status so a supervisor
//! can restart or alert; graceful shutdown (SIGTERM/SIGINT) exits zero.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sopen_core::codes;
use sopen_core::collaborators::{ArtifactGenerator, QueueClient};
use sopen_core::config::ServiceConfig;
use sopen_server::boot::{self, Collaborators};
use sopen_server::collaborators::{
    ChannelQueue, HtmlGenerator, IntervalScheduler, JobFn, JobFuture, PagesWatcher, ScheduledJob,
    TcpProbeDependency,
};
use sopen_server::metrics::ServerMetrics;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Sopen publishing service
#[derive(Parser, Debug)]
#[command(name = "sopen-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to service configuration file
    #[arg(short, long, default_value = "sopen.toml")]
    config: PathBuf,

    /// Override the configured listener port
    #[arg(long)]
    port: Option<u16>,

    /// Force-disable the queue subsystem regardless of configuration
    #[arg(long)]
    no_queue: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log to file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let mut config = if args.config.exists() {
        ServiceConfig::from_file(&args.config).context("failed to load configuration")?
    } else {
        info!("no config file found at {:?}, using defaults", args.config);
        ServiceConfig::default()
    };
    config.apply_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.no_queue {
        config.queue.enabled = false;
    }

    info!("starting Sopen publishing service");

    let metrics = ServerMetrics::new().context("failed to initialize metrics registry")?;
    let collaborators = wire_collaborators(&config, &metrics);

    let prepared = match boot::prepare(config, collaborators, metrics).await {
        Ok(prepared) => prepared,
        Err(boot_error) => {
            error!(
                code = codes::BOOT_FAIL,
                error = %boot_error,
                "fatal boot failure; terminating"
            );
            return Err(boot_error.into());
        },
    };

    prepared
        .serve(shutdown_signal())
        .await
        .context("server error")?;
    info!("shutdown complete");
    Ok(())
}

/// Build the production collaborator set from the configuration.
fn wire_collaborators(config: &ServiceConfig, metrics: &ServerMetrics) -> Collaborators {
    let generator: Arc<dyn ArtifactGenerator> = Arc::new(HtmlGenerator::new(
        config.server.hostname.clone(),
        metrics.clone(),
    ));
    let homepage = config.site.homepage_path();

    // Recurring homepage refresh: maintenance regeneration independent of
    // the publish mode.
    let refresh_generator = Arc::clone(&generator);
    let refresh_target = homepage.clone();
    let refresh: JobFn = Arc::new(move || {
        let generator = Arc::clone(&refresh_generator);
        let target = refresh_target.clone();
        let future: JobFuture = Box::pin(async move {
            generator
                .generate(&target)
                .await
                .map_err(|generate_error| generate_error.to_string())
        });
        future
    });

    let queue = config
        .queue
        .is_active()
        .then(|| Arc::new(ChannelQueue::new(Arc::clone(&generator), homepage)) as Arc<dyn QueueClient>);

    Collaborators {
        datastore: Arc::new(TcpProbeDependency::datastore(config.datastore.uri.clone())),
        cache: Arc::new(TcpProbeDependency::cache(config.cache.uri.clone())),
        queue,
        scheduler: Arc::new(IntervalScheduler::new(vec![ScheduledJob::new(
            "homepage_refresh",
            config.scheduler.refresh_interval,
            refresh,
        )])),
        watcher: Arc::new(PagesWatcher::new(
            config.site.pages_dir.clone(),
            config.site.watch_interval,
        )),
        generator,
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .context("failed to open log file")?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    Ok(())
}

/// Resolve when the process receives a termination signal.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("received SIGINT");
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c"),
        Err(signal_error) => error!("failed to listen for ctrl-c: {signal_error}"),
    }
}
