//! memstore-controller: keeps Cloud Memorystore for Redis instances in line
//! with the objects declared in a directory.
//!
//! Every tick the daemon:
//! - Loads each `*.json` instance object from the objects directory
//! - Resolves its provider config from the credentials directory
//! - Observes the remote instance and creates, updates or deletes it
//! - Writes status and late-initialized spec back to the object file

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use memstore_controller::config::FileCredentials;
use memstore_controller::connector::GrpcClientFactory;
use memstore_controller::{MemorystoreConnector, Reconciler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod agent;

use agent::Agent;

/// Cloud Memorystore controller
#[derive(Parser, Debug)]
#[command(name = "memstore-controller", version, about)]
struct Args {
    /// Directory of instance objects (one JSON file per instance)
    #[arg(long, default_value = "/var/lib/memstore-controller/objects")]
    objects_dir: PathBuf,

    /// Directory of provider configs (<name>.json)
    #[arg(long, default_value = "/etc/memstore-controller/providers")]
    credentials_dir: PathBuf,

    /// Seconds between reconcile passes
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Per-object reconcile timeout in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Timeout in seconds for establishing a connection to the Redis API
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    connect_timeout: u64,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "memstore_controller=info,tonic=warn,tower=warn,hyper=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting memstore-controller");
    info!("Objects directory: {}", args.objects_dir.display());
    info!("Credentials directory: {}", args.credentials_dir.display());

    let timeout = Duration::from_secs(args.timeout);
    let factory = GrpcClientFactory::new(Duration::from_secs(args.connect_timeout));
    let connector =
        MemorystoreConnector::with_factory(FileCredentials::new(&args.credentials_dir), factory)
            .with_call_timeout(timeout);
    let agent = Agent::new(
        Reconciler::new(connector),
        &args.objects_dir,
        Duration::from_secs(args.interval),
        timeout,
    );

    let token = CancellationToken::new();

    if args.once {
        let summary = agent.tick(&token).await?;
        info!(
            reconciled = summary.reconciled,
            failed = summary.failed,
            finalized = summary.finalized,
            "Single pass complete"
        );
        if summary.failed > 0 {
            anyhow::bail!("{} object(s) failed to reconcile", summary.failed);
        }
        return Ok(());
    }

    let shutdown = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    agent.run(token).await.context("controller loop failed")?;

    info!("memstore-controller stopped");
    Ok(())
}
