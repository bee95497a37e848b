// ABOUTME: Main entry point for the parley chat bot
// ABOUTME: Initializes logging, config, plugin registry, console gateway and dispatcher

use anyhow::{Context, Result};
use clap::Parser;
use parley::{
    app,
    bus::MessageBus,
    config::Config,
    dispatcher::Dispatcher,
    gateway::{ConsoleGateway, GatewayRegistry},
};
use parley_core::signals::{self, Signals};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const BUS_CAPACITY: usize = 256;

/// The stdin reader sits on a blocking thread that cannot be cancelled, so
/// the runtime is not allowed to wait on it past this.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "parley", about = "Plugin-driven chat bot")]
struct Cli {
    /// Config file (overrides PARLEY_CONFIG_PATH and the default lookup).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    log_json: bool,

    /// Bot nickname (overrides config value).
    #[arg(long)]
    nick: Option<String>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr; stdout carries the console gateway's chat output
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("parley")
        .build()
        .context("Failed to create Tokio runtime")?;
    let result = runtime.block_on(run(cli));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(cli: Cli) -> Result<()> {

    tracing::info!("Starting parley");

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(nick) = cli.nick {
        config.bot.nick = nick;
        config.validate()?;
    }

    tracing::info!(
        nick = %config.bot.nick,
        operators = config.bot.operators.len(),
        channels = ?config.bot.channels,
        first_responder_only = config.plugins.first_responder_only,
        "Configuration loaded"
    );

    let metrics = if config.metrics.enabled {
        Some(app::install_metrics()?)
    } else {
        None
    };

    // The registry outlives every gateway connection
    let hub = Arc::new(Signals::new());
    let registry = app::build_registry(config.plugins.clone());
    registry.listen(&hub);
    hub.emit(signals::STARTED);

    let (bus, inbound) = MessageBus::new(BUS_CAPACITY);
    let dispatcher = tokio::spawn(Dispatcher::new(Arc::clone(&registry)).run(inbound));

    let mut gateways = GatewayRegistry::new();
    gateways.register(Arc::new(
        ConsoleGateway::stdio(&config.bot.nick, config.operators_set())
            .with_channels(config.bot.channels.clone())
            .with_signals(Arc::clone(&hub)),
    ));

    let mut running = gateways.start_all(&bus);
    drop(bus);

    tokio::select! {
        finished = running.join_next() => {
            if let Some(Ok((platform_id, result))) = finished {
                match result {
                    Ok(()) => tracing::info!(platform_id = %platform_id, "Gateway finished"),
                    Err(e) => tracing::error!(platform_id = %platform_id, error = %e, "Gateway failed"),
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down");
        }
    }

    // Dropping the remaining gateway tasks closes the bus
    running.shutdown().await;
    dispatcher
        .await
        .context("dispatcher task panicked")??;
    gateways.shutdown_all().await;

    if let Some(handle) = metrics {
        tracing::info!(metrics = %handle.render(), "Final metrics snapshot");
    }

    tracing::info!("parley stopped");
    Ok(())
}
