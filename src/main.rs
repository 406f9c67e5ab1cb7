//! Main entry point for the Ready Room match queue service
//!
//! Production entry point that wires the queue core to the AMQP broker and
//! the health/metrics server, with graceful shutdown on SIGINT/SIGTERM.

use anyhow::Result;
use clap::Parser;
use ready_room::amqp::{
    AmqpConfig, AmqpConnection, AmqpNotifier, CommandRequestConsumer, CommandRouter,
    PublisherConfig,
};
use ready_room::config::{AppConfig, MessageCatalog, StaticDefinitionProvider};
use ready_room::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use ready_room::notify::Notifier;
use ready_room::queue::{GroupRegistry, GroupScheduler, MatchCoordinator};
use ready_room::sched::{TickScheduler, TokioTickScheduler};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Ready Room - category-based match queue with ready checks
#[derive(Parser)]
#[command(
    name = "ready-room",
    version,
    about = "A match queue and ready-check microservice for multiplayer matchmaking",
    long_about = "Ready Room consumes player commands over AMQP, pools players into \
                 named queue categories, forms match groups when a pool fills, runs a \
                 ready-confirmation window and a launch countdown, and publishes the \
                 activity-launch commands for dispatched matches."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// AMQP host override
    #[arg(long, value_name = "HOST", help = "Override AMQP broker host")]
    amqp_host: Option<String>,

    /// AMQP port override
    #[arg(long, value_name = "PORT", help = "Override AMQP broker port")]
    amqp_port: Option<u16>,

    /// Health server port override
    #[arg(long, value_name = "PORT", help = "Override health server port")]
    health_port: Option<u16>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Ready Room Match Queue Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!("   AMQP: {}:{}", config.amqp.host, config.amqp.port);
    info!("   Command queue: {}", config.amqp.command_queue);
    info!("   Queue categories: {}", config.queues.len());
    for def in &config.queues {
        info!(
            "     {} ({} players, {}s confirm, {}s countdown)",
            def.name, def.max_players, def.confirmation_seconds, def.countdown_seconds
        );
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(amqp_host) = &args.amqp_host {
        config.amqp.host = amqp_host.clone();
    }

    if let Some(amqp_port) = args.amqp_port {
        config.amqp.port = amqp_port;
    }

    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let metrics = Arc::new(MetricsCollector::new()?);
    let messages = Arc::new(MessageCatalog::with_overrides(&config.messages));
    let definitions = Arc::new(StaticDefinitionProvider::new(config.queues.clone())?);

    info!("Connecting to AMQP broker...");
    let amqp = AmqpConnection::new(AmqpConfig::from(&config.amqp)).await?;
    let publish_channel = amqp.open_channel().await?;
    let consume_channel = amqp.open_command_channel(&config.amqp.command_queue).await?;

    let notifier = Arc::new(AmqpNotifier::new(publish_channel, PublisherConfig::default()).await?);

    let registry = GroupRegistry::new();
    let ticker = Arc::new(TokioTickScheduler::new()) as Arc<dyn TickScheduler>;
    let scheduler = GroupScheduler::new(registry.clone(), ticker, metrics.clone());
    let coordinator = MatchCoordinator::new(
        definitions,
        registry,
        scheduler,
        notifier.clone() as Arc<dyn Notifier>,
        messages.clone(),
        metrics.clone(),
    );

    let router = Arc::new(CommandRouter::new(
        coordinator.clone(),
        notifier.clone() as Arc<dyn Notifier>,
        messages,
    ));
    let consumer = CommandRequestConsumer::new(router, consume_channel);
    consumer.start_consuming(&config.amqp.command_queue).await?;

    let health_server = Arc::new(HealthServer::new(
        HealthServerConfig {
            port: config.service.health_port,
            host: "0.0.0.0".to_string(),
        },
        metrics,
        coordinator.clone(),
    ));
    let health_task = {
        let health_server = health_server.clone();
        tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Health server failed: {}", e);
            }
        })
    };

    info!("✅ Ready Room Match Queue Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");

    let shutdown = async {
        if let Err(e) = consumer.stop_consuming().await {
            warn!("Failed to stop consumer cleanly: {}", e);
        }
        if let Err(e) = coordinator.shutdown() {
            warn!("Coordinator shutdown reported an error: {}", e);
        }
        // Give the publishing task a moment to drain the shutdown notices
        sleep(Duration::from_millis(500)).await;
        health_server.stop();
        if let Err(e) = amqp.close().await {
            warn!("Failed to close AMQP connection: {}", e);
        }
    };

    match tokio::time::timeout(config.shutdown_timeout(), shutdown).await {
        Ok(()) => {
            info!("✅ Graceful shutdown completed successfully");
        }
        Err(_) => {
            warn!("⚠️  Shutdown timeout exceeded, forcing exit");
        }
    }

    health_task.abort();
    info!("🛑 Ready Room Match Queue Service stopped");
    Ok(())
}
