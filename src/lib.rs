pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod scheduler;
pub mod services;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
pub use config::Config;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = Config::load()?;
    config.validate()?;

    if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        if let Some(port) = config.observability.metrics_port {
            builder
                .with_http_listener(([0, 0, 0, 0], port))
                .install()
                .context("Failed to install Prometheus exporter")?;
        } else {
            builder
                .install_recorder()
                .context("Failed to install Prometheus recorder")?;
        }
    }

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let (layer, task) = tracing_loki::builder()
            .label("app", "anisync")?
            .extra_field("env", config.observability.loki_environment.clone())?
            .build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    if config.observability.metrics_enabled {
        info!(
            port = ?config.observability.metrics_port,
            "Prometheus metrics recorder initialized"
        );
    }

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let Some(command) = cli.command else {
        println!("No command given. Run `anisync --help` for usage.");
        return Ok(());
    };

    match command {
        Commands::Crawl {
            kind,
            per_page,
            max_pages,
            fresh,
            strategy,
        } => {
            cli::cmd_crawl(
                &config, kind, per_page, max_pages, fresh, strategy, &cancel,
            )
            .await
        }

        Commands::Daily { kind, pages, since } => {
            cli::cmd_daily(&config, kind, pages, since, &cancel).await
        }

        Commands::Page {
            page,
            pages,
            kind,
            strategy,
            per_page,
        } => cli::cmd_page(&config, page, pages, kind, strategy, per_page, &cancel).await,

        Commands::Daemon { cron, kind, now } => {
            cli::cmd_daemon(&config, cron, kind, now, &cancel).await
        }

        Commands::Status => cli::cmd_status(&config).await,

        Commands::Reset { kind } => cli::cmd_reset(&config, kind).await,

        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("config.toml already exists, left untouched.");
            }
            Ok(())
        }
    }
}

/// Cancels `cancel` on Ctrl+C so running imports stop between pages.
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                cancel.cancel();
            }
            Err(e) => {
                error!("Error listening for shutdown: {}", e);
            }
        }
    });
}
