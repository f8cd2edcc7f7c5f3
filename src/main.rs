//! SIEM Event Gateway
//! Security-event ingestion and query service over embedded SQLite

use anyhow::{Context, Result};
use clap::{Arg, Command};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use siem_event_gateway::config::Config;
use siem_event_gateway::database::EventStore;
use siem_event_gateway::handlers::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let matches = Command::new("event-gateway")
        .version(env!("CARGO_PKG_VERSION"))
        .author("SIEM Team")
        .about("Security-event ingestion and query service")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Server host"),
        )
        .arg(
            Arg::new("validate-config")
                .long("validate-config")
                .help("Validate configuration and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("init-schema")
                .long("init-schema")
                .help("Initialize the database schema and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();

    info!("Loading configuration from: {}", config_path);
    let mut config = Config::load(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    // Override with command line arguments
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    if let Some(host) = matches.get_one::<String>("host") {
        config.server.host = host.clone();
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    if matches.get_flag("validate-config") {
        info!("Configuration is valid");
        return Ok(());
    }

    let config = Arc::new(config);

    info!("Opening event store at {}", config.database.url);
    let store = EventStore::connect(&config.database)
        .await
        .context("Failed to initialize event store")?;

    if matches.get_flag("init-schema") {
        // Schema creation happens inside EventStore::connect.
        info!("Schema initialized successfully");
        return Ok(());
    }

    let state = AppState {
        config: config.clone(),
        store: Arc::new(store),
    };

    let mut app =
        create_router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    if config.server.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid server host")?,
        config.server.port,
    );

    info!("Starting SIEM Event Gateway on {}", addr);
    print_config_summary(&config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "siem_event_gateway=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Print configuration summary
fn print_config_summary(config: &Config) {
    info!("=== Configuration Summary ===");
    info!("Server: {}:{}", config.server.host, config.server.port);
    info!("Database: {}", config.database.url);
    info!("Connection Pool: {} connections", config.database.max_connections);
    info!("Default Page Size: {}", config.query.default_page_size);
    info!("Max Page Size: {}", config.query.max_page_size);
    info!("=============================");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
