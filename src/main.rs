//! cachegate - plain-HTTP gateway to an S3 bucket for build caches and artifacts

use axum::routing::get;
use axum::Router;
use cachegate::api::handlers::{
    check_object, download_object, method_not_allowed, upload_object, AppState,
};
use cachegate::config::{Config, StorageConfig};
use cachegate::mapping::HeaderMapping;
use cachegate::storage::{FilesystemBackend, S3Backend, StorageBackend};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// cachegate - HTTP cache/artifact gateway backed by object storage
#[derive(Parser, Debug)]
#[command(name = "cachegate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Object key prefix (overrides config)
    #[arg(short, long, value_name = "PREFIX")]
    prefix: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from file if specified, otherwise use default loading
    let mut config = if let Some(ref path) = cli.config {
        Config::from_file(path)?
    } else {
        Config::load()
    };

    // CLI overrides
    if let Some(ref addr) = cli.listen {
        config.listen_addr = addr.parse()?;
    }
    if let Some(ref prefix) = cli.prefix {
        config.key_prefix = prefix.clone();
    }

    // Initialize tracing. RUST_LOG wins over the configured level.
    let log_level = if cli.verbose {
        "cachegate=trace,tower_http=trace".to_string()
    } else {
        config.log_level.clone()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cachegate HTTP cache gateway");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Key prefix: {:?}", config.key_prefix);

    let header_mapping = HeaderMapping::parse(&config.header_mapping);
    info!("  Header mappings: {}", header_mapping.len());

    let storage: Box<dyn StorageBackend> = match &config.storage {
        StorageConfig::Filesystem { path } => {
            info!("  Storage: Filesystem");
            info!("  Data directory: {:?}", path);
            Box::new(FilesystemBackend::new(path.clone()).await?)
        }
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            ..
        } => {
            info!("  Storage: S3");
            info!("  Bucket: {}", bucket);
            info!("  Region: {}", region);
            if let Some(ep) = endpoint {
                info!("  Endpoint: {}", ep);
            }
            Box::new(S3Backend::new(&config.storage)?)
        }
    };

    let state = Arc::new(AppState {
        storage,
        key_prefix: config.key_prefix.clone(),
        header_mapping,
    });

    // Every path is an object key:
    //   GET  /{key}  - stream object to response body
    //   HEAD /{key}  - existence probe (200/404, no body)
    //   PUT  /{key}  - store object from request body
    //   POST /{key}  - identical to PUT
    //   other        - 405
    let object_routes = get(download_object)
        .head(check_object)
        .put(upload_object)
        .post(upload_object)
        .fallback(method_not_allowed);

    let app = Router::new()
        .route("/", object_routes.clone())
        .route("/*path", object_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server with graceful shutdown
    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("cachegate listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Handle shutdown signals (SIGINT, SIGTERM)
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
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
