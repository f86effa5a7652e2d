//! obatch server binary.
//!
//! Serves `$batch` over an in-memory entity store.
//!
//! # Usage
//!
//! ```bash
//! # With config file
//! obatch --config config.yaml
//!
//! # With environment variables only
//! OBATCH_STORAGE__SCHEMA_PATH=schema.json obatch
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use obatch_api::http::{
    create_router_with_limits, create_router_with_observability_and_limit, AppState,
    RouterLimits,
};
use obatch_api::observability::{init_logging, init_metrics, LoggingConfig};
use obatch_server::{BatchLimits, ServerConfig};
use obatch_storage::{MemoryEntityStore, SchemaFile};

/// obatch - OData $batch server
#[derive(Parser, Debug)]
#[command(name = "obatch")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = if let Some(config_path) = args.config {
        ServerConfig::load(&config_path)?
    } else {
        ServerConfig::from_env()?
    };

    init_logging(LoggingConfig::from(&config.logging));
    info!(version = env!("CARGO_PKG_VERSION"), "starting obatch server");

    let storage = Arc::new(build_storage(&config)?);
    let state = AppState::with_limits(storage, BatchLimits::from(&config.batch));
    let limits = router_limits(&config);

    let router = if config.metrics.enabled {
        let metrics_state = init_metrics()?.with_path(config.metrics.path.clone());
        info!(path = %metrics_state.path(), "metrics enabled");
        create_router_with_observability_and_limit(state, metrics_state, limits)
    } else {
        create_router_with_limits(state, limits)
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Builds the configured store; only `memory` exists.
fn build_storage(config: &ServerConfig) -> anyhow::Result<MemoryEntityStore> {
    match config.storage.backend.as_str() {
        "memory" => match &config.storage.schema_path {
            Some(path) => {
                let schema = SchemaFile::load(path)?;
                info!(
                    %path,
                    collections = schema.collections.len(),
                    "using in-memory storage"
                );
                Ok(MemoryEntityStore::from_schema(schema)?)
            }
            None => {
                warn!("storage.schema_path not set, starting without collections");
                Ok(MemoryEntityStore::new())
            }
        },
        other => anyhow::bail!("unknown storage backend: {other}"),
    }
}

fn router_limits(config: &ServerConfig) -> RouterLimits {
    RouterLimits {
        body_limit: config.server.max_body_bytes,
        probe_timeout: Duration::from_secs(config.server.request_timeout_secs),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
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
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_args_parsing() {
        let args = Args::try_parse_from(["obatch"]).unwrap();
        assert!(args.config.is_none());

        let args = Args::try_parse_from(["obatch", "--config", "config.yaml"]).unwrap();
        assert_eq!(args.config, Some("config.yaml".to_string()));

        let args = Args::try_parse_from(["obatch", "-c", "test.yaml"]).unwrap();
        assert_eq!(args.config, Some("test.yaml".to_string()));
    }

    #[test]
    fn test_router_limits_from_config() {
        let mut config = ServerConfig::default();
        config.server.max_body_bytes = 1024;
        config.server.request_timeout_secs = 5;

        let limits = router_limits(&config);
        assert_eq!(limits.body_limit, 1024);
        assert_eq!(limits.probe_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_build_storage_from_schema_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"collections": {{"cell/box/col": {{"entity_types": ["Sales"]}}}}}}"#
        )
        .unwrap();

        let mut config = ServerConfig::default();
        config.storage.schema_path = Some(file.path().display().to_string());

        let store = build_storage(&config).unwrap();
        assert!(!store.contains_entity("cell/box/col", "Sales", "k"));
    }

    #[test]
    fn test_build_storage_missing_schema_file() {
        let mut config = ServerConfig::default();
        config.storage.schema_path = Some("/nonexistent/schema.json".to_string());
        assert!(build_storage(&config).is_err());
    }
}
