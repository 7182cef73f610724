use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::Parser;
use pair_engine::{EngineHandle, PairingEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod handlers;
mod metrics;
mod ws;


use crate::config::{FileConfig, ServerConfig};
use crate::metrics::ServerMetrics;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "duet")]
#[command(about = "Anonymous one-on-one chat server")]
struct Cli {
    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding config.toml (defaults to ~/.duet)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Directory of frontend files served at / (overrides config)
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn apply_overrides(&self, fc: &mut FileConfig) {
        if let Some(host) = &self.host {
            fc.server.host = host.clone();
        }
        if let Some(port) = self.port {
            fc.server.port = port;
        }
        if let Some(dir) = &self.static_dir {
            fc.server.static_dir = dir.clone();
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub engine: EngineHandle,
    /// Server runtime configuration
    pub server_config: Arc<ServerConfig>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
}

impl AppState {
    /// Spawn the pairing engine and wrap it with fresh metrics
    pub(crate) fn new(server_config: Arc<ServerConfig>) -> Self {
        let engine = PairingEngine::spawn(server_config.chat.engine_config());
        Self {
            engine,
            server_config,
            metrics: Arc::new(ServerMetrics::new()),
        }
    }
}

pub(crate) fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.server_config.static_dir);

    Router::new()
        .route("/ws", get(handlers::chat_websocket_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "duet=debug,pair_engine=debug,tower_http=debug,info"
    } else {
        "duet=info,pair_engine=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting Duet chat server");

    let config_dir = config::config_dir(cli.config_dir.clone())?;
    let mut file_config: FileConfig = config::load_config(&config_dir)
        .extract()
        .context("Failed to load configuration")?;
    cli.apply_overrides(&mut file_config);
    let server_config = Arc::new(ServerConfig::from_file(&file_config)?);

    run_server(server_config).await
}

async fn run_server(server_config: Arc<ServerConfig>) -> Result<()> {
    if !server_config.static_dir.is_dir() {
        warn!(
            "Static directory {} does not exist; only the API will be served",
            server_config.static_dir.display()
        );
    }

    let app_state = AppState::new(server_config.clone());
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(server_config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", server_config.bind_addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Duet listening on http://{}", actual_addr);
    info!("  GET /ws          - Chat WebSocket");
    info!("  GET /health      - Health summary");
    info!("  GET /metrics     - Server metrics");
    info!(
        "  GET /            - Static files from {}",
        server_config.static_dir.display()
    );

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    fn test_state(static_dir: PathBuf) -> AppState {
        let mut fc = FileConfig::default();
        fc.server.host = "127.0.0.1".to_string();
        fc.server.port = 0;
        fc.server.static_dir = static_dir;
        AppState::new(Arc::new(ServerConfig::from_file(&fc).unwrap()))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_cli_overrides_file_config() {
        let cli = Cli::parse_from(["duet", "--port", "8081", "--static-dir", "web"]);
        let mut fc = FileConfig::default();
        cli.apply_overrides(&mut fc);
        assert_eq!(fc.server.port, 8081);
        assert_eq!(fc.server.host, "0.0.0.0");
        assert_eq!(fc.server.static_dir, PathBuf::from("web"));
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path().to_path_buf()));

        let (status, json) = get_json(app.clone(), "/health/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "alive");

        let (status, json) = get_json(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["waiting"], 0);

        let (status, json) = get_json(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["engine"]["connections"], 0);
        assert_eq!(json["connections"]["active"], 0);
    }

    #[tokio::test]
    async fn test_static_files_served_from_static_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("index.html"), "<h1>duet</h1>").unwrap();
        let app = build_router(test_state(tmp.path().to_path_buf()));

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"<h1>duet</h1>");

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/missing.js")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
