//! HTTP surface for the after-tax free cash flow service.

use analysis_core::AnalysisError;
use analysis_orchestrator::AnalysisOrchestrator;
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yahoo_client::YahooClient;

pub mod atfcf_routes;
pub mod config;
pub mod request_id;

pub use config::ServerConfig;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
    /// Deadline for one calculation, provider round-trips included
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(orchestrator: AnalysisOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Handler errors. Details are logged; clients only see a fixed message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No ticker provided")]
    MissingTicker,

    #[error("Could not calculate ATFCF for {ticker}: {source}")]
    Unavailable {
        ticker: String,
        #[source]
        source: AnalysisError,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::MissingTicker => (StatusCode::BAD_REQUEST, "No ticker provided"),
            AppError::Unavailable { ticker, source } => {
                match source {
                    AnalysisError::ApiError(_) | AnalysisError::Timeout(_) => {
                        tracing::error!("Error calculating ATFCF for {}: {}", ticker, source)
                    }
                    _ => tracing::warn!("ATFCF unavailable for {}: {}", ticker, source),
                }
                (StatusCode::NOT_FOUND, "Could not calculate ATFCF for ticker")
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router with all routes and middleware.
///
/// `request_timeout` bounds each ATFCF calculation; an overrun answers with
/// the regular 404 body.
pub fn app(state: AppState, request_timeout: Duration) -> Router {
    let state = AppState {
        request_timeout,
        ..state
    };

    Router::new()
        .route("/health", get(health))
        .merge(atfcf_routes::atfcf_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(request_id::request_id_middleware))
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "api_server=info,analysis_orchestrator=info,fundamental_analysis=info,yahoo_client=info,tower_http=info"
            .into()
    });

    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    tracing::info!(
        "Starting ATFCF API ({} statements, cache capacity {}, Yahoo limit {} per {}s, deadline {}s)",
        config.statement_frequency,
        config.cache_capacity,
        config.yahoo.rate_limit,
        config.yahoo.rate_window.as_secs(),
        config.request_timeout.as_secs()
    );

    let provider = Arc::new(YahooClient::new(config.yahoo.clone()));
    let orchestrator = AnalysisOrchestrator::new(provider)
        .with_frequency(config.statement_frequency)
        .with_cache_capacity(config.cache_capacity);

    let router = app(AppState::new(orchestrator), config.request_timeout);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
