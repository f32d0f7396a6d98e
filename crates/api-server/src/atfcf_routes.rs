//! After-tax free cash flow endpoint.

use analysis_core::{AnalysisError, AtfcfResult};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct AtfcfQuery {
    #[serde(default)]
    pub ticker: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AtfcfResponse {
    /// Echoed exactly as the client sent it
    pub ticker: String,
    #[serde(flatten)]
    pub result: AtfcfResult,
}

pub fn atfcf_routes() -> Router<AppState> {
    Router::new().route("/atfcf", get(get_atfcf))
}

async fn get_atfcf(
    State(state): State<AppState>,
    query: Result<Query<AtfcfQuery>, QueryRejection>,
) -> Result<Json<AtfcfResponse>, AppError> {
    let ticker = match query {
        Ok(Query(q)) => q.ticker,
        Err(e) => {
            tracing::debug!("Unreadable query string: {}", e);
            None
        }
    }
    .filter(|t| !t.trim().is_empty())
    .ok_or(AppError::MissingTicker)?;

    let result = tokio::time::timeout(
        state.request_timeout,
        state.orchestrator.calculate_atfcf(&ticker),
    )
    .await
    .unwrap_or(Err(AnalysisError::Timeout(state.request_timeout)))
    .map_err(|source| AppError::Unavailable {
        ticker: ticker.clone(),
        source,
    })?;

    Ok(Json(AtfcfResponse { ticker, result }))
}
