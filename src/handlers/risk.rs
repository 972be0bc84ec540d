// src/handlers/risk.rs - Risk scoring HTTP handlers
use axum::{extract::State, http::HeaderMap, response::Json};
use tracing::instrument;
use validator::Validate;

use crate::middleware::error_handler::ApiError;
use crate::models::risk::StatisticsResponse;
use crate::models::transaction::{
    MessageResponse, ReportFraudRequest, RiskAssessmentResponse, ScoreTransactionRequest,
};
use crate::state::AppState;

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
}

/// Score one transaction and persist its record.
#[instrument(skip(state, headers, request))]
pub async fn score_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ScoreTransactionRequest>,
) -> Result<Json<RiskAssessmentResponse>, ApiError> {
    request.validate()?;
    let ip_address = client_ip(&headers);
    let response = state
        .risk_engine
        .score(request.into_input(), ip_address)
        .await?;
    Ok(Json(response))
}

/// Apply a ground-truth label to a prior transaction.
#[instrument(skip(state, request))]
pub async fn report_fraud(
    State(state): State<AppState>,
    Json(request): Json<ReportFraudRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let response = state.feedback_service.report(request).await?;
    Ok(Json(response))
}

/// Trailing 24 h status breakdown and risk distribution.
pub async fn get_statistics(
    State(state): State<AppState>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let response = state.stats_service.summary().await?;
    Ok(Json(response))
}
