// src/routes/risk.rs - Risk scoring routes
use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::risk::{get_statistics, report_fraud, score_transaction};
use crate::state::AppState;

/// Create risk scoring routes
pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Score a transaction in real time
        .route("/transactions/score", post(score_transaction))

        // Ground-truth feedback on a prior transaction
        .route("/transactions/feedback", post(report_fraud))

        // Aggregates over the trailing 24 hours
        .route("/transactions/statistics", get(get_statistics))
}
