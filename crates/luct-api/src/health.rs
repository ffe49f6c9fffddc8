use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use tracing::warn;

use luct_types::api::HealthResponse;

use crate::auth::{AppState, run_blocking};

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "LUCT Reporting API running",
        "timestamp": chrono::Utc::now(),
    }))
}

/// Always 200; the body says whether the database answered.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = match run_blocking(&state, |db| Ok(db.ping()?)).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Health check failed: {:?}", e);
            false
        }
    };

    Json(HealthResponse {
        status: if db_ok { "OK" } else { "DB connection failed" }.to_string(),
        timestamp: chrono::Utc::now(),
    })
}
