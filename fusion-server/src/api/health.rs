//! Liveness check

use axum::{Json, http::StatusCode};
use serde_json::{Value, json};

/// GET /health
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
