//! ISR API Handlers

use axum::{Json, extract::State};

use crate::api::AppState;

const MANUAL_REASON: &str = "trigger incremental rendering by manual";

/// POST /api/admin/isr
/// Regenerates every page in the background
pub async fn trigger_all(State(state): State<AppState>) -> Json<bool> {
    let scheduled = state.trigger.spawn_trigger_all(MANUAL_REASON).is_some();
    Json(scheduled)
}
