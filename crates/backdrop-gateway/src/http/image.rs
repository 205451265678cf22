use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /check-image: polled by the page to notice a new background.
///
/// `modified` is the artifact mtime in fractional epoch seconds; clients
/// reload the image when it changes.
pub async fn check_image(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.slot.info() {
        Some(info) => Json(json!({
            "exists": true,
            "path": state.public_path,
            "modified": info.modified_epoch_secs(),
        })),
        None => Json(json!({ "exists": false })),
    }
}

/// GET /reset-sessions: the reset itself happens client-side; this only
/// acknowledges the signal.
pub async fn reset_sessions() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Sessions reset signal sent",
    }))
}
