//! Route table and middleware stack.

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::post, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::photos::upload_photo;
use crate::state::AppState;

/// Slack on top of the largest category ceiling for multipart framing and the
/// non-file fields.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let max_upload = state
        .config
        .max_photo_size_bytes
        .max(state.config.max_avatar_size_bytes)
        .max(state.config.max_banner_size_bytes);

    Router::new()
        .route("/api/v0/photos", post(upload_photo))
        .layer(DefaultBodyLimit::max(max_upload + BODY_LIMIT_SLACK))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
