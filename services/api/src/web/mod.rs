pub mod protocol;
pub mod rest;
pub mod state;
pub mod viewer_task;
pub mod ws_handler;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

// Re-export the main handlers to make them easily accessible
// to the binary that builds the web server router.
pub use rest::{
    delete_interactions_handler, list_stories_handler, mark_seen_handler, next_page_handler,
    story_detail_handler, toggle_like_handler,
};
pub use ws_handler::ws_handler;

/// Builds the REST and WebSocket routes over the shared state.
pub fn router(app_state: Arc<state::AppState>) -> Router {
    Router::new()
        .route("/stories", get(list_stories_handler))
        .route("/stories/next-page", post(next_page_handler))
        .route("/stories/{id}", get(story_detail_handler))
        .route("/stories/{id}/seen", post(mark_seen_handler))
        .route("/stories/{id}/like", post(toggle_like_handler))
        .route("/interactions", delete(delete_interactions_handler))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}
