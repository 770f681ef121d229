pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::swap;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// `body_limit` caps the request body of upload routes.
pub fn api_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/swap", post(swap::swap))
        .layer(DefaultBodyLimit::max(body_limit))
}
