pub mod auth;
pub mod avatar;
pub mod posts;
pub mod profile;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router with request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(posts::router())
        .merge(profile::router())
        .merge(avatar::router())
        .merge(auth::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
