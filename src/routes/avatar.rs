use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::avatar::avatar_for_handle;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/avatar/{handle}", get(serve))
}

async fn serve(State(state): State<AppState>, Path(handle): Path<String>) -> AppResult<Response> {
    if state.users.get_user_by_handle(&handle).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }

    let png = avatar_for_handle(&handle)?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        png,
    )
        .into_response())
}
