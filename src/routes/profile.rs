use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::db::models::Post;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProfileView {
    pub user: CurrentUser,
    pub posts: Vec<Post>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/profile", get(profile))
}

/// The logged-in user's own posts, newest first.
async fn profile(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<ProfileView>> {
    let posts = state.posts.list_by_author(&user.handle).await?;
    Ok(Json(ProfileView { user, posts }))
}
