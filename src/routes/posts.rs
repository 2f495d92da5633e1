use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::CurrentUser;
use crate::db::models::{Post, PostOrder};
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::posts::PostDraft;
use crate::state::AppState;

// --- Views ---

#[derive(Serialize)]
pub struct FeedView {
    pub user: Option<CurrentUser>,
    pub posts: Vec<Post>,
}

// --- Forms ---

#[derive(Deserialize, Default)]
pub struct FeedQuery {
    #[serde(default)]
    pub sort: PostOrder,
    pub tag: Option<String>,
}

#[derive(Deserialize)]
pub struct CreatePostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Comma-separated
    #[serde(default)]
    pub tags: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(feed))
        .route("/post/{id}", get(post_detail))
        .route("/posts", post(create_post))
        .route("/like/{id}", post(like_post))
        .route("/delete/{id}", post(delete_post))
}

// --- Handlers ---

async fn feed(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<FeedView>> {
    let posts = match query.tag.as_deref().map(str::trim) {
        Some(tag) if !tag.is_empty() => state.posts.list_by_tag(tag).await?,
        _ => match query.sort {
            PostOrder::Recent => state.posts.list_recent().await?,
            PostOrder::Popular => state.posts.list_popular().await?,
        },
    };

    Ok(Json(FeedView { user, posts }))
}

async fn post_detail(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Post>> {
    Ok(Json(state.posts.get(id).await?))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CreatePostForm>,
) -> AppResult<Response> {
    let draft = PostDraft {
        title: form.title,
        body: form.body,
        tags: form.tags.split(',').map(str::to_string).collect(),
    };
    let post = state.posts.create(draft, &user).await?;

    Ok((StatusCode::CREATED, Json(post)).into_response())
}

async fn like_post(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let likes = state.posts.increment_like(id).await?;
    Ok(Json(json!({ "likes": likes })).into_response())
}

async fn delete_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    state.posts.delete_owned(id, user.as_ref()).await?;
    Ok(Json(json!({ "deleted": id })).into_response())
}
