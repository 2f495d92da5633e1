use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{CurrentUser, ProviderIdentity, Session};
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::extractors::SessionContext;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct HandleForm {
    #[serde(default)]
    pub handle: String,
}

/// Identity the provider collaborator has already verified.
#[derive(Deserialize)]
pub struct ProviderForm {
    pub subject: String,
    pub email: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_status).post(login))
        .route("/login/provider", post(provider_login))
        .route("/register", post(register))
        .route("/logout", post(logout))
}

// -- Cookie helpers --

fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    let max_age_secs = auth.session_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        auth.cookie_name, token, max_age_secs
    )
}

fn clear_session_cookie(auth: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        auth.cookie_name
    )
}

/// Write session changes back to the store. Returns the `Set-Cookie` value
/// when the client's cookie has to change.
pub async fn commit_session(state: &AppState, session: &mut Session) -> AppResult<Option<String>> {
    if session.is_destroyed() {
        if let Some(token) = session.token() {
            state.sessions.destroy(token).await?;
        }
        return Ok(Some(clear_session_cookie(&state.config.auth)));
    }

    if session.is_dirty() {
        let token = state.sessions.save(session).await?;
        return Ok(Some(session_cookie(&state.config.auth, &token)));
    }

    Ok(None)
}

fn with_cookie(cookie: Option<String>, body: impl IntoResponse) -> Response {
    (AppendHeaders(cookie.map(|c| (header::SET_COOKIE, c))), body).into_response()
}

// -- Handlers --

/// GET /login - whether the session is logged in, or waiting on a handle
/// after a provider login.
async fn login_status(
    State(state): State<AppState>,
    SessionContext(session): SessionContext,
) -> AppResult<Response> {
    let user = state.resolver.resolve_current_user(&session).await?;
    let pending_registration = user.is_none() && session.user_id().is_some();

    Ok(Json(json!({
        "user": user,
        "pending_registration": pending_registration,
    }))
    .into_response())
}

/// POST /login
async fn login(
    State(state): State<AppState>,
    SessionContext(mut session): SessionContext,
    Form(form): Form<HandleForm>,
) -> AppResult<Response> {
    let user = state.resolver.login_local(&mut session, &form.handle).await?;
    let cookie = commit_session(&state, &mut session).await?;
    Ok(with_cookie(cookie, Json(user)))
}

/// POST /login/provider - called by the identity provider collaborator once
/// its token exchange has succeeded. Unknown subjects come back pending.
async fn provider_login(
    State(state): State<AppState>,
    SessionContext(mut session): SessionContext,
    headers: HeaderMap,
    Form(form): Form<ProviderForm>,
) -> AppResult<Response> {
    let Some(expected) = state.config.auth.provider_token.as_deref() else {
        return Err(AppError::NotFound("Provider login is not configured".into()));
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented != Some(expected) {
        tracing::warn!("Rejected provider callback with a bad token");
        return Err(AppError::Forbidden("Invalid provider token".into()));
    }

    let subject = form.subject.trim();
    if subject.is_empty() {
        return Err(AppError::Validation("Subject is required".into()));
    }
    let identity = ProviderIdentity {
        subject: subject.to_string(),
        email: form.email.filter(|e| !e.trim().is_empty()),
    };

    let user = state
        .resolver
        .login_or_register_via_provider(&mut session, &identity)
        .await?;
    let pending_registration = user.is_unclaimed();
    let user = CurrentUser::from_user(user);
    let cookie = commit_session(&state, &mut session).await?;

    Ok(with_cookie(
        cookie,
        Json(json!({
            "user": user,
            "pending_registration": pending_registration,
        })),
    ))
}

/// POST /register - new local account, or claim a handle after provider login
async fn register(
    State(state): State<AppState>,
    SessionContext(mut session): SessionContext,
    Form(form): Form<HandleForm>,
) -> AppResult<Response> {
    let user = state
        .resolver
        .register_local_handle(&mut session, &form.handle)
        .await?;
    let cookie = commit_session(&state, &mut session).await?;
    Ok(with_cookie(cookie, Json(user)))
}

/// POST /logout
async fn logout(
    State(state): State<AppState>,
    SessionContext(mut session): SessionContext,
) -> AppResult<Response> {
    state.resolver.logout(&mut session);
    let cookie = commit_session(&state, &mut session).await?;
    Ok(with_cookie(cookie, Redirect::to("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookies_use_configured_name() {
        let auth = AuthConfig {
            cookie_name: "blog".to_string(),
            session_hours: 2,
            proof_secret: None,
            provider_token: None,
        };
        assert_eq!(
            session_cookie(&auth, "tok"),
            "blog=tok; HttpOnly; SameSite=Strict; Path=/; Max-Age=7200"
        );
        assert_eq!(
            clear_session_cookie(&auth),
            "blog=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"
        );
    }
}
