use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::{CurrentUser, Session};
use crate::error::AppError;
use crate::state::AppState;

/// The request's session, loaded through the session cookie. Requests
/// without a live session get an empty one that is only persisted if a
/// handler writes to it.
pub struct SessionContext(pub Session);

impl FromRequestParts<AppState> for SessionContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_session_token(parts, &state.config.auth.cookie_name) else {
            return Ok(SessionContext(Session::default()));
        };

        let session = state.sessions.load(token).await?.unwrap_or_default();
        Ok(SessionContext(session))
    }
}

/// Extractor that requires authentication.
/// Redirects to the login page if no logged-in user is found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let SessionContext(session) = SessionContext::from_request_parts(parts, state).await?;
        Ok(state.resolver.require_authenticated(&session).await?)
    }
}

/// Optional user extractor: `None` instead of a redirect when not logged in.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let SessionContext(session) = SessionContext::from_request_parts(parts, state).await?;
        Ok(MaybeUser(state.resolver.resolve_current_user(&session).await?))
    }
}

fn extract_session_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_cookie(cookie: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header::COOKIE, cookie)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn finds_named_cookie_among_others() {
        let parts = parts_with_cookie("theme=dark; microblog_session=abc123; lang=en");
        assert_eq!(
            extract_session_token(&parts, "microblog_session"),
            Some("abc123")
        );
    }

    #[test]
    fn missing_or_empty_cookie_is_none() {
        let parts = parts_with_cookie("theme=dark");
        assert_eq!(extract_session_token(&parts, "microblog_session"), None);

        let parts = parts_with_cookie("microblog_session=");
        assert_eq!(extract_session_token(&parts, "microblog_session"), None);
    }
}
