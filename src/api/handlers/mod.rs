//! Route handlers and shared request plumbing.

pub mod auth;
pub mod health;
pub mod questions;
pub mod votes;

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use tracing::error;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::Error;

/// Map a domain error to its HTTP response. Internal causes are logged
/// here and never echoed to the client.
pub(crate) fn error_response(err: Error) -> (StatusCode, String) {
    match err {
        Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
        Error::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        Error::Conflict(msg) => (StatusCode::CONFLICT, msg),
        Error::Internal(err) => {
            error!("Internal error: {err:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

/// Resolve the acting user from `Authorization: Bearer` or the access
/// cookie, in that order.
pub(crate) fn require_user(state: &AppState, headers: &HeaderMap) -> Result<Uuid, Error> {
    let Some(token) = extract_token(headers, auth::ACCESS_COOKIE_NAME) else {
        return Err(Error::unauthorized("authentication required"));
    };
    state.identity.authenticate(&token)
}

pub(crate) fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    extract_cookie(headers, cookie_name)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub(crate) fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("accessToken=xyz"),
        );
        assert_eq!(
            extract_token(&headers, "accessToken"),
            Some("abc".to_string())
        );
    }

    #[test]
    fn cookie_is_parsed_from_multiple_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=xyz; other=1"),
        );
        assert_eq!(
            extract_token(&headers, "accessToken"),
            Some("xyz".to_string())
        );
    }

    #[test]
    fn empty_bearer_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer  "));
        assert_eq!(extract_token(&headers, "accessToken"), None);
    }

    #[test]
    fn internal_errors_are_not_echoed() {
        let (status, body) = error_response(Error::from(anyhow::anyhow!("secret detail")));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Internal server error");
    }
}
