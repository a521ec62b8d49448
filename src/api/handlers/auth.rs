//! Session endpoints: register, login, guest login, refresh, logout, me.
//!
//! Tokens travel both as `HttpOnly` cookies and in the JSON body; requests
//! authenticate with `Authorization: Bearer` or the cookie, in that order.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{error_response, extract_cookie, require_user};
use crate::api::AppState;
use crate::auth::{AuthConfig, NewUser, TokenPair};
use crate::model::PublicUser;

pub(crate) const ACCESS_COOKIE_NAME: &str = "accessToken";
pub(crate) const REFRESH_COOKIE_NAME: &str = "refreshToken";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    full_name: String,
    username: String,
    email: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    username: Option<String>,
    email: Option<String>,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = PublicUser),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "Username or email already taken"),
    ),
    tag = "users"
)]
pub async fn register(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let new_user = NewUser {
        full_name: payload.full_name,
        username: payload.username,
        email: payload.email,
        password: payload.password,
    };
    match state.identity.register(new_user).await {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session started", body = LoginResponse),
        (status = 400, description = "Missing payload or login"),
        (status = 401, description = "Invalid credentials or unverified account"),
        (status = 404, description = "User not found"),
    ),
    tag = "users"
)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let Some(login) = payload.username.or(payload.email) else {
        return (
            StatusCode::BAD_REQUEST,
            "Username or email is required".to_string(),
        )
            .into_response();
    };

    match state.identity.login(&login, &payload.password).await {
        Ok(success) => session_response(StatusCode::OK, success.user, success.tokens, &state.config),
        Err(err) => error_response(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/users/guest",
    responses(
        (status = 200, description = "Guest session started", body = LoginResponse),
    ),
    tag = "users"
)]
pub async fn guest_login(state: Extension<Arc<AppState>>) -> impl IntoResponse {
    match state.identity.guest_login().await {
        Ok(success) => session_response(StatusCode::OK, success.user, success.tokens, &state.config),
        Err(err) => error_response(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/users/refresh-token",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = TokenPair),
        (status = 401, description = "Missing, invalid or replayed refresh token"),
    ),
    tag = "users"
)]
pub async fn refresh(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let presented = payload
        .and_then(|Json(body)| body.refresh_token)
        .or_else(|| extract_cookie(&headers, REFRESH_COOKIE_NAME));
    let Some(presented) = presented else {
        return (
            StatusCode::UNAUTHORIZED,
            "No refresh token provided".to_string(),
        )
            .into_response();
    };

    match state.identity.refresh(&presented).await {
        Ok(tokens) => {
            let mut response_headers = HeaderMap::new();
            set_token_cookies(&mut response_headers, &tokens, &state.config);
            (StatusCode::OK, response_headers, Json(tokens)).into_response()
        }
        Err(err) => error_response(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/users/logout",
    responses(
        (status = 200, description = "Session cleared"),
        (status = 401, description = "Not authenticated"),
    ),
    tag = "users"
)]
pub async fn logout(state: Extension<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match require_user(&state, &headers) {
        Ok(user_id) => user_id,
        Err(err) => return error_response(err).into_response(),
    };

    if let Err(err) = state.identity.logout(user_id).await {
        return error_response(err).into_response();
    }

    // Always clear both cookies, even if the slot was already empty.
    let mut response_headers = HeaderMap::new();
    let secure = state.config.cookie_secure();
    if let Ok(cookie) = clear_cookie(ACCESS_COOKIE_NAME, secure) {
        response_headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = clear_cookie(REFRESH_COOKIE_NAME, secure) {
        response_headers.append(SET_COOKIE, cookie);
    }
    (
        StatusCode::OK,
        response_headers,
        "Logged out successfully".to_string(),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current user", body = PublicUser),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User no longer exists"),
    ),
    tag = "users"
)]
pub async fn me(state: Extension<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match require_user(&state, &headers) {
        Ok(user_id) => user_id,
        Err(err) => return error_response(err).into_response(),
    };

    match state.identity.current_user(user_id).await {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

fn session_response(
    status: StatusCode,
    user: PublicUser,
    tokens: TokenPair,
    config: &AuthConfig,
) -> axum::response::Response {
    let mut response_headers = HeaderMap::new();
    set_token_cookies(&mut response_headers, &tokens, config);
    let body = LoginResponse {
        user,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    };
    (status, response_headers, Json(body)).into_response()
}

fn set_token_cookies(headers: &mut HeaderMap, tokens: &TokenPair, config: &AuthConfig) {
    let secure = config.cookie_secure();
    if let Ok(cookie) = auth_cookie(
        ACCESS_COOKIE_NAME,
        &tokens.access_token,
        config.access_ttl_seconds(),
        secure,
    ) {
        headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = auth_cookie(
        REFRESH_COOKIE_NAME,
        &tokens.refresh_token,
        config.refresh_ttl_seconds(),
        secure,
    ) {
        headers.append(SET_COOKIE, cookie);
    }
}

/// Build an `HttpOnly` cookie for a session token.
fn auth_cookie(
    name: &str,
    token: &str,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
