//! Accepted-answer endpoint.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{error_response, require_user};
use crate::api::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/questions/{question_id}/accept/{answer_id}",
    params(
        ("question_id" = Uuid, Path, description = "Question id"),
        ("answer_id" = Uuid, Path, description = "Answer id"),
    ),
    responses(
        (status = 200, description = "Answer accepted"),
        (status = 400, description = "Answer belongs to another question"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Only the question author can accept"),
        (status = 404, description = "Question or answer not found"),
    ),
    tag = "questions"
)]
pub async fn accept(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path((question_id, answer_id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    let acting_user = match require_user(&state, &headers) {
        Ok(user_id) => user_id,
        Err(err) => return error_response(err).into_response(),
    };

    match state
        .acceptance
        .accept(acting_user, question_id, answer_id)
        .await
    {
        Ok(()) => (StatusCode::OK, "Answer accepted".to_string()).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}
