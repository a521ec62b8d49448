//! Vote endpoints: cast (toggle) and per-target counts.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{error_response, require_user};
use crate::api::AppState;
use crate::model::{TargetKind, VoteCount, VoteKind, VoteOutcome};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CastVoteRequest {
    target_type: TargetKind,
    target_id: Uuid,
    vote_type: VoteKind,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CastVoteResponse {
    pub outcome: VoteOutcome,
}

#[utoipa::path(
    post,
    path = "/api/v1/votes",
    request_body = CastVoteRequest,
    responses(
        (status = 201, description = "Vote added", body = CastVoteResponse),
        (status = 200, description = "Vote updated or removed", body = CastVoteResponse),
        (status = 400, description = "Missing or invalid payload"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Concurrent vote on the same target"),
    ),
    tag = "votes"
)]
pub async fn cast(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<CastVoteRequest>>,
) -> impl IntoResponse {
    let voter_id = match require_user(&state, &headers) {
        Ok(voter_id) => voter_id,
        Err(err) => return error_response(err).into_response(),
    };
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state
        .ledger
        .cast(
            voter_id,
            payload.target_type,
            payload.target_id,
            payload.vote_type,
        )
        .await
    {
        Ok(outcome) => {
            let status = match outcome {
                VoteOutcome::Created => StatusCode::CREATED,
                VoteOutcome::Updated | VoteOutcome::Removed => StatusCode::OK,
            };
            (status, Json(CastVoteResponse { outcome })).into_response()
        }
        Err(err) => error_response(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/votes/{target_kind}/{target_id}",
    params(
        ("target_kind" = String, Path, description = "Question or Answer"),
        ("target_id" = Uuid, Path, description = "Target id"),
    ),
    responses(
        (status = 200, description = "Vote counts", body = VoteCount),
        (status = 400, description = "Unknown target kind"),
    ),
    tag = "votes"
)]
pub async fn count(
    state: Extension<Arc<AppState>>,
    Path((target_kind, target_id)): Path<(String, Uuid)>,
) -> impl IntoResponse {
    let Ok(target_kind) = TargetKind::from_str(&target_kind) else {
        return (
            StatusCode::BAD_REQUEST,
            "Invalid target kind, expected Question or Answer".to_string(),
        )
            .into_response();
    };

    match state.ledger.count(target_kind, target_id).await {
        Ok(count) => (StatusCode::OK, Json(count)).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}
