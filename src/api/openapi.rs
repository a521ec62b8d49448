//! OpenAPI document aggregating the handler annotations.

use utoipa::OpenApi;

use crate::api::handlers;
use crate::auth::TokenPair;
use crate::model::{PublicUser, VoteCount};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "askora",
        description = "Q&A forum backend: sessions, votes, accepted answers"
    ),
    paths(
        handlers::health::health,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::guest_login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::votes::cast,
        handlers::votes::count,
        handlers::questions::accept,
    ),
    components(schemas(
        PublicUser,
        TokenPair,
        VoteCount,
        handlers::auth::RegisterRequest,
        handlers::auth::LoginRequest,
        handlers::auth::RefreshRequest,
        handlers::auth::LoginResponse,
        handlers::votes::CastVoteRequest,
        handlers::votes::CastVoteResponse,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_all_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
        assert!(paths
            .iter()
            .any(|p| p.as_str() == "/api/v1/users/refresh-token"));
        assert!(paths
            .iter()
            .any(|p| p.as_str() == "/api/v1/votes/{target_kind}/{target_id}"));
        assert_eq!(paths.len(), 10);
    }
}
