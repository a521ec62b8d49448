//! Shared data model: users, roles, vote targets and directions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Closed role set. Policy decisions match on this exhaustively; there is
/// no string-typed role anywhere past the storage layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Regular,
    Admin,
    Guest,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Admin => "admin",
            Self::Guest => "guest",
        }
    }

    /// Guests are implicitly verified and skip the verification gate.
    #[must_use]
    pub fn requires_verification(self) -> bool {
        match self {
            Self::Regular | Self::Admin => true,
            Self::Guest => false,
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "regular" => Ok(Self::Regular),
            "admin" => Ok(Self::Admin),
            "guest" => Ok(Self::Guest),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Stored user row. The password hash and refresh-token slot never appear
/// in any serialized projection.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
    /// The single live refresh token, if a session is active.
    pub refresh_token: Option<String>,
}

impl UserRecord {
    /// Client-visible projection.
    #[must_use]
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            full_name: self.full_name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            verified: self.verified,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PublicUser {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
}

/// What a vote points at. Serialized as `Question`/`Answer` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum TargetKind {
    Question,
    Answer,
}

impl TargetKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Question => "Question",
            Self::Answer => "Answer",
        }
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Question" => Ok(Self::Question),
            "Answer" => Ok(Self::Answer),
            other => Err(format!("invalid target type: {other}")),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vote direction. Serialized as `upvote`/`downvote`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Upvote,
    Downvote,
}

impl VoteKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upvote => "upvote",
            Self::Downvote => "downvote",
        }
    }
}

impl FromStr for VoteKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "upvote" => Ok(Self::Upvote),
            "downvote" => Ok(Self::Downvote),
            other => Err(format!("invalid vote type: {other}")),
        }
    }
}

/// Result of a cast: the only three transitions the ledger allows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Created,
    Updated,
    Removed,
}

/// Point-in-time aggregate counts for one target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VoteCount {
    pub upvotes: i64,
    pub downvotes: i64,
}

/// The slice of a question the acceptance workflow touches.
#[derive(Clone, Copy, Debug)]
pub struct QuestionHead {
    pub id: Uuid,
    pub author_id: Uuid,
    pub accepted_answer: Option<Uuid>,
}
