//! Storage capabilities injected into the core services.
//!
//! Each service receives the trait it needs, never a pool or connection
//! handle, so tests can substitute the in-memory fake. The atomicity
//! guarantees the core relies on (unique vote keys, compare-and-swap
//! refresh rotation, the three-way vote toggle) live behind these traits:
//! the Postgres backend enforces them with indexes, row locks, and
//! conditional updates; the memory backend serialises every operation
//! behind one mutex.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{QuestionHead, Role, TargetKind, UserRecord, VoteCount, VoteKind, VoteOutcome};

pub mod memory;
pub mod postgres;

/// Fields needed to create a user row. Username and email arrive already
/// normalized (trimmed, lowercased).
#[derive(Clone, Debug)]
pub struct NewUserRecord {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
}

/// Outcome when inserting against the unique username/email indexes.
#[derive(Debug)]
pub enum InsertUserOutcome {
    Created(UserRecord),
    Conflict,
}

/// Outcome of the atomic vote toggle. `RaceLost` means a concurrent insert
/// on the same key won; the boundary reports it as a conflict, never as a
/// duplicate row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    Applied(VoteOutcome),
    RaceLost,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, new_user: NewUserRecord) -> Result<InsertUserOutcome>;

    /// Lookup by normalized username or email, whichever matches.
    async fn find_by_login(&self, username_or_email: &str) -> Result<Option<UserRecord>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    /// Store the sole live refresh token and stamp `last_login`.
    async fn record_login(&self, id: Uuid, refresh_token: &str) -> Result<()>;

    /// Compare-and-swap rotation: replace the slot only if it still holds
    /// `current`. Returns false when the stored value no longer matches
    /// (replayed token or a lost concurrent rotation).
    async fn rotate_refresh_token(&self, id: Uuid, current: &str, next: &str) -> Result<bool>;

    /// Clear the slot without touching activity timestamps (replay
    /// handling). Idempotent.
    async fn clear_refresh_token(&self, id: Uuid) -> Result<()>;

    /// Clear the slot and stamp `last_active` (logout). Idempotent.
    async fn record_logout(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait VoteStore: Send + Sync {
    /// The three-way toggle as one atomic unit per (voter, target) key:
    /// no row creates one, a same-direction row deletes it, an
    /// opposite-direction row flips in place.
    async fn toggle(
        &self,
        voter_id: Uuid,
        target_kind: TargetKind,
        target_id: Uuid,
        kind: VoteKind,
    ) -> Result<ToggleOutcome>;

    /// Counts ledger rows per direction as of the read.
    async fn count(&self, target_kind: TargetKind, target_id: Uuid) -> Result<VoteCount>;
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn question_head(&self, id: Uuid) -> Result<Option<QuestionHead>>;

    /// The question an answer belongs to, if the answer exists.
    async fn answer_question(&self, id: Uuid) -> Result<Option<Uuid>>;

    async fn set_accepted_answer(&self, question_id: Uuid, answer_id: Uuid) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::{InsertUserOutcome, ToggleOutcome};
    use crate::model::VoteOutcome;

    #[test]
    fn toggle_outcome_distinguishes_race_losses() {
        assert_ne!(
            ToggleOutcome::Applied(VoteOutcome::Created),
            ToggleOutcome::RaceLost
        );
    }

    #[test]
    fn insert_outcome_debug_names() {
        assert_eq!(format!("{:?}", InsertUserOutcome::Conflict), "Conflict");
    }
}
