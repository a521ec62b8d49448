//! In-memory store backing tests.
//!
//! One mutex around the whole state gives every operation the same
//! atomicity the database provides with row locks and unique indexes, so
//! the core's invariants can be exercised without Postgres.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{InsertUserOutcome, NewUserRecord, QuestionStore, ToggleOutcome, UserStore, VoteStore};
use crate::model::{QuestionHead, TargetKind, UserRecord, VoteCount, VoteKind, VoteOutcome};

struct MemUser {
    record: UserRecord,
    last_login: Option<i64>,
    last_active: Option<i64>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, MemUser>,
    votes: HashMap<(Uuid, TargetKind, Uuid), VoteKind>,
    questions: HashMap<Uuid, QuestionHead>,
    answers: HashMap<Uuid, Uuid>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a question owned by `author_id`; returns its id.
    pub async fn seed_question(&self, author_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        let mut state = self.inner.lock().await;
        state.questions.insert(
            id,
            QuestionHead {
                id,
                author_id,
                accepted_answer: None,
            },
        );
        id
    }

    /// Seed an answer belonging to `question_id`; returns its id.
    pub async fn seed_answer(&self, question_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        let mut state = self.inner.lock().await;
        state.answers.insert(id, question_id);
        id
    }

    /// Accepted answer currently stored for a question, for assertions.
    pub async fn accepted_answer(&self, question_id: Uuid) -> Option<Uuid> {
        let state = self.inner.lock().await;
        state
            .questions
            .get(&question_id)
            .and_then(|question| question.accepted_answer)
    }

    /// Last-login stamp, for assertions.
    pub async fn last_login(&self, user_id: Uuid) -> Option<i64> {
        let state = self.inner.lock().await;
        state.users.get(&user_id).and_then(|user| user.last_login)
    }
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(0))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, new_user: NewUserRecord) -> Result<InsertUserOutcome> {
        let mut state = self.inner.lock().await;
        let taken = state.users.values().any(|user| {
            user.record.username == new_user.username || user.record.email == new_user.email
        });
        if taken {
            return Ok(InsertUserOutcome::Conflict);
        }
        let record = UserRecord {
            id: new_user.id,
            full_name: new_user.full_name,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            verified: new_user.verified,
            refresh_token: None,
        };
        state.users.insert(
            record.id,
            MemUser {
                record: record.clone(),
                last_login: None,
                last_active: None,
            },
        );
        Ok(InsertUserOutcome::Created(record))
    }

    async fn find_by_login(&self, username_or_email: &str) -> Result<Option<UserRecord>> {
        let state = self.inner.lock().await;
        Ok(state
            .users
            .values()
            .find(|user| {
                user.record.username == username_or_email || user.record.email == username_or_email
            })
            .map(|user| user.record.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let state = self.inner.lock().await;
        Ok(state.users.get(&id).map(|user| user.record.clone()))
    }

    async fn record_login(&self, id: Uuid, refresh_token: &str) -> Result<()> {
        let mut state = self.inner.lock().await;
        if let Some(user) = state.users.get_mut(&id) {
            user.record.refresh_token = Some(refresh_token.to_string());
            user.last_login = Some(now_unix_seconds());
        }
        Ok(())
    }

    async fn rotate_refresh_token(&self, id: Uuid, current: &str, next: &str) -> Result<bool> {
        let mut state = self.inner.lock().await;
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(false);
        };
        if user.record.refresh_token.as_deref() == Some(current) {
            user.record.refresh_token = Some(next.to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn clear_refresh_token(&self, id: Uuid) -> Result<()> {
        let mut state = self.inner.lock().await;
        if let Some(user) = state.users.get_mut(&id) {
            user.record.refresh_token = None;
        }
        Ok(())
    }

    async fn record_logout(&self, id: Uuid) -> Result<()> {
        let mut state = self.inner.lock().await;
        if let Some(user) = state.users.get_mut(&id) {
            user.record.refresh_token = None;
            user.last_active = Some(now_unix_seconds());
        }
        Ok(())
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn toggle(
        &self,
        voter_id: Uuid,
        target_kind: TargetKind,
        target_id: Uuid,
        kind: VoteKind,
    ) -> Result<ToggleOutcome> {
        // The lock is held for the whole three-way branch, so concurrent
        // casts on one key serialise just like the transactional backend.
        let mut state = self.inner.lock().await;
        let key = (voter_id, target_kind, target_id);
        let outcome = match state.votes.get(&key) {
            None => {
                state.votes.insert(key, kind);
                VoteOutcome::Created
            }
            Some(existing) if *existing == kind => {
                state.votes.remove(&key);
                VoteOutcome::Removed
            }
            Some(_) => {
                state.votes.insert(key, kind);
                VoteOutcome::Updated
            }
        };
        Ok(ToggleOutcome::Applied(outcome))
    }

    async fn count(&self, target_kind: TargetKind, target_id: Uuid) -> Result<VoteCount> {
        let state = self.inner.lock().await;
        let mut count = VoteCount::default();
        for ((_, vote_target_kind, vote_target_id), kind) in &state.votes {
            if *vote_target_kind == target_kind && *vote_target_id == target_id {
                match kind {
                    VoteKind::Upvote => count.upvotes += 1,
                    VoteKind::Downvote => count.downvotes += 1,
                }
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn question_head(&self, id: Uuid) -> Result<Option<QuestionHead>> {
        let state = self.inner.lock().await;
        Ok(state.questions.get(&id).copied())
    }

    async fn answer_question(&self, id: Uuid) -> Result<Option<Uuid>> {
        let state = self.inner.lock().await;
        Ok(state.answers.get(&id).copied())
    }

    async fn set_accepted_answer(&self, question_id: Uuid, answer_id: Uuid) -> Result<()> {
        let mut state = self.inner.lock().await;
        if let Some(question) = state.questions.get_mut(&question_id) {
            question.accepted_answer = Some(answer_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn new_user(username: &str, email: &str) -> NewUserRecord {
        NewUserRecord {
            id: Uuid::new_v4(),
            full_name: "Test User".to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::Regular,
            verified: true,
        }
    }

    #[tokio::test]
    async fn insert_user_rejects_duplicate_username_or_email() -> Result<()> {
        let store = MemoryStore::new();
        let outcome = store.insert_user(new_user("alice", "alice@x.com")).await?;
        assert!(matches!(outcome, InsertUserOutcome::Created(_)));

        let outcome = store.insert_user(new_user("alice", "other@x.com")).await?;
        assert!(matches!(outcome, InsertUserOutcome::Conflict));

        let outcome = store.insert_user(new_user("other", "alice@x.com")).await?;
        assert!(matches!(outcome, InsertUserOutcome::Conflict));
        Ok(())
    }

    #[tokio::test]
    async fn rotate_refresh_token_is_compare_and_swap() -> Result<()> {
        let store = MemoryStore::new();
        let InsertUserOutcome::Created(user) =
            store.insert_user(new_user("bob", "bob@x.com")).await?
        else {
            panic!("expected created");
        };

        store.record_login(user.id, "first").await?;
        assert!(store.rotate_refresh_token(user.id, "first", "second").await?);
        // The old value no longer matches.
        assert!(!store.rotate_refresh_token(user.id, "first", "third").await?);

        let stored = store.find_by_id(user.id).await?.expect("user exists");
        assert_eq!(stored.refresh_token.as_deref(), Some("second"));
        Ok(())
    }

    #[tokio::test]
    async fn toggle_walks_create_update_remove() -> Result<()> {
        let store = MemoryStore::new();
        let voter = Uuid::new_v4();
        let target = Uuid::new_v4();

        let outcome = store
            .toggle(voter, TargetKind::Question, target, VoteKind::Upvote)
            .await?;
        assert_eq!(outcome, ToggleOutcome::Applied(VoteOutcome::Created));

        let outcome = store
            .toggle(voter, TargetKind::Question, target, VoteKind::Downvote)
            .await?;
        assert_eq!(outcome, ToggleOutcome::Applied(VoteOutcome::Updated));

        let outcome = store
            .toggle(voter, TargetKind::Question, target, VoteKind::Downvote)
            .await?;
        assert_eq!(outcome, ToggleOutcome::Applied(VoteOutcome::Removed));

        let count = store.count(TargetKind::Question, target).await?;
        assert_eq!(count, VoteCount::default());
        Ok(())
    }

    #[tokio::test]
    async fn count_separates_targets_and_directions() -> Result<()> {
        let store = MemoryStore::new();
        let target = Uuid::new_v4();
        let other = Uuid::new_v4();

        for _ in 0..3 {
            store
                .toggle(Uuid::new_v4(), TargetKind::Answer, target, VoteKind::Upvote)
                .await?;
        }
        store
            .toggle(Uuid::new_v4(), TargetKind::Answer, target, VoteKind::Downvote)
            .await?;
        store
            .toggle(Uuid::new_v4(), TargetKind::Answer, other, VoteKind::Upvote)
            .await?;
        // Same id under a different target kind counts separately.
        store
            .toggle(Uuid::new_v4(), TargetKind::Question, target, VoteKind::Upvote)
            .await?;

        let count = store.count(TargetKind::Answer, target).await?;
        assert_eq!(
            count,
            VoteCount {
                upvotes: 3,
                downvotes: 1
            }
        );
        Ok(())
    }
}
