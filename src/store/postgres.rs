//! Postgres-backed store.
//!
//! All uniqueness and atomicity guarantees are enforced here, not in the
//! services: unique indexes on username/email and on the vote key, a row
//! lock around the vote toggle, and a conditional update for refresh-token
//! rotation. Schema lives in `migrations/`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use tracing::Instrument;
use uuid::Uuid;

use super::{InsertUserOutcome, NewUserRecord, QuestionStore, ToggleOutcome, UserStore, VoteStore};
use crate::model::{QuestionHead, Role, TargetKind, UserRecord, VoteCount, VoteKind, VoteOutcome};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<UserRecord> {
    let role: String = row.get("role");
    Ok(UserRecord {
        id: row.get("id"),
        full_name: row.get("full_name"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: Role::from_str(&role).map_err(anyhow::Error::msg)?,
        verified: row.get("verified"),
        refresh_token: row.get("refresh_token"),
    })
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, new_user: NewUserRecord) -> Result<InsertUserOutcome> {
        let query = r"
            INSERT INTO users
                (id, full_name, username, email, password_hash, role, verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(new_user.id)
            .bind(&new_user.full_name)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(new_user.role.as_str())
            .bind(new_user.verified)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(InsertUserOutcome::Created(UserRecord {
                id: new_user.id,
                full_name: new_user.full_name,
                username: new_user.username,
                email: new_user.email,
                password_hash: new_user.password_hash,
                role: new_user.role,
                verified: new_user.verified,
                refresh_token: None,
            })),
            Err(err) if is_unique_violation(&err) => Ok(InsertUserOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn find_by_login(&self, username_or_email: &str) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT id, full_name, username, email, password_hash, role, verified, refresh_token
            FROM users
            WHERE username = $1 OR email = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username_or_email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by login")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT id, full_name, username, email, password_hash, role, verified, refresh_token
            FROM users
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn record_login(&self, id: Uuid, refresh_token: &str) -> Result<()> {
        let query = r"
            UPDATE users
            SET refresh_token = $2, last_login = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(refresh_token)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to store refresh token")?;
        Ok(())
    }

    async fn rotate_refresh_token(&self, id: Uuid, current: &str, next: &str) -> Result<bool> {
        // Single conditional update: two concurrent rotations of the same
        // token cannot both match, so exactly one wins.
        let query = r"
            UPDATE users
            SET refresh_token = $3
            WHERE id = $1 AND refresh_token = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(current)
            .bind(next)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to rotate refresh token")?;
        Ok(result.rows_affected() == 1)
    }

    async fn clear_refresh_token(&self, id: Uuid) -> Result<()> {
        let query = "UPDATE users SET refresh_token = NULL WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to clear refresh token")?;
        Ok(())
    }

    async fn record_logout(&self, id: Uuid) -> Result<()> {
        let query = r"
            UPDATE users
            SET refresh_token = NULL, last_active = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record logout")?;
        Ok(())
    }
}

#[async_trait]
impl VoteStore for PgStore {
    async fn toggle(
        &self,
        voter_id: Uuid,
        target_kind: TargetKind,
        target_id: Uuid,
        kind: VoteKind,
    ) -> Result<ToggleOutcome> {
        // The row lock serialises toggles on one key; the unique index on
        // (voter_id, target_kind, target_id) turns the remaining insert
        // race into a deterministic reject instead of a duplicate row.
        let mut tx = self.pool.begin().await.context("begin vote toggle")?;

        let query = r"
            SELECT kind FROM votes
            WHERE voter_id = $1 AND target_kind = $2 AND target_id = $3
            FOR UPDATE
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let existing = sqlx::query(query)
            .bind(voter_id)
            .bind(target_kind.as_str())
            .bind(target_id)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to lookup existing vote")?;

        let outcome = match existing {
            None => {
                let query = r"
                    INSERT INTO votes (id, voter_id, target_kind, target_id, kind)
                    VALUES ($1, $2, $3, $4, $5)
                ";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "INSERT",
                    db.statement = query
                );
                let result = sqlx::query(query)
                    .bind(Uuid::new_v4())
                    .bind(voter_id)
                    .bind(target_kind.as_str())
                    .bind(target_id)
                    .bind(kind.as_str())
                    .execute(&mut *tx)
                    .instrument(span)
                    .await;
                match result {
                    Ok(_) => VoteOutcome::Created,
                    Err(err) if is_unique_violation(&err) => {
                        let _ = tx.rollback().await;
                        return Ok(ToggleOutcome::RaceLost);
                    }
                    Err(err) => return Err(err).context("failed to insert vote"),
                }
            }
            Some(row) => {
                let stored: String = row.get("kind");
                let stored = VoteKind::from_str(&stored).map_err(anyhow::Error::msg)?;
                if stored == kind {
                    let query = r"
                        DELETE FROM votes
                        WHERE voter_id = $1 AND target_kind = $2 AND target_id = $3
                    ";
                    let span = tracing::info_span!(
                        "db.query",
                        db.system = "postgresql",
                        db.operation = "DELETE",
                        db.statement = query
                    );
                    sqlx::query(query)
                        .bind(voter_id)
                        .bind(target_kind.as_str())
                        .bind(target_id)
                        .execute(&mut *tx)
                        .instrument(span)
                        .await
                        .context("failed to withdraw vote")?;
                    VoteOutcome::Removed
                } else {
                    let query = r"
                        UPDATE votes
                        SET kind = $4
                        WHERE voter_id = $1 AND target_kind = $2 AND target_id = $3
                    ";
                    let span = tracing::info_span!(
                        "db.query",
                        db.system = "postgresql",
                        db.operation = "UPDATE",
                        db.statement = query
                    );
                    sqlx::query(query)
                        .bind(voter_id)
                        .bind(target_kind.as_str())
                        .bind(target_id)
                        .bind(kind.as_str())
                        .execute(&mut *tx)
                        .instrument(span)
                        .await
                        .context("failed to flip vote")?;
                    VoteOutcome::Updated
                }
            }
        };

        tx.commit().await.context("commit vote toggle")?;
        Ok(ToggleOutcome::Applied(outcome))
    }

    async fn count(&self, target_kind: TargetKind, target_id: Uuid) -> Result<VoteCount> {
        let query = r"
            SELECT
                COUNT(*) FILTER (WHERE kind = 'upvote') AS upvotes,
                COUNT(*) FILTER (WHERE kind = 'downvote') AS downvotes
            FROM votes
            WHERE target_kind = $1 AND target_id = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(target_kind.as_str())
            .bind(target_id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to count votes")?;

        Ok(VoteCount {
            upvotes: row.get::<Option<i64>, _>("upvotes").unwrap_or(0),
            downvotes: row.get::<Option<i64>, _>("downvotes").unwrap_or(0),
        })
    }
}

#[async_trait]
impl QuestionStore for PgStore {
    async fn question_head(&self, id: Uuid) -> Result<Option<QuestionHead>> {
        let query = r"
            SELECT id, author_id, accepted_answer
            FROM questions
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup question")?;

        Ok(row.map(|row| QuestionHead {
            id: row.get("id"),
            author_id: row.get("author_id"),
            accepted_answer: row.get("accepted_answer"),
        }))
    }

    async fn answer_question(&self, id: Uuid) -> Result<Option<Uuid>> {
        let query = "SELECT question_id FROM answers WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup answer")?;

        Ok(row.map(|row| row.get("question_id")))
    }

    async fn set_accepted_answer(&self, question_id: Uuid, answer_id: Uuid) -> Result<()> {
        let query = "UPDATE questions SET accepted_answer = $2 WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(question_id)
            .bind(answer_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to set accepted answer")?;
        Ok(())
    }
}
