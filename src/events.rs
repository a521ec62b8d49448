//! Activity hook: the seam where the excluded notification layer attaches.
//!
//! The core only reports that something happened; delivery, fan-out, and
//! display are someone else's concern. The default hook emits structured
//! log lines and nothing more.

use crate::model::{TargetKind, VoteKind, VoteOutcome};
use tracing::debug;
use uuid::Uuid;

pub trait ActivityHook: Send + Sync {
    fn vote_recorded(
        &self,
        voter_id: Uuid,
        target_kind: TargetKind,
        target_id: Uuid,
        kind: VoteKind,
        outcome: VoteOutcome,
    );

    fn answer_accepted(&self, question_id: Uuid, answer_id: Uuid, author_id: Uuid);
}

/// Default hook: log and move on.
pub struct LogActivityHook;

impl ActivityHook for LogActivityHook {
    fn vote_recorded(
        &self,
        voter_id: Uuid,
        target_kind: TargetKind,
        target_id: Uuid,
        kind: VoteKind,
        outcome: VoteOutcome,
    ) {
        debug!(
            voter_id = %voter_id,
            target_kind = %target_kind,
            target_id = %target_id,
            vote_kind = kind.as_str(),
            ?outcome,
            "vote recorded"
        );
    }

    fn answer_accepted(&self, question_id: Uuid, answer_id: Uuid, author_id: Uuid) {
        debug!(
            question_id = %question_id,
            answer_id = %answer_id,
            author_id = %author_id,
            "answer accepted"
        );
    }
}
