//! Vote ledger: at most one vote per (voter, target), applied as an
//! atomic toggle.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::Error;
use crate::events::ActivityHook;
use crate::model::{TargetKind, VoteCount, VoteKind, VoteOutcome};
use crate::store::{ToggleOutcome, VoteStore};

pub struct VoteLedger {
    votes: Arc<dyn VoteStore>,
    hook: Arc<dyn ActivityHook>,
}

impl VoteLedger {
    #[must_use]
    pub fn new(votes: Arc<dyn VoteStore>, hook: Arc<dyn ActivityHook>) -> Self {
        Self { votes, hook }
    }

    /// Apply a vote as a toggle against the current ledger row:
    /// no row creates one, the same kind removes it, the other kind
    /// flips it. Exactly one branch runs per call.
    pub async fn cast(
        &self,
        voter_id: Uuid,
        target_kind: TargetKind,
        target_id: Uuid,
        kind: VoteKind,
    ) -> Result<VoteOutcome, Error> {
        match self
            .votes
            .toggle(voter_id, target_kind, target_id, kind)
            .await?
        {
            ToggleOutcome::Applied(outcome) => {
                self.hook
                    .vote_recorded(voter_id, target_kind, target_id, kind, outcome);
                Ok(outcome)
            }
            ToggleOutcome::RaceLost => Err(Error::conflict("vote already recorded")),
        }
    }

    pub async fn count(&self, target_kind: TargetKind, target_id: Uuid) -> Result<VoteCount, Error> {
        Ok(self.votes.count(target_kind, target_id).await?)
    }
}
