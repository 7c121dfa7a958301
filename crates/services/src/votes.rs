//! # VoteService
//!
//! Cast, change and remove votes while keeping every target's karma equal to
//! the sum of its live votes.
//!
//! Each mutation runs under the write gate as:
//! 1. ledger check (`Conflict` / `NotFound` / `NoOp`),
//! 2. score load (`NotFound` for a missing target, nothing written yet),
//! 3. ledger write,
//! 4. score write; if it fails the ledger write is reverted.

use std::sync::Arc;

use domains::{DomainError, DomainResult, ScoreRepository, UserId, Vote, VoteRepository, VoteTarget, VoteValue};
use tracing::{error, info, instrument, warn};

use crate::gate::WriteGate;
use crate::karma::KarmaAccumulator;
use crate::ledger::{LedgerChange, VoteLedger};

/// Result of a committed vote mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    /// The vote as stored; for a removal, the vote that was removed.
    pub vote: Vote,
    /// Delta applied to the target's karma.
    pub delta: i64,
    /// Target karma after the delta.
    pub karma: i64,
}

#[derive(Clone)]
pub struct VoteService {
    ledger: Arc<VoteLedger>,
    karma: Arc<KarmaAccumulator>,
    gate: WriteGate,
}

impl VoteService {
    pub fn new(votes: Arc<dyn VoteRepository>, scores: Arc<dyn ScoreRepository>, gate: WriteGate) -> Self {
        Self {
            ledger: Arc::new(VoteLedger::new(votes)),
            karma: Arc::new(KarmaAccumulator::new(scores)),
            gate,
        }
    }

    #[instrument(skip_all, fields(user = %user_id, vote_target = %target, value = value.as_i64()))]
    pub async fn cast_vote(&self, user_id: UserId, target: VoteTarget, value: VoteValue) -> DomainResult<VoteOutcome> {
        let _guard = self.gate.write().await;
        let change = self.ledger.prepare_cast(user_id, target, value).await?;
        self.commit("cast", change).await
    }

    #[instrument(skip_all, fields(user = %user_id, vote_target = %target, value = value.as_i64()))]
    pub async fn change_vote(&self, user_id: UserId, target: VoteTarget, value: VoteValue) -> DomainResult<VoteOutcome> {
        let _guard = self.gate.write().await;
        let change = self.ledger.prepare_change(user_id, target, value).await?;
        self.commit("change", change).await
    }

    #[instrument(skip_all, fields(user = %user_id, vote_target = %target))]
    pub async fn remove_vote(&self, user_id: UserId, target: VoteTarget) -> DomainResult<VoteOutcome> {
        let _guard = self.gate.write().await;
        let change = self.ledger.prepare_remove(user_id, target).await?;
        self.commit("remove", change).await
    }

    pub async fn get_vote(&self, user_id: UserId, target: VoteTarget) -> DomainResult<Vote> {
        let _guard = self.gate.read().await;
        self.ledger.get(user_id, target).await
    }

    /// Current karma of a post or comment.
    pub async fn karma_of(&self, target: VoteTarget) -> DomainResult<i64> {
        let _guard = self.gate.read().await;
        self.karma.current(target).await
    }

    /// Steps 2–4. Caller holds the write guard.
    async fn commit(&self, op: &'static str, change: LedgerChange) -> DomainResult<VoteOutcome> {
        let target = change.target();
        let delta = change.delta();

        let score = self.karma.current(target).await?;
        let applied = self.ledger.apply(change).await?;
        let vote = applied.vote().clone();

        match self.karma.write(target, score, delta).await {
            Ok(karma) => {
                info!(op, vote_id = %vote.id, delta, karma, "vote committed");
                Ok(VoteOutcome { vote, delta, karma })
            }
            Err(score_err) => {
                warn!(op, vote_id = %vote.id, error = %score_err, "karma update failed, rolling back vote");
                if let Err(undo_err) = self.ledger.revert(applied).await {
                    error!(
                        op,
                        vote_id = %vote.id,
                        error = %undo_err,
                        "vote rollback failed; ledger and karma disagree"
                    );
                    return Err(DomainError::Internal(format!(
                        "{op} vote {}: karma update failed ({score_err}) and rollback failed ({undo_err})",
                        vote.id
                    )));
                }
                Err(score_err)
            }
        }
    }
}
