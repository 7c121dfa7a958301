//! # VoteLedger
//!
//! Enforces "at most one live vote per (user, target)" and computes the karma
//! delta of each cast, change and removal.
//!
//! Every operation is split in two: `prepare_*` reads and validates, returning
//! a [`LedgerChange`] that carries its delta; [`VoteLedger::apply`] persists
//! it and returns an [`Applied`] record that [`VoteLedger::revert`] can undo.
//! The caller holds the write gate across both halves.

use std::sync::Arc;

use domains::{
    DomainError, DomainResult, NewVote, UserId, Vote, VoteId, VoteRepository, VoteTarget,
    VoteValue,
};
use tracing::debug;

/// A validated, not yet persisted ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChange {
    Cast(NewVote),
    Change { existing: Vote, value: VoteValue },
    Remove(Vote),
}

impl LedgerChange {
    pub fn target(&self) -> VoteTarget {
        match self {
            Self::Cast(vote) => vote.target,
            Self::Change { existing, .. } => existing.target,
            Self::Remove(vote) => vote.target,
        }
    }

    /// Karma delta this change contributes to its target.
    pub fn delta(&self) -> i64 {
        match self {
            Self::Cast(vote) => vote.value.as_i64(),
            Self::Change { existing, value } => value.as_i64() - existing.value.as_i64(),
            Self::Remove(vote) => -vote.value.as_i64(),
        }
    }
}

/// A persisted ledger mutation together with its inverse.
#[derive(Debug)]
pub struct Applied {
    vote: Vote,
    undo: Undo,
}

impl Applied {
    /// The vote as it now stands (for a removal, the vote that was removed).
    pub fn vote(&self) -> &Vote {
        &self.vote
    }
}

#[derive(Debug)]
enum Undo {
    Delete(VoteId),
    Revert { vote_id: VoteId, value: VoteValue },
    Reinsert(Vote),
}

pub struct VoteLedger {
    votes: Arc<dyn VoteRepository>,
}

impl VoteLedger {
    pub fn new(votes: Arc<dyn VoteRepository>) -> Self {
        Self { votes }
    }

    pub async fn find(&self, user_id: UserId, target: VoteTarget) -> DomainResult<Option<Vote>> {
        self.votes
            .get_vote(user_id, target)
            .await
            .map_err(|e| DomainError::storage("load vote", e))
    }

    pub async fn get(&self, user_id: UserId, target: VoteTarget) -> DomainResult<Vote> {
        self.find(user_id, target)
            .await?
            .ok_or_else(|| DomainError::not_found("vote", format!("{user_id} on {target}")))
    }

    pub async fn prepare_cast(
        &self,
        user_id: UserId,
        target: VoteTarget,
        value: VoteValue,
    ) -> DomainResult<LedgerChange> {
        if let Some(existing) = self.find(user_id, target).await? {
            return Err(DomainError::Conflict(format!(
                "user {user_id} already voted on {target} (vote {})",
                existing.id
            )));
        }
        Ok(LedgerChange::Cast(NewVote {
            user_id,
            target,
            value,
        }))
    }

    pub async fn prepare_change(
        &self,
        user_id: UserId,
        target: VoteTarget,
        value: VoteValue,
    ) -> DomainResult<LedgerChange> {
        let existing = self.get(user_id, target).await?;
        if existing.value == value {
            return Err(DomainError::NoOp(format!(
                "vote {} is already {}",
                existing.id,
                value.as_i64()
            )));
        }
        Ok(LedgerChange::Change { existing, value })
    }

    pub async fn prepare_remove(&self, user_id: UserId, target: VoteTarget) -> DomainResult<LedgerChange> {
        let existing = self.get(user_id, target).await?;
        Ok(LedgerChange::Remove(existing))
    }

    pub async fn apply(&self, change: LedgerChange) -> DomainResult<Applied> {
        match change {
            LedgerChange::Cast(new_vote) => {
                let vote = self
                    .votes
                    .insert_vote(new_vote)
                    .await
                    .map_err(|e| DomainError::storage("insert vote", e))?;
                debug!(vote_id = %vote.id, "vote inserted");
                Ok(Applied {
                    undo: Undo::Delete(vote.id),
                    vote,
                })
            }
            LedgerChange::Change { existing, value } => {
                let updated_at = self
                    .votes
                    .update_vote_value(existing.id, value)
                    .await
                    .map_err(|e| DomainError::storage("update vote", e))?;
                debug!(vote_id = %existing.id, value = value.as_i64(), "vote value updated");
                Ok(Applied {
                    undo: Undo::Revert {
                        vote_id: existing.id,
                        value: existing.value,
                    },
                    vote: Vote {
                        value,
                        updated_at,
                        ..existing
                    },
                })
            }
            LedgerChange::Remove(existing) => {
                let deleted = self
                    .votes
                    .delete_vote(existing.id)
                    .await
                    .map_err(|e| DomainError::storage("delete vote", e))?;
                if !deleted {
                    return Err(DomainError::not_found("vote", existing.id));
                }
                debug!(vote_id = %existing.id, "vote deleted");
                Ok(Applied {
                    undo: Undo::Reinsert(existing.clone()),
                    vote: existing,
                })
            }
        }
    }

    /// Undoes a previously applied change.
    pub async fn revert(&self, applied: Applied) -> DomainResult<()> {
        match applied.undo {
            Undo::Delete(vote_id) => {
                let deleted = self
                    .votes
                    .delete_vote(vote_id)
                    .await
                    .map_err(|e| DomainError::storage("roll back cast", e))?;
                if !deleted {
                    return Err(DomainError::Internal(format!(
                        "roll back cast: vote {vote_id} is already gone"
                    )));
                }
            }
            Undo::Revert { vote_id, value } => {
                self.votes
                    .update_vote_value(vote_id, value)
                    .await
                    .map_err(|e| DomainError::storage("roll back change", e))?;
            }
            Undo::Reinsert(vote) => {
                self.votes
                    .restore_vote(vote)
                    .await
                    .map_err(|e| DomainError::storage("roll back removal", e))?;
            }
        }
        Ok(())
    }
}
