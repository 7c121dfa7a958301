//! # KarmaAccumulator
//!
//! The only writer of post and comment karma.

use std::sync::Arc;

use domains::{DomainError, DomainResult, ScoreRepository, VoteTarget};

pub struct KarmaAccumulator {
    scores: Arc<dyn ScoreRepository>,
}

impl KarmaAccumulator {
    pub fn new(scores: Arc<dyn ScoreRepository>) -> Self {
        Self { scores }
    }

    /// Current score of `target`; `NotFound` when the target does not exist.
    pub async fn current(&self, target: VoteTarget) -> DomainResult<i64> {
        self.scores
            .get_score(target)
            .await
            .map_err(|e| DomainError::storage("load score", e))?
            .ok_or_else(|| DomainError::not_found(target.kind().as_str(), target.id()))
    }

    /// Writes `score + delta` and returns it. `score` must have been read
    /// under the same write guard.
    pub async fn write(&self, target: VoteTarget, score: i64, delta: i64) -> DomainResult<i64> {
        let next = score
            .checked_add(delta)
            .ok_or_else(|| DomainError::Internal(format!("karma overflow on {target}")))?;
        self.scores
            .set_score(target, next)
            .await
            .map_err(|e| DomainError::storage("store score", e))?;
        Ok(next)
    }

    /// Load-then-write in one call.
    pub async fn apply_delta(&self, target: VoteTarget, delta: i64) -> DomainResult<i64> {
        let score = self.current(target).await?;
        self.write(target, score, delta).await
    }
}
