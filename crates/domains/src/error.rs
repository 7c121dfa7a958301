//! # DomainError
//!
//! Centralized error handling for the Rusty-Community core.
//! Every failure a caller can observe from a vote or thread operation maps to
//! exactly one variant here; nothing is retried on the caller's behalf.

use std::fmt::Display;

use thiserror::Error;

/// The primary error type for all core operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Missing vote, vote target, parent node or node (entity kind, id).
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// The user already holds a live vote on the target.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The requested change would leave the vote exactly as it is.
    #[error("no change: {0}")]
    NoOp(String),

    /// A vote names both or neither target kind, or a reply would land
    /// outside its parent's root.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// A message would be addressed to its own sender.
    #[error("self reference: {0}")]
    SelfReference(String),

    /// Malformed input (e.g. empty content, vote value other than ±1).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Storage failure, or a rollback that could not be completed.
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound(entity, id.to_string())
    }

    /// Wraps a repository failure, keeping the whole `anyhow` context chain.
    pub fn storage(action: &str, err: anyhow::Error) -> Self {
        Self::Internal(format!("{action}: {err:#}"))
    }

    /// Short, stable label for log fields and simulator counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(..) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::NoOp(_) => "no_op",
            Self::InvalidTarget(_) => "invalid_target",
            Self::SelfReference(_) => "self_reference",
            Self::ValidationError(_) => "validation",
            Self::Internal(_) => "internal",
        }
    }
}

/// A specialized Result type for core logic.
pub type DomainResult<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_keeps_context_chain() {
        let err = anyhow::anyhow!("disk full").context("writing score");
        let wrapped = DomainError::storage("apply delta", err);
        assert_eq!(
            wrapped.to_string(),
            "internal service error: apply delta: writing score: disk full"
        );
        assert_eq!(wrapped.kind(), "internal");
    }

    #[test]
    fn not_found_formats_entity_and_id() {
        let err = DomainError::not_found("comment", 42);
        assert_eq!(err.to_string(), "comment not found with ID 42");
    }
}
