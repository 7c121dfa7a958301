//! # Repository Ports
//!
//! Any storage adapter must implement these traits to back the services.
//! Ports speak `anyhow::Result`: a storage failure is always an internal
//! error from the caller's point of view, while "absent" is modelled as
//! `None` / `false` so services decide which `DomainError` it becomes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    CommunityId, NewPost, NewThreadNode, NewVote, NodeId, Page, Post, PostId, RootScope, SortOrder,
    ThreadKind, ThreadNode, UserId, Vote, VoteId, VoteTarget, VoteValue,
};

/// Vote ledger persistence.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait VoteRepository: Send + Sync {
    async fn get_vote(&self, user_id: UserId, target: VoteTarget) -> anyhow::Result<Option<Vote>>;

    /// Assigns id and timestamps. Must refuse a second vote for the same
    /// `(user_id, target)`.
    async fn insert_vote(&self, vote: NewVote) -> anyhow::Result<Vote>;

    /// Returns the new `updated_at`.
    async fn update_vote_value(&self, vote_id: VoteId, value: VoteValue) -> anyhow::Result<DateTime<Utc>>;

    /// `false` when no such vote exists.
    async fn delete_vote(&self, vote_id: VoteId) -> anyhow::Result<bool>;

    /// Re-inserts a previously deleted vote verbatim (id and timestamps).
    async fn restore_vote(&self, vote: Vote) -> anyhow::Result<()>;
}

/// Karma storage for scored entities (posts and comments).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    /// `None` when the target record does not exist.
    async fn get_score(&self, target: VoteTarget) -> anyhow::Result<Option<i64>>;

    async fn set_score(&self, target: VoteTarget, score: i64) -> anyhow::Result<()>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert_post(&self, post: NewPost) -> anyhow::Result<Post>;
    async fn get_post(&self, id: PostId) -> anyhow::Result<Option<Post>>;

    /// Newest first, ties broken by id. `None` lists every community.
    async fn list_posts(&self, community_id: Option<CommunityId>, page: Page) -> anyhow::Result<Vec<Post>>;
}

/// Arena storage for comment and message trees. Every call is scoped to one
/// [`ThreadKind`]; a comment id never resolves in the message arena.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    /// Assigns id and timestamps.
    async fn insert_node(&self, node: NewThreadNode) -> anyhow::Result<ThreadNode>;

    async fn get_node(&self, kind: ThreadKind, id: NodeId) -> anyhow::Result<Option<ThreadNode>>;

    /// Direct children of `parent_id` only.
    async fn list_children(
        &self,
        kind: ThreadKind,
        parent_id: NodeId,
        order: SortOrder,
        page: Page,
    ) -> anyhow::Result<Vec<ThreadNode>>;

    /// Nodes with no parent, selected by `scope`.
    async fn list_roots_for(
        &self,
        kind: ThreadKind,
        scope: RootScope,
        order: SortOrder,
        page: Page,
    ) -> anyhow::Result<Vec<ThreadNode>>;

    /// Replaces `content` and bumps `updated_at`; `None` when absent.
    async fn update_content(
        &self,
        kind: ThreadKind,
        id: NodeId,
        content: String,
    ) -> anyhow::Result<Option<ThreadNode>>;
}

/// A single backend implementing every port, so one handle can be shared
/// by all services.
pub trait CommunityStore: VoteRepository + ScoreRepository + PostRepository + ThreadRepository {}

impl<T> CommunityStore for T where T: VoteRepository + ScoreRepository + PostRepository + ThreadRepository {}
