//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Community.
//! We use UUID v7 for time-ordered, globally unique identification, wrapped
//! in newtypes so a post id can never be handed to a message lookup.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Mints a fresh, time-ordered identifier.
            pub fn generate() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// A registered user (owned by the external account service).
    UserId
);
id_type!(
    /// A community (subreddit); membership is managed elsewhere.
    CommunityId
);
id_type!(PostId);
id_type!(
    /// A comment or a direct message; both live in thread arenas.
    NodeId
);
id_type!(
    /// Groups every message descending from one conversation starter.
    ConversationId
);
id_type!(VoteId);
id_type!(
    /// The anchor of a thread: a post for comments, a conversation for messages.
    RootId
);

impl From<PostId> for RootId {
    fn from(id: PostId) -> Self {
        Self(id.0)
    }
}

impl From<ConversationId> for RootId {
    fn from(id: ConversationId) -> Self {
        Self(id.0)
    }
}

// ── Posts ───────────────────────────────────────────────────────────────────

/// A submission into a community. Its `karma` is only ever written by the
/// vote engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub community_id: CommunityId,
    pub author_id: UserId,
    pub title: String,
    pub content: String,
    pub karma: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a post; the repository assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub community_id: CommunityId,
    pub author_id: UserId,
    pub title: String,
    pub content: String,
}

// ── Votes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

/// The single entity a vote applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum VoteTarget {
    Post(PostId),
    Comment(NodeId),
}

impl VoteTarget {
    /// Builds a target from the loose `(post_id, comment_id)` shape callers
    /// send. Exactly one side must be present.
    pub fn from_parts(post_id: Option<PostId>, comment_id: Option<NodeId>) -> DomainResult<Self> {
        match (post_id, comment_id) {
            (Some(post), None) => Ok(Self::Post(post)),
            (None, Some(comment)) => Ok(Self::Comment(comment)),
            (Some(_), Some(_)) => Err(DomainError::InvalidTarget(
                "vote must reference a post or a comment, not both".into(),
            )),
            (None, None) => Err(DomainError::InvalidTarget(
                "vote must reference a post or a comment".into(),
            )),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Post(_) => TargetKind::Post,
            Self::Comment(_) => TargetKind::Comment,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Post(id) => id.0,
            Self::Comment(id) => id.0,
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.id())
    }
}

/// An upvote (+1) or a downvote (−1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

impl From<VoteValue> for i64 {
    fn from(value: VoteValue) -> Self {
        value.as_i64()
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = DomainError;

    fn try_from(raw: i64) -> DomainResult<Self> {
        match raw {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            other => Err(DomainError::ValidationError(format!(
                "vote value must be 1 or -1, got {other}"
            ))),
        }
    }
}

/// A live vote. At most one exists per `(user_id, target)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub user_id: UserId,
    pub target: VoteTarget,
    pub value: VoteValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a vote; the repository assigns id and timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewVote {
    pub user_id: UserId,
    pub target: VoteTarget,
    pub value: VoteValue,
}

// ── Threads ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadKind {
    Comment,
    Message,
}

impl ThreadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Message => "message",
        }
    }
}

/// A comment under a post or a direct message inside a conversation.
///
/// Nodes reference their parent and root by id only; the tree is an arena
/// keyed by [`NodeId`]. Everything except `content` (and the vote-driven
/// `karma`) is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadNode {
    pub id: NodeId,
    pub kind: ThreadKind,
    pub root_id: RootId,
    pub parent_id: Option<NodeId>,
    pub author_id: UserId,
    /// Receiver of a message; always `None` for comments.
    pub recipient_id: Option<UserId>,
    pub content: String,
    /// Vote score; comments only, stays 0 for messages.
    pub karma: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ThreadNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Insert payload for a thread node; the repository assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThreadNode {
    pub kind: ThreadKind,
    pub root_id: RootId,
    pub parent_id: Option<NodeId>,
    pub author_id: UserId,
    pub recipient_id: Option<UserId>,
    pub content: String,
}

/// Which root-level nodes a listing selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootScope {
    /// Roots anchored at a post or conversation.
    Root(RootId),
    /// Roots addressed to a user (the message inbox).
    Recipient(UserId),
}

/// Listing order. Ties on `created_at` fall back to the id in the same
/// direction, so pages never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    NewestFirst,
    OldestFirst,
}

/// A `LIMIT`/`OFFSET` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamps `limit` to `1..=MAX_LIMIT`.
    pub fn new(limit: u32, offset: u32) -> Self {
        Self::bounded(Some(limit), Some(offset), Self::DEFAULT_LIMIT, Self::MAX_LIMIT)
    }

    /// Builds a page from optional caller input. A missing or zero limit
    /// falls back to `default_limit`; anything above `max_limit` is capped.
    pub fn bounded(limit: Option<u32>, offset: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        let limit = match limit {
            Some(0) | None => default_limit,
            Some(l) => l,
        };
        Self {
            limit: limit.clamp(1, max_limit),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}
