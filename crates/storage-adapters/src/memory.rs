//! # In-memory store
//!
//! `DashMap`-backed implementation of every repository port. Posts, votes and
//! both thread arenas live in separate maps keyed by id; parent and root links
//! are plain ids, so there is nothing to keep alive and nothing to cycle.
//!
//! The store enforces the same structural rules a relational schema would
//! (unique `(user, target)` votes, parents must exist in the same arena and
//! share the root). Serializing multi-step operations is the services' job.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{
    CommunityId, NewPost, NewThreadNode, NewVote, NodeId, Page, Post, PostId, PostRepository, RootScope,
    ScoreRepository, SortOrder, ThreadKind, ThreadNode, ThreadRepository, UserId, Vote, VoteId,
    VoteRepository, VoteTarget, VoteValue,
};
use tracing::trace;

#[derive(Debug, Default)]
pub struct MemoryStore {
    posts: DashMap<PostId, Post>,
    votes: DashMap<VoteId, Vote>,
    /// Uniqueness index: one live vote per `(user, target)`.
    vote_index: DashMap<(UserId, VoteTarget), VoteId>,
    comments: DashMap<NodeId, ThreadNode>,
    messages: DashMap<NodeId, ThreadNode>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn arena(&self, kind: ThreadKind) -> &DashMap<NodeId, ThreadNode> {
        match kind {
            ThreadKind::Comment => &self.comments,
            ThreadKind::Message => &self.messages,
        }
    }

    /// Number of live votes; handy for assertions.
    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }
}

fn sort_and_page(mut nodes: Vec<ThreadNode>, order: SortOrder, page: Page) -> Vec<ThreadNode> {
    match order {
        SortOrder::NewestFirst => {
            nodes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)))
        }
        SortOrder::OldestFirst => {
            nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
        }
    }
    nodes
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

#[async_trait]
impl VoteRepository for MemoryStore {
    async fn get_vote(&self, user_id: UserId, target: VoteTarget) -> Result<Option<Vote>> {
        let Some(vote_id) = self.vote_index.get(&(user_id, target)).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.votes.get(&vote_id).map(|v| v.clone()))
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<Vote> {
        match self.vote_index.entry((vote.user_id, vote.target)) {
            Entry::Occupied(existing) => bail!(
                "user {} already holds vote {} on {}",
                vote.user_id,
                existing.get(),
                vote.target
            ),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let stored = Vote {
                    id: VoteId::generate(),
                    user_id: vote.user_id,
                    target: vote.target,
                    value: vote.value,
                    created_at: now,
                    updated_at: now,
                };
                slot.insert(stored.id);
                self.votes.insert(stored.id, stored.clone());
                trace!(vote_id = %stored.id, "vote stored");
                Ok(stored)
            }
        }
    }

    async fn update_vote_value(&self, vote_id: VoteId, value: VoteValue) -> Result<DateTime<Utc>> {
        let mut vote = self
            .votes
            .get_mut(&vote_id)
            .ok_or_else(|| anyhow!("vote {vote_id} does not exist"))?;
        vote.value = value;
        vote.updated_at = Utc::now();
        Ok(vote.updated_at)
    }

    async fn delete_vote(&self, vote_id: VoteId) -> Result<bool> {
        let Some((_, vote)) = self.votes.remove(&vote_id) else {
            return Ok(false);
        };
        self.vote_index.remove(&(vote.user_id, vote.target));
        Ok(true)
    }

    async fn restore_vote(&self, vote: Vote) -> Result<()> {
        match self.vote_index.entry((vote.user_id, vote.target)) {
            Entry::Occupied(existing) => bail!(
                "cannot restore vote {}: {} is live for the same user and target",
                vote.id,
                existing.get()
            ),
            Entry::Vacant(slot) => {
                slot.insert(vote.id);
                self.votes.insert(vote.id, vote);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ScoreRepository for MemoryStore {
    async fn get_score(&self, target: VoteTarget) -> Result<Option<i64>> {
        Ok(match target {
            VoteTarget::Post(id) => self.posts.get(&id).map(|p| p.karma),
            VoteTarget::Comment(id) => self.comments.get(&id).map(|c| c.karma),
        })
    }

    async fn set_score(&self, target: VoteTarget, score: i64) -> Result<()> {
        match target {
            VoteTarget::Post(id) => {
                let mut post = self
                    .posts
                    .get_mut(&id)
                    .ok_or_else(|| anyhow!("post {id} does not exist"))?;
                post.karma = score;
            }
            VoteTarget::Comment(id) => {
                let mut comment = self
                    .comments
                    .get_mut(&id)
                    .ok_or_else(|| anyhow!("comment {id} does not exist"))?;
                comment.karma = score;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let now = Utc::now();
        let stored = Post {
            id: PostId::generate(),
            community_id: post.community_id,
            author_id: post.author_id,
            title: post.title,
            content: post.content,
            karma: 0,
            created_at: now,
            updated_at: now,
        };
        self.posts.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        Ok(self.posts.get(&id).map(|p| p.clone()))
    }

    async fn list_posts(&self, community_id: Option<CommunityId>, page: Page) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| community_id.map_or(true, |c| p.community_id == c))
            .map(|p| p.clone())
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(posts
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }
}

#[async_trait]
impl ThreadRepository for MemoryStore {
    async fn insert_node(&self, node: NewThreadNode) -> Result<ThreadNode> {
        let arena = self.arena(node.kind);
        if let Some(parent_id) = node.parent_id {
            let parent = arena
                .get(&parent_id)
                .ok_or_else(|| anyhow!("parent {} {parent_id} does not exist", node.kind.as_str()))?;
            if parent.root_id != node.root_id {
                bail!(
                    "parent {parent_id} belongs to root {}, not {}",
                    parent.root_id,
                    node.root_id
                );
            }
        }

        let now = Utc::now();
        let stored = ThreadNode {
            id: NodeId::generate(),
            kind: node.kind,
            root_id: node.root_id,
            parent_id: node.parent_id,
            author_id: node.author_id,
            recipient_id: node.recipient_id,
            content: node.content,
            karma: 0,
            created_at: now,
            updated_at: now,
        };
        arena.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_node(&self, kind: ThreadKind, id: NodeId) -> Result<Option<ThreadNode>> {
        Ok(self.arena(kind).get(&id).map(|n| n.clone()))
    }

    async fn list_children(
        &self,
        kind: ThreadKind,
        parent_id: NodeId,
        order: SortOrder,
        page: Page,
    ) -> Result<Vec<ThreadNode>> {
        let children = self
            .arena(kind)
            .iter()
            .filter(|n| n.parent_id == Some(parent_id))
            .map(|n| n.clone())
            .collect();
        Ok(sort_and_page(children, order, page))
    }

    async fn list_roots_for(
        &self,
        kind: ThreadKind,
        scope: RootScope,
        order: SortOrder,
        page: Page,
    ) -> Result<Vec<ThreadNode>> {
        let roots = self
            .arena(kind)
            .iter()
            .filter(|n| n.is_root())
            .filter(|n| match scope {
                RootScope::Root(root_id) => n.root_id == root_id,
                RootScope::Recipient(user_id) => n.recipient_id == Some(user_id),
            })
            .map(|n| n.clone())
            .collect();
        Ok(sort_and_page(roots, order, page))
    }

    async fn update_content(&self, kind: ThreadKind, id: NodeId, content: String) -> Result<Option<ThreadNode>> {
        let Some(mut node) = self.arena(kind).get_mut(&id) else {
            return Ok(None);
        };
        node.content = content;
        node.updated_at = Utc::now();
        Ok(Some(node.clone()))
    }
}
