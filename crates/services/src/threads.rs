//! # ThreadStore
//!
//! One arena-backed hierarchy shared by comments and direct messages.
//!
//! The two kinds differ only in where a reply lands: a comment reply stays
//! under its parent's post, a message reply goes back to the parent's author.
//! That rule lives in a [`ThreadPolicy`]; everything else (parent lookup,
//! root inheritance, ordering, content edits) is shared.

use std::sync::Arc;

use domains::{
    DomainError, DomainResult, NewThreadNode, NodeId, Page, RootId, RootScope, SortOrder,
    ThreadKind, ThreadNode, ThreadRepository, UserId,
};
use tracing::{debug, info, instrument};

use crate::gate::WriteGate;

/// Where a new node is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub root_id: RootId,
    pub recipient_id: Option<UserId>,
}

/// Per-kind rules for starting a thread and answering in one.
pub trait ThreadPolicy: Send + Sync + 'static {
    const KIND: ThreadKind;

    /// Validates a caller-chosen placement for a root node.
    fn check_root(&self, placement: &Placement, author_id: UserId) -> DomainResult<()>;

    /// Derives a reply's placement from its parent. Caller input never
    /// overrides the result.
    fn reply_placement(&self, parent: &ThreadNode, author_id: UserId) -> DomainResult<Placement>;
}

/// Comments: replies stay under the parent's post; there is no recipient.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentPolicy;

impl ThreadPolicy for CommentPolicy {
    const KIND: ThreadKind = ThreadKind::Comment;

    fn check_root(&self, placement: &Placement, _author_id: UserId) -> DomainResult<()> {
        if placement.recipient_id.is_some() {
            return Err(DomainError::InvalidTarget("comments have no recipient".into()));
        }
        Ok(())
    }

    fn reply_placement(&self, parent: &ThreadNode, _author_id: UserId) -> DomainResult<Placement> {
        Ok(Placement {
            root_id: parent.root_id,
            recipient_id: None,
        })
    }
}

/// Messages: a reply is always addressed to the parent's author.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePolicy;

impl ThreadPolicy for MessagePolicy {
    const KIND: ThreadKind = ThreadKind::Message;

    fn check_root(&self, placement: &Placement, author_id: UserId) -> DomainResult<()> {
        match placement.recipient_id {
            None => Err(DomainError::ValidationError("a message needs a recipient".into())),
            Some(recipient) if recipient == author_id => Err(DomainError::SelfReference(format!(
                "user {author_id} cannot message themselves"
            ))),
            Some(_) => Ok(()),
        }
    }

    fn reply_placement(&self, parent: &ThreadNode, author_id: UserId) -> DomainResult<Placement> {
        let recipient = parent.author_id;
        if recipient == author_id {
            return Err(DomainError::SelfReference(format!(
                "reply to message {} would be addressed to its own sender {author_id}",
                parent.id
            )));
        }
        Ok(Placement {
            root_id: parent.root_id,
            recipient_id: Some(recipient),
        })
    }
}

pub struct ThreadStore<P: ThreadPolicy> {
    repo: Arc<dyn ThreadRepository>,
    gate: WriteGate,
    policy: P,
}

impl<P: ThreadPolicy> Clone for ThreadStore<P>
where
    P: Clone,
{
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            gate: self.gate.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<P: ThreadPolicy> ThreadStore<P> {
    pub fn new(repo: Arc<dyn ThreadRepository>, gate: WriteGate, policy: P) -> Self {
        Self { repo, gate, policy }
    }

    #[instrument(skip_all, fields(kind = P::KIND.as_str(), root = %placement.root_id, author = %author_id))]
    pub async fn create_root(&self, placement: Placement, author_id: UserId, content: &str) -> DomainResult<ThreadNode> {
        let content = require_content(content)?;
        self.policy.check_root(&placement, author_id)?;

        let _guard = self.gate.write().await;
        let node = self
            .insert(NewThreadNode {
                kind: P::KIND,
                root_id: placement.root_id,
                parent_id: None,
                author_id,
                recipient_id: placement.recipient_id,
                content,
            })
            .await?;
        info!(node_id = %node.id, "thread started");
        Ok(node)
    }

    #[instrument(skip_all, fields(kind = P::KIND.as_str(), parent = %parent_id, author = %author_id))]
    pub async fn create_reply(&self, parent_id: NodeId, author_id: UserId, content: &str) -> DomainResult<ThreadNode> {
        let content = require_content(content)?;

        let _guard = self.gate.write().await;
        // 1. The parent must already exist in this arena.
        let parent = self.load(parent_id).await?;

        // 2. Placement comes from the parent, never from the caller.
        let placement = self.policy.reply_placement(&parent, author_id)?;
        if placement.root_id != parent.root_id {
            return Err(DomainError::InvalidTarget(format!(
                "reply root {} differs from parent root {}",
                placement.root_id, parent.root_id
            )));
        }

        // 3. Persist.
        let node = self
            .insert(NewThreadNode {
                kind: P::KIND,
                root_id: placement.root_id,
                parent_id: Some(parent.id),
                author_id,
                recipient_id: placement.recipient_id,
                content,
            })
            .await?;
        info!(node_id = %node.id, root = %node.root_id, "reply added");
        Ok(node)
    }

    pub async fn get(&self, id: NodeId) -> DomainResult<ThreadNode> {
        let _guard = self.gate.read().await;
        self.load(id).await
    }

    /// Root nodes in `scope`, newest first.
    pub async fn list_roots(&self, scope: RootScope, page: Page) -> DomainResult<Vec<ThreadNode>> {
        let _guard = self.gate.read().await;
        let nodes = self
            .repo
            .list_roots_for(P::KIND, scope, SortOrder::NewestFirst, page)
            .await
            .map_err(|e| DomainError::storage("list roots", e))?;
        debug!(kind = P::KIND.as_str(), count = nodes.len(), ?scope, "roots listed");
        Ok(nodes)
    }

    /// Direct children of `parent_id`, oldest first.
    pub async fn list_replies(&self, parent_id: NodeId, page: Page) -> DomainResult<Vec<ThreadNode>> {
        let _guard = self.gate.read().await;
        self.load(parent_id).await?;
        let nodes = self
            .repo
            .list_children(P::KIND, parent_id, SortOrder::OldestFirst, page)
            .await
            .map_err(|e| DomainError::storage("list replies", e))?;
        debug!(kind = P::KIND.as_str(), count = nodes.len(), parent = %parent_id, "replies listed");
        Ok(nodes)
    }

    /// Replaces a node's content; structure is untouched.
    #[instrument(skip_all, fields(kind = P::KIND.as_str(), node = %id))]
    pub async fn edit_content(&self, id: NodeId, content: &str) -> DomainResult<ThreadNode> {
        let content = require_content(content)?;

        let _guard = self.gate.write().await;
        let node = self
            .repo
            .update_content(P::KIND, id, content)
            .await
            .map_err(|e| DomainError::storage("update content", e))?
            .ok_or_else(|| DomainError::not_found(P::KIND.as_str(), id))?;
        info!("content edited");
        Ok(node)
    }

    async fn load(&self, id: NodeId) -> DomainResult<ThreadNode> {
        self.repo
            .get_node(P::KIND, id)
            .await
            .map_err(|e| DomainError::storage("load node", e))?
            .ok_or_else(|| DomainError::not_found(P::KIND.as_str(), id))
    }

    async fn insert(&self, node: NewThreadNode) -> DomainResult<ThreadNode> {
        self.repo
            .insert_node(node)
            .await
            .map_err(|e| DomainError::storage("insert node", e))
    }
}

/// Rejects blank content.
pub(crate) fn require_content(content: &str) -> DomainResult<String> {
    if content.trim().is_empty() {
        return Err(DomainError::ValidationError("content is required".into()));
    }
    Ok(content.to_owned())
}
