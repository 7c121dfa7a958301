//! # MessageService
//!
//! The direct-message instantiation of [`ThreadStore`]. A new message opens a
//! conversation; every reply travels back to the author of the message it
//! answers, whatever receiver the caller had in mind.

use domains::{ConversationId, DomainResult, NodeId, Page, RootScope, ThreadNode, UserId};

use crate::threads::{MessagePolicy, Placement, ThreadStore};

#[derive(Clone)]
pub struct MessageService {
    threads: ThreadStore<MessagePolicy>,
}

impl MessageService {
    pub fn new(threads: ThreadStore<MessagePolicy>) -> Self {
        Self { threads }
    }

    /// Starts a conversation. `SelfReference` when sender and receiver are
    /// the same user; nothing is written in that case.
    pub async fn send_message(&self, sender_id: UserId, receiver_id: UserId, content: &str) -> DomainResult<ThreadNode> {
        let placement = Placement {
            root_id: ConversationId::generate().into(),
            recipient_id: Some(receiver_id),
        };
        self.threads.create_root(placement, sender_id, content).await
    }

    /// Replies to `parent_id`; the receiver is the parent's sender.
    pub async fn reply_to_message(&self, parent_id: NodeId, sender_id: UserId, content: &str) -> DomainResult<ThreadNode> {
        self.threads.create_reply(parent_id, sender_id, content).await
    }

    pub async fn get_message(&self, id: NodeId) -> DomainResult<ThreadNode> {
        self.threads.get(id).await
    }

    /// Conversation-starting messages received by `user_id`, newest first.
    pub async fn get_messages_for_user(&self, user_id: UserId, page: Page) -> DomainResult<Vec<ThreadNode>> {
        self.threads.list_roots(RootScope::Recipient(user_id), page).await
    }

    /// Direct replies to a message, oldest first.
    pub async fn get_message_replies(&self, parent_id: NodeId, page: Page) -> DomainResult<Vec<ThreadNode>> {
        self.threads.list_replies(parent_id, page).await
    }

    pub async fn edit_message(&self, id: NodeId, content: &str) -> DomainResult<ThreadNode> {
        self.threads.edit_content(id, content).await
    }
}
