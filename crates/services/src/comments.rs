//! # CommentService
//!
//! The comment instantiation of [`ThreadStore`]: roots hang off a post,
//! replies inherit their parent's post.

use domains::{DomainResult, NodeId, Page, PostId, RootScope, ThreadNode, UserId};

use crate::posts::PostService;
use crate::threads::{CommentPolicy, Placement, ThreadStore};

#[derive(Clone)]
pub struct CommentService {
    threads: ThreadStore<CommentPolicy>,
    posts: PostService,
}

impl CommentService {
    pub fn new(threads: ThreadStore<CommentPolicy>, posts: PostService) -> Self {
        Self { threads, posts }
    }

    /// Top-level comment on a post. The post must exist.
    pub async fn add_comment(&self, post_id: PostId, author_id: UserId, content: &str) -> DomainResult<ThreadNode> {
        self.posts.get_post(post_id).await?;
        let placement = Placement {
            root_id: post_id.into(),
            recipient_id: None,
        };
        self.threads.create_root(placement, author_id, content).await
    }

    /// Reply to a comment; lands under the parent's post.
    pub async fn reply_to_comment(&self, parent_id: NodeId, author_id: UserId, content: &str) -> DomainResult<ThreadNode> {
        self.threads.create_reply(parent_id, author_id, content).await
    }

    pub async fn get_comment(&self, id: NodeId) -> DomainResult<ThreadNode> {
        self.threads.get(id).await
    }

    /// Top-level comments of a post, newest first.
    pub async fn get_comments_by_post(&self, post_id: PostId, page: Page) -> DomainResult<Vec<ThreadNode>> {
        self.posts.get_post(post_id).await?;
        self.threads.list_roots(RootScope::Root(post_id.into()), page).await
    }

    /// Direct replies to a comment, oldest first.
    pub async fn get_comment_replies(&self, parent_id: NodeId, page: Page) -> DomainResult<Vec<ThreadNode>> {
        self.threads.list_replies(parent_id, page).await
    }

    pub async fn edit_comment(&self, id: NodeId, content: &str) -> DomainResult<ThreadNode> {
        self.threads.edit_content(id, content).await
    }
}
