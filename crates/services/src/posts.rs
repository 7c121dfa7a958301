//! # PostService
//!
//! Minimal post registry: posts anchor comment threads and receive votes.
//! Karma is never written here.

use std::sync::Arc;

use domains::{CommunityId, DomainError, DomainResult, NewPost, Page, Post, PostId, PostRepository, UserId};
use tracing::{debug, info, instrument};

use crate::gate::WriteGate;
use crate::threads::require_content;

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    gate: WriteGate,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostRepository>, gate: WriteGate) -> Self {
        Self { posts, gate }
    }

    #[instrument(skip_all, fields(community = %community_id, author = %author_id))]
    pub async fn create_post(
        &self,
        community_id: CommunityId,
        author_id: UserId,
        title: &str,
        content: &str,
    ) -> DomainResult<Post> {
        if title.trim().is_empty() {
            return Err(DomainError::ValidationError("title is required".into()));
        }
        let content = require_content(content)?;

        let _guard = self.gate.write().await;
        let post = self
            .posts
            .insert_post(NewPost {
                community_id,
                author_id,
                title: title.to_owned(),
                content,
            })
            .await
            .map_err(|e| DomainError::storage("insert post", e))?;
        info!(post_id = %post.id, "post created");
        Ok(post)
    }

    pub async fn get_post(&self, id: PostId) -> DomainResult<Post> {
        let _guard = self.gate.read().await;
        self.posts
            .get_post(id)
            .await
            .map_err(|e| DomainError::storage("load post", e))?
            .ok_or_else(|| DomainError::not_found("post", id))
    }

    /// Posts of one community, newest first. Communities live elsewhere, so
    /// an unknown id simply has no posts.
    pub async fn list_posts_by_community(&self, community_id: CommunityId, page: Page) -> DomainResult<Vec<Post>> {
        self.list(Some(community_id), page).await
    }

    /// Every post, newest first.
    pub async fn feed(&self, page: Page) -> DomainResult<Vec<Post>> {
        self.list(None, page).await
    }

    async fn list(&self, community_id: Option<CommunityId>, page: Page) -> DomainResult<Vec<Post>> {
        let _guard = self.gate.read().await;
        let posts = self
            .posts
            .list_posts(community_id, page)
            .await
            .map_err(|e| DomainError::storage("list posts", e))?;
        debug!(count = posts.len(), ?community_id, "posts listed");
        Ok(posts)
    }
}
