//! Shared fixtures for the end-to-end suites: a fresh in-memory community
//! plus helpers that seed the entities most scenarios start from.

use std::sync::Arc;

use domains::{CommunityId, DomainResult, NodeId, Post, UserId};
use services::Community;
use storage_adapters::MemoryStore;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub community: Community,
}

pub fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let community = Community::new(store.clone());
    Fixture { store, community }
}

pub async fn seed_post(community: &Community, author: UserId) -> DomainResult<Post> {
    community
        .posts
        .create_post(CommunityId::generate(), author, "Hello", "First post")
        .await
}

pub async fn seed_comment(community: &Community, post: &Post, author: UserId) -> DomainResult<NodeId> {
    Ok(community.comments.add_comment(post.id, author, "a comment").await?.id)
}
