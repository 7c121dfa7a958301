//! The same service flows over the SQLite store.

use std::sync::Arc;

use domains::{CommunityId, DomainError, Page, UserId, VoteTarget, VoteValue};
use services::Community;
use storage_adapters::SqliteStore;

async fn community() -> Community {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    Community::new(Arc::new(store))
}

#[tokio::test]
async fn vote_transitions_persist() {
    let community = community().await;
    let post = community
        .posts
        .create_post(CommunityId::generate(), UserId::generate(), "t", "c")
        .await
        .unwrap();
    let target = VoteTarget::Post(post.id);
    let (a, b) = (UserId::generate(), UserId::generate());

    community.votes.cast_vote(a, target, VoteValue::Up).await.unwrap();
    community.votes.cast_vote(b, target, VoteValue::Up).await.unwrap();
    community.votes.change_vote(a, target, VoteValue::Down).await.unwrap();
    community.votes.remove_vote(b, target).await.unwrap();

    assert_eq!(community.posts.get_post(post.id).await.unwrap().karma, -1);
    assert!(matches!(
        community.votes.cast_vote(a, target, VoteValue::Up).await,
        Err(DomainError::Conflict(_))
    ));
}

#[tokio::test]
async fn threads_round_trip() {
    let community = community().await;
    let post = community
        .posts
        .create_post(CommunityId::generate(), UserId::generate(), "t", "c")
        .await
        .unwrap();

    let root = community.comments.add_comment(post.id, UserId::generate(), "root").await.unwrap();
    let reply = community
        .comments
        .reply_to_comment(root.id, UserId::generate(), "reply")
        .await
        .unwrap();
    assert_eq!(reply.root_id, root.root_id);

    let replies = community.comments.get_comment_replies(root.id, Page::default()).await.unwrap();
    assert_eq!(replies, vec![reply]);

    let (a, b) = (UserId::generate(), UserId::generate());
    let m1 = community.messages.send_message(a, b, "hi").await.unwrap();
    let m2 = community.messages.reply_to_message(m1.id, b, "hey").await.unwrap();
    assert_eq!(m2.recipient_id, Some(a));
    assert_eq!(
        community.messages.get_messages_for_user(b, Page::default()).await.unwrap(),
        vec![m1]
    );
}
