//! End-to-end vote flows over the in-memory store.

use domains::{DomainError, NodeId, PostId, UserId, VoteTarget, VoteValue};
use integration_tests::{fixture, seed_comment, seed_post};

#[tokio::test]
async fn two_users_walk_the_karma_through_every_transition() {
    let fx = fixture();
    let votes = &fx.community.votes;
    let post = seed_post(&fx.community, UserId::generate()).await.unwrap();
    let target = VoteTarget::Post(post.id);
    let (a, b) = (UserId::generate(), UserId::generate());

    assert_eq!(votes.karma_of(target).await.unwrap(), 0);

    let out = votes.cast_vote(a, target, VoteValue::Up).await.unwrap();
    assert_eq!((out.delta, out.karma), (1, 1));

    let out = votes.cast_vote(b, target, VoteValue::Up).await.unwrap();
    assert_eq!((out.delta, out.karma), (1, 2));

    let out = votes.change_vote(a, target, VoteValue::Down).await.unwrap();
    assert_eq!((out.delta, out.karma), (-2, 0));

    let out = votes.remove_vote(b, target).await.unwrap();
    assert_eq!((out.delta, out.karma), (-1, -1));
    assert_eq!(out.vote.value, VoteValue::Up);

    assert_eq!(fx.community.posts.get_post(post.id).await.unwrap().karma, -1);
    assert_eq!(fx.store.vote_count(), 1);
}

#[tokio::test]
async fn cast_then_remove_restores_the_original_score() {
    let fx = fixture();
    let post = seed_post(&fx.community, UserId::generate()).await.unwrap();
    let target = VoteTarget::Post(post.id);
    let user = UserId::generate();

    fx.community.votes.cast_vote(user, target, VoteValue::Down).await.unwrap();
    fx.community.votes.remove_vote(user, target).await.unwrap();

    assert_eq!(fx.community.votes.karma_of(target).await.unwrap(), 0);
    assert!(matches!(
        fx.community.votes.get_vote(user, target).await,
        Err(DomainError::NotFound("vote", _))
    ));
}

#[tokio::test]
async fn rejected_operations_leave_state_untouched() {
    let fx = fixture();
    let votes = &fx.community.votes;
    let post = seed_post(&fx.community, UserId::generate()).await.unwrap();
    let target = VoteTarget::Post(post.id);
    let user = UserId::generate();

    votes.cast_vote(user, target, VoteValue::Up).await.unwrap();

    let err = votes.cast_vote(user, target, VoteValue::Down).await.unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));

    let err = votes.change_vote(user, target, VoteValue::Up).await.unwrap_err();
    assert!(matches!(err, DomainError::NoOp(_)));

    let stranger = UserId::generate();
    assert!(matches!(
        votes.change_vote(stranger, target, VoteValue::Down).await,
        Err(DomainError::NotFound("vote", _))
    ));
    assert!(matches!(
        votes.remove_vote(stranger, target).await,
        Err(DomainError::NotFound("vote", _))
    ));

    assert_eq!(votes.karma_of(target).await.unwrap(), 1);
    assert_eq!(votes.get_vote(user, target).await.unwrap().value, VoteValue::Up);
    assert_eq!(fx.store.vote_count(), 1);
}

#[tokio::test]
async fn votes_on_missing_targets_are_not_found() {
    let fx = fixture();
    let user = UserId::generate();

    let err = fx
        .community
        .votes
        .cast_vote(user, VoteTarget::Post(PostId::generate()), VoteValue::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound("post", _)));

    let err = fx
        .community
        .votes
        .cast_vote(user, VoteTarget::Comment(NodeId::generate()), VoteValue::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound("comment", _)));
    assert_eq!(fx.store.vote_count(), 0);
}

#[test]
fn malformed_targets_and_values_are_rejected() {
    assert!(matches!(
        VoteTarget::from_parts(Some(PostId::generate()), Some(NodeId::generate())),
        Err(DomainError::InvalidTarget(_))
    ));
    assert!(matches!(VoteTarget::from_parts(None, None), Err(DomainError::InvalidTarget(_))));
    assert!(matches!(VoteValue::try_from(0), Err(DomainError::ValidationError(_))));
    assert!(matches!(VoteValue::try_from(2), Err(DomainError::ValidationError(_))));
}

#[tokio::test]
async fn comment_karma_is_independent_of_its_post() {
    let fx = fixture();
    let post = seed_post(&fx.community, UserId::generate()).await.unwrap();
    let comment = seed_comment(&fx.community, &post, UserId::generate()).await.unwrap();
    let user = UserId::generate();

    let out = fx
        .community
        .votes
        .cast_vote(user, VoteTarget::Comment(comment), VoteValue::Down)
        .await
        .unwrap();
    assert_eq!(out.karma, -1);

    // Same user, different target: no conflict.
    fx.community
        .votes
        .cast_vote(user, VoteTarget::Post(post.id), VoteValue::Up)
        .await
        .unwrap();

    assert_eq!(fx.community.comments.get_comment(comment).await.unwrap().karma, -1);
    assert_eq!(fx.community.posts.get_post(post.id).await.unwrap().karma, 1);
}

#[tokio::test]
async fn messages_cannot_be_voted_on() {
    let fx = fixture();
    let (a, b) = (UserId::generate(), UserId::generate());
    let message = fx.community.messages.send_message(a, b, "hi").await.unwrap();

    let err = fx
        .community
        .votes
        .cast_vote(b, VoteTarget::Comment(message.id), VoteValue::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound("comment", _)));
}
