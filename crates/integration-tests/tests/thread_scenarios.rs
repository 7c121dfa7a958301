//! Comment and message hierarchies end to end.

use domains::{CommunityId, DomainError, NodeId, Page, PostId, RootId, UserId};
use integration_tests::{fixture, seed_post};

#[tokio::test]
async fn nested_replies_inherit_the_post() {
    let fx = fixture();
    let comments = &fx.community.comments;
    let post = seed_post(&fx.community, UserId::generate()).await.unwrap();

    let c1 = comments.add_comment(post.id, UserId::generate(), "top").await.unwrap();
    let c2 = comments.reply_to_comment(c1.id, UserId::generate(), "reply").await.unwrap();
    let c3 = comments.reply_to_comment(c2.id, UserId::generate(), "deeper").await.unwrap();

    let expected: RootId = post.id.into();
    for node in [&c1, &c2, &c3] {
        assert_eq!(node.root_id, expected);
        assert_eq!(node.recipient_id, None);
    }
    assert!(c1.is_root());
    assert_eq!(c2.parent_id, Some(c1.id));
    assert_eq!(c3.parent_id, Some(c2.id));
}

#[tokio::test]
async fn reply_to_missing_parent_creates_nothing() {
    let fx = fixture();
    let post = seed_post(&fx.community, UserId::generate()).await.unwrap();

    let err = fx
        .community
        .comments
        .reply_to_comment(NodeId::generate(), UserId::generate(), "orphan")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound("comment", _)));

    let roots = fx.community.comments.get_comments_by_post(post.id, Page::default()).await.unwrap();
    assert!(roots.is_empty());
}

#[tokio::test]
async fn comments_need_an_existing_post_and_content() {
    let fx = fixture();
    let comments = &fx.community.comments;

    assert!(matches!(
        comments.add_comment(PostId::generate(), UserId::generate(), "hello").await,
        Err(DomainError::NotFound("post", _))
    ));

    let post = seed_post(&fx.community, UserId::generate()).await.unwrap();
    assert!(matches!(
        comments.add_comment(post.id, UserId::generate(), "   ").await,
        Err(DomainError::ValidationError(_))
    ));
}

#[tokio::test]
async fn message_replies_go_back_to_the_parent_author() {
    let fx = fixture();
    let messages = &fx.community.messages;
    let (a, b) = (UserId::generate(), UserId::generate());

    let m1 = messages.send_message(a, b, "hi B").await.unwrap();
    assert_eq!(m1.recipient_id, Some(b));

    let m2 = messages.reply_to_message(m1.id, b, "hi A").await.unwrap();
    assert_eq!(m2.recipient_id, Some(a));
    assert_eq!(m2.root_id, m1.root_id);

    let m3 = messages.reply_to_message(m2.id, a, "how are you").await.unwrap();
    assert_eq!(m3.recipient_id, Some(b));
    assert_eq!(m3.root_id, m1.root_id);
}

#[tokio::test]
async fn self_addressed_messages_are_rejected_before_any_write() {
    let fx = fixture();
    let messages = &fx.community.messages;
    let (a, b) = (UserId::generate(), UserId::generate());

    assert!(matches!(
        messages.send_message(a, a, "note to self").await,
        Err(DomainError::SelfReference(_))
    ));
    assert!(messages.get_messages_for_user(a, Page::default()).await.unwrap().is_empty());

    // Replying to your own message would address it to yourself.
    let m1 = messages.send_message(a, b, "hello").await.unwrap();
    assert!(matches!(
        messages.reply_to_message(m1.id, a, "anyone?").await,
        Err(DomainError::SelfReference(_))
    ));
    assert!(messages.get_message_replies(m1.id, Page::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn inbox_lists_conversation_starters_newest_first() {
    let fx = fixture();
    let messages = &fx.community.messages;
    let me = UserId::generate();

    let first = messages.send_message(UserId::generate(), me, "one").await.unwrap();
    let second = messages.send_message(UserId::generate(), me, "two").await.unwrap();
    let sent = messages.send_message(me, UserId::generate(), "outgoing").await.unwrap();
    // A reply addressed to me is not a conversation starter.
    messages.reply_to_message(sent.id, UserId::generate(), "reply").await.unwrap();

    let inbox = messages.get_messages_for_user(me, Page::default()).await.unwrap();
    assert_eq!(inbox.iter().map(|m| m.id).collect::<Vec<_>>(), vec![second.id, first.id]);
}

#[tokio::test]
async fn listings_are_ordered_and_paged() {
    let fx = fixture();
    let comments = &fx.community.comments;
    let post = seed_post(&fx.community, UserId::generate()).await.unwrap();

    let mut roots = Vec::new();
    for i in 0..5 {
        roots.push(comments.add_comment(post.id, UserId::generate(), &format!("root {i}")).await.unwrap().id);
    }
    let parent = roots[0];
    let mut replies = Vec::new();
    for i in 0..5 {
        replies.push(comments.reply_to_comment(parent, UserId::generate(), &format!("reply {i}")).await.unwrap().id);
    }

    let newest: Vec<NodeId> = roots.iter().rev().copied().collect();
    let page = comments.get_comments_by_post(post.id, Page::new(2, 0)).await.unwrap();
    assert_eq!(page.iter().map(|n| n.id).collect::<Vec<_>>(), newest[..2]);
    let page = comments.get_comments_by_post(post.id, Page::new(2, 4)).await.unwrap();
    assert_eq!(page.iter().map(|n| n.id).collect::<Vec<_>>(), newest[4..]);

    let page = comments.get_comment_replies(parent, Page::new(3, 1)).await.unwrap();
    assert_eq!(page.iter().map(|n| n.id).collect::<Vec<_>>(), replies[1..4]);

    let past_end = comments.get_comment_replies(parent, Page::new(3, 50)).await.unwrap();
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn replies_list_direct_children_only() {
    let fx = fixture();
    let comments = &fx.community.comments;
    let post = seed_post(&fx.community, UserId::generate()).await.unwrap();

    let root = comments.add_comment(post.id, UserId::generate(), "root").await.unwrap();
    let child = comments.reply_to_comment(root.id, UserId::generate(), "child").await.unwrap();
    comments.reply_to_comment(child.id, UserId::generate(), "grandchild").await.unwrap();

    let direct = comments.get_comment_replies(root.id, Page::default()).await.unwrap();
    assert_eq!(direct, vec![child]);

    let roots = comments.get_comments_by_post(post.id, Page::default()).await.unwrap();
    assert_eq!(roots.len(), 1);

    assert!(matches!(
        comments.get_comment_replies(NodeId::generate(), Page::default()).await,
        Err(DomainError::NotFound("comment", _))
    ));
}

#[tokio::test]
async fn editing_changes_content_only() {
    let fx = fixture();
    let comments = &fx.community.comments;
    let post = seed_post(&fx.community, UserId::generate()).await.unwrap();
    let root = comments.add_comment(post.id, UserId::generate(), "root").await.unwrap();
    let reply = comments.reply_to_comment(root.id, UserId::generate(), "typo").await.unwrap();

    let edited = comments.edit_comment(reply.id, "fixed").await.unwrap();
    assert_eq!(edited.content, "fixed");
    assert_eq!(edited.parent_id, reply.parent_id);
    assert_eq!(edited.root_id, reply.root_id);
    assert_eq!(edited.author_id, reply.author_id);
    assert_eq!(edited.created_at, reply.created_at);

    assert!(matches!(
        comments.edit_comment(reply.id, "").await,
        Err(DomainError::ValidationError(_))
    ));
    assert!(matches!(
        comments.edit_comment(NodeId::generate(), "x").await,
        Err(DomainError::NotFound("comment", _))
    ));
    assert_eq!(comments.get_comment(reply.id).await.unwrap().content, "fixed");
}

#[tokio::test]
async fn comment_and_message_arenas_are_separate() {
    let fx = fixture();
    let post = seed_post(&fx.community, UserId::generate()).await.unwrap();
    let comment = fx.community.comments.add_comment(post.id, UserId::generate(), "c").await.unwrap();

    assert!(matches!(
        fx.community.messages.get_message(comment.id).await,
        Err(DomainError::NotFound("message", _))
    ));
    assert!(matches!(
        fx.community.messages.reply_to_message(comment.id, UserId::generate(), "x").await,
        Err(DomainError::NotFound("message", _))
    ));
}

#[tokio::test]
async fn posts_list_per_community_and_in_the_feed() {
    let fx = fixture();
    let posts = &fx.community.posts;
    let (rust, go) = (CommunityId::generate(), CommunityId::generate());

    let r1 = posts.create_post(rust, UserId::generate(), "r1", "body").await.unwrap();
    let g1 = posts.create_post(go, UserId::generate(), "g1", "body").await.unwrap();
    let r2 = posts.create_post(rust, UserId::generate(), "r2", "body").await.unwrap();

    let listed = posts.list_posts_by_community(rust, Page::default()).await.unwrap();
    assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![r2.id, r1.id]);

    let feed = posts.feed(Page::new(2, 1)).await.unwrap();
    assert_eq!(feed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![g1.id, r1.id]);

    assert!(posts
        .list_posts_by_community(CommunityId::generate(), Page::default())
        .await
        .unwrap()
        .is_empty());
}
