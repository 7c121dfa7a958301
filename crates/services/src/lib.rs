//! # services
//!
//! The vote/karma consistency engine and the comment/message thread stores.
//!
//! # Developer Note
//! Build services through [`Community::new`] so that they all share one
//! [`WriteGate`]. Two services holding different gates over the same store
//! would no longer serialize their check-then-write sequences.

pub mod comments;
pub mod gate;
pub mod karma;
pub mod ledger;
pub mod messages;
pub mod posts;
pub mod threads;
pub mod votes;

use std::sync::Arc;

use domains::CommunityStore;

pub use comments::CommentService;
pub use gate::WriteGate;
pub use messages::MessageService;
pub use posts::PostService;
pub use threads::{CommentPolicy, MessagePolicy, Placement, ThreadPolicy, ThreadStore};
pub use votes::{VoteOutcome, VoteService};

/// Every service of the subsystem, wired to one store and one gate.
#[derive(Clone)]
pub struct Community {
    pub posts: PostService,
    pub votes: VoteService,
    pub comments: CommentService,
    pub messages: MessageService,
}

impl Community {
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: CommunityStore + 'static,
    {
        let gate = WriteGate::new();
        let posts = PostService::new(store.clone(), gate.clone());
        let votes = VoteService::new(store.clone(), store.clone(), gate.clone());
        let comments = CommentService::new(
            ThreadStore::new(store.clone(), gate.clone(), CommentPolicy),
            posts.clone(),
        );
        let messages = MessageService::new(ThreadStore::new(store, gate, MessagePolicy));

        Self {
            posts,
            votes,
            comments,
            messages,
        }
    }
}
