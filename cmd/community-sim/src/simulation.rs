//! Phased multi-user workload and the karma audit that follows it.
//!
//! Every phase spawns one task per user on a [`JoinSet`] and waits for all of
//! them before the next phase starts. The workload is deterministic in shape
//! (who votes on what, in which direction); only the interleaving varies.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use configs::Settings;
use domains::{CommunityId, DomainError, NodeId, Page, Post, UserId, VoteTarget, VoteValue};
use serde::Serialize;
use services::{Community, VoteOutcome};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Counters collected by one task; merged once the phase completes.
#[derive(Debug, Default)]
struct Tally {
    deltas: HashMap<VoteTarget, i64>,
    votes_committed: u64,
    comments: u64,
    messages: u64,
    rejected: BTreeMap<&'static str, u64>,
}

impl Tally {
    fn committed(&mut self, outcome: &VoteOutcome) {
        *self.deltas.entry(outcome.vote.target).or_default() += outcome.delta;
        self.votes_committed += 1;
    }

    fn rejected(&mut self, err: &DomainError) {
        if matches!(err, DomainError::Internal(_)) {
            warn!(error = %err, "internal error during simulation");
        }
        *self.rejected.entry(err.kind()).or_default() += 1;
    }

    fn merge(&mut self, other: Tally) {
        for (target, delta) in other.deltas {
            *self.deltas.entry(target).or_default() += delta;
        }
        self.votes_committed += other.votes_committed;
        self.comments += other.comments;
        self.messages += other.messages;
        for (kind, count) in other.rejected {
            *self.rejected.entry(kind).or_default() += count;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Mismatch {
    pub target: VoteTarget,
    pub expected: i64,
    pub actual: i64,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub users: u32,
    pub rounds: u32,
    pub posts: usize,
    pub comments: u64,
    pub messages: u64,
    pub votes_committed: u64,
    /// Rejected operations by error kind. Conflicts and no-ops are expected.
    pub rejected: BTreeMap<&'static str, u64>,
    pub audited_targets: usize,
    pub mismatches: Vec<Mismatch>,
}

impl Report {
    pub fn internal_errors(&self) -> u64 {
        self.rejected.get("internal").copied().unwrap_or(0)
    }

    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty() && self.internal_errors() == 0
    }
}

pub struct Simulation {
    community: Community,
    users: Vec<UserId>,
    rounds: u32,
    page: Page,
}

impl Simulation {
    pub fn new(community: Community, settings: &Settings) -> Self {
        Self {
            community,
            users: (0..settings.simulation.users).map(|_| UserId::generate()).collect(),
            rounds: settings.simulation.rounds,
            page: settings.pagination.page(None, None),
        }
    }

    pub async fn run(self) -> Result<Report> {
        let mut tally = Tally::default();

        let posts = self.create_posts().await?;
        info!(posts = posts.len(), "[phase 1] posts created");

        let comments = self.comment_phase(&posts, &mut tally).await?;
        info!(comments = comments.len(), "[phase 2] comment threads built");

        self.vote_phase(&posts, &comments, &mut tally).await?;
        info!(committed = tally.votes_committed, "[phase 3] votes settled");

        self.message_phase(&mut tally).await?;
        info!(messages = tally.messages, "[phase 4] conversations exchanged");

        let mismatches = self.audit(&posts, &comments, &tally.deltas).await?;
        Ok(Report {
            users: self.users.len() as u32,
            rounds: self.rounds,
            posts: posts.len(),
            comments: tally.comments,
            messages: tally.messages,
            votes_committed: tally.votes_committed,
            rejected: tally.rejected,
            audited_targets: posts.len() + comments.len(),
            mismatches,
        })
    }

    async fn create_posts(&self) -> Result<Vec<Post>> {
        let community_id = CommunityId::generate();
        let mut posts = Vec::with_capacity(self.users.len());
        for (i, user) in self.users.iter().enumerate() {
            let post = self
                .community
                .posts
                .create_post(community_id, *user, &format!("Post {i}"), &format!("Opening post by user {i}"))
                .await?;
            posts.push(post);
        }
        Ok(posts)
    }

    /// Each user comments on a different post per round and replies to its
    /// previous comment, so threads grow several levels deep.
    async fn comment_phase(&self, posts: &[Post], tally: &mut Tally) -> Result<Vec<NodeId>> {
        let mut set = JoinSet::new();
        for (i, user) in self.users.iter().copied().enumerate() {
            let comments = self.community.comments.clone();
            let post_ids: Vec<_> = (0..self.rounds as usize)
                .map(|r| posts[(i + r) % posts.len()].id)
                .collect();
            set.spawn(async move {
                let mut local = Tally::default();
                let mut created = Vec::new();
                let mut previous: Option<NodeId> = None;
                for (r, post_id) in post_ids.into_iter().enumerate() {
                    match comments.add_comment(post_id, user, &format!("comment {i}.{r}")).await {
                        Ok(node) => {
                            local.comments += 1;
                            created.push(node.id);
                        }
                        Err(err) => local.rejected(&err),
                    }
                    if let Some(parent) = previous {
                        match comments.reply_to_comment(parent, user, &format!("follow-up {i}.{r}")).await {
                            Ok(node) => {
                                local.comments += 1;
                                created.push(node.id);
                            }
                            Err(err) => local.rejected(&err),
                        }
                    }
                    previous = created.last().copied();
                }
                (created, local)
            });
        }

        let mut all = Vec::new();
        while let Some(joined) = set.join_next().await {
            let (created, local) = joined.context("comment task panicked")?;
            all.extend(created);
            tally.merge(local);
        }
        all.sort();
        Ok(all)
    }

    /// Users vote on a post and a comment per round, alternating direction.
    /// A second vote on the same target becomes a change; every third round
    /// the vote is withdrawn again.
    async fn vote_phase(&self, posts: &[Post], comments: &[NodeId], tally: &mut Tally) -> Result<()> {
        let mut set = JoinSet::new();
        for (i, user) in self.users.iter().copied().enumerate() {
            let votes = self.community.votes.clone();
            let plan: Vec<(usize, VoteTarget, VoteTarget)> = (0..self.rounds as usize)
                .map(|r| {
                    let post = VoteTarget::Post(posts[(i + r + 1) % posts.len()].id);
                    let comment = match comments {
                        [] => post,
                        _ => VoteTarget::Comment(comments[(i * 7 + r) % comments.len()]),
                    };
                    (r, post, comment)
                })
                .collect();
            set.spawn(async move {
                let mut local = Tally::default();
                for (r, post, comment) in plan {
                    let value = if (i + r) % 2 == 0 { VoteValue::Up } else { VoteValue::Down };
                    for target in [post, comment] {
                        let result = match votes.cast_vote(user, target, value).await {
                            Err(DomainError::Conflict(_)) => votes.change_vote(user, target, value).await,
                            other => other,
                        };
                        match result {
                            Ok(outcome) => local.committed(&outcome),
                            Err(err) => local.rejected(&err),
                        }
                        if r % 3 == 2 {
                            match votes.remove_vote(user, target).await {
                                Ok(outcome) => local.committed(&outcome),
                                Err(err) => local.rejected(&err),
                            }
                        }
                    }
                }
                local
            });
        }

        while let Some(joined) = set.join_next().await {
            tally.merge(joined.context("vote task panicked")?);
        }
        Ok(())
    }

    /// Every user messages the next one, then answers whatever landed in the
    /// inbox. One self-addressed attempt per user is expected to bounce.
    async fn message_phase(&self, tally: &mut Tally) -> Result<()> {
        let n = self.users.len();
        let mut set = JoinSet::new();
        for (i, user) in self.users.iter().copied().enumerate() {
            let messages = self.community.messages.clone();
            let receiver = self.users[(i + 1) % n];
            set.spawn(async move {
                let mut local = Tally::default();
                for outcome in [
                    messages.send_message(user, receiver, &format!("hello from {i}")).await,
                    messages.send_message(user, user, "note to self").await,
                ] {
                    match outcome {
                        Ok(_) => local.messages += 1,
                        Err(err) => local.rejected(&err),
                    }
                }
                local
            });
        }
        while let Some(joined) = set.join_next().await {
            tally.merge(joined.context("message task panicked")?);
        }

        let mut set = JoinSet::new();
        for user in self.users.iter().copied() {
            let messages = self.community.messages.clone();
            let page = self.page;
            set.spawn(async move {
                let mut local = Tally::default();
                let inbox = match messages.get_messages_for_user(user, page).await {
                    Ok(inbox) => inbox,
                    Err(err) => {
                        local.rejected(&err);
                        return local;
                    }
                };
                for message in inbox {
                    match messages.reply_to_message(message.id, user, "got it").await {
                        Ok(reply) => {
                            debug!(reply = %reply.id, to = ?reply.recipient_id, "replied");
                            local.messages += 1;
                        }
                        Err(err) => local.rejected(&err),
                    }
                }
                local
            });
        }
        while let Some(joined) = set.join_next().await {
            tally.merge(joined.context("reply task panicked")?);
        }
        Ok(())
    }

    /// Compares stored karma with the reported deltas for every post and
    /// comment, voted on or not.
    async fn audit(
        &self,
        posts: &[Post],
        comments: &[NodeId],
        deltas: &HashMap<VoteTarget, i64>,
    ) -> Result<Vec<Mismatch>> {
        let mut mismatches = Vec::new();
        for post in posts {
            let target = VoteTarget::Post(post.id);
            let actual = self.community.posts.get_post(post.id).await?.karma;
            check(target, deltas, actual, &mut mismatches);
        }
        for id in comments {
            let target = VoteTarget::Comment(*id);
            let actual = self.community.comments.get_comment(*id).await?.karma;
            check(target, deltas, actual, &mut mismatches);
        }
        Ok(mismatches)
    }
}

fn check(target: VoteTarget, deltas: &HashMap<VoteTarget, i64>, actual: i64, out: &mut Vec<Mismatch>) {
    let expected = deltas.get(&target).copied().unwrap_or(0);
    if expected != actual {
        warn!(%target, expected, actual, "karma mismatch");
        out.push(Mismatch {
            target,
            expected,
            actual,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configs::{LogFormat, LogSettings, PaginationSettings, SimulationSettings, StorageBackend, StorageSettings};
    use std::sync::Arc;
    use storage_adapters::MemoryStore;

    fn settings(users: u32, rounds: u32) -> Settings {
        Settings {
            storage: StorageSettings {
                backend: StorageBackend::Memory,
                database_url: String::new().into(),
            },
            pagination: PaginationSettings {
                default_limit: 10,
                max_limit: 100,
            },
            log: LogSettings {
                level: "info".into(),
                format: LogFormat::Compact,
            },
            simulation: SimulationSettings { users, rounds },
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn simulation_audit_passes() {
        let community = Community::new(Arc::new(MemoryStore::new()));
        let report = Simulation::new(community, &settings(6, 4)).run().await.unwrap();

        assert!(report.is_consistent(), "{report:?}");
        assert_eq!(report.posts, 6);
        // One self-addressed send per user.
        assert_eq!(report.rejected.get("self_reference"), Some(&6));
        // Each user sends one message and answers the one it received.
        assert_eq!(report.messages, 12);
        assert!(report.votes_committed > 0);
        assert_eq!(report.audited_targets as u64, 6 + report.comments);
    }

    #[test]
    fn tallies_merge_per_target() {
        let target = VoteTarget::Post(domains::PostId::generate());
        let mut a = Tally::default();
        a.deltas.insert(target, 2);
        a.rejected.insert("conflict", 1);
        let mut b = Tally::default();
        b.deltas.insert(target, -1);
        b.rejected.insert("conflict", 2);
        b.votes_committed = 3;

        a.merge(b);
        assert_eq!(a.deltas[&target], 1);
        assert_eq!(a.rejected["conflict"], 3);
        assert_eq!(a.votes_committed, 3);
    }
}
