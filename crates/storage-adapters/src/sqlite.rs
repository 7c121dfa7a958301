//! # SQLite store
//!
//! This module implements the data mapping between the SQLite relational
//! model and the `domains` models.
//!
//! UUIDs are stored as 16-byte BLOBs. Timestamps are stored as INTEGER
//! microseconds since the epoch so `ORDER BY created_at` is exact and cheap.
//! Tables are created on connect with `CREATE TABLE IF NOT EXISTS`; there is
//! no migration history.

use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    CommunityId, NewPost, NewThreadNode, NewVote, NodeId, Page, Post, PostId, PostRepository,
    RootId, RootScope, ScoreRepository, SortOrder, ThreadKind, ThreadNode, ThreadRepository,
    UserId, Vote, VoteId, VoteRepository, VoteTarget, VoteValue,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS posts (
        id           BLOB PRIMARY KEY,
        community_id BLOB NOT NULL,
        author_id    BLOB NOT NULL,
        title        TEXT NOT NULL,
        content      TEXT NOT NULL,
        karma        INTEGER NOT NULL DEFAULT 0,
        created_at   INTEGER NOT NULL,
        updated_at   INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS posts_community ON posts (community_id, created_at)",
    "CREATE TABLE IF NOT EXISTS thread_nodes (
        id           BLOB PRIMARY KEY,
        kind         TEXT NOT NULL CHECK (kind IN ('comment', 'message')),
        root_id      BLOB NOT NULL,
        parent_id    BLOB REFERENCES thread_nodes(id),
        author_id    BLOB NOT NULL,
        recipient_id BLOB,
        content      TEXT NOT NULL,
        karma        INTEGER NOT NULL DEFAULT 0,
        created_at   INTEGER NOT NULL,
        updated_at   INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS thread_nodes_parent ON thread_nodes (kind, parent_id, created_at)",
    "CREATE INDEX IF NOT EXISTS thread_nodes_root ON thread_nodes (kind, root_id, created_at)",
    "CREATE INDEX IF NOT EXISTS thread_nodes_recipient ON thread_nodes (kind, recipient_id, created_at)",
    "CREATE TABLE IF NOT EXISTS votes (
        id          BLOB PRIMARY KEY,
        user_id     BLOB NOT NULL,
        target_kind TEXT NOT NULL CHECK (target_kind IN ('post', 'comment')),
        target_id   BLOB NOT NULL,
        value       INTEGER NOT NULL CHECK (value IN (-1, 1)),
        created_at  INTEGER NOT NULL,
        updated_at  INTEGER NOT NULL,
        UNIQUE (user_id, target_kind, target_id)
    )",
];

const NODE_COLUMNS: &str =
    "id, kind, root_id, parent_id, author_id, recipient_id, content, karma, created_at, updated_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

// Helpers for UUID and timestamp conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Result<Uuid> {
    Uuid::from_slice(blob).context("malformed uuid blob")
}

fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| anyhow!("timestamp {micros} out of range"))
}

/// Current time truncated to what the database can hold, so returned models
/// compare equal to what a later read produces.
fn now() -> Result<DateTime<Utc>> {
    from_micros(to_micros(Utc::now()))
}

fn thread_kind(raw: &str) -> Result<ThreadKind> {
    match raw {
        "comment" => Ok(ThreadKind::Comment),
        "message" => Ok(ThreadKind::Message),
        other => bail!("unknown thread kind {other:?}"),
    }
}

fn vote_target(kind: &str, id: Uuid) -> Result<VoteTarget> {
    match kind {
        "post" => Ok(VoteTarget::Post(PostId(id))),
        "comment" => Ok(VoteTarget::Comment(NodeId(id))),
        other => bail!("unknown vote target kind {other:?}"),
    }
}

fn row_to_post(row: &SqliteRow) -> Result<Post> {
    Ok(Post {
        id: PostId(blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?)?),
        community_id: CommunityId(blob_to_uuid(&row.try_get::<Vec<u8>, _>("community_id")?)?),
        author_id: UserId(blob_to_uuid(&row.try_get::<Vec<u8>, _>("author_id")?)?),
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        karma: row.try_get("karma")?,
        created_at: from_micros(row.try_get("created_at")?)?,
        updated_at: from_micros(row.try_get("updated_at")?)?,
    })
}

fn row_to_vote(row: &SqliteRow) -> Result<Vote> {
    let target_kind: String = row.try_get("target_kind")?;
    let target_id = blob_to_uuid(&row.try_get::<Vec<u8>, _>("target_id")?)?;
    Ok(Vote {
        id: VoteId(blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?)?),
        user_id: UserId(blob_to_uuid(&row.try_get::<Vec<u8>, _>("user_id")?)?),
        target: vote_target(&target_kind, target_id)?,
        value: VoteValue::try_from(row.try_get::<i64, _>("value")?)?,
        created_at: from_micros(row.try_get("created_at")?)?,
        updated_at: from_micros(row.try_get("updated_at")?)?,
    })
}

fn row_to_node(row: &SqliteRow) -> Result<ThreadNode> {
    let parent_id = row
        .try_get::<Option<Vec<u8>>, _>("parent_id")?
        .map(|b| blob_to_uuid(&b).map(NodeId))
        .transpose()?;
    let recipient_id = row
        .try_get::<Option<Vec<u8>>, _>("recipient_id")?
        .map(|b| blob_to_uuid(&b).map(UserId))
        .transpose()?;
    Ok(ThreadNode {
        id: NodeId(blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?)?),
        kind: thread_kind(&row.try_get::<String, _>("kind")?)?,
        root_id: RootId(blob_to_uuid(&row.try_get::<Vec<u8>, _>("root_id")?)?),
        parent_id,
        author_id: UserId(blob_to_uuid(&row.try_get::<Vec<u8>, _>("author_id")?)?),
        recipient_id,
        content: row.try_get("content")?,
        karma: row.try_get("karma")?,
        created_at: from_micros(row.try_get("created_at")?)?,
        updated_at: from_micros(row.try_get("updated_at")?)?,
    })
}

fn order_clause(order: SortOrder) -> &'static str {
    match order {
        SortOrder::NewestFirst => "ORDER BY created_at DESC, id DESC",
        SortOrder::OldestFirst => "ORDER BY created_at ASC, id ASC",
    }
}

/// An in-memory database is dropped once its last connection closes, so
/// that connection is pinned: never reaped for idleness or age.
fn pool_options(url: &str) -> SqlitePoolOptions {
    if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    }
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `url` and ensures the
    /// schema exists. `sqlite::memory:` gives a database private to this
    /// store.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid sqlite url {url:?}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = pool_options(url);
        let max_connections = pool_options.get_max_connections();
        let pool = pool_options
            .connect_with(options)
            .await
            .context("opening sqlite pool")?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .context("creating schema")?;
        }
        info!(max_connections, "sqlite store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl VoteRepository for SqliteStore {
    async fn get_vote(&self, user_id: UserId, target: VoteTarget) -> Result<Option<Vote>> {
        let row = sqlx::query(
            "SELECT id, user_id, target_kind, target_id, value, created_at, updated_at
             FROM votes WHERE user_id = ? AND target_kind = ? AND target_id = ?",
        )
        .bind(uuid_to_blob(user_id.0))
        .bind(target.kind().as_str())
        .bind(uuid_to_blob(target.id()))
        .fetch_optional(&self.pool)
        .await
        .context("get_vote")?;

        row.as_ref().map(row_to_vote).transpose()
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<Vote> {
        let now = now()?;
        let stored = Vote {
            id: VoteId::generate(),
            user_id: vote.user_id,
            target: vote.target,
            value: vote.value,
            created_at: now,
            updated_at: now,
        };
        self.restore_vote(stored.clone()).await.context("insert_vote")?;
        Ok(stored)
    }

    async fn update_vote_value(&self, vote_id: VoteId, value: VoteValue) -> Result<DateTime<Utc>> {
        let updated_at = now()?;
        let result = sqlx::query("UPDATE votes SET value = ?, updated_at = ? WHERE id = ?")
            .bind(value.as_i64())
            .bind(to_micros(updated_at))
            .bind(uuid_to_blob(vote_id.0))
            .execute(&self.pool)
            .await
            .context("update_vote_value")?;
        if result.rows_affected() == 0 {
            bail!("vote {vote_id} does not exist");
        }
        Ok(updated_at)
    }

    async fn delete_vote(&self, vote_id: VoteId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM votes WHERE id = ?")
            .bind(uuid_to_blob(vote_id.0))
            .execute(&self.pool)
            .await
            .context("delete_vote")?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_vote(&self, vote: Vote) -> Result<()> {
        sqlx::query(
            "INSERT INTO votes (id, user_id, target_kind, target_id, value, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(vote.id.0))
        .bind(uuid_to_blob(vote.user_id.0))
        .bind(vote.target.kind().as_str())
        .bind(uuid_to_blob(vote.target.id()))
        .bind(vote.value.as_i64())
        .bind(to_micros(vote.created_at))
        .bind(to_micros(vote.updated_at))
        .execute(&self.pool)
        .await
        .with_context(|| format!("writing vote {}", vote.id))?;
        Ok(())
    }
}

#[async_trait]
impl ScoreRepository for SqliteStore {
    async fn get_score(&self, target: VoteTarget) -> Result<Option<i64>> {
        let query = match target {
            VoteTarget::Post(_) => "SELECT karma FROM posts WHERE id = ?",
            VoteTarget::Comment(_) => "SELECT karma FROM thread_nodes WHERE id = ? AND kind = 'comment'",
        };
        let row = sqlx::query(query)
            .bind(uuid_to_blob(target.id()))
            .fetch_optional(&self.pool)
            .await
            .context("get_score")?;
        row.map(|r| r.try_get::<i64, _>("karma").map_err(anyhow::Error::from))
            .transpose()
    }

    async fn set_score(&self, target: VoteTarget, score: i64) -> Result<()> {
        let query = match target {
            VoteTarget::Post(_) => "UPDATE posts SET karma = ? WHERE id = ?",
            VoteTarget::Comment(_) => "UPDATE thread_nodes SET karma = ? WHERE id = ? AND kind = 'comment'",
        };
        let result = sqlx::query(query)
            .bind(score)
            .bind(uuid_to_blob(target.id()))
            .execute(&self.pool)
            .await
            .context("set_score")?;
        if result.rows_affected() == 0 {
            bail!("{target} does not exist");
        }
        Ok(())
    }
}

#[async_trait]
impl PostRepository for SqliteStore {
    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let now = now()?;
        let stored = Post {
            id: PostId::generate(),
            community_id: post.community_id,
            author_id: post.author_id,
            title: post.title,
            content: post.content,
            karma: 0,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO posts (id, community_id, author_id, title, content, karma, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(uuid_to_blob(stored.id.0))
        .bind(uuid_to_blob(stored.community_id.0))
        .bind(uuid_to_blob(stored.author_id.0))
        .bind(&stored.title)
        .bind(&stored.content)
        .bind(to_micros(stored.created_at))
        .bind(to_micros(stored.updated_at))
        .execute(&self.pool)
        .await
        .context("insert_post")?;
        Ok(stored)
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, community_id, author_id, title, content, karma, created_at, updated_at
             FROM posts WHERE id = ?",
        )
        .bind(uuid_to_blob(id.0))
        .fetch_optional(&self.pool)
        .await
        .context("get_post")?;
        row.as_ref().map(row_to_post).transpose()
    }

    async fn list_posts(&self, community_id: Option<CommunityId>, page: Page) -> Result<Vec<Post>> {
        sqlx::query(
            "SELECT id, community_id, author_id, title, content, karma, created_at, updated_at
             FROM posts WHERE (?1 IS NULL OR community_id = ?1)
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(community_id.map(|c| uuid_to_blob(c.0)))
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .context("list_posts")?
        .iter()
        .map(row_to_post)
        .collect()
    }
}

#[async_trait]
impl ThreadRepository for SqliteStore {
    /// Parent check and insert run in one transaction so the parent cannot
    /// disappear in between.
    async fn insert_node(&self, node: NewThreadNode) -> Result<ThreadNode> {
        let mut tx = self.pool.begin().await?;

        if let Some(parent_id) = node.parent_id {
            let parent_root = sqlx::query("SELECT root_id FROM thread_nodes WHERE id = ? AND kind = ?")
                .bind(uuid_to_blob(parent_id.0))
                .bind(node.kind.as_str())
                .fetch_optional(&mut *tx)
                .await
                .context("loading parent")?
                .ok_or_else(|| anyhow!("parent {} {parent_id} does not exist", node.kind.as_str()))?;
            let parent_root = RootId(blob_to_uuid(&parent_root.try_get::<Vec<u8>, _>("root_id")?)?);
            if parent_root != node.root_id {
                bail!("parent {parent_id} belongs to root {parent_root}, not {}", node.root_id);
            }
        }

        let now = now()?;
        let stored = ThreadNode {
            id: NodeId::generate(),
            kind: node.kind,
            root_id: node.root_id,
            parent_id: node.parent_id,
            author_id: node.author_id,
            recipient_id: node.recipient_id,
            content: node.content,
            karma: 0,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO thread_nodes
                (id, kind, root_id, parent_id, author_id, recipient_id, content, karma, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(uuid_to_blob(stored.id.0))
        .bind(stored.kind.as_str())
        .bind(uuid_to_blob(stored.root_id.0))
        .bind(stored.parent_id.map(|p| uuid_to_blob(p.0)))
        .bind(uuid_to_blob(stored.author_id.0))
        .bind(stored.recipient_id.map(|r| uuid_to_blob(r.0)))
        .bind(&stored.content)
        .bind(to_micros(stored.created_at))
        .bind(to_micros(stored.updated_at))
        .execute(&mut *tx)
        .await
        .context("insert_node")?;

        tx.commit().await?;
        debug!(node_id = %stored.id, kind = stored.kind.as_str(), "thread node stored");
        Ok(stored)
    }

    async fn get_node(&self, kind: ThreadKind, id: NodeId) -> Result<Option<ThreadNode>> {
        let row = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM thread_nodes WHERE id = ? AND kind = ?"
        ))
        .bind(uuid_to_blob(id.0))
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("get_node")?;
        row.as_ref().map(row_to_node).transpose()
    }

    async fn list_children(
        &self,
        kind: ThreadKind,
        parent_id: NodeId,
        order: SortOrder,
        page: Page,
    ) -> Result<Vec<ThreadNode>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM thread_nodes WHERE kind = ? AND parent_id = ? {} LIMIT ? OFFSET ?",
            order_clause(order)
        );
        sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(uuid_to_blob(parent_id.0))
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .context("list_children")?
            .iter()
            .map(row_to_node)
            .collect()
    }

    async fn list_roots_for(
        &self,
        kind: ThreadKind,
        scope: RootScope,
        order: SortOrder,
        page: Page,
    ) -> Result<Vec<ThreadNode>> {
        let (column, key) = match scope {
            RootScope::Root(root_id) => ("root_id", root_id.0),
            RootScope::Recipient(user_id) => ("recipient_id", user_id.0),
        };
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM thread_nodes
             WHERE kind = ? AND parent_id IS NULL AND {column} = ? {} LIMIT ? OFFSET ?",
            order_clause(order)
        );
        sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(uuid_to_blob(key))
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .context("list_roots_for")?
            .iter()
            .map(row_to_node)
            .collect()
    }

    async fn update_content(&self, kind: ThreadKind, id: NodeId, content: String) -> Result<Option<ThreadNode>> {
        let result = sqlx::query("UPDATE thread_nodes SET content = ?, updated_at = ? WHERE id = ? AND kind = ?")
            .bind(&content)
            .bind(to_micros(now()?))
            .bind(uuid_to_blob(id.0))
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .context("update_content")?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_node(kind, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.expect("in-memory sqlite")
    }

    async fn seed_post(store: &SqliteStore) -> Post {
        store
            .insert_post(NewPost {
                community_id: CommunityId::generate(),
                author_id: UserId::generate(),
                title: "sqlite".into(),
                content: "body".into(),
            })
            .await
            .unwrap()
    }

    #[test]
    fn memory_pool_keeps_its_connection() {
        let memory = pool_options("sqlite::memory:");
        assert_eq!(memory.get_max_connections(), 1);
        assert_eq!(memory.get_min_connections(), 1);
        assert_eq!(memory.get_idle_timeout(), None);
        assert_eq!(memory.get_max_lifetime(), None);

        let file = pool_options("sqlite://community.db");
        assert_eq!(file.get_max_connections(), 5);
        assert!(file.get_idle_timeout().is_some());
    }

    #[tokio::test]
    async fn vote_round_trip_and_uniqueness() {
        let store = store().await;
        let post = seed_post(&store).await;
        let new = NewVote {
            user_id: UserId::generate(),
            target: VoteTarget::Post(post.id),
            value: VoteValue::Down,
        };

        let vote = store.insert_vote(new).await.unwrap();
        assert_eq!(store.get_vote(new.user_id, new.target).await.unwrap(), Some(vote.clone()));
        assert!(store.insert_vote(new).await.is_err());

        store.update_vote_value(vote.id, VoteValue::Up).await.unwrap();
        let reread = store.get_vote(new.user_id, new.target).await.unwrap().unwrap();
        assert_eq!(reread.value, VoteValue::Up);

        assert!(store.delete_vote(vote.id).await.unwrap());
        assert!(!store.delete_vote(vote.id).await.unwrap());
    }

    #[tokio::test]
    async fn score_of_missing_target_is_none() {
        let store = store().await;
        let post = seed_post(&store).await;

        store.set_score(VoteTarget::Post(post.id), 3).await.unwrap();
        assert_eq!(store.get_score(VoteTarget::Post(post.id)).await.unwrap(), Some(3));
        assert_eq!(store.get_score(VoteTarget::Comment(NodeId::generate())).await.unwrap(), None);
        assert!(store.set_score(VoteTarget::Post(PostId::generate()), 1).await.is_err());
    }

    #[tokio::test]
    async fn posts_filter_by_community() {
        let store = store().await;
        let first = seed_post(&store).await;
        let second = seed_post(&store).await;

        let own = store.list_posts(Some(first.community_id), Page::default()).await.unwrap();
        assert_eq!(own, vec![first.clone()]);

        let feed = store.list_posts(None, Page::default()).await.unwrap();
        assert_eq!(feed, vec![second, first]);
    }

    #[tokio::test]
    async fn thread_nodes_list_direct_children_in_order() {
        let store = store().await;
        let post = seed_post(&store).await;
        let root_id: RootId = post.id.into();
        let new = |parent_id, content: &str| NewThreadNode {
            kind: ThreadKind::Comment,
            root_id,
            parent_id,
            author_id: UserId::generate(),
            recipient_id: None,
            content: content.into(),
        };

        let root = store.insert_node(new(None, "root")).await.unwrap();
        let a = store.insert_node(new(Some(root.id), "a")).await.unwrap();
        let b = store.insert_node(new(Some(root.id), "b")).await.unwrap();
        store.insert_node(new(Some(a.id), "nested")).await.unwrap();
        assert!(store.insert_node(new(Some(NodeId::generate()), "orphan")).await.is_err());

        let children = store
            .list_children(ThreadKind::Comment, root.id, SortOrder::OldestFirst, Page::default())
            .await
            .unwrap();
        assert_eq!(children.iter().map(|n| n.id).collect::<Vec<_>>(), vec![a.id, b.id]);

        let roots = store
            .list_roots_for(ThreadKind::Comment, RootScope::Root(root_id), SortOrder::NewestFirst, Page::default())
            .await
            .unwrap();
        assert_eq!(roots, vec![root]);
    }
}
