use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::Stream;
use rusqlite::{params, types::Type, OptionalExtension, Row};
use tokio::sync::mpsc;
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Post, RenderedField};

use super::schema::SCHEMA;

const POST_COLUMNS: &str =
    "id, title, content, excerpt, date, modified, author, featured_media, link";

pub type SubscriptionId = u64;

/// Live view of the `posts` table.
///
/// The first snapshot is the table as it was when subscribing; every committed
/// write after that pushes the full, re-ordered table.
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<Vec<Post>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next snapshot. Returns `None` once the store has dropped us.
    #[cfg(test)]
    pub async fn next_snapshot(&mut self) -> Option<Vec<Post>> {
        self.rx.recv().await
    }

    /// Most recent snapshot that is already queued, skipping stale ones.
    #[cfg(test)]
    pub fn latest(&mut self) -> Option<Vec<Post>> {
        let mut latest = None;
        while let Ok(snapshot) = self.rx.try_recv() {
            latest = Some(snapshot);
        }
        latest
    }
}

impl Stream for Subscription {
    type Item = Vec<Post>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[derive(Default)]
struct Subscribers {
    next_id: SubscriptionId,
    senders: HashMap<SubscriptionId, mpsc::UnboundedSender<Vec<Post>>>,
}

impl Subscribers {
    fn register(&mut self, tx: mpsc::UnboundedSender<Vec<Post>>) -> SubscriptionId {
        self.next_id += 1;
        self.senders.insert(self.next_id, tx);
        self.next_id
    }

    fn publish(&mut self, snapshot: Vec<Post>) {
        // Receivers that were dropped without unsubscribing are pruned here
        self.senders
            .retain(|_, tx| tx.send(snapshot.clone()).is_ok());
        tracing::trace!("Published snapshot to {} subscribers", self.senders.len());
    }
}

type SharedSubscribers = Arc<Mutex<Subscribers>>;

fn lock(subscribers: &SharedSubscribers) -> MutexGuard<'_, Subscribers> {
    // Nothing panics while holding the lock mid-update
    subscribers
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Rich-text fields encoded to their JSON column form ahead of the write.
struct PostRow {
    id: i64,
    title: String,
    content: String,
    excerpt: String,
    date: String,
    modified: String,
    author: i64,
    featured_media: i64,
    link: String,
}

impl PostRow {
    fn encode(post: &Post) -> Result<Self> {
        Ok(Self {
            id: post.id,
            title: serde_json::to_string(&post.title)?,
            content: serde_json::to_string(&post.content)?,
            excerpt: serde_json::to_string(&post.excerpt)?,
            date: post.date.clone(),
            modified: post.modified.clone(),
            author: post.author,
            featured_media: post.featured_media,
            link: post.link.clone(),
        })
    }
}

pub struct PostStore {
    conn: Connection,
    // Only touched on the connection thread (or by unsubscribe), so snapshots
    // go out in commit order and a commit always publishes
    subscribers: SharedSubscribers,
}

impl PostStore {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            subscribers: SharedSubscribers::default(),
        })
    }

    // Observation

    pub async fn subscribe(&self) -> Result<Subscription> {
        let subscribers = self.subscribers.clone();
        let subscription = self
            .conn
            .call(move |conn| {
                // Read and register in one step so no commit falls between them
                let snapshot = select_all(conn)?;
                let (tx, rx) = mpsc::unbounded_channel();
                // Cannot fail: rx is still alive
                let _ = tx.send(snapshot);
                let id = lock(&subscribers).register(tx);
                Ok(Subscription { id, rx })
            })
            .await?;

        tracing::debug!("Store subscriber {} registered", subscription.id);
        Ok(subscription)
    }

    /// Stop delivery to `id`; its stream ends once drained.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if lock(&self.subscribers).senders.remove(&id).is_some() {
            tracing::debug!("Store subscriber {} removed", id);
        }
    }

    // Reads

    pub async fn get_all(&self) -> Result<Vec<Post>> {
        let posts = self.conn.call(|conn| Ok(select_all(conn)?)).await?;
        Ok(posts)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let post = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"))?;
                let post = stmt.query_row(params![id], post_from_row).optional()?;
                Ok(post)
            })
            .await?;
        Ok(post)
    }

    pub async fn count(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    // Writes

    /// Clear the table and insert `posts`, as one transaction.
    pub async fn replace_all(&self, posts: &[Post]) -> Result<()> {
        let rows = encode_rows(posts)?;
        self.write(move |conn| {
            conn.execute("DELETE FROM posts", [])?;
            insert_rows(conn, &rows)
        })
        .await?;
        tracing::debug!("Replaced store contents with {} posts", posts.len());
        Ok(())
    }

    /// Upsert by id; rows not in `posts` are kept.
    pub async fn insert_or_replace(&self, posts: &[Post]) -> Result<()> {
        let rows = encode_rows(posts)?;
        self.write(move |conn| insert_rows(conn, &rows)).await?;
        tracing::debug!("Upserted {} posts", posts.len());
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.write(|conn| {
            conn.execute("DELETE FROM posts", [])?;
            Ok(())
        })
        .await
    }

    async fn write<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<()> + Send + 'static,
    {
        let subscribers = self.subscribers.clone();

        // Commit and publish run together on the connection thread, so a
        // caller cancelled mid-write cannot leave subscribers stale
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                op(&tx)?;
                tx.commit()?;
                let snapshot = select_all(conn)?;
                lock(&subscribers).publish(snapshot);
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn encode_rows(posts: &[Post]) -> Result<Vec<PostRow>> {
    posts.iter().map(PostRow::encode).collect()
}

fn insert_rows(conn: &rusqlite::Connection, rows: &[PostRow]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT OR REPLACE INTO posts ({POST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
    ))?;
    for row in rows {
        stmt.execute(params![
            row.id,
            row.title,
            row.content,
            row.excerpt,
            row.date,
            row.modified,
            row.author,
            row.featured_media,
            row.link,
        ])?;
    }
    Ok(())
}

fn select_all(conn: &rusqlite::Connection) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts ORDER BY date DESC, id DESC"
    ))?;
    let posts = stmt
        .query_map([], post_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(posts)
}

fn rendered_field(row: &Row, idx: usize) -> rusqlite::Result<RenderedField> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: rendered_field(row, 1)?,
        content: rendered_field(row, 2)?,
        excerpt: rendered_field(row, 3)?,
        date: row.get(4)?,
        modified: row.get(5)?,
        author: row.get(6)?,
        featured_media: row.get(7)?,
        link: row.get(8)?,
    })
}
