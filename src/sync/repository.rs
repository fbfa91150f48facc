use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::api::RemoteSource;
use crate::db::{PostStore, Subscription, SubscriptionId};
use crate::error::Result;
use crate::models::Post;
use crate::network::Connectivity;

/// Why a refresh produced no posts. The messages are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("{0}")]
    Transport(String),

    #[error("No internet connection")]
    NoConnectivity,

    #[error("No internet connection and no cached data available")]
    NoCachedData,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid page {0}: pages start at 1")]
    InvalidPage(u32),
}

/// Single source of truth for posts: the local store, kept in step with the remote list.
pub struct PostRepository {
    remote: Arc<dyn RemoteSource>,
    store: Arc<PostStore>,
    connectivity: Arc<dyn Connectivity>,
    per_page: u32,
}

impl PostRepository {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        store: Arc<PostStore>,
        connectivity: Arc<dyn Connectivity>,
        per_page: u32,
    ) -> Self {
        Self {
            remote,
            store,
            connectivity,
            per_page: per_page.max(1),
        }
    }

    /// Live posts, newest first. The first snapshot is the current cache, which may be empty.
    pub async fn observe_all(&self) -> Result<Subscription> {
        self.store.subscribe().await
    }

    /// End the live stream returned by [`observe_all`](Self::observe_all).
    pub fn stop_observing(&self, id: SubscriptionId) {
        self.store.unsubscribe(id);
    }

    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connectivity.watch()
    }

    /// Fetch `page` and mirror it into the store, or fall back to the cache when offline.
    ///
    /// Page 1 is an authoritative snapshot and replaces the whole cache; later
    /// pages are merged in. Offline, only page 1 can be served, and only if the
    /// cache is non-empty. Every failure comes back as a [`SyncError`].
    pub async fn refresh(&self, page: u32) -> std::result::Result<Vec<Post>, SyncError> {
        if page == 0 {
            return Err(SyncError::InvalidPage(page));
        }

        if self.connectivity.is_online().await {
            let posts = self.remote.fetch(page, self.per_page).await.map_err(|e| {
                tracing::warn!("Failed to fetch page {}: {}", page, e);
                SyncError::Transport(e.to_string())
            })?;

            let written = if page == 1 {
                self.store.replace_all(&posts).await
            } else {
                self.store.insert_or_replace(&posts).await
            };
            written.map_err(|e| {
                tracing::error!("Failed to store page {}: {}", page, e);
                SyncError::Storage(e.to_string())
            })?;

            tracing::debug!("Synced {} posts from page {}", posts.len(), page);
            return Ok(posts);
        }

        if page > 1 {
            tracing::warn!("Offline, cannot load page {}", page);
            return Err(SyncError::NoConnectivity);
        }

        let cached = self.store.get_all().await.map_err(|e| {
            tracing::error!("Failed to read cached posts: {}", e);
            SyncError::Storage(e.to_string())
        })?;

        if cached.is_empty() {
            tracing::warn!("Offline with an empty cache");
            return Err(SyncError::NoCachedData);
        }

        tracing::info!("Offline, serving {} cached posts", cached.len());
        Ok(cached)
    }

    /// Drop every cached post; observers see an empty list.
    pub async fn clear_cache(&self) -> Result<()> {
        self.store.clear().await
    }

    /// Cached post by id. Never goes to the network.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        self.store.get_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_post;
    use crate::network::NetworkMonitor;
    use crate::sync::testing::ScriptedRemote;

    struct Harness {
        remote: Arc<ScriptedRemote>,
        store: Arc<PostStore>,
        network: Arc<NetworkMonitor>,
        repository: PostRepository,
    }

    async fn harness(remote: ScriptedRemote, online: bool) -> Harness {
        let remote = Arc::new(remote);
        let store = Arc::new(PostStore::open_in_memory().await.expect("store"));
        let network = Arc::new(NetworkMonitor::new(online));
        let repository = PostRepository::new(remote.clone(), store.clone(), network.clone(), 10);
        Harness {
            remote,
            store,
            network,
            repository,
        }
    }

    fn ids(posts: &[Post]) -> Vec<i64> {
        let mut ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn online_page_one_replaces_whole_cache() {
        let a = sample_post(1, "2024-02-01T00:00:00");
        let b = sample_post(2, "2024-02-02T00:00:00");
        let h = harness(ScriptedRemote::new().with_page(1, vec![a, b]), true).await;
        h.store
            .insert_or_replace(&[
                sample_post(3, "2024-01-01T00:00:00"),
                sample_post(4, "2024-01-02T00:00:00"),
            ])
            .await
            .expect("seed");

        let posts = h.repository.refresh(1).await.expect("refresh should succeed");

        assert_eq!(ids(&posts), vec![1, 2]);
        assert_eq!(ids(&h.store.get_all().await.expect("read")), vec![1, 2]);
        assert_eq!(h.remote.requests(), vec![(1, 10)]);
    }

    #[tokio::test]
    async fn online_later_pages_are_additive() {
        let remote = ScriptedRemote::new()
            .with_page(1, vec![sample_post(1, "2024-02-01T00:00:00")])
            .with_page(2, vec![sample_post(2, "2024-01-01T00:00:00")]);
        let h = harness(remote, true).await;

        h.repository.refresh(1).await.expect("page 1");
        let page_two = h.repository.refresh(2).await.expect("page 2");

        assert_eq!(ids(&page_two), vec![2]);
        assert_eq!(ids(&h.store.get_all().await.expect("read")), vec![1, 2]);
    }

    #[tokio::test]
    async fn offline_page_one_with_empty_cache_has_no_data() {
        let h = harness(ScriptedRemote::new(), false).await;

        assert_eq!(h.repository.refresh(1).await, Err(SyncError::NoCachedData));
        assert_eq!(h.remote.fetch_count(), 0);
    }

    #[tokio::test]
    async fn offline_page_one_serves_the_cache() {
        let h = harness(ScriptedRemote::new(), false).await;
        h.store
            .insert_or_replace(&[
                sample_post(1, "2024-01-01T00:00:00"),
                sample_post(2, "2024-01-02T00:00:00"),
            ])
            .await
            .expect("seed");

        let posts = h.repository.refresh(1).await.expect("cache should be served");

        assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(h.remote.fetch_count(), 0);
    }

    #[tokio::test]
    async fn offline_later_pages_always_fail() {
        let h = harness(ScriptedRemote::new(), false).await;
        assert_eq!(h.repository.refresh(2).await, Err(SyncError::NoConnectivity));

        h.store
            .insert_or_replace(&[sample_post(1, "2024-01-01T00:00:00")])
            .await
            .expect("seed");
        assert_eq!(h.repository.refresh(2).await, Err(SyncError::NoConnectivity));
        assert_eq!(h.repository.refresh(7).await, Err(SyncError::NoConnectivity));
    }

    #[tokio::test]
    async fn connectivity_is_checked_on_every_call() {
        let h = harness(
            ScriptedRemote::new().with_page(1, vec![sample_post(1, "2024-01-01T00:00:00")]),
            true,
        )
        .await;

        h.repository.refresh(1).await.expect("online refresh");
        h.network.set_online(false);
        let cached = h.repository.refresh(1).await.expect("offline refresh");

        assert_eq!(ids(&cached), vec![1]);
        assert_eq!(h.remote.fetch_count(), 1);
    }

    #[tokio::test]
    async fn transport_errors_become_failures_and_keep_the_cache() {
        let h = harness(ScriptedRemote::new().with_error(1, "connection reset"), true).await;
        h.store
            .insert_or_replace(&[sample_post(9, "2024-01-01T00:00:00")])
            .await
            .expect("seed");

        let result = h.repository.refresh(1).await;

        match result {
            Err(SyncError::Transport(message)) => assert!(message.contains("connection reset")),
            other => panic!("expected transport failure, got {other:?}"),
        }
        assert_eq!(ids(&h.store.get_all().await.expect("read")), vec![9]);
    }

    #[tokio::test]
    async fn page_zero_is_rejected() {
        let h = harness(ScriptedRemote::new(), true).await;
        assert_eq!(h.repository.refresh(0).await, Err(SyncError::InvalidPage(0)));
        assert_eq!(h.remote.fetch_count(), 0);
    }

    #[tokio::test]
    async fn store_failures_become_storage_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("posts.db");
        let store = Arc::new(PostStore::open(&path).await.expect("open"));
        let remote = Arc::new(
            ScriptedRemote::new().with_page(1, vec![sample_post(1, "2024-01-01T00:00:00")]),
        );
        let network = Arc::new(NetworkMonitor::new(true));
        let repository = PostRepository::new(remote, store, network.clone(), 10);

        // Break the table behind the store's back
        rusqlite::Connection::open(&path)
            .expect("second connection")
            .execute_batch("DROP TABLE posts")
            .expect("drop table");

        match repository.refresh(1).await {
            Err(SyncError::Storage(message)) => assert!(message.contains("posts")),
            other => panic!("expected storage failure on write, got {other:?}"),
        }

        network.set_online(false);
        assert!(matches!(
            repository.refresh(1).await,
            Err(SyncError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn get_by_id_reads_only_the_cache() {
        let h = harness(ScriptedRemote::new(), true).await;
        h.store
            .insert_or_replace(&[sample_post(5, "2024-01-01T00:00:00")])
            .await
            .expect("seed");

        let found = h.repository.get_by_id(5).await.expect("lookup");
        let missing = h.repository.get_by_id(6).await.expect("lookup");

        assert_eq!(found.map(|p| p.id), Some(5));
        assert!(missing.is_none());
        assert_eq!(h.remote.fetch_count(), 0);
    }

    #[tokio::test]
    async fn observers_see_the_refreshed_snapshot() {
        let h = harness(
            ScriptedRemote::new().with_page(
                1,
                vec![
                    sample_post(1, "2024-01-01T00:00:00"),
                    sample_post(2, "2024-03-01T00:00:00"),
                ],
            ),
            true,
        )
        .await;
        let mut live = h.repository.observe_all().await.expect("observe");
        assert!(live.next_snapshot().await.expect("initial").is_empty());

        h.repository.refresh(1).await.expect("refresh");

        let snapshot = live.next_snapshot().await.expect("after refresh");
        assert_eq!(snapshot.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 1]);
        h.repository.clear_cache().await.expect("clear");
        assert!(live.next_snapshot().await.expect("after clear").is_empty());
        h.repository.stop_observing(live.id());
        assert_eq!(live.next_snapshot().await, None);
    }
}
