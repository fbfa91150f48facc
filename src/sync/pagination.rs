use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;

use crate::error::Result;
use crate::models::Post;

use super::repository::PostRepository;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    pub posts: Vec<Post>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub current_page: u32,
    pub has_more_pages: bool,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            posts: Vec::new(),
            is_loading: false,
            error: None,
            current_page: 1,
            has_more_pages: true,
        }
    }
}

/// Clears the in-flight flag when a command finishes or its task is aborted.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    state: &'a watch::Sender<FeedState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.state.send_modify(|s| s.is_loading = false);
    }
}

/// Drives infinite scroll over a [`PostRepository`].
///
/// Commands never queue: while one is running, others return `false` immediately.
pub struct FeedController {
    repository: Arc<PostRepository>,
    state: watch::Sender<FeedState>,
    in_flight: AtomicBool,
    // Store subscription feeding the pump, 0 when none
    pump: AtomicU64,
}

impl FeedController {
    pub fn new(repository: Arc<PostRepository>) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        Self {
            repository,
            state,
            in_flight: AtomicBool::new(false),
            pump: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> FeedState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Load the current page. Returns `false` if suppressed.
    pub async fn load_next(&self) -> bool {
        if !self.state.borrow().has_more_pages {
            return false;
        }
        let Some(_guard) = self.begin() else {
            tracing::debug!("load_next suppressed, a load is already in flight");
            return false;
        };

        let (page, has_more) = {
            let state = self.state.borrow();
            (state.current_page, state.has_more_pages)
        };
        if !has_more {
            return false;
        }

        self.load_page(page).await;
        true
    }

    /// Start over from page 1. Returns `false` if suppressed.
    pub async fn reset_and_refresh(&self) -> bool {
        let Some(_guard) = self.begin() else {
            tracing::debug!("reset suppressed, a load is already in flight");
            return false;
        };

        self.state.send_modify(|s| {
            s.current_page = 1;
            s.has_more_pages = true;
        });
        self.load_page(1).await;
        true
    }

    /// Manual retry after a failure; same rules as [`load_next`](Self::load_next).
    pub async fn retry(&self) -> bool {
        self.load_next().await
    }

    /// Mirror the store's live snapshots into `FeedState::posts` until
    /// [`stop_snapshot_pump`](Self::stop_snapshot_pump) or abort.
    pub async fn run_snapshot_pump(&self) -> Result<()> {
        let mut live = self.repository.observe_all().await?;
        self.pump.store(live.id(), Ordering::SeqCst);
        while let Some(posts) = live.next().await {
            self.state.send_modify(|s| s.posts = posts);
        }
        tracing::debug!("Snapshot pump stopped");
        Ok(())
    }

    /// Unsubscribe the pump from the store; it returns once queued snapshots are drained.
    pub fn stop_snapshot_pump(&self) {
        let id = self.pump.swap(0, Ordering::SeqCst);
        if id != 0 {
            self.repository.stop_observing(id);
        }
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
        Some(InFlight {
            flag: &self.in_flight,
            state: &self.state,
        })
    }

    async fn load_page(&self, page: u32) {
        match self.repository.refresh(page).await {
            Ok(posts) if posts.is_empty() => {
                tracing::info!("Reached the end of the feed at page {}", page);
                self.state.send_modify(|s| s.has_more_pages = false);
            }
            Ok(posts) => {
                tracing::debug!("Loaded {} posts from page {}", posts.len(), page);
                self.state.send_modify(|s| s.current_page = page + 1);
            }
            Err(e) => {
                self.state.send_modify(|s| s.error = Some(e.to_string()));
            }
        }
    }
}
