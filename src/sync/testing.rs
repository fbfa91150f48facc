//! Test doubles for the sync layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::api::RemoteSource;
use crate::error::{AppError, Result};
use crate::models::Post;

/// Remote that serves canned pages. Unknown pages are empty.
///
/// When gated, every fetch signals `started` and then parks until `release`.
pub(crate) struct ScriptedRemote {
    pages: Mutex<HashMap<u32, std::result::Result<Vec<Post>, String>>>,
    requests: Mutex<Vec<(u32, u32)>>,
    fetches: AtomicUsize,
    gate: Option<Notify>,
    started: Notify,
}

impl ScriptedRemote {
    pub(crate) fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            gate: None,
            started: Notify::new(),
        }
    }

    pub(crate) fn with_page(self, page: u32, posts: Vec<Post>) -> Self {
        self.set_page(page, posts);
        self
    }

    pub(crate) fn with_error(self, page: u32, message: &str) -> Self {
        self.pages
            .lock()
            .expect("pages lock")
            .insert(page, Err(message.to_string()));
        self
    }

    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub(crate) fn set_page(&self, page: u32, posts: Vec<Post>) {
        self.pages.lock().expect("pages lock").insert(page, Ok(posts));
    }

    /// Wait until a fetch has been entered.
    pub(crate) async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let one parked fetch complete.
    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<(u32, u32)> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl RemoteSource for ScriptedRemote {
    async fn fetch(&self, page: u32, per_page: u32) -> Result<Vec<Post>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests lock")
            .push((page, per_page));
        self.started.notify_one();

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let scripted = self.pages.lock().expect("pages lock").get(&page).cloned();
        match scripted {
            Some(Ok(posts)) => Ok(posts),
            Some(Err(message)) => Err(AppError::BlogApi(message)),
            None => Ok(Vec::new()),
        }
    }
}
