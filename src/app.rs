use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::WpClient;
use crate::config::Config;
use crate::db::PostStore;
use crate::error::Result;
use crate::models::Post;
use crate::network::{probe, NetworkMonitor, ProbeTarget};
use crate::sync::{FeedController, FeedState, PostRepository};
use crate::tui::AppAction;

/// Width the reader pre-renders post bodies at; the paragraph widget re-wraps narrower panes.
const READER_WIDTH: usize = 100;

/// How [`Services::build`] settles the initial connectivity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// Probe once before returning, for commands that sync straight away.
    Probe,
    /// Start offline and leave reachability to the background probe.
    Deferred,
}

/// Long-lived collaborators, constructed once at startup and passed down.
pub struct Services {
    pub repository: Arc<PostRepository>,
    pub network: Arc<NetworkMonitor>,
    probe_target: Option<ProbeTarget>,
    probe_interval: std::time::Duration,
    probe_timeout: std::time::Duration,
}

impl Services {
    pub async fn build(config: &Config, startup: Startup) -> Result<Self> {
        let store = Arc::new(PostStore::open(&config.db_path).await?);
        let client = WpClient::new(
            &config.base_url,
            config.request_timeout(),
            config.connect_timeout(),
        )?;

        let probe_target = ProbeTarget::from_url(client.posts_url());
        let initially_online = match (&probe_target, startup) {
            (Some(target), Startup::Probe) => {
                let online = probe(target, config.connect_timeout()).await;
                if !online {
                    tracing::warn!("Starting offline, cached posts will be used");
                }
                online
            }
            (Some(_), Startup::Deferred) => false,
            (None, _) => true,
        };
        let network = Arc::new(NetworkMonitor::new(initially_online));

        let repository = Arc::new(PostRepository::new(
            Arc::new(client),
            store,
            network.clone(),
            config.per_page,
        ));

        Ok(Self {
            repository,
            network,
            probe_target,
            probe_interval: config.probe_interval(),
            probe_timeout: config.connect_timeout(),
        })
    }

    /// Keep the connectivity signal live until the returned task is aborted.
    pub fn spawn_probe(&self) -> Option<JoinHandle<()>> {
        let target = self.probe_target.clone()?;
        Some(
            self.network
                .spawn_probe(target, self.probe_interval, self.probe_timeout),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    List,
    Detail,
}

#[derive(Debug, Default)]
pub struct DetailState {
    pub post: Option<Post>,
    pub body: String,
    pub error: Option<String>,
    pub scroll: u16,
}

pub struct App {
    // Data
    pub feed: FeedState,
    pub is_offline: bool,
    pub detail: DetailState,

    // UI State
    pub view: View,
    pub selected_index: usize,
    pub show_help: bool,

    // Async state
    feed_rx: watch::Receiver<FeedState>,
    online_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,

    // Services
    repository: Arc<PostRepository>,
    controller: Arc<FeedController>,
}

impl App {
    pub fn new(services: &Services) -> Self {
        let repository = services.repository.clone();
        let controller = Arc::new(FeedController::new(repository.clone()));

        let feed_rx = controller.subscribe();
        let online_rx = repository.connectivity();
        let is_offline = !*online_rx.borrow();

        let mut background = Vec::new();
        {
            let controller = controller.clone();
            background.push(tokio::spawn(async move {
                if let Err(e) = controller.run_snapshot_pump().await {
                    tracing::error!("Post list stopped updating: {}", e);
                }
            }));
        }
        let probing = services.spawn_probe();
        let wait_for_probe = probing.is_some();
        background.extend(probing);

        let mut app = Self {
            feed: FeedState::default(),
            is_offline,
            detail: DetailState::default(),
            view: View::List,
            selected_index: 0,
            show_help: false,
            feed_rx,
            online_rx,
            tasks: Vec::new(),
            background,
            repository,
            controller,
        };

        // Cached posts show through the pump meanwhile; the first page
        // loads once reachability is known
        if wait_for_probe {
            let network = services.network.clone();
            let controller = app.controller.clone();
            app.tasks.push(tokio::spawn(async move {
                network.wait_first_probe().await;
                controller.load_next().await;
            }));
        } else {
            app.spawn_command(Command::LoadNext);
        }
        app
    }

    pub fn selected_post(&self) -> Option<&Post> {
        self.feed.posts.get(self.selected_index)
    }

    pub fn visible_post(&self) -> Option<&Post> {
        match self.view {
            View::List => self.selected_post(),
            View::Detail => self.detail.post.as_ref(),
        }
    }

    /// Pull the latest controller and connectivity values into the render state.
    pub fn poll_updates(&mut self) {
        if self.feed_rx.has_changed().unwrap_or(false) {
            self.feed = self.feed_rx.borrow_and_update().clone();
            let len = self.feed.posts.len();
            if len > 0 && self.selected_index >= len {
                self.selected_index = len - 1;
            }
        }

        if self.online_rx.has_changed().unwrap_or(false) {
            self.is_offline = !*self.online_rx.borrow_and_update();
        }

        self.tasks.retain(|task| !task.is_finished());
    }

    pub async fn handle_action(&mut self, action: AppAction) -> Result<bool> {
        match action {
            AppAction::Quit => return Ok(true),

            AppAction::MoveUp => {
                if self.selected_index > 0 {
                    self.selected_index -= 1;
                }
            }

            AppAction::MoveDown => {
                let len = self.feed.posts.len();
                if len > 0 && self.selected_index < len - 1 {
                    self.selected_index += 1;
                }
                self.maybe_load_more();
            }

            AppAction::MoveToTop => {
                self.selected_index = 0;
            }

            AppAction::MoveToBottom => {
                self.selected_index = self.feed.posts.len().saturating_sub(1);
                self.maybe_load_more();
            }

            AppAction::OpenPost => {
                if let Some(id) = self.selected_post().map(|p| p.id) {
                    self.open_detail(id).await?;
                }
            }

            AppAction::Back => {
                self.view = View::List;
                self.detail = DetailState::default();
            }

            AppAction::ScrollDown => {
                self.detail.scroll = self.detail.scroll.saturating_add(1);
            }

            AppAction::ScrollUp => {
                self.detail.scroll = self.detail.scroll.saturating_sub(1);
            }

            AppAction::Refresh => {
                self.selected_index = 0;
                self.spawn_command(Command::Reset);
            }

            AppAction::Retry => {
                self.spawn_command(Command::Retry);
            }

            AppAction::OpenInBrowser => {
                if let Some(post) = self.visible_post() {
                    if !post.link.is_empty() {
                        if let Err(e) = open::that(&post.link) {
                            tracing::warn!("Failed to open {}: {}", post.link, e);
                        }
                    }
                }
            }

            AppAction::ShowHelp => {
                self.show_help = true;
            }

            AppAction::HideHelp => {
                self.show_help = false;
            }
        }

        Ok(false)
    }

    /// Cancel in-flight commands and background tasks.
    pub fn shutdown(&mut self) {
        self.controller.stop_snapshot_pump();
        for task in self.tasks.drain(..).chain(self.background.drain(..)) {
            task.abort();
        }
    }

    async fn open_detail(&mut self, id: i64) -> Result<()> {
        let post = self.repository.get_by_id(id).await?;

        self.detail = match post {
            Some(post) => DetailState {
                body: post.content_text(READER_WIDTH),
                post: Some(post),
                error: None,
                scroll: 0,
            },
            None => DetailState {
                error: Some("Post not found".to_string()),
                ..DetailState::default()
            },
        };
        self.view = View::Detail;
        Ok(())
    }

    /// Infinite scroll: reaching the last card asks for the next page.
    fn maybe_load_more(&mut self) {
        let at_end = self.selected_index + 1 >= self.feed.posts.len();
        // After a failure, loading more is a manual retry
        if at_end
            && self.feed.has_more_pages
            && !self.controller.is_loading()
            && self.feed.error.is_none()
        {
            self.spawn_command(Command::LoadNext);
        }
    }

    fn spawn_command(&mut self, command: Command) {
        let controller = self.controller.clone();
        self.tasks.push(tokio::spawn(async move {
            let started = match command {
                Command::LoadNext => controller.load_next().await,
                Command::Reset => controller.reset_and_refresh().await,
                Command::Retry => controller.retry().await,
            };
            if !started {
                tracing::debug!("{:?} suppressed", command);
            }
        }));
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    LoadNext,
    Reset,
    Retry,
}
