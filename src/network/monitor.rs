use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use url::Url;

/// Live network reachability, consumed read-only by the sync layer.
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Latest known reachability.
    async fn is_online(&self) -> bool;

    /// Reachability as a live value, for offline indicators.
    fn watch(&self) -> watch::Receiver<bool>;
}

/// Host and port the background probe connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    pub fn from_url(url: &Url) -> Option<Self> {
        Some(Self {
            host: url.host_str()?.to_string(),
            port: url.port_or_known_default()?,
        })
    }
}

/// Try a TCP connect to `target` within `timeout`.
pub async fn probe(target: &ProbeTarget, timeout: Duration) -> bool {
    let connect = TcpStream::connect((target.host.as_str(), target.port));
    matches!(tokio::time::timeout(timeout, connect).await, Ok(Ok(_)))
}

pub struct NetworkMonitor {
    tx: watch::Sender<bool>,
    // Flips once the background probe has reported
    probed: watch::Sender<bool>,
}

impl NetworkMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        let (probed, _) = watch::channel(false);
        Self { tx, probed }
    }

    pub fn current(&self) -> bool {
        *self.tx.borrow()
    }

    /// Publish a reachability value; watchers are only woken on a change.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            if online {
                tracing::info!("Network is reachable");
            } else {
                tracing::warn!("Network is unreachable");
            }
        }
    }

    /// Resolves after the first background probe result, whatever it was.
    pub async fn wait_first_probe(&self) {
        let mut rx = self.probed.subscribe();
        // The sender lives in `self`, so this only errors if never probed and dropped
        let _ = rx.wait_for(|probed| *probed).await;
    }

    /// Probe `target` every `interval` until the returned task is aborted.
    ///
    /// The first probe runs immediately.
    pub fn spawn_probe(
        self: &Arc<Self>,
        target: ProbeTarget,
        interval: Duration,
        timeout: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let online = probe(&target, timeout).await;
                tracing::trace!("Probe {}:{} -> {}", target.host, target.port, online);
                monitor.set_online(online);
                monitor.probed.send_if_modified(|probed| !std::mem::replace(probed, true));
            }
        })
    }
}

#[async_trait]
impl Connectivity for NetworkMonitor {
    async fn is_online(&self) -> bool {
        self.current()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
