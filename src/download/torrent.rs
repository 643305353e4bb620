use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{DownloadError, DownloadOutcome, OutcomeSender};

/// Lifecycle signals a torrent handle can emit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentEvent {
    Error { name: String, message: String },
    NoPeers { name: String },
    Done { name: String },
}

/// A torrent registered with an engine. `name` is the best name known at
/// registration time (the magnet `dn` or a placeholder); events carry the
/// name known when they fire.
#[derive(Debug)]
pub struct TorrentHandle {
    pub name: String,
    pub events: mpsc::UnboundedReceiver<TorrentEvent>,
}

impl TorrentHandle {
    /// Build a handle together with the sender its engine reports through
    pub fn channel(name: impl Into<String>) -> (Self, mpsc::UnboundedSender<TorrentEvent>) {
        let (sender, events) = mpsc::unbounded_channel();
        (
            Self {
                name: name.into(),
                events,
            },
            sender,
        )
    }
}

/// Swarm side of a torrent download. Implementations must return from
/// `add` promptly and report progress through the handle's events.
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    async fn add(&self, source: &str, dir: &Path) -> Result<TorrentHandle>;
}

/// Relays one engine handle into download outcomes
#[derive(Clone)]
pub struct TorrentDownloader {
    engine: Arc<dyn TorrentEngine>,
}

impl TorrentDownloader {
    pub fn new(engine: Arc<dyn TorrentEngine>) -> Self {
        Self { engine }
    }

    /// Register `payload` with the engine and spawn a relay that turns its
    /// events into outcomes. The returned task finishes after exactly one
    /// terminal outcome has been sent.
    pub async fn start_torrent(
        &self,
        id: &str,
        payload: &str,
        dir: &Path,
        outcomes: OutcomeSender,
    ) -> JoinHandle<()> {
        let id = id.to_string();
        match self.engine.add(payload, dir).await {
            Ok(handle) => {
                info!(%id, name = %handle.name, dir = %dir.display(), "torrent added");
                let _ = outcomes.send(DownloadOutcome::torrent_started(&id, &handle.name));
                tokio::spawn(relay_events(id, handle, outcomes))
            }
            Err(e) => {
                let name = display_name(payload);
                warn!(%id, error = %format!("{:#}", e), "torrent engine rejected payload");
                let error = DownloadError::engine(name, e);
                let _ = outcomes.send(DownloadOutcome::failed(&id, &error));
                tokio::spawn(async {})
            }
        }
    }
}

async fn relay_events(id: String, mut handle: TorrentHandle, outcomes: OutcomeSender) {
    let mut last_name = handle.name.clone();

    while let Some(event) = handle.events.recv().await {
        match event {
            TorrentEvent::NoPeers { name } => {
                debug!(%id, %name, "torrent has no peers");
                let _ = outcomes.send(DownloadOutcome::no_peers(&id, &name));
                last_name = name;
            }
            TorrentEvent::Done { name } => {
                info!(%id, %name, "torrent finished");
                let _ = outcomes.send(DownloadOutcome::torrent_done(&id, &name));
                return;
            }
            TorrentEvent::Error { name, message } => {
                warn!(%id, %name, error = %message, "torrent failed");
                let error = DownloadError::engine(name, anyhow!(message));
                let _ = outcomes.send(DownloadOutcome::failed(&id, &error));
                return;
            }
        }
    }

    warn!(%id, name = %last_name, "torrent engine dropped the handle before finishing");
    let error = DownloadError::engine(last_name, anyhow!("event stream closed"));
    let _ = outcomes.send(DownloadOutcome::failed(&id, &error));
}

/// Human readable name for a torrent source before the engine knows
/// better: the magnet `dn` parameter, or the last URL segment.
pub fn display_name(source: &str) -> String {
    if let Ok(url) = Url::parse(source) {
        if url.scheme().eq_ignore_ascii_case("magnet") {
            return url
                .query_pairs()
                .find(|(key, value)| key == "dn" && !value.trim().is_empty())
                .map(|(_, value)| value.into_owned())
                .unwrap_or_else(|| "magnet link".to_string());
        }
    }

    super::destination::file_name_from_url(source).unwrap_or_else(|| "torrent".to_string())
}
