use anyhow::{Context, Result};
use async_trait::async_trait;
use librqbit::{AddTorrent, AddTorrentOptions, ManagedTorrent, Session};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use super::torrent::display_name;
use super::{TorrentEngine, TorrentEvent, TorrentHandle};

/// `TorrentEngine` backed by one long-lived librqbit session shared by
/// every download of the process.
pub struct RqbitEngine {
    session: Arc<Session>,
    no_peers_check: Duration,
    create_missing_dirs: bool,
}

impl RqbitEngine {
    pub async fn new(
        default_dir: PathBuf,
        no_peers_check: Duration,
        create_missing_dirs: bool,
    ) -> Result<Self> {
        let session = Session::new(default_dir)
            .await
            .context("Failed to start torrent session")?;

        Ok(Self {
            session,
            no_peers_check,
            create_missing_dirs,
        })
    }

    pub async fn shutdown(&self) {
        self.session.stop().await;
    }
}

#[async_trait]
impl TorrentEngine for RqbitEngine {
    async fn add(&self, source: &str, dir: &Path) -> Result<TorrentHandle> {
        prepare_output_dir(dir, self.create_missing_dirs).await?;

        let (handle, events) = TorrentHandle::channel(display_name(source));
        let options = AddTorrentOptions {
            output_folder: Some(dir.to_string_lossy().into_owned()),
            overwrite: true,
            ..Default::default()
        };

        tokio::spawn(watch_torrent(
            Arc::clone(&self.session),
            source.to_string(),
            options,
            handle.name.clone(),
            events,
            self.no_peers_check,
        ));

        Ok(handle)
    }
}

async fn prepare_output_dir(dir: &Path, create_missing: bool) -> Result<()> {
    if create_missing {
        return tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create torrent directory: {:?}", dir));
    }

    let metadata = tokio::fs::metadata(dir)
        .await
        .with_context(|| format!("Torrent directory does not exist: {:?}", dir))?;
    if !metadata.is_dir() {
        anyhow::bail!("Torrent destination is not a directory: {:?}", dir);
    }
    Ok(())
}

/// Drive one torrent from magnet/metadata resolution to completion.
///
/// librqbit has no "no peers" notification, so the swarm is sampled every
/// `check` and a `NoPeers` event is sent once per stretch without live
/// peers (including a metadata lookup that has not found anyone yet).
async fn watch_torrent(
    session: Arc<Session>,
    source: String,
    options: AddTorrentOptions,
    mut name: String,
    events: UnboundedSender<TorrentEvent>,
    check: Duration,
) {
    let mut ticker = interval(check);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut reported_no_peers = false;

    let add = session.add_torrent(AddTorrent::from_url(source), Some(options));
    tokio::pin!(add);

    let added = loop {
        tokio::select! {
            result = &mut add => break result,
            _ = ticker.tick() => {
                if !reported_no_peers {
                    debug!(%name, "metadata still unresolved");
                    let _ = events.send(TorrentEvent::NoPeers { name: name.clone() });
                    reported_no_peers = true;
                }
            }
        }
    };

    let handle = match added.map(|response| response.into_handle()) {
        Ok(Some(handle)) => handle,
        Ok(None) => {
            let _ = events.send(TorrentEvent::Error {
                name,
                message: "torrent was only listed, not added".to_string(),
            });
            return;
        }
        Err(e) => {
            let _ = events.send(TorrentEvent::Error {
                name,
                message: format!("{:#}", e),
            });
            return;
        }
    };

    if let Some(resolved) = handle.name() {
        name = resolved;
    }
    info!(%name, "torrent metadata resolved");

    let completed = handle.wait_until_completed();
    tokio::pin!(completed);

    loop {
        tokio::select! {
            result = &mut completed => {
                let event = match result {
                    Ok(()) => TorrentEvent::Done { name },
                    Err(e) => TorrentEvent::Error { name, message: format!("{:#}", e) },
                };
                let _ = events.send(event);
                return;
            }
            _ = ticker.tick() => {
                if let Some(message) = swarm_error(&handle) {
                    let _ = events.send(TorrentEvent::Error { name, message });
                    return;
                }

                if live_peers(&handle) == 0 {
                    if !reported_no_peers {
                        let _ = events.send(TorrentEvent::NoPeers { name: name.clone() });
                        reported_no_peers = true;
                    }
                } else {
                    reported_no_peers = false;
                }
            }
        }
    }
}

fn swarm_error(handle: &ManagedTorrent) -> Option<String> {
    handle.stats().error
}

fn live_peers(handle: &ManagedTorrent) -> usize {
    handle
        .stats()
        .live
        .map(|live| live.snapshot.peer_stats.live)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_output_dir_is_created_when_allowed() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("tv");

        prepare_output_dir(&dir, true).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_missing_output_dir_is_an_error_when_creation_is_off() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("movie");

        assert!(prepare_output_dir(&dir, false).await.is_err());
        assert!(!dir.exists());

        std::fs::create_dir(&dir).unwrap();
        prepare_output_dir(&dir, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_in_place_of_output_dir_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("music");
        std::fs::write(&blocker, "x").unwrap();

        assert!(prepare_output_dir(&blocker, false).await.is_err());
    }
}
