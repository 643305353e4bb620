use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::destination::file_name_from_url;
use super::{
    DestinationResolver, DirectDownloader, DownloadError, DownloadOutcome, DownloadRequest,
    FileRef, OutcomeSender, SourceKind, TorrentDownloader, TorrentEngine,
};

static MAGNET_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^magnet:\?(?:.*&)?xt=urn:[a-z0-9]+:").expect("magnet pattern is valid")
});

/// Turns a reference to an uploaded file into a URL it can be fetched from
#[async_trait]
pub trait FileLinkResolver: Send + Sync {
    async fn resolve(&self, file: &FileRef) -> Result<String>;
}

/// Resolver for payloads that already are URLs (terminal use, tests)
pub struct PassthroughLinks;

#[async_trait]
impl FileLinkResolver for PassthroughLinks {
    async fn resolve(&self, file: &FileRef) -> Result<String> {
        Ok(file.file_id.clone())
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    pub output_directory: PathBuf,
    pub max_concurrent: usize,
}

/// Validates download requests and hands each one to the matching adapter
/// on its own task.
pub struct Dispatcher {
    destinations: DestinationResolver,
    torrents: TorrentDownloader,
    files: Arc<DirectDownloader>,
    links: Arc<dyn FileLinkResolver>,
    semaphore: Arc<Semaphore>,
    active_downloads: Arc<Mutex<HashSet<String>>>,
}

/// What an accepted request turned into once validated
enum Job {
    Torrent { source: Source },
    File { file: FileRef },
}

enum Source {
    Magnet(String),
    Upload(FileRef),
}

impl Dispatcher {
    pub fn new(
        options: DispatcherOptions,
        engine: Arc<dyn TorrentEngine>,
        files: DirectDownloader,
        links: Arc<dyn FileLinkResolver>,
    ) -> Self {
        Self {
            destinations: DestinationResolver::new(options.output_directory),
            torrents: TorrentDownloader::new(engine),
            files: Arc::new(files),
            links,
            semaphore: Arc::new(Semaphore::new(options.max_concurrent.max(1))),
            active_downloads: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn destinations(&self) -> &DestinationResolver {
        &self.destinations
    }

    /// Start `request` in the background and return its download id.
    ///
    /// Only validation failures are returned here; everything that happens
    /// after the request is accepted is reported through `outcomes`.
    pub fn dispatch(
        &self,
        request: DownloadRequest,
        outcomes: OutcomeSender,
    ) -> Result<String, DownloadError> {
        let job = Self::validate(&request)?;
        let id = request.new_id();
        let dir = self.destinations.resolve(request.category);

        info!(%id, category = %request.category, dir = %dir.display(), "dispatching download");

        let semaphore = Arc::clone(&self.semaphore);
        let torrents = self.torrents.clone();
        let files = Arc::clone(&self.files);
        let links = Arc::clone(&self.links);
        let active_downloads = Arc::clone(&self.active_downloads);
        let task_id = id.clone();

        if let Ok(mut active) = self.active_downloads.lock() {
            active.insert(id.clone());
        }

        tokio::spawn(async move {
            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    debug!(id = %task_id, "waiting for a free download slot");
                    semaphore.acquire_owned().await.ok()
                }
            };

            if permit.is_some() {
                run_job(job, &task_id, &dir, torrents, files, links, outcomes).await;
            }

            drop(permit);
            if let Ok(mut active) = active_downloads.lock() {
                active.remove(&task_id);
            }
        });

        Ok(id)
    }

    /// Ids of downloads that were accepted and have not finished yet
    pub fn get_active_downloads(&self) -> Vec<String> {
        let mut ids: Vec<String> = match self.active_downloads.lock() {
            Ok(active) => active.iter().cloned().collect(),
            Err(_) => Vec::new(),
        };
        ids.sort();
        ids
    }

    fn validate(request: &DownloadRequest) -> Result<Job, DownloadError> {
        match request.source_kind {
            SourceKind::Magnet => {
                let uri = request
                    .payload
                    .as_deref()
                    .map(str::trim)
                    .filter(|uri| !uri.is_empty())
                    .ok_or_else(|| DownloadError::invalid_payload("no magnet link was sent"))?;

                if !MAGNET_URI.is_match(uri) {
                    return Err(DownloadError::invalid_payload(format!(
                        "{:?} is not a magnet link",
                        uri
                    )));
                }
                Ok(Job::Torrent {
                    source: Source::Magnet(uri.to_string()),
                })
            }
            SourceKind::TorrentFile => {
                let file = request
                    .file_ref()
                    .ok_or_else(|| DownloadError::invalid_payload("no .torrent file was sent"))?;
                Ok(Job::Torrent {
                    source: Source::Upload(file),
                })
            }
            SourceKind::DirectFile => {
                let file = request
                    .file_ref()
                    .ok_or_else(|| DownloadError::invalid_payload("no file was sent"))?;
                if let Some(name) = &file.file_name {
                    super::sanitize_file_name(name)?;
                }
                Ok(Job::File { file })
            }
        }
    }
}

async fn run_job(
    job: Job,
    id: &str,
    dir: &Path,
    torrents: TorrentDownloader,
    files: Arc<DirectDownloader>,
    links: Arc<dyn FileLinkResolver>,
    outcomes: OutcomeSender,
) {
    match job {
        Job::Torrent { source } => {
            let payload = match source {
                Source::Magnet(uri) => uri,
                Source::Upload(file) => match resolve_link(links.as_ref(), &file, id).await {
                    Ok(url) => url,
                    Err(e) => {
                        let _ = outcomes.send(DownloadOutcome::failed(id, &e));
                        return;
                    }
                },
            };
            let relay = torrents.start_torrent(id, &payload, dir, outcomes).await;
            // The slot stays taken until the torrent reaches a terminal state
            let _ = relay.await;
        }
        Job::File { file } => {
            let url = match resolve_link(links.as_ref(), &file, id).await {
                Ok(url) => url,
                Err(e) => {
                    let _ = outcomes.send(DownloadOutcome::failed(id, &e));
                    return;
                }
            };
            let name = file
                .file_name
                .clone()
                .or_else(|| file_name_from_url(&url))
                .unwrap_or_else(|| "download".to_string());

            let _ = outcomes.send(DownloadOutcome::file_started(id, &name));
            let outcome = match files.start_direct_download(&url, &name, dir).await {
                Ok(bytes) => DownloadOutcome::file_done(id, &name, bytes),
                Err(e) => DownloadOutcome::failed(id, &e),
            };
            let _ = outcomes.send(outcome);
        }
    }
}

async fn resolve_link(
    links: &dyn FileLinkResolver,
    file: &FileRef,
    id: &str,
) -> Result<String, DownloadError> {
    links.resolve(file).await.map_err(|e| {
        let name = file.file_name.clone().unwrap_or_else(|| "file".to_string());
        warn!(%id, error = %format!("{:#}", e), "file link resolution failed");
        DownloadError::resolve(name, e)
    })
}
