pub mod destination;
pub mod engine;
pub mod error;
pub mod manager;
pub mod outcome;
pub mod rqbit;
pub mod torrent;

pub use destination::{DestinationResolver, sanitize_file_name};
pub use engine::DirectDownloader;
pub use error::DownloadError;
pub use manager::{Dispatcher, DispatcherOptions, FileLinkResolver, PassthroughLinks};
pub use outcome::{DownloadOutcome, OutcomeReceiver, OutcomeSender, OutcomeStatus};
pub use rqbit::RqbitEngine;
pub use torrent::{TorrentDownloader, TorrentEngine, TorrentEvent, TorrentHandle};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Library section a finished download is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Movie,
    Tv,
    Music,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Movie,
        Category::Tv,
        Category::Music,
        Category::Other,
    ];

    /// Wire name, also used as the directory name under the output root
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Movie => "movie",
            Category::Tv => "tv",
            Category::Music => "music",
            Category::Other => "other",
        }
    }

    /// Button label shown in the category keyboard
    pub fn label(&self) -> &'static str {
        match self {
            Category::Movie => "Movies 🎬",
            Category::Tv => "TV Shows 📺",
            Category::Music => "Music 🎵",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" | "movies" => Ok(Category::Movie),
            "tv" => Ok(Category::Tv),
            "music" => Ok(Category::Music),
            "other" => Ok(Category::Other),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Magnet,
    TorrentFile,
    DirectFile,
}

impl SourceKind {
    pub fn is_torrent(&self) -> bool {
        matches!(self, SourceKind::Magnet | SourceKind::TorrentFile)
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            SourceKind::Magnet | SourceKind::TorrentFile => "torrent",
            SourceKind::DirectFile => "file",
        }
    }
}

/// A document the user uploaded, as known to the chat transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub file_id: String,
    pub file_name: Option<String>,
}

impl FileRef {
    pub fn new(file_id: impl Into<String>, file_name: Option<String>) -> Self {
        Self {
            file_id: file_id.into(),
            file_name,
        }
    }
}

/// Everything the dispatcher needs to start one download.
///
/// `payload` is the raw magnet URI for [`SourceKind::Magnet`] and a file
/// reference (transport file id or URL) for the two file kinds. It is
/// `None` when the user never sent a usable payload, which the dispatcher
/// reports as [`DownloadError::InvalidPayload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub category: Category,
    pub source_kind: SourceKind,
    pub payload: Option<String>,
    pub file_name: Option<String>,
}

impl DownloadRequest {
    pub fn new(category: Category, source_kind: SourceKind) -> Self {
        Self {
            category,
            source_kind,
            payload: None,
            file_name: None,
        }
    }

    pub fn magnet(category: Category, uri: impl Into<String>) -> Self {
        Self::new(category, SourceKind::Magnet).with_payload(uri)
    }

    pub fn torrent_file(category: Category, file: Option<FileRef>) -> Self {
        Self::new(category, SourceKind::TorrentFile).with_file(file)
    }

    pub fn direct_file(category: Category, file: Option<FileRef>) -> Self {
        Self::new(category, SourceKind::DirectFile).with_file(file)
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    fn with_file(mut self, file: Option<FileRef>) -> Self {
        if let Some(file) = file {
            self.payload = Some(file.file_id);
            self.file_name = file.file_name;
        }
        self
    }

    /// The payload as a file reference, when there is one to resolve
    pub fn file_ref(&self) -> Option<FileRef> {
        self.payload
            .as_ref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| FileRef::new(p.clone(), self.file_name.clone()))
    }

    pub(crate) fn new_id(&self) -> String {
        format!(
            "{}_{}",
            self.source_kind.id_prefix(),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert_eq!("Movies".parse::<Category>(), Ok(Category::Movie));
        assert!("anime".parse::<Category>().is_err());
    }

    #[test]
    fn test_request_builders() {
        let request = DownloadRequest::torrent_file(Category::Music, None);
        assert_eq!(request.source_kind, SourceKind::TorrentFile);
        assert!(request.payload.is_none());
        assert!(request.file_ref().is_none());

        let request = DownloadRequest::direct_file(
            Category::Tv,
            Some(FileRef::new("abc", Some("clip.mkv".to_string()))),
        );
        assert_eq!(request.payload.as_deref(), Some("abc"));
        assert_eq!(request.file_name.as_deref(), Some("clip.mkv"));
        assert_eq!(
            request.file_ref(),
            Some(FileRef::new("abc", Some("clip.mkv".to_string())))
        );
    }

    #[test]
    fn test_request_id_prefix() {
        let id = DownloadRequest::magnet(Category::Tv, "magnet:?xt=urn:btih:abc").new_id();
        assert!(id.starts_with("torrent_"));
        assert_eq!(id.len(), "torrent_".len() + 8);

        let id = DownloadRequest::direct_file(Category::Other, None).new_id();
        assert!(id.starts_with("file_"));
    }
}
