use tokio::sync::mpsc;

use super::DownloadError;

pub type OutcomeSender = mpsc::UnboundedSender<DownloadOutcome>;
pub type OutcomeReceiver = mpsc::UnboundedReceiver<DownloadOutcome>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Started,
    NoPeers,
    Error,
    Done,
}

impl OutcomeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OutcomeStatus::Error | OutcomeStatus::Done)
    }
}

/// One lifecycle event of a dispatched download, ready to show to a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub id: String,
    pub status: OutcomeStatus,
    pub name: String,
    pub message: String,
}

impl DownloadOutcome {
    fn new(id: &str, status: OutcomeStatus, name: &str, message: String) -> Self {
        Self {
            id: id.to_string(),
            status,
            name: name.to_string(),
            message,
        }
    }

    pub fn torrent_started(id: &str, name: &str) -> Self {
        Self::new(
            id,
            OutcomeStatus::Started,
            name,
            format!("Torrent: {} added", name),
        )
    }

    pub fn no_peers(id: &str, name: &str) -> Self {
        Self::new(
            id,
            OutcomeStatus::NoPeers,
            name,
            format!("Torrent: {} has no peers", name),
        )
    }

    pub fn torrent_done(id: &str, name: &str) -> Self {
        Self::new(
            id,
            OutcomeStatus::Done,
            name,
            format!("Torrent: {} download finished", name),
        )
    }

    pub fn file_started(id: &str, name: &str) -> Self {
        Self::new(
            id,
            OutcomeStatus::Started,
            name,
            format!("File: {} download started", name),
        )
    }

    pub fn file_done(id: &str, name: &str, bytes: u64) -> Self {
        Self::new(
            id,
            OutcomeStatus::Done,
            name,
            format!(
                "File: {} download finished successfully! ({})",
                name,
                format_bytes(bytes)
            ),
        )
    }

    pub fn failed(id: &str, error: &DownloadError) -> Self {
        let name = match error {
            DownloadError::InvalidPayload { .. } => "",
            DownloadError::Engine { name, .. }
            | DownloadError::Resolve { name, .. }
            | DownloadError::Download { name, .. } => name,
        };
        Self::new(id, OutcomeStatus::Error, name, error.user_message())
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
