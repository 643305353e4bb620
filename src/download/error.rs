use thiserror::Error;

/// Failures a download can end in.
///
/// Every variant maps to a fixed, user-facing sentence through
/// [`DownloadError::user_message`]; the `Display` output and sources are
/// meant for logs only.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The request carried no usable magnet, file reference or file name
    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },

    /// The torrent engine reported a failure
    #[error("torrent engine error for {name}")]
    Engine {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// The uploaded file could not be turned into a download link
    #[error("could not resolve a download link for {name}")]
    Resolve {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// HTTP or file stream failure during a direct download
    #[error("download of {name} failed")]
    Download {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DownloadError {
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        DownloadError::InvalidPayload {
            reason: reason.into(),
        }
    }

    pub fn engine(name: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        DownloadError::Engine {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn resolve(name: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        DownloadError::Resolve {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn download(name: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        DownloadError::Download {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            DownloadError::InvalidPayload { .. } => {
                "A proper file wasn't sent, please retry".to_string()
            }
            DownloadError::Engine { name, .. } => {
                format!("Error downloading torrent: {}", name)
            }
            DownloadError::Resolve { name, .. } => {
                format!("Error: could not fetch the uploaded file: {}", name)
            }
            DownloadError::Download { name, .. } => {
                format!("Error: could not download file: {}", name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_hide_internal_errors() {
        let err = DownloadError::engine(
            "Show.S01E01",
            anyhow::anyhow!("tracker 10.0.0.1:6969 refused connection"),
        );
        let message = err.user_message();
        assert!(message.contains("Show.S01E01"));
        assert!(!message.contains("10.0.0.1"));

        let err = DownloadError::download("file.mp4", anyhow::anyhow!("HTTP 500"));
        assert_eq!(
            err.user_message(),
            "Error: could not download file: file.mp4"
        );
    }

    #[test]
    fn test_invalid_payload_message() {
        let err = DownloadError::invalid_payload("no document attached");
        assert_eq!(err.user_message(), "A proper file wasn't sent, please retry");
        assert!(err.to_string().contains("no document attached"));
    }
}
