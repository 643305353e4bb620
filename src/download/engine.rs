use anyhow::{Context, Result, anyhow, bail};
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{DownloadError, sanitize_file_name};

const USER_AGENT: &str = concat!("mediabot/", env!("CARGO_PKG_VERSION"));

/// Streams a single HTTP resource into a file. No resume, no retries:
/// an existing file at the destination is overwritten and a failed
/// transfer leaves whatever was written so far in place.
pub struct DirectDownloader {
    client: Client,
    idle_timeout: Duration,
    create_missing_dirs: bool,
}

impl DirectDownloader {
    pub fn new(
        connect_timeout: Duration,
        idle_timeout: Duration,
        create_missing_dirs: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            idle_timeout,
            create_missing_dirs,
        })
    }

    /// Download `url` into `<dir>/<file_name>` and return the number of
    /// bytes written.
    pub async fn start_direct_download(
        &self,
        url: &str,
        file_name: &str,
        dir: &Path,
    ) -> Result<u64, DownloadError> {
        let file_name = sanitize_file_name(file_name)?;
        let output_path = dir.join(&file_name);

        info!(path = %output_path.display(), "starting direct download");

        match self.download_attempt(url, &output_path).await {
            Ok(bytes) => {
                info!(path = %output_path.display(), bytes, "direct download finished");
                Ok(bytes)
            }
            Err(e) => {
                warn!(path = %output_path.display(), error = %format!("{:#}", e), "direct download failed");
                Err(DownloadError::download(file_name, e))
            }
        }
    }

    async fn download_attempt(&self, url: &str, output_path: &Path) -> Result<u64> {
        // A server that accepts the connection but never answers counts as idle
        let response = timeout(self.idle_timeout, self.client.get(url).send())
            .await
            .map_err(|_| anyhow!("No response headers within {:?}", self.idle_timeout))?
            .context("Failed to send HTTP request")?;

        if !response.status().is_success() {
            bail!("HTTP request failed with status: {}", response.status());
        }

        if let Some(total) = response.content_length() {
            debug!(total, "response size announced");
        }

        if self.create_missing_dirs {
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create destination directory")?;
            }
        }

        let mut file = File::create(output_path)
            .await
            .context("Failed to create output file")?;

        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        loop {
            let next = timeout(self.idle_timeout, stream.next())
                .await
                .map_err(|_| anyhow!("No data received for {:?}", self.idle_timeout))?;

            let Some(chunk_result) = next else {
                break;
            };
            let chunk = chunk_result.context("Failed to read chunk from response")?;

            file.write_all(&chunk)
                .await
                .context("Failed to write chunk to file")?;

            downloaded += chunk.len() as u64;
        }

        file.flush().await.context("Failed to flush file")?;
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use tempfile::TempDir;

    fn downloader() -> DirectDownloader {
        DirectDownloader::new(Duration::from_secs(5), Duration::from_secs(5), true).unwrap()
    }

    #[tokio::test]
    async fn test_download_writes_body() {
        let mut server = Server::new_async().await;
        let body = b"some video bytes";
        let mock = server
            .mock("GET", "/file.mp4")
            .with_status(200)
            .with_body(body.as_slice())
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let url = format!("{}/file.mp4", server.url());

        let bytes = downloader()
            .start_direct_download(&url, "file.mp4", temp_dir.path())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, body.len() as u64);
        let written = std::fs::read(temp_dir.path().join("file.mp4")).unwrap();
        assert_eq!(written, body);
    }

    #[tokio::test]
    async fn test_download_overwrites_existing_file() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/notes.txt")
            .with_status(200)
            .with_body("new")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "old contents that are longer").unwrap();

        let url = format!("{}/notes.txt", server.url());
        downloader()
            .start_direct_download(&url, "notes.txt", temp_dir.path())
            .await
            .unwrap();

        let written = std::fs::read_to_string(temp_dir.path().join("notes.txt")).unwrap();
        assert_eq!(written, "new");
    }

    #[tokio::test]
    async fn test_download_creates_category_directory() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/a.flac")
            .with_status(200)
            .with_body("la")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("music");
        let url = format!("{}/a.flac", server.url());

        downloader()
            .start_direct_download(&url, "a.flac", &dir)
            .await
            .unwrap();

        assert!(dir.join("a.flac").exists());
    }

    #[tokio::test]
    async fn test_http_error_is_download_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.bin")
            .with_status(404)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let url = format!("{}/missing.bin", server.url());

        let err = downloader()
            .start_direct_download(&url, "missing.bin", temp_dir.path())
            .await
            .unwrap_err();

        match err {
            DownloadError::Download { name, .. } => assert_eq!(name, "missing.bin"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_failure_is_download_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/file.bin")
            .with_status(200)
            .with_body("data")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        // The destination "directory" is a regular file, so opening the output fails
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let no_mkdir =
            DirectDownloader::new(Duration::from_secs(5), Duration::from_secs(5), false).unwrap();
        let url = format!("{}/file.bin", server.url());
        let result = no_mkdir.start_direct_download(&url, "file.bin", &blocker).await;

        assert!(matches!(result, Err(DownloadError::Download { .. })));
    }

    #[tokio::test]
    async fn test_path_like_names_are_rejected_before_any_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/x")
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let url = format!("{}/x", server.url());
        let result = downloader()
            .start_direct_download(&url, "../escape.sh", temp_dir.path())
            .await;

        assert!(matches!(result, Err(DownloadError::InvalidPayload { .. })));
        mock.assert_async().await;
    }

    /// Accept one connection, read the request, send `reply` and then
    /// keep the socket open without writing anything else.
    async fn stalling_server(reply: &'static [u8]) -> String {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket.write_all(reply).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });
        format!("http://{}/stalled.bin", addr)
    }

    fn impatient_downloader() -> DirectDownloader {
        DirectDownloader::new(Duration::from_secs(1), Duration::from_millis(300), true).unwrap()
    }

    #[tokio::test]
    async fn test_missing_response_headers_time_out() {
        let url = stalling_server(b"").await;
        let temp_dir = TempDir::new().unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            impatient_downloader().start_direct_download(&url, "stalled.bin", temp_dir.path()),
        )
        .await
        .expect("download should give up on a silent server");

        assert!(matches!(result, Err(DownloadError::Download { .. })));
    }

    #[tokio::test]
    async fn test_stalled_body_times_out() {
        let url = stalling_server(
            b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nfirst ten.",
        )
        .await;
        let temp_dir = TempDir::new().unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            impatient_downloader().start_direct_download(&url, "stalled.bin", temp_dir.path()),
        )
        .await
        .expect("download should give up on a stalled body");

        match result {
            Err(DownloadError::Download { name, .. }) => assert_eq!(name, "stalled.bin"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(temp_dir.path().join("stalled.bin").exists());
    }
}
