use anyhow::{Result, bail};
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use mediabot::download::{OutcomeStatus, PassthroughLinks};
use mediabot::{Category, Config, DownloadRequest, FileRef, RqbitEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::build_dispatcher;

pub async fn handle_fetch(
    config: &Config,
    category: Category,
    magnet: Option<String>,
    torrent_url: Option<String>,
    url: Option<String>,
    name: Option<String>,
) -> Result<()> {
    let term = Term::stdout();

    let request = match (magnet, torrent_url, url) {
        (Some(magnet), None, None) => DownloadRequest::magnet(category, magnet),
        (None, Some(torrent_url), None) => {
            DownloadRequest::torrent_file(category, Some(FileRef::new(torrent_url, None)))
        }
        (None, None, Some(url)) => {
            DownloadRequest::direct_file(category, Some(FileRef::new(url, name)))
        }
        _ => bail!("Specify exactly one of --magnet, --torrent-url or --url"),
    };

    let engine = Arc::new(RqbitEngine::new(
        config.output_dir(),
        config.no_peers_check(),
        config.storage.create_missing_dirs,
    )
    .await?);
    let dispatcher = build_dispatcher(config, engine.clone(), Arc::new(PassthroughLinks))?;

    term.write_line(&format!(
        "{} Saving to {}",
        style("📁").cyan(),
        style(dispatcher.destinations().resolve(category).display()).cyan()
    ))?;

    let (sender, mut outcomes) = mpsc::unbounded_channel();
    if let Err(e) = dispatcher.dispatch(request, sender) {
        term.write_line(&format!("{} {}", style("❌").red(), e.user_message()))?;
        bail!(e);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Waiting for the download to start...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut failed = false;
    while let Some(outcome) = outcomes.recv().await {
        match outcome.status {
            OutcomeStatus::Started => spinner.set_message(outcome.message),
            OutcomeStatus::NoPeers => {
                spinner.println(format!("{} {}", style("⚠️").yellow(), outcome.message));
            }
            OutcomeStatus::Done => {
                spinner.finish_and_clear();
                term.write_line(&format!("{} {}", style("✅").green(), outcome.message))?;
            }
            OutcomeStatus::Error => {
                spinner.finish_and_clear();
                term.write_line(&format!("{} {}", style("❌").red(), outcome.message))?;
                failed = true;
            }
        }
    }

    engine.shutdown().await;

    if failed {
        bail!("download failed");
    }
    Ok(())
}
