pub mod config;
pub mod fetch;
pub mod run;

use anyhow::Result;
use mediabot::download::{DirectDownloader, Dispatcher, DispatcherOptions, FileLinkResolver};
use mediabot::{Config, TorrentEngine};
use std::sync::Arc;

// Re-export all handlers
pub use config::handle_config;
pub use fetch::handle_fetch;
pub use run::handle_run;

/// Wire the dispatcher the same way for the bot and for one-off fetches
pub fn build_dispatcher(
    config: &Config,
    engine: Arc<dyn TorrentEngine>,
    links: Arc<dyn FileLinkResolver>,
) -> Result<Dispatcher> {
    let files = DirectDownloader::new(
        config.connect_timeout(),
        config.idle_timeout(),
        config.storage.create_missing_dirs,
    )?;

    Ok(Dispatcher::new(
        DispatcherOptions {
            output_directory: config.output_dir(),
            max_concurrent: config.downloads.max_concurrent,
        },
        engine,
        files,
        links,
    ))
}
