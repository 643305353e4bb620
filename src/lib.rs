pub mod bot;
pub mod config;
pub mod download;

// Re-export commonly used types for easier access in tests
pub use bot::{BotRunner, ChatApi, Conversation, TelegramClient};
pub use config::{Config, ConfigManager};
pub use download::{
    Category, DestinationResolver, DirectDownloader, Dispatcher, DispatcherOptions,
    DownloadError, DownloadOutcome, DownloadRequest, FileLinkResolver, FileRef, OutcomeStatus,
    RqbitEngine, SourceKind, TorrentEngine, TorrentEvent, TorrentHandle,
};
