use clap::{Parser, Subcommand};
use mediabot::Category;

#[derive(Parser)]
#[command(name = "mediabot")]
#[command(about = "A Telegram bot that downloads torrents and files into your media library")]
#[command(long_about = "
mediabot runs a Telegram bot that asks which library section a download
belongs to (movies, TV, music, other), takes a magnet link, a .torrent file
or any document, and saves the result under the configured output directory.

Examples:
  mediabot run                                   # Start the bot
  mediabot fetch tv --magnet 'magnet:?xt=...'    # One-off torrent download
  mediabot fetch other --url https://host/a.mp4  # One-off file download
  mediabot config show                           # Print the configuration
")]
#[command(version)]
pub struct Cli {
    /// Override config file path
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Telegram bot
    Run {
        /// Output directory override
        #[arg(short, long, value_name = "DIR")]
        #[arg(help = "Save downloads under this directory")]
        output_dir: Option<String>,
    },

    /// Download a single torrent or file without the bot
    #[command(visible_alias = "dl")]
    Fetch {
        /// Library section (movie, tv, music, other)
        #[arg(value_parser = parse_category)]
        category: Category,

        /// Magnet link to download
        #[arg(short, long, value_name = "URI", conflicts_with_all = ["torrent_url", "url"])]
        magnet: Option<String>,

        /// URL of a .torrent file
        #[arg(short, long, value_name = "URL", conflicts_with = "url")]
        torrent_url: Option<String>,

        /// URL of a file to download directly
        #[arg(short, long, value_name = "URL")]
        url: Option<String>,

        /// File name for a direct download (defaults to the URL's last segment)
        #[arg(short, long, value_name = "NAME", requires = "url")]
        name: Option<String>,

        /// Output directory override
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<String>,
    },

    /// Manage configuration
    #[command(visible_alias = "cfg")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only specific section
        #[arg(short, long, value_name = "SECTION")]
        #[arg(help = "Show only specific section (bot, storage, downloads)")]
        section: Option<String>,
    },

    /// Print the config file location
    Path,

    /// Validate configuration
    #[command(visible_alias = "check")]
    Validate,

    /// Create sample configuration
    Sample {
        /// Output file (defaults to config.sample.toml)
        #[arg(short, long, value_name = "FILE")]
        #[arg(help = "Output file path")]
        output: Option<String>,

        /// Overwrite existing file
        #[arg(short, long)]
        #[arg(help = "Overwrite existing file")]
        force: bool,
    },
}

fn parse_category(value: &str) -> Result<Category, String> {
    value.parse()
}

// Helper functions for CLI validation and parsing
impl Cli {
    /// Validate CLI arguments and show helpful error messages
    pub fn validate(&self) -> Result<(), String> {
        if let Commands::Fetch {
            magnet,
            torrent_url,
            url,
            ..
        } = &self.command
        {
            let sources = [magnet, torrent_url, url]
                .iter()
                .filter(|source| source.is_some())
                .count();
            if sources != 1 {
                return Err("Specify exactly one of --magnet, --torrent-url or --url".to_string());
            }
        }
        Ok(())
    }

    /// Check if command talks to Telegram and therefore needs a token
    pub fn requires_token(&self) -> bool {
        matches!(self.command, Commands::Run { .. })
    }

    /// Check if command should run even with an invalid configuration
    pub fn skips_config_validation(&self) -> bool {
        matches!(self.command, Commands::Config { .. })
    }

    /// Output directory given on the command line, if any
    pub fn output_dir_override(&self) -> Option<&str> {
        match &self.command {
            Commands::Run { output_dir } | Commands::Fetch { output_dir, .. } => {
                output_dir.as_deref()
            }
            Commands::Config { .. } => None,
        }
    }
}
