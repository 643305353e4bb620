use anyhow::Result;
use console::{Term, style};
use mediabot::{BotRunner, Config, RqbitEngine, TelegramClient};
use std::sync::Arc;
use tracing::info;

use super::build_dispatcher;

pub async fn handle_run(config: &Config) -> Result<()> {
    let term = Term::stdout();
    let output_dir = config.output_dir();

    term.write_line(&format!(
        "{} Starting bot, saving downloads under {}",
        style("🤖").cyan(),
        style(output_dir.display()).cyan()
    ))?;
    if !config.bot.allowed_users.is_empty() {
        term.write_line(&format!(
            "{} Restricted to {} user(s)",
            style("🔒").yellow(),
            config.bot.allowed_users.len()
        ))?;
    }

    let engine = Arc::new(RqbitEngine::new(
        output_dir,
        config.no_peers_check(),
        config.storage.create_missing_dirs,
    )
    .await?);
    let telegram = Arc::new(TelegramClient::new(config.bot.token.clone())?);
    let dispatcher = build_dispatcher(config, engine.clone(), telegram.clone())?;

    let mut runner = BotRunner::new(
        telegram,
        Arc::new(dispatcher),
        config.bot.allowed_users.clone(),
    );

    tokio::select! {
        result = runner.run(config.poll_timeout()) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    engine.shutdown().await;
    term.write_line(&format!("{} Bot stopped", style("👋").cyan()))?;
    Ok(())
}
