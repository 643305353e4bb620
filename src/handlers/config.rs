use crate::cli::ConfigAction;
use anyhow::Result;
use console::{Term, style};
use dialoguer::Confirm;
use mediabot::config::ConfigManager;
use std::path::PathBuf;
use std::process;

pub async fn handle_config(config_manager: &ConfigManager, action: ConfigAction) -> Result<()> {
    let term = Term::stdout();

    match action {
        ConfigAction::Show { section } => {
            let config = config_manager.config();

            // The token is a credential; never echo it back
            let mut shown = config.clone();
            if !shown.bot.token.is_empty() {
                shown.bot.token = "<redacted>".to_string();
            }

            let content = match section.as_deref() {
                Some("bot") => {
                    term.write_line(&format!("{} Bot configuration:", style("🤖").cyan()))?;
                    toml::to_string_pretty(&shown.bot)?
                }
                Some("storage") => {
                    term.write_line(&format!("{} Storage configuration:", style("💾").cyan()))?;
                    toml::to_string_pretty(&shown.storage)?
                }
                Some("downloads") => {
                    term.write_line(&format!(
                        "{} Download configuration:",
                        style("⬇️").cyan()
                    ))?;
                    toml::to_string_pretty(&shown.downloads)?
                }
                Some(s) => {
                    term.write_line(&format!("{} Unknown section: {}", style("❌").red(), s))?;
                    process::exit(1);
                }
                None => {
                    term.write_line(&format!("{} Current configuration:", style("⚙️").cyan()))?;
                    toml::to_string_pretty(&shown)?
                }
            };

            term.write_line("")?;
            term.write_line(&content)?;
        }

        ConfigAction::Path => {
            term.write_line(&config_manager.config_file().display().to_string())?;
        }

        ConfigAction::Validate => {
            term.write_line(&format!(
                "{} Validating configuration...",
                style("🔍").cyan()
            ))?;

            match config_manager.validate(true) {
                Ok(()) => {
                    term.write_line(&format!("{} Configuration is valid", style("✅").green()))?;
                }
                Err(e) => {
                    term.write_line(&format!(
                        "{} Configuration validation failed:",
                        style("❌").red()
                    ))?;
                    term.write_line(&format!("   {}", e))?;
                    process::exit(1);
                }
            }
        }

        ConfigAction::Sample { output, force } => {
            let target = output.map(PathBuf::from);
            let destination = target
                .clone()
                .unwrap_or_else(|| config_manager.config_dir().join("config.sample.toml"));

            if destination.exists() && !force {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "{} already exists, overwrite it?",
                        style(destination.display()).cyan()
                    ))
                    .default(false)
                    .interact()?;

                if !confirmed {
                    term.write_line(&format!("{} Operation cancelled", style("❌").red()))?;
                    return Ok(());
                }
            }

            let sample_file = config_manager.create_sample_config(target.as_deref())?;
            term.write_line(&format!(
                "{} Sample configuration created at: {:?}",
                style("✅").green(),
                sample_file
            ))?;
        }
    }
    Ok(())
}
