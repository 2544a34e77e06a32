//! Configuration view and initialization commands: `newsboard config`.

use std::path::Path;

use anyhow::Result;
use newsboard::config::{CliOverrides, NewsboardConfig};

use super::load_config;
use crate::{Cli, ConfigCommands};

fn mask(secret: &Option<String>) -> String {
    match secret {
        Some(s) if s.chars().count() > 4 => {
            format!("\"{}…\"", s.chars().take(4).collect::<String>())
        }
        Some(_) => "\"****\"".to_string(),
        None => "(unset)".to_string(),
    }
}

fn show(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("\"{}\"", v),
        None => "(unset)".to_string(),
    }
}

pub fn cmd_config(cli: &Cli, config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Newsboard Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No newsboard.toml found at {}", config_path.display());
                println!("Run 'newsboard config init' to create one.");
            }
            println!();

            let config = load_config(cli, config_path, CliOverrides::default())?;
            println!("Effective values (with env/CLI overrides):");
            println!("[backend]");
            println!("  url = {}", show(&config.backend.url));
            println!("  api_key = {}", mask(&config.backend.api_key));
            println!("  access_token = {}", mask(&config.backend.access_token));
            println!(
                "  request_timeout_secs = {}",
                config.backend.request_timeout_secs
            );
            println!("[session]");
            println!("  user_id = {}", show(&config.session.user_id));
            println!("  email = {}", show(&config.session.email));
            println!("[webhooks]");
            println!("  promotion_url = {}", show(&config.webhooks.promotion_url));
            println!(
                "  review_complete_url = {}",
                show(&config.webhooks.review_complete_url)
            );
            println!("  max_attempts = {}", config.webhooks.max_attempts);
            println!("  backoff_ms = {}", config.webhooks.backoff_ms);
            println!("[realtime]");
            println!(
                "  poll_interval_secs = {}",
                config.realtime.poll_interval_secs
            );
            println!("[server]");
            println!("  port = {}", config.server.port);
            println!("  dev_mode = {}", config.server.dev_mode);
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init { force }) => {
            if config_path.exists() && !force {
                println!("newsboard.toml already exists at {}", config_path.display());
                println!("Pass --force to overwrite it.");
                return Ok(());
            }

            NewsboardConfig::default().save(config_path)?;

            println!("Created newsboard.toml at {}", config_path.display());
            println!();
            println!("You can now set:");
            println!("  - [backend] url, api_key");
            println!("  - [session] user_id, email");
            println!("  - [webhooks] promotion_url, review_complete_url");
            println!();
        }
    }

    Ok(())
}
