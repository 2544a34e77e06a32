//! CLI command implementations.
//!
//! | Module    | Commands handled          |
//! |-----------|---------------------------|
//! | `serve`   | `Serve`                   |
//! | `board`   | `Board`, `Move`           |
//! | `config`  | `Config`                  |

pub mod board;
pub mod config;
pub mod serve;

pub use board::{cmd_board, cmd_move};
pub use config::cmd_config;
pub use serve::cmd_serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use newsboard::board::{
    BoardGateway, BoardStore, MemoryGateway, MoveOrchestrator, RestGateway, SeedData,
    WebhookNotifier,
};
use newsboard::config::{CliOverrides, NewsboardConfig};

use crate::Cli;

/// Effective configuration: file, then environment, then CLI flags.
pub fn load_config(cli: &Cli, path: &Path, overrides: CliOverrides) -> Result<NewsboardConfig> {
    let mut config = NewsboardConfig::load_or_default(path)?;
    config.apply_env();
    config.apply_cli(&CliOverrides {
        user_id: cli.user.clone().or(overrides.user_id),
        ..overrides
    });
    Ok(config)
}

/// Wire gateway, store, notifier and orchestrator for one session.
pub fn build_orchestrator(
    config: &NewsboardConfig,
    seed: Option<&Path>,
) -> Result<Arc<MoveOrchestrator>> {
    let gateway: Arc<dyn BoardGateway> = match seed {
        Some(path) => {
            tracing::info!(seed = %path.display(), "Using in-memory board");
            Arc::new(MemoryGateway::new(SeedData::from_file(path)?))
        }
        None => Arc::new(RestGateway::new(config.rest_config()?)?),
    };
    let notifier = WebhookNotifier::new(
        config.webhooks.promotion_url.clone(),
        config.webhooks.review_complete_url.clone(),
        config.retry_policy(),
        config.request_timeout(),
    )?;
    let store = BoardStore::new(gateway, config.session());
    Ok(Arc::new(MoveOrchestrator::new(store, Arc::new(notifier))))
}
