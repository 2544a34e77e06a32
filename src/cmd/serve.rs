//! Board server command: `newsboard serve`.

use std::path::Path;

use anyhow::Result;
use newsboard::board::server::{ServerConfig, start_server};
use newsboard::config::CliOverrides;

use super::{build_orchestrator, load_config};
use crate::Cli;

pub async fn cmd_serve(
    cli: &Cli,
    config_path: &Path,
    port: Option<u16>,
    dev: bool,
    open: bool,
    seed: Option<&Path>,
) -> Result<()> {
    let config = load_config(
        cli,
        config_path,
        CliOverrides {
            port,
            dev_mode: dev,
            user_id: None,
        },
    )?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let orchestrator = build_orchestrator(&config, seed)?;

    start_server(
        ServerConfig {
            port: config.server.port,
            dev_mode: config.server.dev_mode,
            // No browser inside dev containers.
            open_browser: open && !config.server.dev_mode,
        },
        orchestrator,
    )
    .await
}
