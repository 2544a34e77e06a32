//! Board inspection and card moves: `newsboard board` and `newsboard move`.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use newsboard::board::{CardView, ColumnView, MoveOrchestrator, MoveOutcome, MoveReport};
use newsboard::config::CliOverrides;
use newsboard::errors::BoardError;
use newsboard_common::{BoardItem, Column, Notice, NoticeLevel};
use tokio::sync::broadcast;

use super::{build_orchestrator, load_config};
use crate::Cli;

fn parse_column(raw: &str) -> Result<Column> {
    Column::from_str(raw).map_err(|_| {
        BoardError::InvalidColumn {
            column: raw.to_string(),
        }
        .into()
    })
}

fn print_card(card: &CardView) {
    let kind = match &card.item {
        BoardItem::Candidate(_) => style("news").dim(),
        BoardItem::Production(_) => style("mine").cyan(),
    };
    let title = card.item.title().unwrap_or("(untitled)");
    match card.pending_from {
        Some(from) => println!(
            "  [{}] {}  {} {}",
            kind,
            card.item.id(),
            title,
            style(format!("(moving from {})", from)).yellow()
        ),
        None => println!("  [{}] {}  {}", kind, card.item.id(), title),
    }
}

fn print_column(column: &ColumnView) {
    println!(
        "{} {}",
        style(&column.title).bold(),
        style(format!("({})", column.items.len())).dim()
    );
    for card in &column.items {
        print_card(card);
    }
    println!();
}

fn print_notices(rx: &mut broadcast::Receiver<Notice>) {
    while let Ok(notice) = rx.try_recv() {
        let label = match notice.level {
            NoticeLevel::Success => style("✓").green(),
            NoticeLevel::Info => style("i").blue(),
            NoticeLevel::Warning => style("!").yellow(),
            NoticeLevel::Error => style("✗").red(),
        };
        println!("{} {}", label, notice.message);
    }
}

pub async fn cmd_board(
    cli: &Cli,
    config_path: &Path,
    column: Option<&str>,
    seed: Option<&Path>,
) -> Result<()> {
    let only = column.map(parse_column).transpose()?;
    let config = load_config(cli, config_path, CliOverrides::default())?;
    let orchestrator = build_orchestrator(&config, seed)?;
    let store = orchestrator.store();
    let mut notices = store.subscribe_notices();

    let loaded = store.load().await;
    print_notices(&mut notices);
    loaded?;

    let board = store.board().await;
    if !board.authenticated {
        println!(
            "{}",
            style("Not signed in: showing candidate items only").dim()
        );
        println!();
    }
    for view in &board.columns {
        if only.is_none() || only == Some(view.name) {
            print_column(view);
        }
    }
    Ok(())
}

fn describe(id: &str, report: &MoveReport) -> String {
    match &report.outcome {
        MoveOutcome::NoOp => format!("{} is already there; nothing to do", id),
        MoveOutcome::Moved { from, to } => format!("Moved {}: {} → {}", id, from, to),
        MoveOutcome::Promoted { production_id } => {
            format!("Promoted {} into the production queue as {}", id, production_id)
        }
        MoveOutcome::Deleted => format!("Reproved and deleted {}", id),
    }
}

pub async fn cmd_move(
    cli: &Cli,
    config_path: &Path,
    id: &str,
    column: &str,
    yes: bool,
    seed: Option<&Path>,
) -> Result<()> {
    let to = parse_column(column)?;
    let config = load_config(cli, config_path, CliOverrides::default())?;
    let orchestrator = build_orchestrator(&config, seed)?;
    let store = orchestrator.store();
    let mut notices = store.subscribe_notices();

    let loaded = store.load().await;
    print_notices(&mut notices);
    loaded?;

    let item = store
        .find_by_id(id)
        .await
        .with_context(|| format!("No card with id {} on the board", id))?;

    let result = match (&item, to) {
        (BoardItem::Production(_), Column::Reprove) => reprove(&orchestrator, id, yes).await,
        _ => orchestrator.move_item(&item, to).await.map(Some),
    };
    print_notices(&mut notices);

    match result {
        Ok(Some(report)) => {
            println!("{}", describe(id, &report));
            Ok(())
        }
        Ok(None) => {
            println!("Cancelled; {} left in place", id);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Stage, ask, then delete or restore.
async fn reprove(
    orchestrator: &MoveOrchestrator,
    id: &str,
    yes: bool,
) -> Result<Option<MoveReport>, BoardError> {
    let Some(prev) = orchestrator.stage_reprove(id).await? else {
        return Ok(Some(MoveReport {
            outcome: MoveOutcome::NoOp,
            notification: None,
        }));
    };

    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!(
                "Reproving {} deletes it permanently. Continue?",
                id
            ))
            .default(false)
            .interact()
            .map_err(|e| BoardError::Other(anyhow::anyhow!(e)))?;

    if confirmed {
        orchestrator.confirm_reprove(id, prev).await.map(Some)
    } else {
        orchestrator.cancel_reprove(id, prev).await;
        Ok(None)
    }
}
