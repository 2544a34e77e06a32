//! Drag-and-drop glue between columns and the orchestrator.
//!
//! A drag carries `{ item_id, item_data }` where `item_data` is the card's
//! JSON record. Drops onto `reprove` for production items are parked until
//! the user confirms or cancels.

use std::collections::HashMap;
use std::sync::Arc;

use newsboard_common::{BoardItem, Column};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::orchestrator::{MoveOrchestrator, MoveReport};
use crate::errors::BoardError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragPayload {
    pub item_id: String,
    pub item_data: String,
}

impl DragPayload {
    /// Build the payload a card puts on the drag.
    pub fn for_item(item: &BoardItem) -> Result<Self, serde_json::Error> {
        Ok(Self {
            item_id: item.id().to_string(),
            item_data: serde_json::to_string(item)?,
        })
    }

    /// Decode the dragged card. Malformed or inconsistent payloads are
    /// logged and yield `None`.
    pub fn parse(&self) -> Option<BoardItem> {
        let item: BoardItem = match serde_json::from_str(&self.item_data) {
            Ok(item) => item,
            Err(e) => {
                warn!(item_id = %self.item_id, "Ignoring malformed drag payload: {}", e);
                return None;
            }
        };
        if item.id() != self.item_id {
            warn!(
                item_id = %self.item_id,
                data_id = item.id(),
                "Ignoring drag payload with mismatched id"
            );
            return None;
        }
        Some(item)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DropResult {
    Applied(MoveReport),
    /// The card shows in `reprove` until confirmed; `prev` is where cancel returns it.
    AwaitingConfirmation { id: String, prev: Column },
    Ignored,
}

/// Column-level controller. Owns the pending reprove confirmations.
pub struct BoardController {
    orchestrator: Arc<MoveOrchestrator>,
    pending: Mutex<HashMap<String, Column>>,
}

impl BoardController {
    pub fn new(orchestrator: Arc<MoveOrchestrator>) -> Self {
        Self {
            orchestrator,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn orchestrator(&self) -> &Arc<MoveOrchestrator> {
        &self.orchestrator
    }

    /// Handle a drop of `payload` onto `column`.
    pub async fn drop_on(
        &self,
        column: Column,
        payload: &DragPayload,
    ) -> Result<DropResult, BoardError> {
        let Some(item) = payload.parse() else {
            return Ok(DropResult::Ignored);
        };

        if let BoardItem::Production(p) = &item
            && column == Column::Reprove
        {
            return match self.orchestrator.stage_reprove(&p.id).await? {
                Some(prev) => {
                    self.pending.lock().await.insert(p.id.clone(), prev);
                    Ok(DropResult::AwaitingConfirmation {
                        id: p.id.clone(),
                        prev,
                    })
                }
                None => Ok(DropResult::Ignored),
            };
        }

        let report = self.orchestrator.move_item(&item, column).await?;
        Ok(DropResult::Applied(report))
    }

    pub async fn pending_confirmation(&self, id: &str) -> Option<Column> {
        self.pending.lock().await.get(id).copied()
    }

    pub async fn confirm(&self, id: &str) -> Result<MoveReport, BoardError> {
        let prev = self
            .pending
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| BoardError::NoPendingConfirmation { id: id.to_string() })?;
        self.orchestrator.confirm_reprove(id, prev).await
    }

    pub async fn cancel(&self, id: &str) -> Result<Column, BoardError> {
        let prev = self
            .pending
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| BoardError::NoPendingConfirmation { id: id.to_string() })?;
        self.orchestrator.cancel_reprove(id, prev).await;
        info!(id, to = %prev, "Reprove cancelled by user");
        Ok(prev)
    }
}
