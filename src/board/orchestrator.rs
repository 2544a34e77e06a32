//! Move orchestrator.
//!
//! Decides which gateway calls a move needs and in which order. Every move
//! follows the same shape: record the previous column, apply optimistically,
//! persist, then notify. A failed persist rolls the card back; a failed
//! notification only warns.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use newsboard_common::{
    BoardItem, CandidateItem, Column, ItemKey, Notice, ProductionEdit, ProductionItem,
    UserIdentity,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::gateway::{BoardGateway, NewProductionItem};
use super::notify::{Endpoint, Notifier};
use super::rows::ProductionRow;
use super::store::BoardStore;
use crate::errors::BoardError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// Source and destination were the same column.
    NoOp,
    Moved { from: Column, to: Column },
    Promoted { production_id: String },
    Deleted,
}

/// Result of one webhook delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub endpoint: Endpoint,
    pub delivered: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveReport {
    #[serde(flatten)]
    pub outcome: MoveOutcome,
    pub notification: Option<Delivery>,
}

impl MoveReport {
    fn quiet(outcome: MoveOutcome) -> Self {
        Self {
            outcome,
            notification: None,
        }
    }
}

/// Removes the key from the in-flight set when the move finishes.
struct InFlight {
    set: Arc<Mutex<HashSet<ItemKey>>>,
    key: ItemKey,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.key);
        }
    }
}

pub struct MoveOrchestrator {
    store: BoardStore,
    gateway: Arc<dyn BoardGateway>,
    notifier: Arc<dyn Notifier>,
    in_flight: Arc<Mutex<HashSet<ItemKey>>>,
}

impl MoveOrchestrator {
    pub fn new(store: BoardStore, notifier: Arc<dyn Notifier>) -> Self {
        let gateway = store.gateway();
        Self {
            store,
            gateway,
            notifier,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn store(&self) -> &BoardStore {
        &self.store
    }

    fn user(&self) -> Result<UserIdentity, BoardError> {
        self.store
            .session()
            .user()
            .cloned()
            .ok_or(BoardError::Unauthenticated)
    }

    fn claim(&self, key: &ItemKey) -> Result<InFlight, BoardError> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| BoardError::Other(anyhow::anyhow!("In-flight set poisoned")))?;
        if !set.insert(key.clone()) {
            return Err(BoardError::MoveInFlight { key: key.clone() });
        }
        Ok(InFlight {
            set: self.in_flight.clone(),
            key: key.clone(),
        })
    }

    /// Resolve the dragged card against the store, so callers can pass a
    /// stale copy from a drag payload.
    async fn resolve(&self, item: &BoardItem) -> Result<(BoardItem, Column), BoardError> {
        let key = item.key();
        let current = self
            .store
            .find(&key)
            .await
            .ok_or_else(|| BoardError::ItemNotFound { key: key.clone() })?;
        let column = self
            .store
            .effective_column(&key)
            .await
            .unwrap_or_else(|| current.column());
        Ok((current, column))
    }

    // ── Moves ────────────────────────────────────────────────────────

    /// Move `item` to `to`. Production items cannot be moved to `reprove`
    /// here; use `stage_reprove` and `confirm_reprove`. A card with a move
    /// or a reprove confirmation outstanding is refused.
    pub async fn move_item(&self, item: &BoardItem, to: Column) -> Result<MoveReport, BoardError> {
        let user = self.user()?;
        let (current, from) = self.resolve(item).await?;
        let key = current.key();
        if self.store.pending(&key).await.is_some() {
            return Err(BoardError::MoveInFlight { key });
        }
        if from == to {
            return Ok(MoveReport::quiet(MoveOutcome::NoOp));
        }

        match current {
            BoardItem::Production(p) if to == Column::Reprove => {
                Err(BoardError::ConfirmationRequired { id: p.id })
            }
            // Trend lists candidates only.
            BoardItem::Production(_) if to == Column::Trend => Err(BoardError::InvalidColumn {
                column: to.as_str().to_string(),
            }),
            BoardItem::Candidate(c) if to == Column::Rewrite => self.promote(&user, &c).await,
            BoardItem::Candidate(c) => self.move_candidate(&c.id, to).await,
            BoardItem::Production(p) => self.move_production(&p.id, to).await,
        }
    }

    async fn promote(
        &self,
        user: &UserIdentity,
        candidate: &CandidateItem,
    ) -> Result<MoveReport, BoardError> {
        let key = ItemKey::candidate(&candidate.id);
        if self.store.is_promoted(&candidate.id).await {
            return Err(BoardError::AlreadyPromoted {
                candidate_id: candidate.id.clone(),
            });
        }
        let guard = self.claim(&key)?;
        let prev = self
            .store
            .apply_optimistic(&key, Column::Rewrite)
            .await
            .ok_or_else(|| BoardError::ItemNotFound { key: key.clone() })?;

        let existing = self
            .gateway
            .find_production_by_origin(&user.id, &candidate.id)
            .await;
        match existing {
            Ok(Some(found)) => {
                warn!(candidate_id = %candidate.id, production_id = %found.id, "Candidate already promoted");
                self.store.rollback(&key, prev).await;
                self.store.refresh_production().await;
                return Err(BoardError::AlreadyPromoted {
                    candidate_id: candidate.id.clone(),
                });
            }
            Ok(None) => {}
            Err(e) => {
                return Err(self
                    .fail(&key, prev, Column::Rewrite, e, "Failed to add item to production queue")
                    .await);
            }
        }

        let created = match self
            .gateway
            .insert_production(NewProductionItem::promote(candidate, user))
            .await
        {
            Ok(created) => created,
            Err(e) => {
                return Err(self
                    .fail(&key, prev, Column::Rewrite, e, "Failed to add item to production queue")
                    .await);
            }
        };

        info!(candidate_id = %candidate.id, production_id = %created.id, "Candidate promoted");
        self.store.settle_promotion(&candidate.id, created.clone()).await;
        self.store
            .notify(Notice::success("Item added to your production queue"));
        drop(guard);

        let delivery = self.deliver(Endpoint::Promotion, &created).await;
        self.store.refresh_production().await;

        Ok(MoveReport {
            outcome: MoveOutcome::Promoted {
                production_id: created.id,
            },
            notification: Some(delivery),
        })
    }

    async fn move_candidate(&self, id: &str, to: Column) -> Result<MoveReport, BoardError> {
        let key = ItemKey::candidate(id);
        let _guard = self.claim(&key)?;
        let prev = self
            .store
            .apply_optimistic(&key, to)
            .await
            .ok_or_else(|| BoardError::ItemNotFound { key: key.clone() })?;

        match self.gateway.update_candidate_column(id, to).await {
            Ok(()) => {
                self.store.confirm_candidate(id, to).await;
                info!(key = %key, from = %prev, to = %to, "Item moved");
                Ok(MoveReport::quiet(MoveOutcome::Moved { from: prev, to }))
            }
            Err(e) => Err(self.fail(&key, prev, to, e, "Failed to update item status").await),
        }
    }

    async fn move_production(&self, id: &str, to: Column) -> Result<MoveReport, BoardError> {
        let key = ItemKey::production(id);
        let guard = self.claim(&key)?;
        let prev = self
            .store
            .apply_optimistic(&key, to)
            .await
            .ok_or_else(|| BoardError::ItemNotFound { key: key.clone() })?;

        let updated = match self.gateway.update_production_column(id, to).await {
            Ok(updated) => updated,
            Err(e) => return Err(self.fail(&key, prev, to, e, "Failed to update item status").await),
        };
        self.store.confirm_production(updated.clone()).await;
        info!(key = %key, from = %prev, to = %to, "Item moved");
        // The card is settled; delivery must not hold it.
        drop(guard);

        let endpoint = match (prev, to) {
            (_, Column::Rewrite) => Some(Endpoint::Promotion),
            (Column::Review, Column::Send) => Some(Endpoint::ReviewComplete),
            _ => None,
        };
        let notification = match endpoint {
            Some(endpoint) => Some(self.deliver(endpoint, &updated).await),
            None => None,
        };

        Ok(MoveReport {
            outcome: MoveOutcome::Moved { from: prev, to },
            notification,
        })
    }

    /// Roll back, tell the user, and wrap the gateway error.
    async fn fail(
        &self,
        key: &ItemKey,
        prev: Column,
        to: Column,
        source: anyhow::Error,
        message: &str,
    ) -> BoardError {
        error!(key = %key, to = %to, "Persisting move failed: {:#}", source);
        self.store.rollback(key, prev).await;
        self.store.notify(Notice::error(message));
        BoardError::RolledBack {
            from: prev,
            to,
            source,
        }
    }

    /// Re-fetch the full record and post it. Never fails the move.
    async fn deliver(&self, endpoint: Endpoint, item: &ProductionItem) -> Delivery {
        let record = match self.gateway.production_record(&item.id).await {
            Ok(Some(row)) => row,
            Ok(None) => local_record(item),
            Err(e) => {
                warn!(id = %item.id, "Failed to re-fetch record before notifying: {:#}", e);
                local_record(item)
            }
        };

        let (sent, failed) = match endpoint {
            Endpoint::Promotion => (
                "Item sent to rewrite service",
                "Failed to send to rewrite service",
            ),
            Endpoint::ReviewComplete => (
                "Item sent to publishing service",
                "Failed to send to publishing service",
            ),
        };

        match self.notifier.notify(endpoint, &record).await {
            Ok(()) => {
                info!(endpoint = %endpoint, id = %item.id, "Webhook delivered");
                self.store.notify(Notice::success(sent));
                Delivery {
                    endpoint,
                    delivered: true,
                    error: None,
                }
            }
            Err(e) => {
                let err = BoardError::Notification(e);
                warn!(endpoint = %endpoint, id = %item.id, "{}", err);
                self.store.notify(Notice::warning(failed));
                Delivery {
                    endpoint,
                    delivered: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    // ── Reprove (delete) flow ────────────────────────────────────────

    /// Show the production item in `reprove` pending confirmation. Returns
    /// the column to restore on cancel, or `None` when already there.
    pub async fn stage_reprove(&self, id: &str) -> Result<Option<Column>, BoardError> {
        self.user()?;
        let key = ItemKey::production(id);
        let (_, from) = self
            .resolve(&BoardItem::Production(stub_production(id)))
            .await?;
        if from == Column::Reprove {
            return Ok(None);
        }
        if self.store.pending(&key).await.is_some() {
            return Err(BoardError::MoveInFlight { key });
        }
        let prev = self.store.apply_optimistic(&key, Column::Reprove).await;
        info!(id, "Reprove staged, awaiting confirmation");
        Ok(prev)
    }

    /// Delete the item permanently. On failure the card returns to `prev`.
    /// The card must still be staged in `reprove`.
    pub async fn confirm_reprove(&self, id: &str, prev: Column) -> Result<MoveReport, BoardError> {
        self.user()?;
        let key = ItemKey::production(id);
        let staged = self.store.pending(&key).await;
        if staged.is_none_or(|m| m.target != Column::Reprove) {
            return Err(BoardError::NoPendingConfirmation { id: id.to_string() });
        }
        let _guard = self.claim(&key)?;

        match self.gateway.delete_production(id).await {
            Ok(true) => {
                self.store.remove_production(id).await;
                self.store.notify(Notice::success("Card deleted successfully"));
                info!(id, "Production item reproved and deleted");
                Ok(MoveReport::quiet(MoveOutcome::Deleted))
            }
            Ok(false) => {
                self.store.rollback(&key, prev).await;
                self.store.notify(Notice::error("Failed to delete card"));
                Err(BoardError::ItemNotFound { key })
            }
            Err(e) => Err(self.fail(&key, prev, Column::Reprove, e, "Failed to delete card").await),
        }
    }

    /// Abandon a staged reprove. No backend call is made.
    pub async fn cancel_reprove(&self, id: &str, prev: Column) {
        let key = ItemKey::production(id);
        let staged = self.store.pending(&key).await;
        if staged.is_some_and(|m| m.target == Column::Reprove) {
            self.store.rollback(&key, prev).await;
            info!(id, to = %prev, "Reprove cancelled");
        }
    }

    // ── Detail / edit surface ────────────────────────────────────────

    /// The full production record from the backend.
    pub async fn fetch_detail(&self, id: &str) -> Result<ProductionItem, BoardError> {
        match self.gateway.get_production(id).await {
            Ok(Some(item)) => Ok(item),
            Ok(None) => Err(BoardError::ItemNotFound {
                key: ItemKey::production(id),
            }),
            Err(e) => {
                self.store.notify(Notice::error("Failed to load card details"));
                Err(BoardError::Gateway(e))
            }
        }
    }

    pub async fn save_edits(
        &self,
        id: &str,
        edit: &ProductionEdit,
    ) -> Result<ProductionItem, BoardError> {
        self.user()?;
        if edit.is_empty() {
            return self.fetch_detail(id).await;
        }
        match self.gateway.update_production_content(id, edit).await {
            Ok(updated) => {
                self.store.confirm_production(updated.clone()).await;
                self.store.notify(Notice::success("Card updated successfully"));
                Ok(updated)
            }
            Err(e) => {
                error!(id, "Failed to save edits: {:#}", e);
                self.store.notify(Notice::error("Failed to update card"));
                Err(BoardError::Gateway(e))
            }
        }
    }

    /// Detail-surface shortcut: move the item to `send`.
    pub async fn send_to_wordpress(&self, id: &str) -> Result<MoveReport, BoardError> {
        if self.user().is_err() {
            self.store
                .notify(Notice::error("You must be logged in to send to WordPress"));
            return Err(BoardError::Unauthenticated);
        }
        let item = BoardItem::Production(stub_production(id));
        let report = self.move_item(&item, Column::Send).await?;
        if report.outcome != MoveOutcome::NoOp {
            self.store.notify(Notice::success("Item sent to WordPress queue"));
        }
        Ok(report)
    }

    /// Delete from the detail surface. No confirmation step.
    pub async fn delete_item(&self, id: &str) -> Result<(), BoardError> {
        self.user()?;
        let key = ItemKey::production(id);
        let _guard = self.claim(&key)?;
        match self.gateway.delete_production(id).await {
            Ok(true) => {
                self.store.remove_production(id).await;
                self.store.notify(Notice::success("Card deleted successfully"));
                Ok(())
            }
            Ok(false) => {
                self.store.notify(Notice::error("Failed to delete card"));
                Err(BoardError::ItemNotFound { key })
            }
            Err(e) => {
                self.store.notify(Notice::error("Failed to delete card"));
                Err(BoardError::Gateway(e))
            }
        }
    }
}

/// Webhook body built from the local copy, used when the backend row
/// cannot be re-fetched.
fn local_record(item: &ProductionItem) -> serde_json::Value {
    serde_json::to_value(ProductionRow::from_item(item))
        .unwrap_or_else(|_| serde_json::json!({ "id": item.id }))
}

/// A bare production reference, resolved against the store before use.
fn stub_production(id: &str) -> ProductionItem {
    ProductionItem {
        id: id.to_string(),
        title: None,
        image_url: None,
        news_url: None,
        source: None,
        published_at: None,
        position: None,
        column: Column::Rewrite,
        content: None,
        description: None,
        keywords: Vec::new(),
        updated_at: None,
        origin_id: None,
        user_id: None,
        email: None,
    }
}
