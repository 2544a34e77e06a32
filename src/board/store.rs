//! Board state store.
//!
//! Holds the confirmed snapshot of both collections plus the overlay of
//! optimistic moves that have not been confirmed yet. A reload replaces only
//! the confirmed snapshot, so a card being dragged never jumps back while
//! its move is in flight.

use std::sync::{Arc, Mutex, Weak};

use newsboard_common::{
    BoardItem, CandidateItem, Column, ItemKey, ItemKind, Notice, ProductionItem, Session,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::gateway::BoardGateway;
use super::projection::{self, BoardView, CardView, Overlay, PendingMove};
use crate::errors::BoardError;

/// State transitions pushed to live clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BoardEvent {
    Reloaded,
    ItemMoved {
        key: ItemKey,
        from: Column,
        to: Column,
    },
    ItemPromoted {
        candidate_id: String,
        production_id: String,
    },
    ItemDeleted {
        key: ItemKey,
    },
    RolledBack {
        key: ItemKey,
        to: Column,
    },
}

#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pub candidates: Vec<CandidateItem>,
    pub production: Vec<ProductionItem>,
    pub overlay: Overlay,
    pub loading: bool,
}

impl BoardState {
    fn confirmed_column(&self, key: &ItemKey) -> Option<Column> {
        match key.kind {
            ItemKind::Candidate => self
                .candidates
                .iter()
                .find(|c| c.id == key.id)
                .map(|c| c.column),
            ItemKind::Production => self
                .production
                .iter()
                .find(|p| p.id == key.id)
                .map(|p| p.column),
        }
    }

    fn set_confirmed_column(&mut self, key: &ItemKey, column: Column) {
        match key.kind {
            ItemKind::Candidate => {
                if let Some(c) = self.candidates.iter_mut().find(|c| c.id == key.id) {
                    c.column = column;
                }
            }
            ItemKind::Production => {
                if let Some(p) = self.production.iter_mut().find(|p| p.id == key.id) {
                    p.column = column;
                }
            }
        }
    }

    fn find(&self, key: &ItemKey) -> Option<BoardItem> {
        match key.kind {
            ItemKind::Candidate => self
                .candidates
                .iter()
                .find(|c| c.id == key.id)
                .cloned()
                .map(BoardItem::Candidate),
            ItemKind::Production => self
                .production
                .iter()
                .find(|p| p.id == key.id)
                .cloned()
                .map(BoardItem::Production),
        }
    }
}

struct StoreInner {
    gateway: Arc<dyn BoardGateway>,
    session: Session,
    state: RwLock<BoardState>,
    notices: broadcast::Sender<Notice>,
    events: broadcast::Sender<BoardEvent>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.subscription.lock()
            && let Some(task) = slot.take()
        {
            task.abort();
        }
    }
}

/// Cheap-to-clone handle to one session's board.
#[derive(Clone)]
pub struct BoardStore {
    inner: Arc<StoreInner>,
}

impl BoardStore {
    pub fn new(gateway: Arc<dyn BoardGateway>, session: Session) -> Self {
        let (notices, _) = broadcast::channel(64);
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(StoreInner {
                gateway,
                session,
                state: RwLock::new(BoardState::default()),
                notices,
                events,
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn gateway(&self) -> Arc<dyn BoardGateway> {
        self.inner.gateway.clone()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BoardEvent> {
        self.inner.events.subscribe()
    }

    pub fn notify(&self, notice: Notice) {
        debug!(level = notice.level.as_str(), message = %notice.message, "Notice");
        let _ = self.inner.notices.send(notice);
    }

    fn emit(&self, event: BoardEvent) {
        let _ = self.inner.events.send(event);
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Fetch both collections and replace the confirmed snapshot. On failure
    /// the previous snapshot stays and an error notice is emitted.
    pub async fn load(&self) -> Result<(), BoardError> {
        self.inner.state.write().await.loading = true;

        let fetched = self.fetch().await;

        let mut state = self.inner.state.write().await;
        state.loading = false;
        match fetched {
            Ok((candidates, production)) => {
                info!(
                    candidates = candidates.len(),
                    production = production.len(),
                    "Board loaded"
                );
                state.candidates = candidates;
                state.production = production;
                drop(state);
                self.emit(BoardEvent::Reloaded);
                Ok(())
            }
            Err(e) => {
                drop(state);
                error!("Failed to load board: {:#}", e);
                self.notify(Notice::error("Failed to load items"));
                Err(BoardError::Gateway(e))
            }
        }
    }

    async fn fetch(&self) -> anyhow::Result<(Vec<CandidateItem>, Vec<ProductionItem>)> {
        let gateway = &self.inner.gateway;
        let candidates = gateway.list_candidates().await?;
        let production = match self.inner.session.user() {
            Some(user) => gateway.list_production(&user.id).await?,
            None => Vec::new(),
        };
        Ok((candidates, production))
    }

    /// Initial load, then reload on every change event for the user's
    /// production items. The subscription ends with `shutdown` or when the
    /// last handle is dropped.
    pub async fn start(&self) -> Result<(), BoardError> {
        self.load().await?;

        let Some(user) = self.inner.session.user() else {
            return Ok(());
        };
        let mut subscription = self
            .inner
            .gateway
            .subscribe_production(&user.id)
            .await
            .map_err(BoardError::Gateway)?;

        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            while subscription.next().await.is_some() {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                debug!("Change event received, reloading board");
                // Failures are reported through the notice channel.
                let _ = BoardStore { inner }.load().await;
            }
        });

        let previous = self
            .inner
            .subscription
            .lock()
            .map_err(|_| BoardError::Other(anyhow::anyhow!("Subscription slot poisoned")))?
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    /// Cancel the change subscription. In-flight requests run to completion.
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.inner.subscription.lock()
            && let Some(task) = slot.take()
        {
            info!("Stopping board subscription");
            task.abort();
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> BoardState {
        self.inner.state.read().await.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.state.read().await.loading
    }

    /// The item as last confirmed by the backend.
    pub async fn find(&self, key: &ItemKey) -> Option<BoardItem> {
        self.inner.state.read().await.find(key)
    }

    /// Find by bare id, production items first.
    pub async fn find_by_id(&self, id: &str) -> Option<BoardItem> {
        let state = self.inner.state.read().await;
        state
            .find(&ItemKey::production(id))
            .or_else(|| state.find(&ItemKey::candidate(id)))
    }

    pub async fn effective_column(&self, key: &ItemKey) -> Option<Column> {
        let state = self.inner.state.read().await;
        let stored = state.confirmed_column(key)?;
        Some(projection::effective_column(key, stored, &state.overlay))
    }

    pub async fn pending(&self, key: &ItemKey) -> Option<PendingMove> {
        self.inner.state.read().await.overlay.get(key).copied()
    }

    /// True when a production item in the snapshot references the candidate.
    pub async fn is_promoted(&self, candidate_id: &str) -> bool {
        self.inner
            .state
            .read()
            .await
            .production
            .iter()
            .any(|p| p.origin_id.as_deref() == Some(candidate_id))
    }

    pub async fn column(&self, column: Column) -> Vec<CardView> {
        let state = self.inner.state.read().await;
        projection::project_column(column, &state.candidates, &state.production, &state.overlay)
    }

    pub async fn board(&self) -> BoardView {
        let state = self.inner.state.read().await;
        BoardView {
            columns: projection::project_board(
                &state.candidates,
                &state.production,
                &state.overlay,
            ),
            loading: state.loading,
            authenticated: self.inner.session.is_authenticated(),
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Show `key` in `target` until confirmed or rolled back. Returns the
    /// column the item was in, or `None` if the item is unknown.
    pub async fn apply_optimistic(&self, key: &ItemKey, target: Column) -> Option<Column> {
        let prev = {
            let mut state = self.inner.state.write().await;
            let stored = state.confirmed_column(key)?;
            let prev = projection::effective_column(key, stored, &state.overlay);
            state
                .overlay
                .insert(key.clone(), PendingMove { prev, target });
            prev
        };
        debug!(key = %key, from = %prev, to = %target, "Optimistic move");
        self.emit(BoardEvent::ItemMoved {
            key: key.clone(),
            from: prev,
            to: target,
        });
        Some(prev)
    }

    pub async fn confirm_candidate(&self, id: &str, column: Column) {
        let key = ItemKey::candidate(id);
        let mut state = self.inner.state.write().await;
        state.set_confirmed_column(&key, column);
        state.overlay.remove(&key);
    }

    /// Replace the production record with the backend's version and clear its overlay.
    pub async fn confirm_production(&self, item: ProductionItem) {
        let key = ItemKey::production(&item.id);
        let mut state = self.inner.state.write().await;
        match state.production.iter_mut().find(|p| p.id == item.id) {
            Some(existing) => *existing = item,
            None => state.production.push(item),
        }
        state.overlay.remove(&key);
    }

    /// Drop the optimistic move and put the item back in `prev`.
    pub async fn rollback(&self, key: &ItemKey, prev: Column) {
        {
            let mut state = self.inner.state.write().await;
            state.overlay.remove(key);
            state.set_confirmed_column(key, prev);
        }
        warn!(key = %key, to = %prev, "Move rolled back");
        self.emit(BoardEvent::RolledBack {
            key: key.clone(),
            to: prev,
        });
    }

    /// Record a completed promotion. The candidate keeps its stored label
    /// and disappears from trend and rewrite through the origin reference.
    pub async fn settle_promotion(&self, candidate_id: &str, created: ProductionItem) {
        let production_id = created.id.clone();
        {
            let mut state = self.inner.state.write().await;
            state.overlay.remove(&ItemKey::candidate(candidate_id));
            if !state.production.iter().any(|p| p.id == created.id) {
                state.production.push(created);
            }
        }
        self.emit(BoardEvent::ItemPromoted {
            candidate_id: candidate_id.to_string(),
            production_id,
        });
    }

    pub async fn remove_production(&self, id: &str) {
        let key = ItemKey::production(id);
        {
            let mut state = self.inner.state.write().await;
            state.production.retain(|p| p.id != id);
            state.overlay.remove(&key);
        }
        self.emit(BoardEvent::ItemDeleted { key });
    }

    /// Re-fetch the user's production items. Failures are logged only.
    pub async fn refresh_production(&self) {
        let Some(user) = self.inner.session.user() else {
            return;
        };
        match self.inner.gateway.list_production(&user.id).await {
            Ok(production) => {
                self.inner.state.write().await.production = production;
                self.emit(BoardEvent::Reloaded);
            }
            Err(e) => warn!("Failed to refresh production items: {:#}", e),
        }
    }
}
