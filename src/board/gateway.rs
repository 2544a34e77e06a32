use anyhow::Result;
use async_trait::async_trait;
use newsboard_common::{CandidateItem, Column, ProductionEdit, ProductionItem, UserIdentity};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Abstraction over the hosted backend holding both record collections.
/// Real implementation: `RestGateway`. In-memory implementation: `MemoryGateway`.
#[async_trait]
pub trait BoardGateway: Send + Sync {
    /// All candidate items, ordered by ingestion rank ascending.
    async fn list_candidates(&self) -> Result<Vec<CandidateItem>>;

    /// All production items owned by `user_id`.
    async fn list_production(&self, user_id: &str) -> Result<Vec<ProductionItem>>;

    /// The full production record, if it exists.
    async fn get_production(&self, id: &str) -> Result<Option<ProductionItem>>;

    /// The production row exactly as the backend stores it, including
    /// columns the domain model does not carry.
    async fn production_record(&self, id: &str) -> Result<Option<serde_json::Value>>;

    /// Most recent production item promoted from `origin_id` for this user.
    async fn find_production_by_origin(
        &self,
        user_id: &str,
        origin_id: &str,
    ) -> Result<Option<ProductionItem>>;

    async fn insert_production(&self, item: NewProductionItem) -> Result<ProductionItem>;

    async fn update_candidate_column(&self, id: &str, column: Column) -> Result<()>;

    /// Sets the column and bumps the last-updated timestamp.
    async fn update_production_column(&self, id: &str, column: Column) -> Result<ProductionItem>;

    async fn update_production_content(
        &self,
        id: &str,
        edit: &ProductionEdit,
    ) -> Result<ProductionItem>;

    /// Returns false when no row matched.
    async fn delete_production(&self, id: &str) -> Result<bool>;

    /// Change notifications for one user's production records.
    async fn subscribe_production(&self, user_id: &str) -> Result<ChangeSubscription>;
}

/// Insert payload for promoting a candidate into the production queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProductionItem {
    pub origin_id: Option<String>,
    pub title: Option<String>,
    pub news_url: Option<String>,
    pub image_url: Option<String>,
    pub source: Option<String>,
    pub user_id: String,
    pub email: Option<String>,
    pub column: Column,
}

impl NewProductionItem {
    /// Copies title/url/image/source from the candidate and lands the new
    /// item in `rewrite`.
    pub fn promote(candidate: &CandidateItem, user: &UserIdentity) -> Self {
        Self {
            origin_id: Some(candidate.id.clone()),
            title: candidate.title.clone(),
            news_url: candidate.news_url.clone(),
            image_url: candidate.image_url.clone(),
            source: candidate.source.clone(),
            user_id: user.id.clone(),
            email: user.email.clone(),
            column: Column::Rewrite,
        }
    }
}

/// "Something changed" for a user's production records. Carries no diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub user_id: String,
}

/// Live change subscription. Dropping it stops any background poller.
pub struct ChangeSubscription {
    rx: broadcast::Receiver<ChangeEvent>,
    poller: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    pub fn new(rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { rx, poller: None }
    }

    pub fn with_poller(rx: broadcast::Receiver<ChangeEvent>, poller: JoinHandle<()>) -> Self {
        Self {
            rx,
            poller: Some(poller),
        }
    }

    /// Waits for the next change. Lagged events collapse into one, since
    /// every event triggers the same full reload. Returns `None` once the
    /// source is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}
