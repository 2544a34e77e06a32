//! In-memory `BoardGateway` backed by a seed file.
//!
//! Used by `--seed` runs and throughout the test suite. Every production
//! mutation publishes a change event to current subscribers. Individual
//! operations can be made to fail to exercise rollback paths.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use newsboard_common::{CandidateItem, Column, ProductionEdit, ProductionItem};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::gateway::{BoardGateway, ChangeEvent, ChangeSubscription, NewProductionItem};
use super::rows::ProductionRow;

/// Gateway operations, for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListCandidates,
    ListProduction,
    GetProduction,
    FindByOrigin,
    InsertProduction,
    UpdateCandidate,
    UpdateProduction,
    UpdateContent,
    DeleteProduction,
    Subscribe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub op: Operation,
    pub id: Option<String>,
}

/// Board contents as stored in a seed file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub candidates: Vec<CandidateItem>,
    #[serde(default)]
    pub production: Vec<ProductionItem>,
}

impl SeedData {
    /// Load from a JSON (`.json`) or TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse seed file {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse seed file {}", path.display()))
        }
    }
}

#[derive(Default)]
struct Inner {
    data: SeedData,
    calls: Vec<GatewayCall>,
    failing: HashSet<Operation>,
}

#[derive(Clone)]
pub struct MemoryGateway {
    inner: Arc<Mutex<Inner>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new(SeedData::default())
    }
}

impl MemoryGateway {
    pub fn new(data: SeedData) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                data,
                ..Default::default()
            })),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and fail if `op` was marked failing.
    fn enter(&self, op: Operation, id: Option<&str>) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.calls.push(GatewayCall {
            op,
            id: id.map(String::from),
        });
        if inner.failing.contains(&op) {
            bail!("Injected failure for {:?}", op);
        }
        Ok(inner)
    }

    fn changed(&self, user_id: Option<&str>) {
        if let Some(user_id) = user_id {
            // No receivers is fine.
            let _ = self.changes.send(ChangeEvent {
                user_id: user_id.to_string(),
            });
        }
    }

    pub fn fail(&self, op: Operation) {
        self.lock().failing.insert(op);
    }

    pub fn recover(&self, op: Operation) {
        self.lock().failing.remove(&op);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    /// Calls that changed stored data.
    pub fn mutations(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c.op,
                    Operation::InsertProduction
                        | Operation::UpdateCandidate
                        | Operation::UpdateProduction
                        | Operation::UpdateContent
                        | Operation::DeleteProduction
                )
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn snapshot(&self) -> SeedData {
        self.lock().data.clone()
    }

    /// Replace a production row directly, as another client would.
    pub fn put_production(&self, item: ProductionItem) {
        let user = item.user_id.clone();
        {
            let mut inner = self.lock();
            match inner.data.production.iter_mut().find(|p| p.id == item.id) {
                Some(existing) => *existing = item,
                None => inner.data.production.push(item),
            }
        }
        self.changed(user.as_deref());
    }
}

#[async_trait]
impl BoardGateway for MemoryGateway {
    async fn list_candidates(&self) -> Result<Vec<CandidateItem>> {
        let inner = self.enter(Operation::ListCandidates, None)?;
        let mut items = inner.data.candidates.clone();
        items.sort_by_key(|c| c.position.unwrap_or(i64::MAX));
        Ok(items)
    }

    async fn list_production(&self, user_id: &str) -> Result<Vec<ProductionItem>> {
        let inner = self.enter(Operation::ListProduction, Some(user_id))?;
        Ok(inner
            .data
            .production
            .iter()
            .filter(|p| p.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn get_production(&self, id: &str) -> Result<Option<ProductionItem>> {
        let inner = self.enter(Operation::GetProduction, Some(id))?;
        Ok(inner.data.production.iter().find(|p| p.id == id).cloned())
    }

    async fn production_record(&self, id: &str) -> Result<Option<serde_json::Value>> {
        let inner = self.enter(Operation::GetProduction, Some(id))?;
        inner
            .data
            .production
            .iter()
            .find(|p| p.id == id)
            .map(|p| {
                serde_json::to_value(ProductionRow::from_item(p))
                    .context("Failed to encode production row")
            })
            .transpose()
    }

    async fn find_production_by_origin(
        &self,
        user_id: &str,
        origin_id: &str,
    ) -> Result<Option<ProductionItem>> {
        let inner = self.enter(Operation::FindByOrigin, Some(origin_id))?;
        Ok(inner
            .data
            .production
            .iter()
            .rev()
            .find(|p| {
                p.user_id.as_deref() == Some(user_id) && p.origin_id.as_deref() == Some(origin_id)
            })
            .cloned())
    }

    async fn insert_production(&self, item: NewProductionItem) -> Result<ProductionItem> {
        let created = {
            let mut inner = self.enter(Operation::InsertProduction, item.origin_id.as_deref())?;
            let now = Utc::now();
            let created = ProductionItem {
                id: uuid::Uuid::new_v4().to_string(),
                title: item.title,
                image_url: item.image_url,
                news_url: item.news_url,
                source: item.source,
                published_at: Some(now),
                position: None,
                column: item.column,
                content: None,
                description: None,
                keywords: Vec::new(),
                updated_at: Some(now),
                origin_id: item.origin_id,
                user_id: Some(item.user_id),
                email: item.email,
            };
            inner.data.production.push(created.clone());
            created
        };
        debug!(id = %created.id, "Inserted production item");
        self.changed(created.user_id.as_deref());
        Ok(created)
    }

    async fn update_candidate_column(&self, id: &str, column: Column) -> Result<()> {
        let mut inner = self.enter(Operation::UpdateCandidate, Some(id))?;
        let candidate = inner
            .data
            .candidates
            .iter_mut()
            .find(|c| c.id == id)
            .with_context(|| format!("Candidate {} not found", id))?;
        candidate.column = column;
        Ok(())
    }

    async fn update_production_column(&self, id: &str, column: Column) -> Result<ProductionItem> {
        let updated = {
            let mut inner = self.enter(Operation::UpdateProduction, Some(id))?;
            let item = inner
                .data
                .production
                .iter_mut()
                .find(|p| p.id == id)
                .with_context(|| format!("Production item {} not found", id))?;
            item.column = column;
            item.updated_at = Some(Utc::now());
            item.clone()
        };
        self.changed(updated.user_id.as_deref());
        Ok(updated)
    }

    async fn update_production_content(
        &self,
        id: &str,
        edit: &ProductionEdit,
    ) -> Result<ProductionItem> {
        let updated = {
            let mut inner = self.enter(Operation::UpdateContent, Some(id))?;
            let item = inner
                .data
                .production
                .iter_mut()
                .find(|p| p.id == id)
                .with_context(|| format!("Production item {} not found", id))?;
            if let Some(title) = &edit.title {
                item.title = Some(title.clone());
            }
            if let Some(description) = &edit.description {
                item.description = Some(description.clone());
            }
            if let Some(content) = &edit.content {
                item.content = Some(content.clone());
            }
            if let Some(keywords) = &edit.keywords {
                item.keywords = keywords.clone();
            }
            item.updated_at = Some(Utc::now());
            item.clone()
        };
        self.changed(updated.user_id.as_deref());
        Ok(updated)
    }

    async fn delete_production(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut inner = self.enter(Operation::DeleteProduction, Some(id))?;
            let pos = inner.data.production.iter().position(|p| p.id == id);
            pos.map(|i| inner.data.production.remove(i))
        };
        match removed {
            Some(item) => {
                self.changed(item.user_id.as_deref());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn subscribe_production(&self, user_id: &str) -> Result<ChangeSubscription> {
        drop(self.enter(Operation::Subscribe, Some(user_id))?);
        let (tx, rx) = broadcast::channel(16);
        let mut source = self.changes.subscribe();
        let user_id = user_id.to_string();
        // Forward only this user's events.
        let forwarder = tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) if event.user_id == user_id => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(ChangeSubscription::with_poller(rx, forwarder))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn candidate(id: &str, column: Column, position: i64) -> CandidateItem {
        CandidateItem {
            id: id.into(),
            title: Some(format!("Candidate {}", id)),
            image_url: None,
            news_url: Some(format!("https://news.example.com/{}", id)),
            source: Some("Example Wire".into()),
            published_at: None,
            position: Some(position),
            column,
        }
    }

    pub fn production(id: &str, column: Column, origin: Option<&str>) -> ProductionItem {
        ProductionItem {
            id: id.into(),
            title: Some(format!("Production {}", id)),
            image_url: None,
            news_url: None,
            source: Some("Example Wire".into()),
            published_at: None,
            position: None,
            column,
            content: None,
            description: None,
            keywords: Vec::new(),
            updated_at: None,
            origin_id: origin.map(String::from),
            user_id: Some("u1".into()),
            email: Some("u1@example.com".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use std::time::Duration;

    fn gateway() -> MemoryGateway {
        MemoryGateway::new(SeedData {
            candidates: vec![
                candidate("c2", Column::Trend, 2),
                candidate("c1", Column::Trend, 1),
            ],
            production: vec![production("p1", Column::Review, Some("c9"))],
        })
    }

    #[tokio::test]
    async fn test_candidates_are_sorted_by_position() {
        let gw = gateway();
        let ids: Vec<String> = gw
            .list_candidates()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_production_is_scoped_to_user() {
        let gw = gateway();
        assert_eq!(gw.list_production("u1").await.unwrap().len(), 1);
        assert!(gw.list_production("someone-else").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_is_logged_and_recoverable() {
        let gw = gateway();
        gw.fail(Operation::UpdateCandidate);
        assert!(gw.update_candidate_column("c1", Column::Review).await.is_err());
        gw.recover(Operation::UpdateCandidate);
        gw.update_candidate_column("c1", Column::Review).await.unwrap();

        let calls = gw.mutations();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.op == Operation::UpdateCandidate));
        let stored = gw.snapshot();
        let c1 = stored.candidates.iter().find(|c| c.id == "c1").unwrap();
        assert_eq!(c1.column, Column::Review);
    }

    #[tokio::test]
    async fn test_delete_missing_row_returns_false() {
        let gw = gateway();
        assert!(gw.delete_production("p1").await.unwrap());
        assert!(!gw.delete_production("p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_subscription_sees_own_mutations_only() {
        let gw = gateway();
        let mut sub = gw.subscribe_production("u1").await.unwrap();

        let mut foreign = production("px", Column::Rewrite, None);
        foreign.user_id = Some("u2".into());
        gw.put_production(foreign);
        gw.update_production_column("p1", Column::Send).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.user_id, "u1");
    }

    #[test]
    fn test_seed_file_formats() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("seed.json");
        std::fs::write(
            &json,
            r#"{"candidates":[{"id":"c1","title":"Hello","position":1}]}"#,
        )
        .unwrap();
        let seed = SeedData::from_file(&json).unwrap();
        assert_eq!(seed.candidates.len(), 1);
        assert!(seed.production.is_empty());

        let toml_path = dir.path().join("seed.toml");
        std::fs::write(
            &toml_path,
            "[[production]]\nid = \"p1\"\ncolumn = \"review\"\nuser_id = \"u1\"\n",
        )
        .unwrap();
        let seed = SeedData::from_file(&toml_path).unwrap();
        assert_eq!(seed.production[0].column, Column::Review);
    }
}
