//! `BoardGateway` over a PostgREST-style hosted backend.
//!
//! Every request carries the project `apikey` header and a bearer token
//! (the user's access token when configured, otherwise the api key).
//! Change notifications are produced by polling the user's production rows.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use newsboard_common::{CandidateItem, Column, ProductionEdit, ProductionItem};
use reqwest::Method;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::gateway::{BoardGateway, ChangeEvent, ChangeSubscription, NewProductionItem};
use super::rows::*;

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
}

#[derive(Clone)]
pub struct RestGateway {
    client: reqwest::Client,
    config: RestConfig,
}

impl RestGateway {
    pub fn new(config: RestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            table
        )
    }

    fn request(&self, method: Method, table: &str) -> reqwest::RequestBuilder {
        let token = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", token))
    }

    async fn fetch_production_rows(&self, query: &[(&str, String)]) -> Result<Vec<ProductionItem>> {
        let rows: Vec<ProductionRow> = self
            .request(Method::GET, PRODUCTION_TABLE)
            .query(query)
            .send()
            .await
            .context("Failed to send production query")?
            .error_for_status()
            .context("Backend rejected production query")?
            .json()
            .await
            .context("Failed to parse production rows")?;
        Ok(convert_rows(rows, ProductionRow::into_production))
    }

    async fn patch_production(
        &self,
        id: &str,
        body: serde_json::Value,
    ) -> Result<ProductionItem> {
        let rows: Vec<ProductionRow> = self
            .request(Method::PATCH, PRODUCTION_TABLE)
            .query(&[("id", eq(id))])
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .context("Failed to send production update")?
            .error_for_status()
            .context("Backend rejected production update")?
            .json()
            .await
            .context("Failed to parse updated production row")?;
        rows.into_iter()
            .next()
            .with_context(|| format!("Production item {} not found", id))?
            .into_production()
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Convert rows, skipping (and logging) rows the domain model cannot represent.
fn convert_rows<R, T>(rows: Vec<R>, convert: fn(R) -> Result<T>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match convert(row) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping backend row: {:#}", e);
                None
            }
        })
        .collect()
}

/// Order-independent digest over the fields that change when a row moves or is edited.
fn fingerprint(items: &[ProductionItem]) -> u64 {
    let mut keys: Vec<(&str, &str, Option<i64>)> = items
        .iter()
        .map(|p| {
            (
                p.id.as_str(),
                p.column.as_str(),
                p.updated_at.map(|t| t.timestamp_micros()),
            )
        })
        .collect();
    keys.sort_unstable();
    let mut hasher = DefaultHasher::new();
    keys.hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl BoardGateway for RestGateway {
    async fn list_candidates(&self) -> Result<Vec<CandidateItem>> {
        debug!("Fetching candidate items");
        let rows: Vec<CandidateRow> = self
            .request(Method::GET, CANDIDATE_TABLE)
            .query(&[("select", CANDIDATE_SELECT), ("order", "position.asc")])
            .send()
            .await
            .context("Failed to send candidate query")?
            .error_for_status()
            .context("Backend rejected candidate query")?
            .json()
            .await
            .context("Failed to parse candidate rows")?;
        Ok(convert_rows(rows, CandidateRow::into_candidate))
    }

    async fn list_production(&self, user_id: &str) -> Result<Vec<ProductionItem>> {
        debug!(user_id, "Fetching production items");
        self.fetch_production_rows(&[("select", "*".to_string()), ("user_id", eq(user_id))])
            .await
    }

    async fn get_production(&self, id: &str) -> Result<Option<ProductionItem>> {
        let mut items = self
            .fetch_production_rows(&[("select", "*".to_string()), ("id", eq(id))])
            .await?;
        Ok(if items.is_empty() {
            None
        } else {
            Some(items.swap_remove(0))
        })
    }

    async fn production_record(&self, id: &str) -> Result<Option<serde_json::Value>> {
        let rows: Vec<serde_json::Value> = self
            .request(Method::GET, PRODUCTION_TABLE)
            .query(&[("select", "*".to_string()), ("id", eq(id))])
            .send()
            .await
            .context("Failed to send production query")?
            .error_for_status()
            .context("Backend rejected production query")?
            .json()
            .await
            .context("Failed to parse production rows")?;
        Ok(rows.into_iter().next())
    }

    async fn find_production_by_origin(
        &self,
        user_id: &str,
        origin_id: &str,
    ) -> Result<Option<ProductionItem>> {
        let items = self
            .fetch_production_rows(&[
                ("select", "*".to_string()),
                ("user_id", eq(user_id)),
                ("google_news_id", eq(origin_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", "1".to_string()),
            ])
            .await?;
        Ok(items.into_iter().next())
    }

    async fn insert_production(&self, item: NewProductionItem) -> Result<ProductionItem> {
        let row = ProductionInsertRow::new(item, Utc::now());
        let rows: Vec<ProductionRow> = self
            .request(Method::POST, PRODUCTION_TABLE)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .context("Failed to send production insert")?
            .error_for_status()
            .context("Backend rejected production insert")?
            .json()
            .await
            .context("Failed to parse inserted production row")?;
        rows.into_iter()
            .next()
            .context("Backend returned no row after insert")?
            .into_production()
    }

    async fn update_candidate_column(&self, id: &str, column: Column) -> Result<()> {
        self.request(Method::PATCH, CANDIDATE_TABLE)
            .query(&[("id", eq(id))])
            .json(&serde_json::json!({ "status": column.as_str() }))
            .send()
            .await
            .context("Failed to send candidate update")?
            .error_for_status()
            .context("Backend rejected candidate update")?;
        Ok(())
    }

    async fn update_production_column(&self, id: &str, column: Column) -> Result<ProductionItem> {
        self.patch_production(
            id,
            serde_json::json!({
                "status": column.as_str(),
                "updated_at": Utc::now().to_rfc3339(),
            }),
        )
        .await
    }

    async fn update_production_content(
        &self,
        id: &str,
        edit: &ProductionEdit,
    ) -> Result<ProductionItem> {
        let mut body = serde_json::Map::new();
        if let Some(title) = &edit.title {
            body.insert("news_title".into(), title.clone().into());
        }
        if let Some(description) = &edit.description {
            body.insert("description".into(), description.clone().into());
        }
        if let Some(content) = &edit.content {
            body.insert("content".into(), content.clone().into());
        }
        if let Some(keywords) = &edit.keywords {
            body.insert("keywords".into(), join_keywords(keywords).into());
        }
        body.insert("updated_at".into(), Utc::now().to_rfc3339().into());
        self.patch_production(id, serde_json::Value::Object(body)).await
    }

    async fn delete_production(&self, id: &str) -> Result<bool> {
        let rows: Vec<serde_json::Value> = self
            .request(Method::DELETE, PRODUCTION_TABLE)
            .query(&[("id", eq(id))])
            .header("Prefer", "return=representation")
            .send()
            .await
            .context("Failed to send production delete")?
            .error_for_status()
            .context("Backend rejected production delete")?
            .json()
            .await
            .context("Failed to parse delete response")?;
        Ok(!rows.is_empty())
    }

    async fn subscribe_production(&self, user_id: &str) -> Result<ChangeSubscription> {
        let (tx, rx) = broadcast::channel(16);
        let gateway = self.clone();
        let user_id = user_id.to_string();
        let interval = self.config.poll_interval;

        let poller = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last: Option<u64> = None;
            loop {
                ticker.tick().await;
                match gateway.list_production(&user_id).await {
                    Ok(items) => {
                        let current = fingerprint(&items);
                        if last.is_some_and(|prev| prev != current) {
                            debug!(user_id = %user_id, "Production rows changed");
                            if tx.send(ChangeEvent { user_id: user_id.clone() }).is_err() {
                                break;
                            }
                        }
                        last = Some(current);
                    }
                    Err(e) => warn!("Change poll failed: {:#}", e),
                }
            }
        });

        Ok(ChangeSubscription::with_poller(rx, poller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        routing::get,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        queries: Vec<HashMap<String, String>>,
        headers: Vec<HeaderMap>,
        bodies: Vec<serde_json::Value>,
    }

    type Shared = Arc<Mutex<Recorded>>;

    async fn candidates(
        State(rec): State<Shared>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        let mut rec = rec.lock().unwrap();
        rec.queries.push(q);
        rec.headers.push(headers);
        Json(serde_json::json!([
            {"id":"c1","title":"First","position":1,"status":null},
            {"id":"c2","title":"Broken","position":2,"status":"archived"},
            {"id":"c3","title":"Third","position":3,"status":"review"}
        ]))
    }

    async fn production_get(
        State(rec): State<Shared>,
        Query(q): Query<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        rec.lock().unwrap().queries.push(q);
        Json(serde_json::json!([
            {"id":"p1","news_title":"Promoted","status":"review","google_news_id":"c1",
             "created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-02T00:00:00+00:00",
             "news_date":"2024-01-01","user_email":"u1@example.com"}
        ]))
    }

    async fn production_post(
        State(rec): State<Shared>,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let mut row = body.clone();
        row["id"] = "p-new".into();
        rec.lock().unwrap().bodies.push(body);
        (StatusCode::CREATED, Json(serde_json::json!([row])))
    }

    async fn production_delete(
        Query(q): Query<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        if q.get("id").map(String::as_str) == Some("eq.p1") {
            Json(serde_json::json!([{"id":"p1"}]))
        } else {
            Json(serde_json::json!([]))
        }
    }

    async fn spawn_backend() -> (RestGateway, Shared) {
        let rec: Shared = Arc::default();
        let app = Router::new()
            .route("/rest/v1/google_news", get(candidates))
            .route(
                "/rest/v1/user_production",
                get(production_get)
                    .post(production_post)
                    .delete(production_delete),
            )
            .with_state(rec.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let gateway = RestGateway::new(RestConfig {
            base_url: format!("http://{}/", addr),
            api_key: "anon-key".into(),
            access_token: Some("user-token".into()),
            request_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        })
        .unwrap();
        (gateway, rec)
    }

    #[tokio::test]
    async fn test_list_candidates_orders_and_skips_bad_rows() {
        let (gateway, rec) = spawn_backend().await;
        let items = gateway.list_candidates().await.unwrap();
        let ids: Vec<&str> = items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
        assert_eq!(items[0].column, Column::Trend);
        assert_eq!(items[1].column, Column::Review);

        let rec = rec.lock().unwrap();
        assert_eq!(rec.queries[0].get("order").map(String::as_str), Some("position.asc"));
        let headers = &rec.headers[0];
        assert_eq!(headers.get("apikey").unwrap(), "anon-key");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer user-token");
    }

    #[tokio::test]
    async fn test_list_production_filters_by_user() {
        let (gateway, rec) = spawn_backend().await;
        let items = gateway.list_production("u1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].origin_id.as_deref(), Some("c1"));
        assert_eq!(items[0].title.as_deref(), Some("Promoted"));
        let rec = rec.lock().unwrap();
        assert_eq!(rec.queries[0].get("user_id").map(String::as_str), Some("eq.u1"));
    }

    #[tokio::test]
    async fn test_production_record_keeps_unmodelled_columns() {
        let (gateway, rec) = spawn_backend().await;
        let record = gateway.production_record("p1").await.unwrap().unwrap();
        assert_eq!(record["news_date"], "2024-01-01");
        assert_eq!(record["user_email"], "u1@example.com");
        assert_eq!(record["google_news_id"], "c1");
        let rec = rec.lock().unwrap();
        assert_eq!(rec.queries[0].get("id").map(String::as_str), Some("eq.p1"));
        assert_eq!(rec.queries[0].get("select").map(String::as_str), Some("*"));
    }

    #[tokio::test]
    async fn test_insert_production_posts_backend_row() {
        let (gateway, rec) = spawn_backend().await;
        let created = gateway
            .insert_production(NewProductionItem {
                origin_id: Some("c1".into()),
                title: Some("First".into()),
                news_url: None,
                image_url: None,
                source: Some("Wire".into()),
                user_id: "u1".into(),
                email: Some("u1@example.com".into()),
                column: Column::Rewrite,
            })
            .await
            .unwrap();
        assert_eq!(created.id, "p-new");
        assert_eq!(created.origin_id.as_deref(), Some("c1"));
        assert_eq!(created.column, Column::Rewrite);

        let rec = rec.lock().unwrap();
        let body = &rec.bodies[0];
        assert_eq!(body["google_news_id"], "c1");
        assert_eq!(body["news_title"], "First");
        assert_eq!(body["news_source"], "Wire");
        assert_eq!(body["status"], "rewrite");
    }

    #[tokio::test]
    async fn test_delete_reports_whether_a_row_matched() {
        let (gateway, _rec) = spawn_backend().await;
        assert!(gateway.delete_production("p1").await.unwrap());
        assert!(!gateway.delete_production("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_backend_error_status_is_an_error() {
        let (gateway, _rec) = spawn_backend().await;
        // No PATCH route is mounted, so the backend answers 405.
        let err = gateway
            .update_candidate_column("c1", Column::Review)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("rejected"));
    }

    #[test]
    fn test_fingerprint_ignores_order_but_not_columns() {
        let a = ProductionItem {
            id: "p1".into(),
            title: None,
            image_url: None,
            news_url: None,
            source: None,
            published_at: None,
            position: None,
            column: Column::Review,
            content: None,
            description: None,
            keywords: vec![],
            updated_at: None,
            origin_id: None,
            user_id: None,
            email: None,
        };
        let mut b = a.clone();
        b.id = "p2".into();
        assert_eq!(fingerprint(&[a.clone(), b.clone()]), fingerprint(&[b.clone(), a.clone()]));

        let mut moved = a.clone();
        moved.column = Column::Send;
        assert_ne!(fingerprint(&[a, b.clone()]), fingerprint(&[moved, b]));
    }
}
