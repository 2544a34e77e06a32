//! Backend row shapes for the `google_news` and `user_production` tables.
//!
//! The backend stores production items under different column names than the
//! domain model (`news_title`, `news_source`, `google_news_id`, a
//! comma-separated `keywords` string). These intermediate row structs do the
//! translation in both directions.

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use newsboard_common::{CandidateItem, Column, ProductionItem};
use serde::{Deserialize, Serialize};

use super::gateway::NewProductionItem;

pub const CANDIDATE_TABLE: &str = "google_news";
pub const PRODUCTION_TABLE: &str = "user_production";

pub const CANDIDATE_SELECT: &str = "id,title,image_url,news_url,source,published_at,position,status";

/// Parse a backend timestamp. Accepts RFC 3339 and zone-less ISO 8601
/// (treated as UTC). Anything else is dropped.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

pub fn join_keywords(keywords: &[String]) -> String {
    keywords.join(", ")
}

fn parse_column(raw: Option<&str>, default: Column) -> Result<Column> {
    match raw {
        None | Some("") => Ok(default),
        Some(s) => Column::from_str(s)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse column label"),
    }
}

fn timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(parse_timestamp)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateRow {
    pub id: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub news_url: Option<String>,
    pub source: Option<String>,
    pub published_at: Option<String>,
    pub position: Option<i64>,
    pub status: Option<String>,
}

impl CandidateRow {
    pub fn into_candidate(self) -> Result<CandidateItem> {
        let column = parse_column(self.status.as_deref(), Column::Trend)
            .with_context(|| format!("Candidate {}", self.id))?;
        Ok(CandidateItem {
            published_at: timestamp(self.published_at.as_deref()),
            id: self.id,
            title: self.title,
            image_url: self.image_url,
            news_url: self.news_url,
            source: self.source,
            position: self.position,
            column,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionRow {
    pub id: String,
    pub news_title: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub news_url: Option<String>,
    pub news_source: Option<String>,
    pub created_at: Option<String>,
    pub status: Option<String>,
    pub google_news_id: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ProductionRow {
    pub fn into_production(self) -> Result<ProductionItem> {
        let column = parse_column(self.status.as_deref(), Column::Rewrite)
            .with_context(|| format!("Production item {}", self.id))?;
        Ok(ProductionItem {
            published_at: timestamp(self.created_at.as_deref()),
            updated_at: timestamp(self.updated_at.as_deref()),
            keywords: self.keywords.as_deref().map(parse_keywords).unwrap_or_default(),
            id: self.id,
            title: self.news_title.or(self.title),
            image_url: self.image_url,
            news_url: self.news_url,
            source: self.news_source,
            position: None,
            column,
            content: self.content,
            description: self.description,
            origin_id: self.google_news_id,
            user_id: self.user_id,
            email: self.email,
        })
    }

    /// Backend-shaped record, as posted to the automation webhooks.
    pub fn from_item(item: &ProductionItem) -> Self {
        Self {
            id: item.id.clone(),
            news_title: item.title.clone(),
            title: item.title.clone(),
            image_url: item.image_url.clone(),
            news_url: item.news_url.clone(),
            news_source: item.source.clone(),
            created_at: item.published_at.map(|t| t.to_rfc3339()),
            status: Some(item.column.as_str().to_string()),
            google_news_id: item.origin_id.clone(),
            updated_at: item.updated_at.map(|t| t.to_rfc3339()),
            content: item.content.clone(),
            description: item.description.clone(),
            keywords: if item.keywords.is_empty() {
                None
            } else {
                Some(join_keywords(&item.keywords))
            },
            user_id: item.user_id.clone(),
            email: item.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionInsertRow {
    pub google_news_id: Option<String>,
    pub news_title: Option<String>,
    pub news_url: Option<String>,
    pub image_url: Option<String>,
    pub news_source: Option<String>,
    pub user_id: String,
    pub email: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ProductionInsertRow {
    pub fn new(item: NewProductionItem, now: DateTime<Utc>) -> Self {
        let stamp = now.to_rfc3339();
        Self {
            google_news_id: item.origin_id,
            news_title: item.title,
            news_url: item.news_url,
            image_url: item.image_url,
            news_source: item.source,
            user_id: item.user_id,
            email: item.email,
            status: item.column.as_str().to_string(),
            created_at: stamp.clone(),
            updated_at: stamp,
        }
    }
}
