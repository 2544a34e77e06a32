use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the six fixed workflow stages a card can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Trend,
    Rewrite,
    Review,
    Send,
    Published,
    Reprove,
}

impl Column {
    /// Display order of the board.
    pub const ALL: [Column; 6] = [
        Column::Trend,
        Column::Rewrite,
        Column::Review,
        Column::Send,
        Column::Published,
        Column::Reprove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trend => "trend",
            Self::Rewrite => "rewrite",
            Self::Review => "review",
            Self::Send => "send",
            Self::Published => "published",
            Self::Reprove => "reprove",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Trend => "Trend",
            Self::Rewrite => "Rewrite",
            Self::Review => "Review",
            Self::Send => "Send to Wordpress",
            Self::Published => "Published",
            Self::Reprove => "Reprove",
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trend" => Ok(Self::Trend),
            "rewrite" => Ok(Self::Rewrite),
            "review" => Ok(Self::Review),
            "send" => Ok(Self::Send),
            "published" => Ok(Self::Published),
            "reprove" => Ok(Self::Reprove),
            _ => Err(format!("Invalid column: {}", s)),
        }
    }
}

fn default_candidate_column() -> Column {
    Column::Trend
}

fn default_production_column() -> Column {
    Column::Rewrite
}

/// An ingested news entry not yet owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub news_url: Option<String>,
    pub source: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Ingestion rank.
    pub position: Option<i64>,
    #[serde(default = "default_candidate_column")]
    pub column: Column,
}

/// A user-owned, editable derivative of a candidate item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionItem {
    pub id: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub news_url: Option<String>,
    pub source: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub position: Option<i64>,
    #[serde(default = "default_production_column")]
    pub column: Column,
    pub content: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Identifier of the candidate this item was promoted from.
    pub origin_id: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
}

/// Partial update applied from the detail/edit surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionEdit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
}

impl ProductionEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.content.is_none()
            && self.keywords.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Candidate,
    Production,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a card on the board. Candidate and production identifiers
/// live in separate collections, so the kind is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub kind: ItemKind,
    pub id: String,
}

impl ItemKey {
    pub fn candidate(id: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Candidate,
            id: id.into(),
        }
    }

    pub fn production(id: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Production,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A card as it travels through the board and the drag payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoardItem {
    Candidate(CandidateItem),
    Production(ProductionItem),
}

impl BoardItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Candidate(c) => &c.id,
            Self::Production(p) => &p.id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Candidate(_) => ItemKind::Candidate,
            Self::Production(_) => ItemKind::Production,
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey {
            kind: self.kind(),
            id: self.id().to_string(),
        }
    }

    pub fn column(&self) -> Column {
        match self {
            Self::Candidate(c) => c.column,
            Self::Production(p) => p.column,
        }
    }

    pub fn set_column(&mut self, column: Column) {
        match self {
            Self::Candidate(c) => c.column = column,
            Self::Production(p) => p.column = column,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Candidate(c) => c.title.as_deref(),
            Self::Production(p) => p.title.as_deref(),
        }
    }

    /// Candidates carry no edit history.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Candidate(_) => None,
            Self::Production(p) => p.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_roundtrip() {
        for column in Column::ALL {
            let parsed: Column = column.as_str().parse().unwrap();
            assert_eq!(parsed, column);
        }
        assert!("backlog".parse::<Column>().is_err());
    }

    #[test]
    fn test_column_serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Column::Send).unwrap(), "\"send\"");
        assert_eq!(
            serde_json::from_str::<Column>("\"reprove\"").unwrap(),
            Column::Reprove
        );
    }

    #[test]
    fn test_candidate_column_defaults_to_trend() {
        let item: CandidateItem = serde_json::from_str(r#"{"id":"c1","title":"Hello"}"#).unwrap();
        assert_eq!(item.column, Column::Trend);
        assert_eq!(item.title.as_deref(), Some("Hello"));
        assert!(item.position.is_none());
    }

    #[test]
    fn test_production_column_defaults_to_rewrite() {
        let item: ProductionItem = serde_json::from_str(r#"{"id":"p1"}"#).unwrap();
        assert_eq!(item.column, Column::Rewrite);
        assert!(item.keywords.is_empty());
    }

    #[test]
    fn test_board_item_is_tagged_by_kind() {
        let json = r#"{"kind":"production","id":"p1","column":"review","origin_id":"c1"}"#;
        let item: BoardItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind(), ItemKind::Production);
        assert_eq!(item.column(), Column::Review);
        match &item {
            BoardItem::Production(p) => assert_eq!(p.origin_id.as_deref(), Some("c1")),
            BoardItem::Candidate(_) => panic!("Expected production item"),
        }

        let back = serde_json::to_string(&item).unwrap();
        assert!(back.contains("\"kind\":\"production\""));
    }

    #[test]
    fn test_board_item_without_kind_is_rejected() {
        let json = r#"{"id":"p1","column":"review","isUserItem":true}"#;
        assert!(serde_json::from_str::<BoardItem>(json).is_err());
    }

    #[test]
    fn test_item_key_distinguishes_kinds() {
        assert_ne!(ItemKey::candidate("x"), ItemKey::production("x"));
        assert_eq!(ItemKey::production("x").to_string(), "production:x");
    }

    #[test]
    fn test_production_edit_is_empty() {
        assert!(ProductionEdit::default().is_empty());
        let edit = ProductionEdit {
            content: Some("<p>body</p>".into()),
            ..Default::default()
        };
        assert!(!edit.is_empty());
    }
}
