//! Shared domain types for the newsboard editorial workflow.
//!
//! The board tracks two kinds of records: [`CandidateItem`]s ingested by an
//! external pipeline, and user-owned [`ProductionItem`]s promoted from them.
//! Both are placed into one of six fixed [`Column`]s.

pub mod models;
pub mod session;

pub use models::{
    BoardItem, CandidateItem, Column, ItemKey, ItemKind, ProductionEdit, ProductionItem,
};
pub use session::{Notice, NoticeLevel, Session, UserIdentity};
