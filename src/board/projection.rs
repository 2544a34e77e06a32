//! Column projection: how candidates, production items and the pending
//! overlay merge into the six board columns.
//!
//! Everything here is a pure function of its inputs.

use std::collections::{HashMap, HashSet};

use newsboard_common::{BoardItem, CandidateItem, Column, ItemKey, ProductionItem};
use serde::{Deserialize, Serialize};

/// An optimistic move awaiting backend confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMove {
    pub prev: Column,
    pub target: Column,
}

pub type Overlay = HashMap<ItemKey, PendingMove>;

/// A card in a column. `pending_from` is set while an optimistic move is unconfirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardView {
    pub item: BoardItem,
    pub pending_from: Option<Column>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnView {
    pub name: Column,
    pub title: String,
    pub items: Vec<CardView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardView {
    pub columns: Vec<ColumnView>,
    pub loading: bool,
    pub authenticated: bool,
}

impl BoardView {
    pub fn column(&self, column: Column) -> Option<&ColumnView> {
        self.columns.iter().find(|c| c.name == column)
    }
}

/// Column an item shows in: the overlay target when pending, else its stored label.
pub fn effective_column(key: &ItemKey, stored: Column, overlay: &Overlay) -> Column {
    overlay.get(key).map_or(stored, |m| m.target)
}

/// Candidate ids already promoted into the production queue.
pub fn promoted_origins(production: &[ProductionItem]) -> HashSet<&str> {
    production
        .iter()
        .filter_map(|p| p.origin_id.as_deref())
        .collect()
}

fn card(mut item: BoardItem, overlay: &Overlay) -> CardView {
    let pending = overlay.get(&item.key()).copied();
    if let Some(m) = pending {
        item.set_column(m.target);
    }
    CardView {
        item,
        pending_from: pending.map(|m| m.prev),
    }
}

/// Items for one column, in presentation order.
pub fn project_column(
    column: Column,
    candidates: &[CandidateItem],
    production: &[ProductionItem],
    overlay: &Overlay,
) -> Vec<CardView> {
    let promoted = promoted_origins(production);

    let prod = production
        .iter()
        .filter(|p| effective_column(&ItemKey::production(&p.id), p.column, overlay) == column)
        .map(|p| card(BoardItem::Production(p.clone()), overlay));

    let cand = candidates
        .iter()
        .filter(|c| effective_column(&ItemKey::candidate(&c.id), c.column, overlay) == column)
        .filter(|c| match column {
            Column::Trend | Column::Rewrite => !promoted.contains(c.id.as_str()),
            _ => true,
        })
        .map(|c| card(BoardItem::Candidate(c.clone()), overlay));

    match column {
        Column::Trend => cand.collect(),
        Column::Published => {
            let mut items: Vec<CardView> = prod.chain(cand).collect();
            // Stable: equal timestamps keep snapshot order. Missing sorts last.
            items.sort_by(|a, b| b.item.updated_at().cmp(&a.item.updated_at()));
            items
        }
        _ => prod.chain(cand).collect(),
    }
}

/// All six columns in display order.
pub fn project_board(
    candidates: &[CandidateItem],
    production: &[ProductionItem],
    overlay: &Overlay,
) -> Vec<ColumnView> {
    Column::ALL
        .iter()
        .map(|&column| ColumnView {
            name: column,
            title: column.title().to_string(),
            items: project_column(column, candidates, production, overlay),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::memory::fixtures::{candidate, production};
    use chrono::{TimeZone, Utc};

    fn ids(cards: &[CardView]) -> Vec<&str> {
        cards.iter().map(|c| c.item.id()).collect()
    }

    #[test]
    fn test_promoted_candidate_leaves_trend() {
        let candidates = vec![candidate("c1", Column::Trend, 1), candidate("c2", Column::Trend, 2)];
        let production = vec![production("p1", Column::Rewrite, Some("c1"))];
        let overlay = Overlay::new();

        let trend = project_column(Column::Trend, &candidates, &production, &overlay);
        assert_eq!(ids(&trend), vec!["c2"]);
        let rewrite = project_column(Column::Rewrite, &candidates, &production, &overlay);
        assert_eq!(ids(&rewrite), vec!["p1"]);
    }

    #[test]
    fn test_rewrite_lists_production_before_unpromoted_candidates() {
        let candidates = vec![
            candidate("c1", Column::Rewrite, 1),
            candidate("c2", Column::Rewrite, 2),
        ];
        let production = vec![
            production("p1", Column::Rewrite, Some("c2")),
            production("p2", Column::Rewrite, None),
        ];
        let rewrite = project_column(Column::Rewrite, &candidates, &production, &Overlay::new());
        assert_eq!(ids(&rewrite), vec!["p1", "p2", "c1"]);
    }

    #[test]
    fn test_review_keeps_promoted_candidates() {
        let candidates = vec![candidate("c1", Column::Review, 1)];
        let production = vec![production("p1", Column::Review, Some("c1"))];
        let review = project_column(Column::Review, &candidates, &production, &Overlay::new());
        assert_eq!(ids(&review), vec!["p1", "c1"]);
    }

    #[test]
    fn test_published_sorts_newest_first_missing_last() {
        let mut old = production("p1", Column::Published, None);
        old.updated_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut new = production("p2", Column::Published, None);
        new.updated_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let undated = production("p3", Column::Published, None);
        let cand = candidate("c1", Column::Published, 1);

        let published = project_column(
            Column::Published,
            &[cand],
            &[old, undated, new],
            &Overlay::new(),
        );
        assert_eq!(ids(&published), vec!["p2", "p1", "p3", "c1"]);
    }

    #[test]
    fn test_overlay_moves_card_and_marks_pending() {
        let candidates = vec![candidate("c1", Column::Trend, 1)];
        let production = vec![production("p1", Column::Review, None)];
        let mut overlay = Overlay::new();
        overlay.insert(
            ItemKey::production("p1"),
            PendingMove {
                prev: Column::Review,
                target: Column::Send,
            },
        );

        let review = project_column(Column::Review, &candidates, &production, &overlay);
        assert!(review.is_empty());
        let send = project_column(Column::Send, &candidates, &production, &overlay);
        assert_eq!(ids(&send), vec!["p1"]);
        assert_eq!(send[0].pending_from, Some(Column::Review));
        assert_eq!(send[0].item.column(), Column::Send);
    }

    #[test]
    fn test_board_has_six_columns_in_display_order_and_is_idempotent() {
        let candidates = vec![candidate("c1", Column::Trend, 1)];
        let production = vec![production("p1", Column::Rewrite, None)];
        let overlay = Overlay::new();
        let board = project_board(&candidates, &production, &overlay);
        let names: Vec<Column> = board.iter().map(|c| c.name).collect();
        assert_eq!(names, Column::ALL.to_vec());
        assert_eq!(board[3].title, "Send to Wordpress");
        assert_eq!(board, project_board(&candidates, &production, &overlay));
    }

    #[test]
    fn test_every_item_appears_in_exactly_one_column() {
        let candidates = vec![
            candidate("c1", Column::Trend, 1),
            candidate("c2", Column::Review, 2),
            candidate("c3", Column::Reprove, 3),
        ];
        let production = vec![
            production("p1", Column::Send, Some("c9")),
            production("p2", Column::Published, None),
        ];
        let board = project_board(&candidates, &production, &Overlay::new());
        let total: usize = board.iter().map(|c| c.items.len()).sum();
        assert_eq!(total, 5);
    }
}
