//! Row filter producing the filtered POST variant.

use serde::{Deserialize, Serialize};

use super::operations::matches_any_keyword;
use crate::models::{Cell, Table};

/// Drop every row whose `classify_col` cell satisfies `classifier`.
///
/// Returns `None` when the column does not exist, which is distinct from a
/// filter that keeps every row. Surviving rows keep their relative order and
/// all columns.
pub fn filter_rows<F>(table: &Table, classify_col: &str, classifier: F) -> Option<Table>
where
    F: Fn(&Cell) -> bool,
{
    let idx = table.column_index(classify_col)?;
    let mut filtered = table.clone();
    filtered.retain_rows(|row| !classifier(&row[idx]));
    Some(filtered)
}

/// Keyword-based row filter (defaults: drop BCY/BYN rows on "IT").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordFilter {
    /// Column classified.
    pub column: String,
    /// Upper-case keywords; any part containing one is dropped.
    pub keywords: Vec<String>,
    /// Value that never matches (the unmatched-join fill).
    pub sentinel: String,
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self {
            column: "IT".to_string(),
            keywords: vec!["BCY".to_string(), "BYN".to_string()],
            sentinel: "Not Found".to_string(),
        }
    }
}

impl KeywordFilter {
    /// True when the row holding `cell` should be removed.
    pub fn matches(&self, cell: &Cell) -> bool {
        matches_any_keyword(cell, self.keywords.as_slice(), &self.sentinel)
    }

    pub fn apply(&self, table: &Table) -> Option<Table> {
        filter_rows(table, &self.column, |cell| self.matches(cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enriched() -> Table {
        Table::from_rows(
            ["Production Order", "IT"],
            vec![
                vec!["P1".into(), "BCY-1,A2".into()],
                vec!["P2".into(), "Not Found".into()],
                vec!["P3".into(), "w1, byn".into()],
                vec!["P4".into(), Cell::Empty],
                vec!["P5".into(), "A7".into()],
            ],
        )
    }

    #[test]
    fn test_drops_keyword_rows_in_order() {
        let filtered = KeywordFilter::default().apply(&enriched()).unwrap();
        let orders: Vec<String> = filtered
            .column("Production Order")
            .unwrap()
            .filter_map(Cell::to_text)
            .collect();
        assert_eq!(orders, vec!["P2", "P4", "P5"]);
        assert_eq!(filtered.columns(), enriched().columns());
    }

    #[test]
    fn test_missing_column_produces_nothing() {
        let table = Table::from_rows(["Production Order"], vec![vec!["P1".into()]]);
        assert!(KeywordFilter::default().apply(&table).is_none());
    }

    #[test]
    fn test_no_matches_keeps_all_rows() {
        let table = Table::from_rows(["IT"], vec![vec!["A".into()], vec!["B".into()]]);
        let filtered = filter_rows(&table, "IT", |_| false).unwrap();
        assert_eq!(filtered.row_count(), table.row_count());
    }
}
