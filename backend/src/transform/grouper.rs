//! Group an auxiliary table into a one-row-per-key lookup.
//!
//! Auxiliary workbooks hold many rows per join key. Before they are merged
//! onto POST, each one is collapsed so that every key carries a single
//! comma-joined string of its values.
//!
//! # Architecture
//!
//! ```text
//! TUBS rows                          Aggregated lookup (sorted, unique)
//! ┌──────────────────────────┐       ┌──────────────────────────┐
//! │ PRORDER: P1, TT_CODE: b  │       │ PRORDER: P1              │
//! │ PRORDER: P1, TT_CODE: a  │  →    │ TT_CODE: "a,b"           │
//! │ PRORDER: P1, TT_CODE: a  │       ├──────────────────────────┤
//! │ PRORDER: P2, TT_CODE: -  │       │ PRORDER: P2, TT_CODE: "" │
//! └──────────────────────────┘       └──────────────────────────┘
//! ```
//!
//! Rows with an absent key are dropped. Absent values are skipped, so a key
//! whose values are all absent is kept with an empty string.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::models::{Cell, Table};

/// How values within one key group are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateMode {
    /// Keep each distinct string form once.
    pub dedupe: bool,
    /// Sort lexicographically before joining (otherwise encounter order).
    pub sort: bool,
}

impl AggregateMode {
    /// Distinct values, sorted. Used for TUBS codes and Demand orders.
    pub const SORTED_UNIQUE: AggregateMode = AggregateMode { dedupe: true, sort: true };

    /// Every value in row order. Used for BeamBalance attributes.
    pub const ENCOUNTER_ORDER: AggregateMode = AggregateMode { dedupe: false, sort: false };
}

/// One row per distinct key with the joined value string.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedLookup {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl AggregatedLookup {
    /// `(key, joined values)` pairs in first-seen key order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Joined values for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&i| self.entries[i].1.as_str())
    }

    /// Left-join view: for every row of `table`, the joined value matching
    /// its `key_column` cell, or `fill` when there is no match.
    pub fn lookup_column(&self, table: &Table, key_column: &str, fill: &str) -> Vec<Cell> {
        match table.column(key_column) {
            Some(keys) => keys
                .map(|cell| {
                    let value = cell.join_key().and_then(|k| self.get(&k));
                    Cell::text(value.unwrap_or(fill))
                })
                .collect(),
            None => vec![Cell::text(fill); table.row_count()],
        }
    }
}

/// Builder for accumulating one key's values while grouping.
struct GroupBuilder {
    values: Vec<String>,
}

impl GroupBuilder {
    fn new() -> Self {
        Self { values: Vec::new() }
    }

    fn add_value(&mut self, cell: &Cell) {
        if let Some(value) = cell.to_text() {
            self.values.push(value);
        }
    }

    fn build(self, mode: AggregateMode) -> String {
        let values: Vec<String> = match (mode.dedupe, mode.sort) {
            (true, true) => self.values.into_iter().collect::<BTreeSet<_>>().into_iter().collect(),
            (true, false) => {
                let mut seen = BTreeSet::new();
                self.values.into_iter().filter(|v| seen.insert(v.clone())).collect()
            }
            (false, true) => {
                let mut values = self.values;
                values.sort();
                values
            }
            (false, false) => self.values,
        };
        values.join(",")
    }
}

/// Group `table` by `key_col` and join the `value_col` entries per key.
///
/// Returns `None` when either column is missing.
pub fn aggregate(
    table: &Table,
    key_col: &str,
    value_col: &str,
    mode: AggregateMode,
) -> Option<AggregatedLookup> {
    let key_idx = table.column_index(key_col)?;
    let value_idx = table.column_index(value_col)?;

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, GroupBuilder> = HashMap::new();

    for row in table.rows() {
        let Some(key) = row[key_idx].join_key() else {
            continue;
        };
        let builder = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            GroupBuilder::new()
        });
        builder.add_value(&row[value_idx]);
    }

    let mut entries = Vec::with_capacity(order.len());
    let mut index = HashMap::with_capacity(order.len());
    for key in order {
        if let Some(builder) = groups.remove(&key) {
            index.insert(key.clone(), entries.len());
            entries.push((key, builder.build(mode)));
        }
    }

    Some(AggregatedLookup {
        entries,
        index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes() -> Table {
        Table::from_rows(
            ["PRORDER", "TT_CODE"],
            vec![
                vec!["P1".into(), "b".into()],
                vec!["P1".into(), "a".into()],
                vec![Cell::Empty, "z".into()],
                vec!["P1".into(), "a".into()],
                vec!["P2".into(), Cell::Empty],
            ],
        )
    }

    #[test]
    fn test_sorted_unique_mode() {
        let lookup = aggregate(&codes(), "PRORDER", "TT_CODE", AggregateMode::SORTED_UNIQUE).unwrap();
        assert_eq!(lookup.get("P1"), Some("a,b"));
    }

    #[test]
    fn test_encounter_order_mode() {
        let lookup = aggregate(&codes(), "PRORDER", "TT_CODE", AggregateMode::ENCOUNTER_ORDER).unwrap();
        assert_eq!(lookup.get("P1"), Some("b,a,a"));
    }

    #[test]
    fn test_one_row_per_key_and_absent_keys_dropped() {
        let lookup = aggregate(&codes(), "PRORDER", "TT_CODE", AggregateMode::SORTED_UNIQUE).unwrap();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.entries()[0].0, "P1");
        assert!(lookup.entries().iter().all(|(_, v)| !v.contains('z')));
    }

    #[test]
    fn test_all_absent_group_is_empty_string() {
        let lookup = aggregate(&codes(), "PRORDER", "TT_CODE", AggregateMode::ENCOUNTER_ORDER).unwrap();
        assert_eq!(lookup.get("P2"), Some(""));
    }

    #[test]
    fn test_row_order_does_not_change_key_count() {
        let mut rows = codes().rows().to_vec();
        rows.reverse();
        let reversed = Table::from_rows(["PRORDER", "TT_CODE"], rows);
        let lookup = aggregate(&reversed, "PRORDER", "TT_CODE", AggregateMode::SORTED_UNIQUE).unwrap();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.get("P1"), Some("a,b"));
    }

    #[test]
    fn test_missing_column() {
        assert!(aggregate(&codes(), "PRORDER", "IT", AggregateMode::SORTED_UNIQUE).is_none());
    }

    #[test]
    fn test_numeric_keys_and_values() {
        let table = Table::from_rows(
            ["Project", "IT"],
            vec![vec![7.0.into(), 12.0.into()], vec!["7".into(), 3.5.into()]],
        );
        let lookup = aggregate(&table, "Project", "IT", AggregateMode::ENCOUNTER_ORDER).unwrap();
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.get("7"), Some("12,3.5"));
    }

    #[test]
    fn test_lookup_column_fills_unmatched() {
        let lookup = aggregate(&codes(), "PRORDER", "TT_CODE", AggregateMode::SORTED_UNIQUE).unwrap();
        let post = Table::from_rows(
            ["Production Order"],
            vec![vec!["P1".into()], vec!["P9".into()], vec![Cell::Empty]],
        );
        let column = lookup.lookup_column(&post, "Production Order", "Not Found");
        assert_eq!(column, vec![Cell::text("a,b"), Cell::text("Not Found"), Cell::text("Not Found")]);
    }
}
