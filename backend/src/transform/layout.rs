//! Column placement policy.
//!
//! Enrichment stages append their columns at the end of the table and
//! record *where* each column belongs. The recorded rules are replayed once,
//! in stage order, after the last stage has run.
//!
//! ```text
//! appended:  Production Order | Demand | Qty | GBD_GBS_Count | TT_CODE | IT
//! rules:     GBD_GBS_Count → index 2, TT_CODE → end, IT → before TT_CODE
//! resolved:  Production Order | Demand | GBD_GBS_Count | Qty | IT | TT_CODE
//! ```

use serde::{Deserialize, Serialize};

use crate::models::Table;

/// Where a column goes, relative to the columns present when the rule is
/// replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "anchor", rename_all = "snake_case")]
pub enum Placement {
    /// Fixed zero-based position (clamped to the table width).
    AtIndex(usize),
    /// Immediately after the anchor column, or at the end without it.
    After(String),
    /// Immediately before the anchor column, or at the end without it.
    BeforeOrEnd(String),
    /// Last column.
    End,
}

/// A single placement rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRule {
    pub column: String,
    pub placement: Placement,
}

/// Ordered list of placement rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    rules: Vec<PlacementRule>,
}

impl ColumnLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[PlacementRule] {
        &self.rules
    }

    /// Record a rule for one column.
    pub fn place(&mut self, column: impl Into<String>, placement: Placement) {
        self.rules.push(PlacementRule {
            column: column.into(),
            placement,
        });
    }

    /// Record a contiguous block: the first column goes to `placement`, each
    /// following column right after its predecessor.
    pub fn place_block<S: AsRef<str>>(&mut self, columns: &[S], placement: Placement) {
        let mut previous: Option<&str> = None;
        for column in columns {
            let column = column.as_ref();
            let rule = match previous {
                None => placement.clone(),
                Some(prev) => Placement::After(prev.to_string()),
            };
            self.place(column, rule);
            previous = Some(column);
        }
    }

    /// Replay the rules over `columns` and return the final order.
    ///
    /// Rules naming a column that is not present are skipped.
    pub fn resolve(&self, columns: &[String]) -> Vec<String> {
        let mut order: Vec<String> = columns.to_vec();

        for rule in &self.rules {
            let Some(current) = order.iter().position(|c| *c == rule.column) else {
                continue;
            };
            let column = order.remove(current);
            let target = match &rule.placement {
                Placement::AtIndex(i) => (*i).min(order.len()),
                Placement::After(anchor) => position_of(&order, anchor)
                    .map(|i| i + 1)
                    .unwrap_or(order.len()),
                Placement::BeforeOrEnd(anchor) => {
                    position_of(&order, anchor).unwrap_or(order.len())
                }
                Placement::End => order.len(),
            };
            order.insert(target, column);
        }

        order
    }

    /// Reorder `table` according to the rules.
    pub fn apply(&self, table: &mut Table) {
        let order = self.resolve(table.columns());
        table.reorder(&order);
    }
}

fn position_of(order: &[String], name: &str) -> Option<usize> {
    order.iter().position(|c| c == name)
}
