//! Domain models for the POST enrichment pipeline.
//!
//! - [`Cell`] - One spreadsheet value (absent, text, number or date)
//! - [`Table`] - Ordered, uniquely-named columns over ordered rows
//! - [`Source`] - The four workbook roles (POST, TUBS, Demand, BeamBalance)
//!
//! Column order is part of the data: the enrichment pipeline positions
//! derived columns for a human-readable layout, and the renderer writes the
//! columns exactly in this order.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// =============================================================================
// Cell
// =============================================================================

/// A single cell value.
///
/// Serializes untagged: `Empty` becomes `null`, text a string, numbers a
/// JSON number and dates an ISO-8601 string.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// Absent value (blank cell, NaN).
    #[default]
    Empty,
    /// Text value.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Date-time value.
    Date(NaiveDateTime),
}

impl Cell {
    /// Create a text cell.
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// True for the absent marker.
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Text form of the cell, `None` when absent.
    ///
    /// Integral numbers print without a fractional part (`12`, not `12.0`),
    /// dates as `YYYY-MM-DD HH:MM:SS`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Date(d) => Some(d.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Numeric view of the cell; numeric-looking text is parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Key used when joining tables. Absent cells never join.
    pub fn join_key(&self) -> Option<String> {
        self.to_text()
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text().unwrap_or_default())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Cell::Empty
        } else {
            Cell::Number(value)
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::Date(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

// =============================================================================
// Table
// =============================================================================

/// An in-memory table: ordered unique column names and ordered rows.
///
/// Every row has exactly `width()` cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given header.
    ///
    /// Names are trimmed; duplicates get `.1`, `.2`, ... suffixes.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: unique_names(columns.into_iter().map(Into::into)),
            rows: Vec::new(),
        }
    }

    /// Create a table from a header and rows. Short rows are padded with
    /// absent cells, long rows truncated.
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Cell>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Append a row, normalised to the table width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterate the cells of one column, top to bottom.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Cell> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Cell at `row` in column `name`.
    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Set a whole column. Replaces the values in place if the column
    /// exists, otherwise appends it at the end.
    pub fn set_column(&mut self, name: &str, mut values: Vec<Cell>) {
        values.resize(self.rows.len(), Cell::Empty);
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Rewrite every cell of a column. Returns false if the column is missing.
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> bool
    where
        F: FnMut(&Cell) -> Cell,
    {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        true
    }

    /// Reorder columns. Names in `order` that do not exist are ignored;
    /// existing columns missing from `order` keep their relative order after
    /// the listed ones.
    pub fn reorder(&mut self, order: &[String]) {
        let mut indices: Vec<usize> = Vec::with_capacity(self.columns.len());
        for name in order {
            if let Some(idx) = self.column_index(name) {
                if !indices.contains(&idx) {
                    indices.push(idx);
                }
            }
        }
        for idx in 0..self.columns.len() {
            if !indices.contains(&idx) {
                indices.push(idx);
            }
        }

        let columns: Vec<String> = indices.iter().map(|&i| self.columns[i].clone()).collect();
        self.columns = columns;
        for row in &mut self.rows {
            let reordered: Vec<Cell> = indices.iter().map(|&i| std::mem::take(&mut row[i])).collect();
            *row = reordered;
        }
    }

    /// Keep only rows for which `keep` returns true, preserving order.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }
}

/// Trim names and make them unique the way spreadsheet readers do
/// (`Qty`, `Qty.1`, `Qty.2`, ...).
fn unique_names<I: Iterator<Item = String>>(names: I) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let base = name.trim().to_string();
        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

// =============================================================================
// Sources
// =============================================================================

/// The workbook roles the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Post,
    Tubs,
    Demand,
    BeamBalance,
}

impl Source {
    /// Human-readable label used in notes and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Post => "POST",
            Source::Tubs => "TUBS",
            Source::Demand => "Demand",
            Source::BeamBalance => "BeamBalance",
        }
    }

    /// Multipart / CLI field name.
    pub fn field_name(&self) -> &'static str {
        match self {
            Source::Post => "post",
            Source::Tubs => "tubs",
            Source::Demand => "demand",
            Source::BeamBalance => "beam_balance",
        }
    }

    pub fn all() -> [Source; 4] {
        [Source::Post, Source::Tubs, Source::Demand, Source::BeamBalance]
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            ["a", "b", "c"],
            vec![
                vec!["1".into(), 2.0.into(), Cell::Empty],
                vec!["x".into(), Cell::Empty, "z".into()],
            ],
        )
    }

    #[test]
    fn test_integral_numbers_print_without_fraction() {
        assert_eq!(Cell::Number(12.0).to_text().as_deref(), Some("12"));
        assert_eq!(Cell::Number(12.5).to_text().as_deref(), Some("12.5"));
        assert_eq!(Cell::Empty.to_text(), None);
    }

    #[test]
    fn test_numeric_and_text_keys_join() {
        assert_eq!(Cell::Number(1001.0).join_key(), Cell::text("1001").join_key());
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let table = Table::new([" Qty ", "Qty", "Qty"]);
        assert_eq!(table.columns(), &["Qty", "Qty.1", "Qty.2"]);
    }

    #[test]
    fn test_rows_are_padded_to_width() {
        let table = Table::from_rows(["a", "b"], vec![vec!["1".into()]]);
        assert_eq!(table.cell(0, "b"), Some(&Cell::Empty));
    }

    #[test]
    fn test_set_column_replaces_or_appends() {
        let mut table = sample();
        table.set_column("b", vec![Cell::from(9.0), Cell::from(8.0)]);
        assert_eq!(table.width(), 3);
        assert_eq!(table.cell(1, "b"), Some(&Cell::Number(8.0)));

        table.set_column("d", vec![Cell::from("new")]);
        assert_eq!(table.columns().last().map(String::as_str), Some("d"));
        assert_eq!(table.cell(1, "d"), Some(&Cell::Empty));
    }

    #[test]
    fn test_reorder_keeps_unlisted_columns() {
        let mut table = sample();
        table.reorder(&["c".to_string(), "missing".to_string(), "a".to_string()]);
        assert_eq!(table.columns(), &["c", "a", "b"]);
        assert_eq!(table.rows()[1], vec![Cell::text("z"), Cell::text("x"), Cell::Empty]);
    }

    #[test]
    fn test_retain_rows_keeps_columns() {
        let mut table = sample();
        table.retain_rows(|row| row[0] != Cell::text("1"));
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.columns(), &["a", "b", "c"]);
    }

    #[test]
    fn test_cell_serializes_untagged() {
        let json = serde_json::to_value(vec![Cell::Empty, Cell::text("a"), Cell::Number(1.5)]).unwrap();
        assert_eq!(json, serde_json::json!([null, "a", 1.5]));
    }
}
