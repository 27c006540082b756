//! Column style map consumed by the XLSX renderer.
//!
//! Styling is a pure mapping from column name to [`ColumnStyle`]. The
//! enrichment pipeline never looks at it; the renderer applies it to data
//! cells (the header row only gets the base border).

use rust_xlsxwriter::{Format, FormatBorder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{RenderError, RenderResult};

/// Number format, font colour and fill colour for one column.
///
/// Colours are 6-digit RGB hex strings, with or without a leading `#`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
}

impl ColumnStyle {
    /// Style with a fixed-decimals number format (`0`, `0.00`, `0.000`, ...).
    pub fn decimals(decimals: u32) -> Self {
        let num_format = if decimals == 0 {
            "0".to_string()
        } else {
            format!("0.{}", "0".repeat(decimals as usize))
        };
        Self {
            num_format: Some(num_format),
            ..Default::default()
        }
    }

    pub fn with_font_color(mut self, color: impl Into<String>) -> Self {
        self.font_color = Some(color.into());
        self
    }

    pub fn with_fill_color(mut self, color: impl Into<String>) -> Self {
        self.fill_color = Some(color.into());
        self
    }

    /// Bordered cell format carrying this style.
    pub(crate) fn to_format(&self, column: &str) -> RenderResult<Format> {
        let mut format = base_format();
        if let Some(ref num_format) = self.num_format {
            format = format.set_num_format(num_format);
        }
        if let Some(ref color) = self.font_color {
            format = format.set_font_color(parse_color(column, color)?);
        }
        if let Some(ref color) = self.fill_color {
            format = format.set_background_color(parse_color(column, color)?);
        }
        Ok(format)
    }
}

/// Thin border on all four sides; applied to every written cell.
pub(crate) fn base_format() -> Format {
    Format::new().set_border(FormatBorder::Thin)
}

fn parse_color(column: &str, value: &str) -> RenderResult<u32> {
    let hex = value.trim().trim_start_matches('#');
    let invalid = || RenderError::InvalidColor {
        column: column.to_string(),
        value: value.to_string(),
    };
    if hex.len() != 6 {
        return Err(invalid());
    }
    u32::from_str_radix(hex, 16).map_err(|_| invalid())
}

/// Column name → style.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleMap {
    columns: BTreeMap<String, ColumnStyle>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, style: ColumnStyle) {
        self.columns.insert(column.into(), style);
    }

    pub fn get(&self, column: &str) -> Option<&ColumnStyle> {
        self.columns.get(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Check every colour parses, without rendering anything.
    pub fn validate(&self) -> RenderResult<()> {
        for (column, style) in &self.columns {
            style.to_format(column)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimals_format() {
        assert_eq!(ColumnStyle::decimals(0).num_format.as_deref(), Some("0"));
        assert_eq!(ColumnStyle::decimals(3).num_format.as_deref(), Some("0.000"));
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("c", "#FF0000").unwrap(), 0xFF0000);
        assert_eq!(parse_color("c", "fff2cc").unwrap(), 0xFFF2CC);
        assert!(parse_color("c", "red").is_err());
        assert!(parse_color("c", "GG0000").is_err());
    }

    #[test]
    fn test_validate_reports_column() {
        let mut styles = StyleMap::new();
        styles.insert("Qty", ColumnStyle::decimals(2).with_font_color("nope"));
        let err = styles.validate().unwrap_err();
        assert!(err.to_string().contains("Qty"));
    }

    #[test]
    fn test_style_map_json_shape() {
        let mut styles = StyleMap::new();
        styles.insert("Qty", ColumnStyle::decimals(3).with_font_color("FF0000"));
        let json = serde_json::to_value(&styles).unwrap();
        assert_eq!(json["Qty"]["numFormat"], "0.000");
        assert_eq!(json["Qty"]["fontColor"], "FF0000");
        assert!(json["Qty"].get("fillColor").is_none());
    }
}
