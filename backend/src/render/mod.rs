//! XLSX renderer for enriched and filtered POST tables.
//!
//! Writes one worksheet per table:
//! - Header row in bold, every written cell (header included) with a thin border
//! - Per-column number format, font colour and fill from a [`StyleMap`]
//! - Dates as real Excel date-times
//!
//! ```text
//! Sheet: ModifiedPost
//! | Production Order | Demand    | GBD_GBS_Count | ... | Action Qty Befor Post |
//! |------------------|-----------|---------------|-----|-----------------------|
//! | P1               | GBD1 GBS2 | 2             | ... | 1.250 (red)           |
//! ```

pub mod style;

pub use style::{ColumnStyle, StyleMap};

use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet};
use std::path::Path;

use crate::error::{RenderError, RenderResult};
use crate::models::{Cell, Table};
use style::base_format;

/// Excel worksheet maximum row count.
pub const MAX_ROWS: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const MAX_COLUMNS: usize = 16_384;

const DATE_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// A rendered output file, ready to save or send.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Write the artifact into `dir` under its file name.
    pub fn save_in(&self, dir: &Path) -> RenderResult<std::path::PathBuf> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Per-column formats, resolved once per sheet.
struct ColumnFormats {
    value: Format,
    date: Format,
}

/// Render `table` into an in-memory XLSX workbook with one sheet.
pub fn render_table(table: &Table, sheet_name: &str, styles: &StyleMap) -> RenderResult<Vec<u8>> {
    let mut workbook = build_workbook(table, sheet_name, styles)?;
    Ok(workbook.save_to_buffer()?)
}

/// Render `table` and save it to `path`.
pub fn write_table(
    table: &Table,
    sheet_name: &str,
    styles: &StyleMap,
    path: &Path,
) -> RenderResult<()> {
    let mut workbook = build_workbook(table, sheet_name, styles)?;
    workbook.save(path)?;
    Ok(())
}

fn build_workbook(table: &Table, sheet_name: &str, styles: &StyleMap) -> RenderResult<Workbook> {
    if table.row_count() + 1 > MAX_ROWS || table.width() > MAX_COLUMNS {
        return Err(RenderError::TooLarge {
            rows: table.row_count(),
            columns: table.width(),
        });
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;
    write_sheet(worksheet, table, styles)?;
    Ok(workbook)
}

fn write_sheet(worksheet: &mut Worksheet, table: &Table, styles: &StyleMap) -> RenderResult<()> {
    let header = base_format().set_bold().set_align(FormatAlign::Center);
    let formats = column_formats(table, styles)?;

    for (col, name) in table.columns().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &header)?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let xl_row = (r + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let xl_col = col as u16;
            let fmt = &formats[col];
            match cell {
                Cell::Empty => {
                    worksheet.write_blank(xl_row, xl_col, &fmt.value)?;
                }
                Cell::Text(s) => {
                    worksheet.write_string_with_format(xl_row, xl_col, s, &fmt.value)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number_with_format(xl_row, xl_col, *n, &fmt.value)?;
                }
                Cell::Date(d) => match excel_serial(d) {
                    Some(serial) => {
                        worksheet.write_number_with_format(xl_row, xl_col, serial, &fmt.date)?;
                    }
                    None => {
                        let text = cell.to_text().unwrap_or_default();
                        worksheet.write_string_with_format(xl_row, xl_col, &text, &fmt.value)?;
                    }
                },
            }
        }
    }

    worksheet.autofit();
    Ok(())
}

/// One bordered format pair per column, in column order.
fn column_formats(table: &Table, styles: &StyleMap) -> RenderResult<Vec<ColumnFormats>> {
    table
        .columns()
        .iter()
        .map(|name| {
            let style = styles.get(name).cloned().unwrap_or_default();
            let value = style.to_format(name)?;
            let date = value.clone().set_num_format(DATE_FORMAT);
            Ok(ColumnFormats { value, date })
        })
        .collect()
}

/// Excel serial date (days since 1899-12-30, fractional time of day).
fn excel_serial(value: &NaiveDateTime) -> Option<f64> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = value.signed_duration_since(epoch).num_milliseconds();
    if millis < 0 {
        return None;
    }
    Some(millis as f64 / 86_400_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;
    use calamine::{open_workbook_auto, Data, Reader};
    use rust_xlsxwriter::FormatBorder;
    use tempfile::tempdir;

    fn post() -> Table {
        Table::from_rows(
            ["Production Order", "Beam Issue To PO", "Action Qty Befor Post", "Note"],
            vec![
                vec!["P1".into(), 1.5.into(), 0.125.into(), Cell::Empty],
                vec!["P2".into(), Cell::Empty, 2.0.into(), "late".into()],
            ],
        )
    }

    fn styles() -> StyleMap {
        let mut styles = StyleMap::new();
        styles.insert("Beam Issue To PO", ColumnStyle::decimals(2));
        styles.insert(
            "Action Qty Befor Post",
            ColumnStyle::decimals(3).with_font_color("FF0000"),
        );
        styles
    }

    #[test]
    fn test_excel_serial() {
        let dt = NaiveDate::from_ymd_opt(2025, 6, 23).unwrap().and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(excel_serial(&dt), Some(45831.5));
    }

    #[test]
    fn test_render_to_buffer_is_zip() {
        let bytes = render_table(&post(), "ModifiedPost", &styles()).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_written_sheet_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modified_post.xlsx");
        write_table(&post(), "ModifiedPost", &styles(), &path).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["ModifiedPost".to_string()]);
        let range = workbook.worksheet_range("ModifiedPost").unwrap();
        assert_eq!(range.get_size(), (3, 4));
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("Production Order".into())));
        assert_eq!(range.get_value((1, 2)), Some(&Data::Float(0.125)));
        assert_eq!(range.get_value((2, 3)), Some(&Data::String("late".into())));
    }

    #[test]
    fn test_bad_color_fails_before_writing() {
        let mut styles = StyleMap::new();
        styles.insert("Note", ColumnStyle::default().with_fill_color("yellow"));
        let err = render_table(&post(), "ModifiedPost", &styles).unwrap_err();
        assert!(matches!(err, RenderError::InvalidColor { .. }));
    }

    #[test]
    fn test_invalid_sheet_name_is_rejected() {
        assert!(render_table(&post(), "bad/name", &StyleMap::new()).is_err());
    }

    #[test]
    fn test_column_formats_carry_profile_styles() {
        let table = Table::new(["Production Order", "Action Qty Befor Post", "Beam Issue To PO", "Total Issue To PO"]);
        let formats = column_formats(&table, &Profile::Full.config().style_map()).unwrap();
        let thin = || Format::new().set_border(FormatBorder::Thin);

        assert_eq!(formats[0].value, thin());
        assert_eq!(
            formats[1].value,
            thin().set_num_format("0.000").set_font_color(0xFF0000)
        );
        assert_eq!(formats[2].value, thin().set_num_format("0.00"));
        assert_eq!(
            formats[3].value,
            thin().set_num_format("0.00").set_background_color(0xFFF2CC)
        );
        assert_eq!(formats[0].date, thin().set_num_format(DATE_FORMAT));
    }

    #[test]
    fn test_too_many_columns() {
        let table = Table::new((0..=MAX_COLUMNS).map(|i| format!("c{}", i)));
        let err = render_table(&table, "Wide", &StyleMap::new()).unwrap_err();
        assert!(matches!(err, RenderError::TooLarge { rows: 0, columns } if columns == MAX_COLUMNS + 1));
    }
}
