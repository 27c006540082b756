//! Workbook and CSV reader.
//!
//! Turns an uploaded file into a [`Table`]. Spreadsheet containers
//! (`.xlsx`, `.xlsm`, `.xls`, `.ods`) are read with calamine and expose their
//! sheet names so the caller can choose one; anything else is treated as CSV
//! with encoding and delimiter auto-detection.
//!
//! The first row is the header. Header names are trimmed, blank ones become
//! `Unnamed: N`, duplicates get `.1`, `.2` suffixes.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::io::Cursor;
use std::path::Path;

use crate::error::{ReadError, ReadResult};
use crate::models::{Cell, Table};

/// Pseudo sheet name reported for CSV input.
pub const CSV_SHEET_NAME: &str = "csv";

/// Container format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Workbook,
    Csv,
}

/// Result of reading one sheet, with metadata.
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    /// The sheet as a table
    pub table: Table,
    /// Sheet actually read
    pub sheet: String,
    /// All sheet names in the file
    pub sheets: Vec<String>,
    /// Detected container format
    pub format: InputFormat,
    /// Detected encoding (CSV only)
    pub encoding: Option<String>,
    /// Detected delimiter (CSV only)
    pub delimiter: Option<char>,
}

/// One uploaded or on-disk input file plus the sheet chosen for it.
#[derive(Debug, Clone)]
pub struct SheetSource {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Sheet to read; the first sheet when `None`.
    pub sheet: Option<String>,
}

impl SheetSource {
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            sheet: None,
        }
    }

    pub fn from_path(path: &Path) -> ReadResult<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_bytes(file_name, bytes))
    }

    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        self.sheet = sheet.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn sheet_names(&self) -> ReadResult<Vec<String>> {
        list_sheets(&self.bytes)
    }

    pub fn read(&self) -> ReadResult<ParsedSheet> {
        read_table_bytes(&self.bytes, self.sheet.as_deref())
    }
}

/// Sniff the container format from the leading bytes.
pub fn detect_format(bytes: &[u8]) -> InputFormat {
    const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
    const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        InputFormat::Workbook
    } else {
        InputFormat::Csv
    }
}

/// Sheet names of a workbook, in workbook order. CSV input has one
/// pseudo sheet.
pub fn list_sheets(bytes: &[u8]) -> ReadResult<Vec<String>> {
    match detect_format(bytes) {
        InputFormat::Workbook => {
            let workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
            Ok(workbook.sheet_names())
        }
        InputFormat::Csv => Ok(vec![CSV_SHEET_NAME.to_string()]),
    }
}

/// Read one sheet (default: the first) from raw file bytes.
pub fn read_table_bytes(bytes: &[u8], sheet: Option<&str>) -> ReadResult<ParsedSheet> {
    match detect_format(bytes) {
        InputFormat::Workbook => read_workbook(bytes, sheet),
        InputFormat::Csv => read_csv(bytes),
    }
}

/// Read one sheet (default: the first) from a file on disk.
pub fn read_table_file<P: AsRef<Path>>(path: P, sheet: Option<&str>) -> ReadResult<ParsedSheet> {
    let bytes = std::fs::read(path.as_ref())?;
    read_table_bytes(&bytes, sheet)
}

// =============================================================================
// Workbooks
// =============================================================================

fn read_workbook(bytes: &[u8], sheet: Option<&str>) -> ReadResult<ParsedSheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let sheets = workbook.sheet_names();

    let selected = match sheet {
        Some(name) => sheets
            .iter()
            .find(|s| s.as_str() == name)
            .cloned()
            .ok_or_else(|| ReadError::SheetNotFound {
                sheet: name.to_string(),
                available: sheets.clone(),
            })?,
        None => sheets.first().cloned().ok_or(ReadError::NoSheets)?,
    };

    let range = workbook.worksheet_range(&selected)?;
    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| ReadError::NoHeaders(selected.clone()))?;

    let mut table = Table::new(header_names(header.iter().map(data_to_cell)));
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(data_to_cell).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_row(cells);
    }

    Ok(ParsedSheet {
        table,
        sheet: selected,
        sheets,
        format: InputFormat::Workbook,
        encoding: None,
        delimiter: None,
    })
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::from(*f),
        Data::Int(i) => Cell::from(*i),
        Data::Bool(b) => Cell::text(if *b { "True" } else { "False" }),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

fn header_names<I: Iterator<Item = Cell>>(cells: I) -> Vec<String> {
    cells
        .enumerate()
        .map(|(i, cell)| match cell.to_text() {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!("Unnamed: {}", i),
        })
        .collect()
}

// =============================================================================
// CSV
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> ReadResult<String> {
    let text = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            let (decoded, _, had_errors) = encoding_rs::ISO_8859_15.decode(bytes);
            if had_errors {
                return Err(ReadError::EncodingError(encoding.to_string()));
            }
            decoded.to_string()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        // Fallback: UTF-8 with lossy conversion
        _ => String::from_utf8_lossy(bytes).to_string(),
    };
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

fn read_csv(bytes: &[u8]) -> ReadResult<ParsedSheet> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ReadError::NoHeaders(CSV_SHEET_NAME.to_string()));
    }

    let mut table = Table::new(header_names(headers.iter().map(|h| Cell::text(h))));
    for record in reader.records() {
        let record = record?;
        let cells: Vec<Cell> = record.iter().map(csv_field_to_cell).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_row(cells);
    }

    Ok(ParsedSheet {
        table,
        sheet: CSV_SHEET_NAME.to_string(),
        sheets: vec![CSV_SHEET_NAME.to_string()],
        format: InputFormat::Csv,
        encoding: Some(encoding),
        delimiter: Some(delimiter),
    })
}

/// Numbers become numeric cells unless they carry leading zeros
/// (order codes such as `007` stay text).
fn csv_field_to_cell(field: &str) -> Cell {
    let value = field.trim();
    if value.is_empty() {
        return Cell::Empty;
    }
    let digits = value.trim_start_matches(['-', '+']);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && !leading_zero => Cell::Number(n),
        _ => Cell::Text(value.to_string()),
    }
}
