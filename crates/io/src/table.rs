//! Header + records view of a sheet or delimited file.
//!
//! Rows and columns keep their absolute sheet positions (0-indexed) so that a
//! record can be written back to the exact cell it was read from.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cell_ref::col_to_letter;
use crate::error::TableError;

/// A typed cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

static EMPTY: CellValue = CellValue::Empty;

/// Format a number the way a spreadsheet shows it: integers without decimals.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// `-?\d+(\.\d+)?` without superfluous leading zeros ("007" stays text).
fn looks_numeric(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if int_part.len() > 1 && int_part.starts_with('0') {
        return false;
    }
    match frac_part {
        Some(f) => !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()),
        None => true,
    }
}

impl CellValue {
    /// Infer a value from a delimited-text field.
    pub fn from_text_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if looks_numeric(trimmed) {
            if let Ok(n) = trimmed.parse::<f64>() {
                return Self::Number(n);
            }
        }
        Self::Text(trimmed.to_string())
    }

    /// Text as a spreadsheet would display it.
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        }
    }

    /// Empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// One data row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Absolute 0-indexed sheet row.
    pub row: usize,
    pub values: Vec<CellValue>,
}

#[derive(Debug, Clone)]
pub struct Table {
    /// Display label for messages ("Master_List.xlsx!Games").
    pub source: String,
    pub sheet: Option<String>,
    pub headers: Vec<String>,
    /// Absolute 0-indexed header row.
    pub header_row: usize,
    pub records: Vec<Record>,
    formulas: HashSet<(usize, usize)>,
}

impl Table {
    /// Build a table from dense rows starting at sheet row 0.
    ///
    /// Header cells that are empty are named by column letter. Data rows
    /// that are entirely blank are skipped.
    pub fn from_rows(
        path: &Path,
        sheet: Option<String>,
        rows: Vec<Vec<CellValue>>,
        header_row: usize,
        formulas: HashSet<(usize, usize)>,
    ) -> Result<Self, TableError> {
        if header_row >= rows.len() {
            return Err(TableError::HeaderRowOutOfRange {
                path: path.to_path_buf(),
                header_row,
            });
        }

        let formula_width = formulas.iter().map(|&(_, c)| c + 1).max().unwrap_or(0);
        let width = rows
            .iter()
            .map(|r| r.len())
            .max()
            .unwrap_or(0)
            .max(formula_width);

        let headers: Vec<String> = (0..width)
            .map(|c| {
                let name = rows[header_row]
                    .get(c)
                    .map(|v| v.display().trim().to_string())
                    .unwrap_or_default();
                if name.is_empty() {
                    col_to_letter(c)
                } else {
                    name
                }
            })
            .collect();

        let mut records = Vec::new();
        for (row, mut values) in rows.into_iter().enumerate().skip(header_row + 1) {
            let has_formula = (0..width).any(|c| formulas.contains(&(row, c)));
            if !has_formula && values.iter().all(CellValue::is_blank) {
                continue;
            }
            values.resize(width, CellValue::Empty);
            records.push(Record { row, values });
        }

        let source = match &sheet {
            Some(name) => format!("{}!{}", path.display(), name),
            None => path.display().to_string(),
        };

        Ok(Self {
            source,
            sheet,
            headers,
            header_row,
            records,
            formulas,
        })
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn value<'a>(&self, record: &'a Record, col: usize) -> &'a CellValue {
        record.values.get(col).unwrap_or(&EMPTY)
    }

    /// True when the cell holds a formula (its cached value may be empty).
    pub fn is_formula(&self, row: usize, col: usize) -> bool {
        self.formulas.contains(&(row, col))
    }

    /// Blank value and no formula.
    pub fn is_blank(&self, record: &Record, col: usize) -> bool {
        !self.is_formula(record.row, col) && self.value(record, col).is_blank()
    }
}

/// Input formats, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Tsv,
    /// Workbooks that can be patched in place.
    Xlsx,
    /// Other workbooks calamine can read (xls, xlsb, ods).
    Workbook,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" | "txt" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            "xlsx" | "xlsm" => Ok(Self::Xlsx),
            "xls" | "xlsb" | "ods" => Ok(Self::Workbook),
            _ => Err(TableError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: ext,
            }),
        }
    }

    pub fn is_workbook(&self) -> bool {
        matches!(self, Self::Xlsx | Self::Workbook)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Sheet name for workbooks; `None` picks the default sheet.
    pub sheet: Option<String>,
    /// 0-indexed header row.
    pub header_row: usize,
    /// Field delimiter for delimited text; `None` sniffs it.
    pub delimiter: Option<u8>,
}

/// Load any supported table file.
pub fn load_table(path: &Path, options: &LoadOptions) -> Result<Table, TableError> {
    if !path.exists() {
        return Err(TableError::NotFound(PathBuf::from(path)));
    }
    match SourceFormat::from_path(path)? {
        SourceFormat::Csv => crate::csv::load(path, options.delimiter, options.header_row),
        SourceFormat::Tsv => crate::csv::load(
            path,
            Some(options.delimiter.unwrap_or(b'\t')),
            options.header_row,
        ),
        SourceFormat::Xlsx | SourceFormat::Workbook => {
            crate::xlsx::load(path, options.sheet.as_deref(), options.header_row)
        }
    }
}
