use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum TableError {
    /// Input file does not exist.
    NotFound(PathBuf),
    /// Extension not recognised as a table format.
    UnsupportedFormat { path: PathBuf, extension: String },
    /// File exists but could not be read.
    Read { path: PathBuf, message: String },
    /// CSV or workbook content could not be parsed.
    Parse { path: PathBuf, message: String },
    /// Workbook contains no sheets.
    NoSheets(PathBuf),
    /// Requested sheet is not in the workbook.
    SheetNotFound { path: PathBuf, sheet: String, available: Vec<String> },
    /// Header row lies past the end of the data.
    HeaderRowOutOfRange { path: PathBuf, header_row: usize },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::UnsupportedFormat { path, extension } => {
                write!(f, "{}: unsupported file type {extension:?}", path.display())
            }
            Self::Read { path, message } => write!(f, "{}: {message}", path.display()),
            Self::Parse { path, message } => write!(f, "{}: {message}", path.display()),
            Self::NoSheets(path) => write!(f, "{}: workbook contains no sheets", path.display()),
            Self::SheetNotFound { path, sheet, .. } => {
                write!(f, "{}: sheet {sheet:?} not found", path.display())
            }
            Self::HeaderRowOutOfRange { path, header_row } => write!(
                f,
                "{}: header row {} is past the last row of data",
                path.display(),
                header_row + 1
            ),
        }
    }
}

impl std::error::Error for TableError {}

#[derive(Debug)]
pub enum PatchError {
    /// Source workbook could not be opened or read.
    Read { path: PathBuf, message: String },
    /// Package is not a valid xlsx zip, or a required part is missing.
    Package(String),
    /// Worksheet or workbook XML could not be parsed or re-serialized.
    Xml(String),
    /// Requested sheet is not a worksheet in this package.
    SheetNotFound(String),
    /// Output could not be written or moved into place.
    Write { path: PathBuf, message: String },
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, message } => write!(f, "{}: {message}", path.display()),
            Self::Package(msg) => write!(f, "invalid xlsx package: {msg}"),
            Self::Xml(msg) => write!(f, "XML error: {msg}"),
            Self::SheetNotFound(sheet) => write!(f, "worksheet {sheet:?} not found in package"),
            Self::Write { path, message } => {
                write!(f, "cannot write {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for PatchError {}
