// File I/O operations

pub mod cell_ref;
pub mod csv;
pub mod error;
pub mod table;
pub mod xlsx;
pub mod xlsx_patch;

pub use error::{PatchError, TableError};
pub use table::{load_table, CellValue, LoadOptions, Record, SourceFormat, Table};
