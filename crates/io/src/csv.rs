// CSV/TSV table loading

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use crate::error::TableError;
use crate::table::{CellValue, Table};

/// Load a delimited file as a table. `delimiter: None` sniffs it.
pub fn load(path: &Path, delimiter: Option<u8>, header_row: usize) -> Result<Table, TableError> {
    let content = read_file_as_utf8(path).map_err(|message| TableError::Read {
        path: path.to_path_buf(),
        message,
    })?;
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(&content));
    tracing::debug!(
        path = %path.display(),
        delimiter = %(delimiter as char).escape_default(),
        "reading delimited file"
    );

    let rows = parse_rows(&content, delimiter).map_err(|message| TableError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    Table::from_rows(path, None, rows, header_row, HashSet::new())
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Score: (number of lines with same field count as line 1) * field_count
        // Higher field count breaks ties; more columns usually means the real delimiter
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
/// A leading byte-order mark is dropped.
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    match text.strip_prefix('\u{feff}') {
        Some(rest) => Ok(rest.to_string()),
        None => Ok(text),
    }
}

fn parse_rows(content: &str, delimiter: u8) -> Result<Vec<Vec<CellValue>>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| format!("line {}: {}", row_idx + 1, e))?;
        rows.push(record.iter().map(CellValue::from_text_field).collect());
    }
    Ok(rows)
}
