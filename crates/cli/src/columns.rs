//! `sheetfill columns`: show what a table file looks like to the resolver.

use serde_json::json;
use sheetfill_io::cell_ref::col_to_letter;
use sheetfill_io::xlsx::list_sheets;
use sheetfill_io::{load_table, LoadOptions, SourceFormat, Table};

use crate::resolve::delimiter_byte;
use crate::util::format_table;
use crate::{ColumnsArgs, CliError};

const MAX_CELL_WIDTH: usize = 48;

#[derive(Debug, PartialEq)]
struct ColumnStats {
    filled: usize,
    blank: usize,
    formulas: usize,
}

fn column_stats(table: &Table, col: usize) -> ColumnStats {
    let mut stats = ColumnStats { filled: 0, blank: 0, formulas: 0 };
    for record in &table.records {
        if table.is_formula(record.row, col) {
            stats.formulas += 1;
        } else if table.is_blank(record, col) {
            stats.blank += 1;
        } else {
            stats.filled += 1;
        }
    }
    stats
}

pub(crate) fn cmd_columns(args: ColumnsArgs) -> Result<(), CliError> {
    let format = SourceFormat::from_path(&args.file)?;
    let table = load_table(
        &args.file,
        &LoadOptions {
            sheet: args.sheet.clone(),
            header_row: (args.header_row - 1) as usize,
            delimiter: delimiter_byte(args.delimiter)?,
        },
    )?;
    let sheets = if format.is_workbook() { list_sheets(&args.file)? } else { Vec::new() };
    let stats: Vec<ColumnStats> = (0..table.width()).map(|c| column_stats(&table, c)).collect();

    if args.json {
        let columns: Vec<serde_json::Value> = table
            .headers
            .iter()
            .zip(&stats)
            .enumerate()
            .map(|(i, (header, s))| {
                json!({
                    "column": col_to_letter(i),
                    "index": i + 1,
                    "header": header,
                    "filled": s.filled,
                    "blank": s.blank,
                    "formulas": s.formulas,
                })
            })
            .collect();
        let sheets: Vec<serde_json::Value> = sheets
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "visibility": s.visibility,
                    "selected": table.sheet.as_deref() == Some(s.name.as_str()),
                })
            })
            .collect();
        let out = json!({
            "file": args.file.display().to_string(),
            "sheet": table.sheet,
            "header_row": table.header_row + 1,
            "rows": table.records.len(),
            "columns": columns,
            "sheets": sheets,
        });
        println!("{}", out);
        return Ok(());
    }

    println!(
        "{}  ({} data rows, header row {})",
        table.source,
        table.records.len(),
        table.header_row + 1
    );
    let rows: Vec<Vec<String>> = table
        .headers
        .iter()
        .zip(&stats)
        .enumerate()
        .map(|(i, (header, s))| {
            vec![
                col_to_letter(i),
                header.clone(),
                s.filled.to_string(),
                s.blank.to_string(),
                s.formulas.to_string(),
            ]
        })
        .collect();
    print!("{}", format_table(&["Col", "Header", "Filled", "Blank", "Formulas"], &rows, MAX_CELL_WIDTH));

    if !sheets.is_empty() {
        println!();
        println!("Sheets:");
        for s in &sheets {
            let marker = if table.sheet.as_deref() == Some(s.name.as_str()) { "*" } else { " " };
            println!("{} {}  {}", marker, s.name, s.visibility.as_str());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetfill_io::CellValue;
    use std::collections::HashSet;
    use std::path::Path;

    #[test]
    fn stats_separate_formulas_from_blanks() {
        let rows = vec![
            vec![CellValue::Text("Name".into()), CellValue::Text("Year".into())],
            vec![CellValue::Text("Doom".into()), CellValue::Number(1993.0)],
            vec![CellValue::Text("Myst".into())],
            vec![CellValue::Text("Total".into())],
        ];
        let formulas: HashSet<(usize, usize)> = [(3, 1)].into_iter().collect();
        let table = Table::from_rows(Path::new("g.xlsx"), Some("Games".into()), rows, 0, formulas).unwrap();
        assert_eq!(column_stats(&table, 0), ColumnStats { filled: 3, blank: 0, formulas: 0 });
        assert_eq!(column_stats(&table, 1), ColumnStats { filled: 1, blank: 1, formulas: 1 });
    }
}
