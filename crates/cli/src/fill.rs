//! `sheetfill fill`: fill blank cells of one column from a reference table.
//!
//! Load both tables, resolve the columns, plan every row, and only when no
//! row is left without a value patch the workbook in place.

use std::path::{Path, PathBuf};

use serde_json::json;
use sheetfill_config::Settings;
use sheetfill_io::cell_ref::cell_address;
use sheetfill_io::xlsx::{list_sheets, Visibility};
use sheetfill_io::xlsx_patch::{patch_workbook, CellPatch, PatchOptions, PatchReport};
use sheetfill_io::{load_table, CellValue, LoadOptions, SourceFormat, Table};
use sheetfill_matcher::{
    plan_fill, FillOptions, FillPlan, MainRow, ReferenceIndex, RowAction, TargetState,
};

use crate::report::write_report;
use crate::resolve::{delimiter_byte, discover_files, resolve_columns, ColumnFlags, Columns, Prompter};
use crate::{CliError, FillArgs};

/// Main rows for planning: key text plus the state of the target cell.
fn main_rows(table: &Table, columns: &Columns) -> Vec<MainRow<CellValue>> {
    table
        .records
        .iter()
        .map(|record| {
            let key = table.value(record, columns.key).display();
            let (target, current) = if table.is_formula(record.row, columns.target) {
                (TargetState::Formula, None)
            } else if table.is_blank(record, columns.target) {
                (TargetState::Blank, None)
            } else {
                (TargetState::Filled, Some(table.value(record, columns.target).clone()))
            };
            MainRow { row: record.row, key, target, current }
        })
        .collect()
}

/// Reference keys with their values; blank value cells are indexed as `None`.
fn reference_index(table: &Table, columns: &Columns) -> ReferenceIndex<CellValue> {
    ReferenceIndex::build(table.records.iter().map(|record| {
        let key = table.value(record, columns.ref_key).display();
        let value = (!table.is_blank(record, columns.ref_value))
            .then(|| table.value(record, columns.ref_value).clone());
        (record.row, key, value)
    }))
}

fn require_patchable(path: &Path) -> Result<(), CliError> {
    match SourceFormat::from_path(path)? {
        SourceFormat::Xlsx => Ok(()),
        _ => Err(CliError::format(format!(
            "{}: only .xlsx/.xlsm workbooks can be filled in place",
            path.display()
        ))
        .with_hint("convert the main file to .xlsx, or swap MAIN and REFERENCE")),
    }
}

fn fills_json(plan: &FillPlan<CellValue>, target_col: usize) -> Vec<serde_json::Value> {
    plan.rows
        .iter()
        .filter_map(|r| match &r.action {
            RowAction::Fill { value, matched_key, score, reference_row } => Some(json!({
                "row": r.row + 1,
                "cell": cell_address(r.row, target_col),
                "key": r.key,
                "matched_key": matched_key,
                "score": score,
                "reference_row": reference_row + 1,
                "value": value,
            })),
            _ => None,
        })
        .collect()
}

fn unmatched_json(plan: &FillPlan<CellValue>, target_col: usize) -> Vec<serde_json::Value> {
    plan.unmatched()
        .map(|(r, reason)| {
            json!({
                "row": r.row + 1,
                "cell": cell_address(r.row, target_col),
                "key": r.key,
                "reason": reason.as_str(),
                "message": reason.to_string(),
            })
        })
        .collect()
}

pub(crate) fn cmd_fill(args: FillArgs, settings: &Settings, quiet: bool) -> Result<(), CliError> {
    let lookup = args.matching.lookup_options(settings)?;
    let delimiter = delimiter_byte(args.matching.delimiter)?;
    let overwrite = args.overwrite || settings.fill.overwrite;
    let unhide = args.unhide || settings.fill.unhide;

    let stdin = std::io::stdin();
    let mut prompter = args
        .interactive
        .then(|| Prompter::new(stdin.lock(), std::io::stderr()));

    let (main_path, ref_path) =
        discover_files(&args.dir, args.main.clone(), args.reference.clone(), prompter.as_mut())?;
    require_patchable(&main_path)?;
    tracing::info!(main = %main_path.display(), reference = %ref_path.display(), "input files");

    let main = load_table(
        &main_path,
        &LoadOptions {
            sheet: args.sheet.clone(),
            header_row: (args.header_row - 1) as usize,
            delimiter: None,
        },
    )?;
    let sheet = main
        .sheet
        .clone()
        .ok_or_else(|| CliError::format(format!("{}: no worksheet to fill", main_path.display())))?;

    let reference = load_table(
        &ref_path,
        &LoadOptions {
            sheet: args.ref_sheet.clone(),
            header_row: (args.ref_header_row - 1) as usize,
            delimiter,
        },
    )?;
    if reference.records.is_empty() {
        return Err(CliError::parse(format!("{}: reference has no data rows", reference.source))
            .with_hint("check --ref-header-row and --ref-sheet"));
    }

    let columns = resolve_columns(
        ColumnFlags {
            key: args.key.as_deref(),
            target: args.target.as_deref(),
            ref_key: args.ref_key.as_deref(),
            ref_value: args.ref_value.as_deref(),
        },
        &main.headers,
        &reference.headers,
        prompter.as_mut(),
    )?;
    let key_name = &main.headers[columns.key];
    let target_name = &main.headers[columns.target];
    tracing::info!(
        key = %key_name,
        target = %target_name,
        ref_key = %reference.headers[columns.ref_key],
        ref_value = %reference.headers[columns.ref_value],
        "columns resolved"
    );

    let index = reference_index(&reference, &columns);
    if index.skipped() > 0 {
        tracing::warn!(rows = index.skipped(), "reference rows with an empty key were ignored");
    }
    let rows = main_rows(&main, &columns);
    let plan = plan_fill(&rows, &index, &FillOptions { lookup, overwrite });

    for (row, value) in plan.fills() {
        tracing::info!(cell = %cell_address(row, columns.target), value = %value.display(), "fill");
    }

    if let Some(path) = &args.report {
        write_report(path, &plan)?;
    }

    let summary = &plan.summary;
    let base = json!({
        "main": main_path.display().to_string(),
        "reference": ref_path.display().to_string(),
        "sheet": sheet,
        "columns": {
            "key": key_name,
            "target": target_name,
            "ref_key": reference.headers[columns.ref_key],
            "ref_value": reference.headers[columns.ref_value],
        },
        "scorer": lookup.scorer.as_str(),
        "threshold": lookup.threshold,
        "summary": summary,
    });

    if !plan.is_complete() {
        for (r, reason) in plan.unmatched() {
            eprintln!("row {}: {:?}: {}", r.row + 1, r.key, reason);
        }
        if args.json {
            let mut out = base;
            out["status"] = json!("unmatched");
            out["unmatched"] = json!(unmatched_json(&plan, columns.target));
            println!("{}", out);
        }
        return Err(CliError::unmatched(format!(
            "{} of {} rows have no match in {}; nothing was written",
            summary.unmatched, summary.rows, reference.source
        ))
        .with_hint("lower --threshold, fix the keys, or pass --report PATH to review every row"));
    }

    let patches: Vec<CellPatch> = plan
        .fills()
        .map(|(row, value)| CellPatch { row, col: columns.target, value: value.clone() })
        .collect();

    // In place, a run with nothing to fill leaves the file untouched; an
    // explicit --output always gets a workbook.
    let write = !args.dry_run && (!patches.is_empty() || args.output.is_some());
    let written: Option<(PathBuf, PatchReport)> = if !write {
        None
    } else {
        let dest = args.output.clone().unwrap_or_else(|| main_path.clone());
        if !unhide {
            log_hidden_sheet(&main_path, &sheet);
        }
        let report = patch_workbook(&main_path, &dest, &sheet, &patches, &PatchOptions { unhide })?;
        Some((dest, report))
    };

    if args.json {
        let mut out = base;
        out["status"] = json!(match (&written, args.dry_run) {
            (Some((_, report)), _) if report.cells_written() > 0 => "filled",
            (None, true) => "dry_run",
            _ => "unchanged",
        });
        out["fills"] = json!(fills_json(&plan, columns.target));
        if let Some((dest, report)) = &written {
            out["output"] = json!(dest.display().to_string());
            out["patch"] = json!(report);
        }
        println!("{}", out);
    }

    if !quiet {
        let label = format!("{}!{} ({})", main_path.display(), sheet, target_name);
        match &written {
            Some((dest, report)) => {
                if report.cells_written() == 0 {
                    eprintln!("Nothing to fill in {}", label);
                } else {
                    eprintln!("Filled {} cells in {}", report.cells_written(), label);
                }
                if dest != &main_path {
                    eprintln!("  written to {}", dest.display());
                }
                if report.unhidden {
                    eprintln!("  sheet {:?} is now visible", sheet);
                }
            }
            None if args.dry_run => {
                eprintln!("Dry run: would fill {} cells in {}", summary.filled, label)
            }
            None => eprintln!("Nothing to fill in {}", label),
        }
        eprintln!(
            "  rows {}, kept {}, filled {}, unmatched {}",
            summary.rows, summary.kept, summary.filled, summary.unmatched
        );
    }

    Ok(())
}

/// Hidden sheets stay hidden unless --unhide; say so at info level.
fn log_hidden_sheet(path: &Path, sheet: &str) {
    let Ok(sheets) = list_sheets(path) else { return };
    if let Some(info) = sheets.iter().find(|s| s.name == sheet) {
        if info.visibility != Visibility::Visible {
            tracing::info!(sheet, visibility = info.visibility.as_str(), "sheet stays hidden");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn table(rows: Vec<Vec<CellValue>>, formulas: &[(usize, usize)]) -> Table {
        Table::from_rows(
            Path::new("t.xlsx"),
            Some("Games".into()),
            rows,
            0,
            formulas.iter().copied().collect::<HashSet<_>>(),
        )
        .unwrap()
    }

    const COLUMNS: Columns = Columns { key: 0, target: 1, ref_key: 0, ref_value: 1 };

    #[test]
    fn main_rows_classify_targets() {
        let t = table(
            vec![
                vec![text("Name"), text("Year")],
                vec![text("Tetris"), CellValue::Number(1989.0)],
                vec![text("Doom")],
                vec![text("Quake"), text("  ")],
                vec![text("Total")],
            ],
            &[(4, 1)],
        );
        let rows = main_rows(&t, &COLUMNS);
        let states: Vec<TargetState> = rows.iter().map(|r| r.target).collect();
        assert_eq!(
            states,
            vec![TargetState::Filled, TargetState::Blank, TargetState::Blank, TargetState::Formula]
        );
        assert_eq!(rows[0].current, Some(CellValue::Number(1989.0)));
        assert_eq!(rows[1].row, 2);
    }

    #[test]
    fn reference_blank_values_index_as_none() {
        let t = table(
            vec![
                vec![text("Name"), text("Year")],
                vec![text("Doom"), CellValue::Number(1993.0)],
                vec![text("Myst")],
            ],
            &[],
        );
        let index = reference_index(&t, &COLUMNS);
        assert_eq!(index.len(), 2);
        let ranked = index.ranked("Myst", sheetfill_matcher::Scorer::Ratio, 1);
        assert_eq!(ranked[0].key, "Myst");
        assert!(ranked[0].value.is_none());
    }

    #[test]
    fn csv_main_file_is_rejected() {
        let err = require_patchable(Path::new("master.csv")).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_FORMAT);
        assert!(require_patchable(Path::new("Master.XLSM")).is_ok());
    }
}
