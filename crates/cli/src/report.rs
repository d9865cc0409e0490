//! Per-row CSV report for `sheetfill fill --report`.

use std::path::Path;

use sheetfill_io::CellValue;
use sheetfill_matcher::{FillPlan, RowAction};

use crate::CliError;

const HEADER: [&str; 7] = ["row", "key", "action", "matched_key", "score", "value", "reason"];

fn record(action: &RowAction<CellValue>) -> [String; 5] {
    match action {
        RowAction::Keep => ["keep".into(), String::new(), String::new(), String::new(), String::new()],
        RowAction::Fill { value, matched_key, score, .. } => [
            "fill".into(),
            matched_key.clone(),
            format!("{:.1}", score),
            value.display(),
            String::new(),
        ],
        RowAction::Unmatched(reason) => [
            "unmatched".into(),
            String::new(),
            String::new(),
            String::new(),
            reason.to_string(),
        ],
    }
}

/// Write one line per planned row. Rows are reported 1-based, as Excel shows them.
pub(crate) fn write_report(path: &Path, plan: &FillPlan<CellValue>) -> Result<(), CliError> {
    let err = |e: csv::Error| CliError::write(format!("{}: {}", path.display(), e));

    let mut writer = csv::Writer::from_path(path).map_err(err)?;
    writer.write_record(HEADER).map_err(err)?;
    for planned in &plan.rows {
        let [action, matched_key, score, value, reason] = record(&planned.action);
        let row = (planned.row + 1).to_string();
        writer
            .write_record([&row, &planned.key, &action, &matched_key, &score, &value, &reason])
            .map_err(err)?;
    }
    writer
        .flush()
        .map_err(|e| CliError::write(format!("{}: {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), rows = plan.rows.len(), "report written");
    Ok(())
}
