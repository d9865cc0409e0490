//! `sheetfill lookup`: score one key against a reference table.

use serde_json::json;
use sheetfill_config::Settings;
use sheetfill_io::{load_table, CellValue, LoadOptions};
use sheetfill_matcher::{Candidate, LookupOutcome, ReferenceIndex};

use crate::resolve::{delimiter_byte, resolve_column};
use crate::util::format_table;
use crate::{CliError, LookupArgs};

const MAX_CELL_WIDTH: usize = 40;

fn candidate_json(c: &Candidate<'_, CellValue>) -> serde_json::Value {
    json!({
        "key": c.key,
        "value": c.value,
        "score": c.score,
        "row": c.row + 1,
    })
}

pub(crate) fn cmd_lookup(args: LookupArgs, settings: &Settings) -> Result<(), CliError> {
    let options = args.matching.lookup_options(settings)?;
    let delimiter = delimiter_byte(args.matching.delimiter)?;

    let table = load_table(
        &args.reference,
        &LoadOptions {
            sheet: args.ref_sheet.clone(),
            header_row: (args.ref_header_row - 1) as usize,
            delimiter,
        },
    )?;
    if table.records.is_empty() {
        return Err(CliError::parse(format!("{}: reference has no data rows", table.source)));
    }

    let ref_key = match &args.ref_key {
        Some(given) => resolve_column(given, &table.headers)?,
        None => 0,
    };
    let ref_value = match &args.ref_value {
        Some(given) => Some(resolve_column(given, &table.headers)?),
        None => (0..table.width()).find(|&c| c != ref_key),
    };

    let index = ReferenceIndex::build(table.records.iter().map(|record| {
        let key = table.value(record, ref_key).display();
        let value = ref_value
            .filter(|&c| !table.is_blank(record, c))
            .map(|c| table.value(record, c).clone());
        (record.row, key, value)
    }));

    let ranked = index.ranked(&args.key, options.scorer, args.top.max(1));
    let outcome = index.lookup(&args.key, &options);
    tracing::debug!(key = %args.key, candidates = index.len(), "lookup");

    if args.json {
        let best = match &outcome {
            LookupOutcome::Matched(c) | LookupOutcome::BelowThreshold(c) => candidate_json(c),
            LookupOutcome::Empty => serde_json::Value::Null,
        };
        let out = json!({
            "key": args.key,
            "reference": table.source,
            "scorer": options.scorer.as_str(),
            "threshold": options.threshold,
            "matched": outcome.matched().is_some(),
            "best": best,
            "candidates": ranked.iter().map(candidate_json).collect::<Vec<_>>(),
        });
        println!("{}", out);
    } else {
        let value_header = ref_value.map(|c| table.headers[c].as_str()).unwrap_or("Value");
        let header = ["Score", "Row", table.headers[ref_key].as_str(), value_header];
        let rows: Vec<Vec<String>> = ranked
            .iter()
            .map(|c| {
                vec![
                    format!("{:.1}", c.score),
                    (c.row + 1).to_string(),
                    c.key.to_string(),
                    c.value.map(CellValue::display).unwrap_or_default(),
                ]
            })
            .collect();
        print!("{}", format_table(&header, &rows, MAX_CELL_WIDTH));
    }

    match outcome {
        LookupOutcome::Matched(c) => {
            if !args.json {
                eprintln!("match: {:?} ({:.1} >= {})", c.key, c.score, options.threshold);
            }
            Ok(())
        }
        LookupOutcome::BelowThreshold(c) => Err(CliError::unmatched(format!(
            "no match for {:?}: best candidate {:?} scored {:.1}, threshold is {}",
            args.key, c.key, c.score, options.threshold
        ))
        .with_hint("lower --threshold or try another --scorer")),
        LookupOutcome::Empty => Err(CliError::unmatched(format!(
            "no match for {:?}: reference has no keys",
            args.key
        ))),
    }
}
