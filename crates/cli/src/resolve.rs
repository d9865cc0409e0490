//! File discovery and column resolution for `sheetfill fill`.
//!
//! Everything that is not passed as a flag is either inferred from the files
//! or, with `--interactive`, asked for on stderr/stdin.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use sheetfill_io::cell_ref::col_to_letter;
use sheetfill_io::SourceFormat;

use crate::CliError;

/// Convert a `--delimiter` char to the byte the CSV reader wants.
pub(crate) fn delimiter_byte(c: Option<char>) -> Result<Option<u8>, CliError> {
    match c {
        None => Ok(None),
        Some(c) if c.is_ascii() => Ok(Some(c as u8)),
        Some(c) => Err(CliError::args(format!("delimiter must be a single ASCII character, got {:?}", c))),
    }
}

/// Resolve a column reference: header name (case-insensitive), column letter, or
/// 1-based column number.
pub(crate) fn resolve_column(given: &str, headers: &[String]) -> Result<usize, CliError> {
    let given = given.trim();

    // Try by name first (case-insensitive)
    if let Some(i) = find_header(headers, given) {
        return Ok(i);
    }

    // Try as column letter (A=0, B=1, ...)
    if let Some(idx) = sheetfill_io::cell_ref::letter_to_col(given) {
        if idx < headers.len() {
            return Ok(idx);
        }
    }

    // Try as 1-indexed number
    if let Ok(n) = given.parse::<usize>() {
        if n >= 1 && n <= headers.len() {
            return Ok(n - 1);
        }
    }

    Err(CliError::args(format!("unknown column: {:?}", given))
        .with_hint(format!("available columns: {}", describe_columns(headers))))
}

/// Index of the header equal to `name`, ignoring case and surrounding space.
pub(crate) fn find_header(headers: &[String], name: &str) -> Option<usize> {
    let wanted = name.trim().to_lowercase();
    headers.iter().position(|h| h.trim().to_lowercase() == wanted)
}

pub(crate) fn describe_columns(headers: &[String]) -> String {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{} ({})", h, col_to_letter(i)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Asks questions on `output` and reads answers from `input`.
pub(crate) struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> Result<Option<String>, CliError> {
        write!(self.output, "{}", question).map_err(|e| CliError::io(e.to_string()))?;
        self.output.flush().map_err(|e| CliError::io(e.to_string()))?;
        let mut line = String::new();
        let n = self
            .input
            .read_line(&mut line)
            .map_err(|e| CliError::io(e.to_string()))?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&mut self, line: &str) -> Result<(), CliError> {
        writeln!(self.output, "{}", line).map_err(|e| CliError::io(e.to_string()))
    }

    /// Pick one of several files by number.
    pub(crate) fn choose_file(&mut self, label: &str, candidates: &[PathBuf]) -> Result<PathBuf, CliError> {
        self.say(&format!("Several {} candidates:", label))?;
        for (i, path) in candidates.iter().enumerate() {
            self.say(&format!("  {}) {}", i + 1, path.display()))?;
        }
        loop {
            let question = format!("{} [1-{}]: ", label, candidates.len());
            let Some(answer) = self.ask(&question)? else {
                return Err(CliError::args(format!("no {} selected", label)));
            };
            match answer.parse::<usize>() {
                Ok(n) if n >= 1 && n <= candidates.len() => return Ok(candidates[n - 1].clone()),
                _ => self.say(&format!("  enter a number between 1 and {}", candidates.len()))?,
            }
        }
    }

    /// Pick a column by name, letter or number. An empty answer takes `default`.
    pub(crate) fn choose_column(
        &mut self,
        label: &str,
        headers: &[String],
        default: Option<usize>,
    ) -> Result<usize, CliError> {
        self.say(&format!("Columns for {}:", label))?;
        for (i, h) in headers.iter().enumerate() {
            self.say(&format!("  {:<3} {}", col_to_letter(i), h))?;
        }
        let question = match default {
            Some(d) => format!("{} [{}]: ", label, headers[d]),
            None => format!("{}: ", label),
        };
        loop {
            let Some(answer) = self.ask(&question)? else {
                return Err(CliError::args(format!("no {} selected", label)));
            };
            if answer.is_empty() {
                match default {
                    Some(d) => return Ok(d),
                    None => continue,
                }
            }
            match resolve_column(&answer, headers) {
                Ok(i) => return Ok(i),
                Err(e) => self.say(&format!("  {}", e.message))?,
            }
        }
    }
}

fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"))
}

/// Supported table files directly inside `dir`, sorted by name.
fn list_candidates(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    if !dir.is_dir() {
        return Err(CliError::io(format!("directory not found: {}", dir.display())));
    }
    let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let entries =
        glob::glob(&pattern).map_err(|e| CliError::args(format!("invalid --dir: {}", e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file() && !is_lock_file(p))
        .filter(|p| SourceFormat::from_path(p).is_ok())
        .collect();
    files.sort();
    Ok(files)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn pick<R: BufRead, W: Write>(
    label: &str,
    mut candidates: Vec<PathBuf>,
    dir: &Path,
    prompter: Option<&mut Prompter<R, W>>,
) -> Result<PathBuf, CliError> {
    if candidates.len() > 1 {
        return match prompter {
            Some(p) => p.choose_file(label, &candidates),
            None => {
                let names: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
                Err(CliError::args(format!(
                    "found {} {} candidates in {}",
                    candidates.len(),
                    label,
                    dir.display()
                ))
                .with_hint(format!(
                    "pass the file explicitly or use --interactive: {}",
                    names.join(", ")
                )))
            }
        };
    }
    candidates.pop().ok_or_else(|| {
        CliError::io(format!("no {} found in {}", label, dir.display()))
            .with_hint("pass the file path explicitly or point --dir at it")
    })
}

/// Resolve the main workbook and reference table paths.
///
/// Missing positionals are discovered in `dir`: the main file is the single
/// xlsx/xlsm, the reference the single other table file (delimited text
/// preferred over workbooks).
pub(crate) fn discover_files<R: BufRead, W: Write>(
    dir: &Path,
    main: Option<PathBuf>,
    reference: Option<PathBuf>,
    mut prompter: Option<&mut Prompter<R, W>>,
) -> Result<(PathBuf, PathBuf), CliError> {
    if let (Some(main), Some(reference)) = (&main, &reference) {
        return Ok((main.clone(), reference.clone()));
    }

    let files = list_candidates(dir)?;
    tracing::debug!(dir = %dir.display(), candidates = files.len(), "discovering input files");

    let main = match main {
        Some(main) => main,
        None => {
            let workbooks: Vec<PathBuf> = files
                .iter()
                .filter(|p| matches!(SourceFormat::from_path(p), Ok(SourceFormat::Xlsx)))
                .filter(|p| reference.as_deref().is_none_or(|r| !same_file(p, r)))
                .cloned()
                .collect();
            pick("main workbook (.xlsx/.xlsm)", workbooks, dir, prompter.as_deref_mut())?
        }
    };

    let reference = match reference {
        Some(reference) => reference,
        None => {
            let others: Vec<PathBuf> = files
                .into_iter()
                .filter(|p| !same_file(p, &main))
                .collect();
            let delimited: Vec<PathBuf> = others
                .iter()
                .filter(|p| {
                    matches!(
                        SourceFormat::from_path(p),
                        Ok(SourceFormat::Csv | SourceFormat::Tsv)
                    )
                })
                .cloned()
                .collect();
            let candidates = if delimited.is_empty() { others } else { delimited };
            pick("reference table", candidates, dir, prompter.as_deref_mut())?
        }
    };

    Ok((main, reference))
}

/// Column flags as given on the command line.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ColumnFlags<'a> {
    pub key: Option<&'a str>,
    pub target: Option<&'a str>,
    pub ref_key: Option<&'a str>,
    pub ref_value: Option<&'a str>,
}

/// Resolved 0-based column indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Columns {
    pub key: usize,
    pub target: usize,
    pub ref_key: usize,
    pub ref_value: usize,
}

fn column<R: BufRead, W: Write>(
    label: &str,
    given: Option<&str>,
    headers: &[String],
    default: Option<usize>,
    prompter: Option<&mut Prompter<R, W>>,
) -> Result<Option<usize>, CliError> {
    match (given, prompter) {
        (Some(given), _) => resolve_column(given, headers).map(Some),
        (None, Some(p)) => p.choose_column(label, headers, default).map(Some),
        (None, None) => Ok(default),
    }
}

/// Resolve the four columns from flags, prompts, or positional defaults.
pub(crate) fn resolve_columns<R: BufRead, W: Write>(
    flags: ColumnFlags<'_>,
    main_headers: &[String],
    ref_headers: &[String],
    mut prompter: Option<&mut Prompter<R, W>>,
) -> Result<Columns, CliError> {
    let key = column("key column", flags.key, main_headers, Some(0), prompter.as_deref_mut())?
        .unwrap_or(0);

    // First main header, other than the key, that the reference also has
    let shared_target = main_headers
        .iter()
        .enumerate()
        .find(|(i, h)| *i != key && find_header(ref_headers, h).is_some())
        .map(|(i, _)| i);
    let target = column("target column", flags.target, main_headers, shared_target, prompter.as_deref_mut())?
        .ok_or_else(|| {
            CliError::args("cannot infer the target column: no main header also appears in the reference")
                .with_hint(format!("pass --target; main columns: {}", describe_columns(main_headers)))
        })?;
    if target == key {
        return Err(CliError::args(format!(
            "key and target are the same column ({})",
            main_headers[key]
        )));
    }

    let same_key = find_header(ref_headers, &main_headers[key]).or(Some(0));
    let ref_key = column("reference key column", flags.ref_key, ref_headers, same_key, prompter.as_deref_mut())?
        .unwrap_or(0);

    let same_value = find_header(ref_headers, &main_headers[target]).filter(|&i| i != ref_key);
    let ref_value = column("reference value column", flags.ref_value, ref_headers, same_value, prompter.as_deref_mut())?
        .ok_or_else(|| {
            CliError::args(format!(
                "cannot infer the reference value column: reference has no {:?} column",
                main_headers[target]
            ))
            .with_hint(format!("pass --ref-value; reference columns: {}", describe_columns(ref_headers)))
        })?;
    if ref_value == ref_key {
        return Err(CliError::args(format!(
            "reference key and value are the same column ({})",
            ref_headers[ref_key]
        )));
    }

    Ok(Columns { key, target, ref_key, ref_value })
}
