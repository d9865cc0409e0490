// sheetfill - fill missing spreadsheet values from a reference table

mod columns;
mod exit_codes;
mod fill;
mod lookup;
mod report;
mod resolve;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use sheetfill_config::{LogSettings, Settings, SettingsError};
use sheetfill_io::{PatchError, TableError};
use sheetfill_matcher::{LookupOptions, MatchError, Scorer};

use exit_codes::{
    code_name, EXIT_FORMAT, EXIT_IO, EXIT_PARSE, EXIT_SUCCESS, EXIT_UNMATCHED,
    EXIT_USAGE, EXIT_WRITE,
};

/// Environment variable holding a tracing filter, e.g. `sheetfill=debug`.
const LOG_ENV: &str = "SHEETFILL_LOG";

#[derive(Parser)]
#[command(name = "sheetfill")]
#[command(about = "Fill missing values in a spreadsheet column by fuzzy-matching a reference table")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More diagnostics on stderr (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only errors on stderr
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Settings file (default: <config dir>/sheetfill/settings.toml)
    #[arg(long, global = true, env = "SHEETFILL_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill blank cells of a target column from a reference table
    #[command(after_help = "\
Examples:
  sheetfill fill Master_List.xlsx Video_Games.csv
  sheetfill fill --key Name --target Year --ref-value Year_of_Release
  sheetfill fill master.xlsx ref.xlsx --ref-sheet Prices --threshold 90 --dry-run
  sheetfill fill -i --dir ~/Downloads/inventory")]
    Fill(FillArgs),

    /// Show the best reference candidates for one key
    #[command(after_help = "\
Examples:
  sheetfill lookup Video_Games.csv 'zelda ocarina'
  sheetfill lookup Video_Games.csv 'Mario Kart 8' --ref-value Year --top 3 --json")]
    Lookup(LookupArgs),

    /// List the columns (and sheets) of a table file
    Columns(ColumnsArgs),
}

/// Options shared by every command that reads the reference table.
#[derive(Args, Clone)]
pub(crate) struct MatchArgs {
    /// Minimum score 0-100 for a match (default 80, or settings)
    #[arg(long)]
    threshold: Option<f64>,

    /// Similarity scorer: weighted, ratio, token-sort, token-set, partial, jaro-winkler
    #[arg(long)]
    scorer: Option<Scorer>,

    /// Reference CSV delimiter (default: sniffed)
    #[arg(long)]
    delimiter: Option<char>,
}

impl MatchArgs {
    /// Flags first, then the settings file.
    pub(crate) fn lookup_options(&self, settings: &Settings) -> Result<LookupOptions, CliError> {
        let scorer = match self.scorer {
            Some(scorer) => scorer,
            None => settings.matching.scorer.parse::<Scorer>()?,
        };
        let threshold = self.threshold.unwrap_or(settings.matching.threshold);
        Ok(LookupOptions::new(scorer, threshold)?)
    }
}

#[derive(Args)]
pub(crate) struct FillArgs {
    /// Workbook to fill (.xlsx/.xlsm). Discovered in --dir when omitted.
    main: Option<PathBuf>,

    /// Reference table (.csv/.tsv/.txt or a workbook). Discovered in --dir when omitted.
    reference: Option<PathBuf>,

    /// Match key column in the main sheet (name, letter or 1-based number)
    #[arg(long)]
    key: Option<String>,

    /// Column to fill in the main sheet
    #[arg(long)]
    target: Option<String>,

    /// Key column in the reference
    #[arg(long)]
    ref_key: Option<String>,

    /// Value column in the reference
    #[arg(long)]
    ref_value: Option<String>,

    /// Main sheet (default: sheet named like the file, else the first)
    #[arg(long)]
    sheet: Option<String>,

    /// Reference sheet for workbooks (default: sheet named like the file, else the first)
    #[arg(long)]
    ref_sheet: Option<String>,

    /// Main header row, 1-based
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    header_row: u32,

    /// Reference header row, 1-based
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    ref_header_row: u32,

    #[command(flatten)]
    matching: MatchArgs,

    /// Also refill target cells that already hold a value
    #[arg(long)]
    overwrite: bool,

    /// Make the filled sheet visible when saving
    #[arg(long)]
    unhide: bool,

    /// Plan and report, never write
    #[arg(long)]
    dry_run: bool,

    /// Write the filled workbook here instead of in place
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,

    /// Write a per-row CSV report
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Directory to discover files in
    #[arg(long, default_value = ".", value_name = "PATH")]
    dir: PathBuf,

    /// Prompt for files and columns that were not given
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Machine-readable summary on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub(crate) struct LookupArgs {
    /// Reference table
    reference: PathBuf,

    /// Key to look up
    key: String,

    /// Key column in the reference (default: first)
    #[arg(long)]
    ref_key: Option<String>,

    /// Value column to show (default: second, when present)
    #[arg(long)]
    ref_value: Option<String>,

    /// Reference sheet for workbooks
    #[arg(long)]
    ref_sheet: Option<String>,

    /// Reference header row, 1-based
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    ref_header_row: u32,

    #[command(flatten)]
    matching: MatchArgs,

    /// Number of candidates to show
    #[arg(long, default_value_t = 5)]
    top: usize,

    /// Machine-readable output on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub(crate) struct ColumnsArgs {
    /// Table file
    file: PathBuf,

    /// Sheet for workbooks (default: sheet named like the file, else the first)
    #[arg(long)]
    sheet: Option<String>,

    /// Header row, 1-based
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    header_row: u32,

    /// CSV delimiter (default: sniffed)
    #[arg(long)]
    delimiter: Option<char>,

    /// Machine-readable output on stdout
    #[arg(long)]
    json: bool,
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

/// Tracing filter: SHEETFILL_LOG, else -v/-q, else the settings file.
fn log_filter(verbose: u8, quiet: bool, settings: &LogSettings) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;

    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return filter;
    }
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => settings.level.as_str(),
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn init_logging(verbose: u8, quiet: bool, settings: &LogSettings) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, quiet, settings))
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::resolve(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => return report_error(CliError::from(e), false),
    };
    init_logging(cli.verbose, cli.quiet, &settings.log);
    tracing::debug!(?settings, "settings resolved");

    let (result, json) = match cli.command {
        Commands::Fill(args) => {
            let json = args.json;
            (fill::cmd_fill(args, &settings, cli.quiet), json)
        }
        Commands::Lookup(args) => {
            let json = args.json;
            (lookup::cmd_lookup(args, &settings), json)
        }
        Commands::Columns(args) => {
            let json = args.json;
            (columns::cmd_columns(args), json)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(err) => report_error(err, json),
    }
}

fn report_error(err: CliError, json: bool) -> ExitCode {
    let CliError { code, message, hint } = err;
    if json && code != EXIT_UNMATCHED {
        // Commands that fail before producing output still emit one JSON value
        let value = serde_json::json!({
            "status": "error",
            "error": code_name(code),
            "message": message,
            "hint": hint,
            "exit_code": code,
        });
        println!("{}", value);
    }
    if !message.is_empty() {
        eprintln!("error: {}", message);
    }
    if let Some(hint) = hint {
        eprintln!("hint:  {}", hint);
    }
    ExitCode::from(code)
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self { code: EXIT_FORMAT, message: msg.into(), hint: None }
    }

    pub fn unmatched(msg: impl Into<String>) -> Self {
        Self { code: EXIT_UNMATCHED, message: msg.into(), hint: None }
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self { code: EXIT_WRITE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<TableError> for CliError {
    fn from(err: TableError) -> Self {
        let message = err.to_string();
        match err {
            TableError::NotFound(_) | TableError::Read { .. } => Self::io(message),
            TableError::UnsupportedFormat { .. } => Self::format(message)
                .with_hint("supported: csv, tsv, txt, xlsx, xlsm, xls, xlsb, ods"),
            TableError::SheetNotFound { available, .. } => {
                Self::args(message).with_hint(format!("available sheets: {}", available.join(", ")))
            }
            TableError::HeaderRowOutOfRange { .. } => {
                Self::parse(message).with_hint("check --header-row / --ref-header-row")
            }
            TableError::Parse { .. } | TableError::NoSheets(_) => Self::parse(message),
        }
    }
}

impl From<PatchError> for CliError {
    fn from(err: PatchError) -> Self {
        let message = err.to_string();
        match err {
            PatchError::Read { .. } => Self::io(message),
            PatchError::Package(_) | PatchError::Xml(_) => Self::parse(message),
            PatchError::SheetNotFound(_) => Self::args(message),
            PatchError::Write { .. } => Self::write(message)
                .with_hint("the original file was not modified"),
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::args(err.to_string())
    }
}

impl From<MatchError> for CliError {
    fn from(err: MatchError) -> Self {
        let hint = match &err {
            MatchError::UnknownScorer(_) => {
                let names: Vec<&str> = Scorer::ALL.iter().map(|s| s.as_str()).collect();
                format!("available scorers: {}", names.join(", "))
            }
            MatchError::InvalidThreshold(_) => {
                "pass --threshold between 0 and 100 or fix [match] threshold in settings".to_string()
            }
        };
        Self::args(err.to_string()).with_hint(hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fill_flags_parse() {
        let cli = Cli::try_parse_from([
            "sheetfill", "fill", "m.xlsx", "r.csv", "--key", "Name", "--target", "C",
            "--threshold", "90", "--scorer", "token_set", "--dry-run", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Fill(args) = cli.command else { panic!("expected fill") };
        assert_eq!(args.main, Some(PathBuf::from("m.xlsx")));
        assert_eq!(args.key.as_deref(), Some("Name"));
        assert_eq!(args.matching.threshold, Some(90.0));
        assert_eq!(args.matching.scorer, Some(Scorer::TokenSet));
        assert!(args.dry_run);
        assert_eq!(args.header_row, 1);
    }

    #[test]
    fn header_row_zero_is_rejected() {
        assert!(Cli::try_parse_from(["sheetfill", "fill", "--header-row", "0"]).is_err());
    }

    #[test]
    fn unknown_scorer_is_rejected() {
        assert!(Cli::try_parse_from(["sheetfill", "lookup", "r.csv", "x", "--scorer", "soundex"]).is_err());
    }

    #[test]
    fn table_errors_map_to_exit_codes() {
        let missing = CliError::from(TableError::NotFound(PathBuf::from("x.csv")));
        assert_eq!(missing.code, EXIT_IO);

        let sheet = CliError::from(TableError::SheetNotFound {
            path: PathBuf::from("m.xlsx"),
            sheet: "Games".into(),
            available: vec!["Sheet1".into(), "Sheet2".into()],
        });
        assert_eq!(sheet.code, EXIT_USAGE);
        assert_eq!(sheet.hint.as_deref(), Some("available sheets: Sheet1, Sheet2"));

        let format = CliError::from(TableError::UnsupportedFormat {
            path: PathBuf::from("m.pdf"),
            extension: "pdf".into(),
        });
        assert_eq!(format.code, EXIT_FORMAT);
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::try_parse_from(["sheetfill", "lookup", "r.csv", "x", "--threshold", "95"]).unwrap();
        let Commands::Lookup(args) = cli.command else { panic!("expected lookup") };
        let mut settings = Settings::default();
        settings.matching.scorer = "token_sort".into();
        let options = args.matching.lookup_options(&settings).unwrap();
        assert_eq!(options.threshold, 95.0);
        assert_eq!(options.scorer, Scorer::TokenSort);

        settings.matching.scorer = "soundex".into();
        let err = args.matching.lookup_options(&settings).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
        assert!(err.hint.unwrap().starts_with("available scorers: "));
    }

    #[test]
    fn log_level_precedence() {
        let settings = LogSettings { level: "info".into() };
        // Only meaningful when SHEETFILL_LOG is unset in the test environment
        if std::env::var_os(LOG_ENV).is_none() {
            assert_eq!(log_filter(0, false, &settings).to_string(), "info");
            assert_eq!(log_filter(1, false, &settings).to_string(), "debug");
            assert_eq!(log_filter(3, false, &settings).to_string(), "trace");
            assert_eq!(log_filter(0, true, &settings).to_string(), "error");
        }
    }
}
