//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success (including "nothing to fill")                          |
//! | 1    | General error (unspecified)                                    |
//! | 2    | Usage: bad args, unknown column, ambiguous discovery           |
//! | 3    | File not found or unreadable                                   |
//! | 4    | Parse error: corrupt workbook, bad CSV, empty table            |
//! | 5    | Unsupported format                                             |
//! | 6    | Unmatched rows: fill aborted, nothing written                  |
//! | 7    | Write failure                                                  |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown column or sheet, ambiguous file
/// discovery, invalid settings.
pub const EXIT_USAGE: u8 = 2;

/// Input file missing or unreadable.
pub const EXIT_IO: u8 = 3;

/// Input could not be parsed (corrupt package, malformed CSV, header row
/// past the end, reference without data rows).
pub const EXIT_PARSE: u8 = 4;

/// File extension not supported, or main file is not a patchable workbook.
pub const EXIT_FORMAT: u8 = 5;

/// At least one row needing a value had no match. Nothing was written.
/// `lookup` also uses it when the best candidate is below threshold.
pub const EXIT_UNMATCHED: u8 = 6;

/// Patched workbook could not be written or moved into place.
pub const EXIT_WRITE: u8 = 7;

/// Stable name for a code, used in `--json` error output.
pub fn code_name(code: u8) -> &'static str {
    match code {
        EXIT_SUCCESS => "ok",
        EXIT_ERROR => "error",
        EXIT_USAGE => "usage",
        EXIT_IO => "io",
        EXIT_PARSE => "parse",
        EXIT_FORMAT => "format",
        EXIT_UNMATCHED => "unmatched",
        EXIT_WRITE => "write",
        _ => "unknown",
    }
}
