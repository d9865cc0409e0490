//! `sheetfill-matcher`: fuzzy key lookup and fill planning.
//!
//! Pure crate: receives pre-loaded keys and values, returns a fill plan.
//! No CLI or IO dependencies.

pub mod error;
pub mod index;
pub mod plan;
pub mod score;

pub use error::MatchError;
pub use index::{Candidate, LookupOptions, LookupOutcome, ReferenceIndex, DEFAULT_THRESHOLD};
pub use plan::{plan_fill, FillOptions, FillPlan, FillSummary, MainRow, PlannedRow, RowAction, TargetState, UnmatchedReason};
pub use score::Scorer;
