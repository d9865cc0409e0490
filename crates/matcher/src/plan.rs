//! Fill planning: decide, per main-table row, whether the target cell is kept,
//! filled from the reference index, or left unmatched.
//!
//! Planning never mutates anything. A plan with any unmatched row is
//! incomplete and must not be written.

use std::fmt;

use serde::Serialize;

use crate::index::{LookupOptions, LookupOutcome, ReferenceIndex};
use crate::score::process;

/// State of the target cell before filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    Blank,
    Filled,
    /// Computed cell; never overwritten.
    Formula,
}

/// One data row of the main table.
#[derive(Debug, Clone)]
pub struct MainRow<V> {
    /// Absolute 0-based sheet row.
    pub row: usize,
    pub key: String,
    pub target: TargetState,
    /// Current target value when `target` is `Filled`.
    pub current: Option<V>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FillOptions {
    pub lookup: LookupOptions,
    /// Refill targets that already hold a value.
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnmatchedReason {
    EmptyKey,
    NoCandidates,
    BelowThreshold { best_key: String, score: f64 },
    EmptyReferenceValue { matched_key: String, score: f64 },
}

impl UnmatchedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyKey => "empty_key",
            Self::NoCandidates => "no_candidates",
            Self::BelowThreshold { .. } => "below_threshold",
            Self::EmptyReferenceValue { .. } => "empty_reference_value",
        }
    }
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "key cell is empty"),
            Self::NoCandidates => write!(f, "reference has no keys"),
            Self::BelowThreshold { best_key, score } => {
                write!(f, "best candidate {best_key:?} scored {score:.1}")
            }
            Self::EmptyReferenceValue { matched_key, score } => {
                write!(f, "matched {matched_key:?} ({score:.1}) but its value is empty")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowAction<V> {
    Keep,
    Fill {
        value: V,
        matched_key: String,
        score: f64,
        reference_row: usize,
    },
    Unmatched(UnmatchedReason),
}

#[derive(Debug, Clone)]
pub struct PlannedRow<V> {
    pub row: usize,
    pub key: String,
    pub action: RowAction<V>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillSummary {
    pub rows: usize,
    pub kept: usize,
    pub filled: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone)]
pub struct FillPlan<V> {
    pub rows: Vec<PlannedRow<V>>,
    pub summary: FillSummary,
}

impl<V> FillPlan<V> {
    /// True when every row that needs a value has one.
    pub fn is_complete(&self) -> bool {
        self.summary.unmatched == 0
    }

    /// `(row, value)` for every cell to write.
    pub fn fills(&self) -> impl Iterator<Item = (usize, &V)> {
        self.rows.iter().filter_map(|r| match &r.action {
            RowAction::Fill { value, .. } => Some((r.row, value)),
            _ => None,
        })
    }

    pub fn unmatched(&self) -> impl Iterator<Item = (&PlannedRow<V>, &UnmatchedReason)> {
        self.rows.iter().filter_map(|r| match &r.action {
            RowAction::Unmatched(reason) => Some((r, reason)),
            _ => None,
        })
    }
}

fn plan_row<V: Clone + PartialEq>(
    row: &MainRow<V>,
    index: &ReferenceIndex<V>,
    options: &FillOptions,
) -> RowAction<V> {
    let needs_value = match row.target {
        TargetState::Formula => return RowAction::Keep,
        TargetState::Filled if !options.overwrite => return RowAction::Keep,
        TargetState::Filled => false,
        TargetState::Blank => true,
    };

    // Filled rows under --overwrite keep their value when nothing better is found
    let unmatched = |reason: UnmatchedReason| {
        if needs_value {
            RowAction::Unmatched(reason)
        } else {
            RowAction::Keep
        }
    };

    // Punctuation-only keys normalize to nothing and would match arbitrarily
    if process(&row.key).is_empty() {
        return unmatched(UnmatchedReason::EmptyKey);
    }

    match index.lookup(&row.key, &options.lookup) {
        LookupOutcome::Matched(c) => match c.value {
            Some(v) if row.current.as_ref() == Some(v) => RowAction::Keep,
            Some(v) => RowAction::Fill {
                value: v.clone(),
                matched_key: c.key.to_string(),
                score: c.score,
                reference_row: c.row,
            },
            None => unmatched(UnmatchedReason::EmptyReferenceValue {
                matched_key: c.key.to_string(),
                score: c.score,
            }),
        },
        LookupOutcome::BelowThreshold(c) => unmatched(UnmatchedReason::BelowThreshold {
            best_key: c.key.to_string(),
            score: c.score,
        }),
        LookupOutcome::Empty => unmatched(UnmatchedReason::NoCandidates),
    }
}

/// Plan the fill for every main row against the reference index.
pub fn plan_fill<V: Clone + PartialEq>(
    rows: &[MainRow<V>],
    index: &ReferenceIndex<V>,
    options: &FillOptions,
) -> FillPlan<V> {
    let mut summary = FillSummary {
        rows: rows.len(),
        ..Default::default()
    };

    let planned = rows
        .iter()
        .map(|row| {
            let action = plan_row(row, index, options);
            match action {
                RowAction::Keep => summary.kept += 1,
                RowAction::Fill { .. } => summary.filled += 1,
                RowAction::Unmatched(_) => summary.unmatched += 1,
            }
            PlannedRow {
                row: row.row,
                key: row.key.clone(),
                action,
            }
        })
        .collect();

    FillPlan {
        rows: planned,
        summary,
    }
}
