use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum MatchError {
    /// Threshold outside 0..=100 (or not a number).
    InvalidThreshold(f64),
    /// Scorer name not recognised.
    UnknownScorer(String),
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidThreshold(t) => {
                write!(f, "threshold must be between 0 and 100, got {t}")
            }
            Self::UnknownScorer(name) => write!(f, "unknown scorer: {name}"),
        }
    }
}

impl std::error::Error for MatchError {}
