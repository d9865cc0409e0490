//! String similarity scorers.
//!
//! Every scorer returns a value in `0.0..=100.0` and expects keys that have
//! already been through [`process`]. Empty input always scores 0.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MatchError;

/// Discount applied to token-based scores so a plain edit-distance hit wins ties.
const TOKEN_SCALE: f64 = 0.95;

/// Length ratio above which partial (substring) scores are considered.
const PARTIAL_LEN_RATIO: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scorer {
    /// Best of ratio, token and partial scores, with length-aware weights.
    #[default]
    Weighted,
    /// Normalized Levenshtein similarity.
    Ratio,
    /// Ratio over alphabetically sorted tokens.
    TokenSort,
    /// Ratio over token intersection and differences; subsets score 100.
    TokenSet,
    /// Best ratio of the shorter key against windows of the longer key.
    Partial,
    /// Jaro-Winkler similarity.
    JaroWinkler,
}

impl Scorer {
    pub const ALL: [Scorer; 6] = [
        Scorer::Weighted,
        Scorer::Ratio,
        Scorer::TokenSort,
        Scorer::TokenSet,
        Scorer::Partial,
        Scorer::JaroWinkler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weighted => "weighted",
            Self::Ratio => "ratio",
            Self::TokenSort => "token-sort",
            Self::TokenSet => "token-set",
            Self::Partial => "partial",
            Self::JaroWinkler => "jaro-winkler",
        }
    }

    /// Score two processed keys.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        match self {
            Self::Weighted => weighted(a, b),
            Self::Ratio => ratio(a, b),
            Self::TokenSort => token_sort(a, b),
            Self::TokenSet => token_set(a, b),
            Self::Partial => partial(a, b),
            Self::JaroWinkler => {
                if a.is_empty() || b.is_empty() {
                    0.0
                } else {
                    strsim::jaro_winkler(a, b) * 100.0
                }
            }
        }
    }
}

impl fmt::Display for Scorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scorer {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Scorer::ALL
            .iter()
            .copied()
            .find(|sc| sc.as_str() == wanted)
            .ok_or_else(|| MatchError::UnknownScorer(s.to_string()))
    }
}

/// Normalize a key for comparison: lowercase, non-alphanumerics become
/// single spaces, leading/trailing separators dropped.
pub fn process(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b) * 100.0
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

pub fn token_sort(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn join_parts(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}

pub fn token_set(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let sect: Vec<&str> = ta.intersection(&tb).copied().collect();
    let diff_ab: Vec<&str> = ta.difference(&tb).copied().collect();
    let diff_ba: Vec<&str> = tb.difference(&ta).copied().collect();

    // One side's tokens are contained in the other's
    if !sect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect = sect.join(" ");
    let combined_ab = join_parts(&sect, &diff_ab.join(" "));
    let combined_ba = join_parts(&sect, &diff_ba.join(" "));

    ratio(&sect, &combined_ab)
        .max(ratio(&sect, &combined_ba))
        .max(ratio(&combined_ab, &combined_ba))
}

pub fn partial(a: &str, b: &str) -> f64 {
    let ca: Vec<char> = a.chars().collect();
    let cb: Vec<char> = b.chars().collect();
    let (short, long) = if ca.len() <= cb.len() { (ca, cb) } else { (cb, ca) };

    if short.is_empty() {
        return 0.0;
    }
    if short.len() == long.len() {
        return ratio(a, b);
    }

    let needle: String = short.iter().collect();
    let mut best = 0.0_f64;
    for start in 0..=(long.len() - short.len()) {
        let window: String = long[start..start + short.len()].iter().collect();
        let score = ratio(&needle, &window);
        if score > best {
            best = score;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

pub fn weighted(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let base = ratio(a, b);
    let la = a.chars().count() as f64;
    let lb = b.chars().count() as f64;
    let len_ratio = la.max(lb) / la.min(lb);

    if len_ratio < PARTIAL_LEN_RATIO {
        return base
            .max(token_sort(a, b) * TOKEN_SCALE)
            .max(token_set(a, b) * TOKEN_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    let partial_score = partial(a, b) * partial_scale;
    let token_score = partial(&sorted_tokens(a), &sorted_tokens(b))
        .max(token_set(a, b))
        * TOKEN_SCALE
        * partial_scale;

    base.max(partial_score).max(token_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn process_normalizes_case_and_punctuation() {
        assert_eq!(process("  Halo 3: ODST "), "halo 3 odst");
        assert_eq!(process("Pokémon  Red/Blue"), "pokémon red blue");
        assert_eq!(process("---"), "");
    }

    #[test]
    fn ratio_identical_and_distinct() {
        assert!(approx(ratio("tetris", "tetris"), 100.0));
        assert!(approx(ratio("kitten", "sitting"), 100.0 * (1.0 - 3.0 / 7.0)));
        assert_eq!(ratio("", "abc"), 0.0);
    }

    #[test]
    fn token_sort_ignores_order() {
        assert!(approx(token_sort("world hello", "hello world"), 100.0));
    }

    #[test]
    fn token_set_subset_is_full_score() {
        assert!(approx(token_set("mario kart", "mario kart 8 deluxe"), 100.0));
        assert!(token_set("zelda", "metroid") < 50.0);
    }

    #[test]
    fn partial_finds_substring() {
        assert!(approx(partial("kart", "mario kart 8"), 100.0));
    }

    #[test]
    fn weighted_prefers_exact() {
        assert!(approx(weighted("doom", "doom"), 100.0));
    }

    #[test]
    fn weighted_scales_long_substring_matches() {
        // "mario kart" (10) vs "mario kart 8 deluxe" (19): partial path, 100 * 0.9
        let s = weighted("mario kart", "mario kart 8 deluxe");
        assert!(approx(s, 90.0), "got {s}");
    }

    #[test]
    fn weighted_rejects_unrelated() {
        assert!(weighted("the sims", "gran turismo") < 50.0);
    }

    #[test]
    fn jaro_winkler_scaled() {
        assert!(approx(Scorer::JaroWinkler.score("abc", "abc"), 100.0));
        assert_eq!(Scorer::JaroWinkler.score("", "abc"), 0.0);
    }

    #[test]
    fn scorer_parse_roundtrip() {
        for scorer in Scorer::ALL {
            assert_eq!(scorer.as_str().parse::<Scorer>().unwrap(), scorer);
        }
        assert_eq!("Token_Set".parse::<Scorer>().unwrap(), Scorer::TokenSet);
        assert!("soundex".parse::<Scorer>().is_err());
    }
}
