use std::cmp::Ordering;

use crate::error::MatchError;
use crate::score::{process, Scorer};

/// Default minimum score for a lookup to count as a match.
pub const DEFAULT_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupOptions {
    pub scorer: Scorer,
    pub threshold: f64,
}

impl LookupOptions {
    pub fn new(scorer: Scorer, threshold: f64) -> Result<Self, MatchError> {
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(MatchError::InvalidThreshold(threshold));
        }
        Ok(Self { scorer, threshold })
    }
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            scorer: Scorer::default(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug)]
struct Entry<V> {
    key: String,
    processed: String,
    value: Option<V>,
    row: usize,
}

/// A reference key scored against a query.
#[derive(Debug)]
pub struct Candidate<'a, V> {
    pub key: &'a str,
    /// `None` when the reference row has a blank value cell.
    pub value: Option<&'a V>,
    pub score: f64,
    pub row: usize,
}

fn candidate<V>(entry: &Entry<V>, score: f64) -> Candidate<'_, V> {
    Candidate {
        key: &entry.key,
        value: entry.value.as_ref(),
        score,
        row: entry.row,
    }
}

#[derive(Debug)]
pub enum LookupOutcome<'a, V> {
    /// Best candidate met the threshold.
    Matched(Candidate<'a, V>),
    /// Best candidate scored below the threshold.
    BelowThreshold(Candidate<'a, V>),
    /// Index holds no keys.
    Empty,
}

impl<'a, V> LookupOutcome<'a, V> {
    pub fn matched(&self) -> Option<&Candidate<'a, V>> {
        match self {
            Self::Matched(c) => Some(c),
            _ => None,
        }
    }
}

/// Reference table keyed for fuzzy lookup.
///
/// Entries keep their insertion order; on equal scores the earliest entry wins.
#[derive(Debug)]
pub struct ReferenceIndex<V> {
    entries: Vec<Entry<V>>,
    skipped: usize,
}

impl<V> ReferenceIndex<V> {
    /// Build from `(row, key, value)` triples. Keys that normalize to nothing
    /// are skipped.
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (usize, String, Option<V>)>,
    {
        let mut entries = Vec::new();
        let mut skipped = 0;
        for (row, key, value) in records {
            let processed = process(&key);
            if processed.is_empty() {
                skipped += 1;
                continue;
            }
            entries.push(Entry { key, processed, value, row });
        }
        Self { entries, skipped }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of records dropped for having an empty key.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn score_entry(query: &str, entry: &Entry<V>, scorer: Scorer) -> f64 {
        if entry.processed == query {
            100.0
        } else {
            scorer.score(query, &entry.processed)
        }
    }

    /// Find the single best reference key for `key`.
    ///
    /// A reference key equal to `key` after normalization always wins, even
    /// when an earlier key also scores 100 (token-set and partial give 100 to
    /// any subset or substring).
    pub fn lookup(&self, key: &str, options: &LookupOptions) -> LookupOutcome<'_, V> {
        let query = process(key);
        if let Some(exact) = self.entries.iter().find(|e| e.processed == query) {
            return LookupOutcome::Matched(candidate(exact, 100.0));
        }

        let mut best: Option<(&Entry<V>, f64)> = None;
        for entry in &self.entries {
            let score = options.scorer.score(&query, &entry.processed);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((entry, score));
            }
        }

        match best {
            None => LookupOutcome::Empty,
            Some((entry, score)) if score >= options.threshold => {
                LookupOutcome::Matched(candidate(entry, score))
            }
            Some((entry, score)) => LookupOutcome::BelowThreshold(candidate(entry, score)),
        }
    }

    /// Top `limit` candidates by descending score, ties in reference order.
    /// Exact keys come before fuzzy keys with the same score.
    pub fn ranked(&self, key: &str, scorer: Scorer, limit: usize) -> Vec<Candidate<'_, V>> {
        let query = process(key);
        let mut scored: Vec<(bool, Candidate<'_, V>)> = self
            .entries
            .iter()
            .map(|entry| {
                let exact = entry.processed == query;
                (exact, candidate(entry, Self::score_entry(&query, entry, scorer)))
            })
            .collect();
        scored.sort_by(|(ea, a), (eb, b)| {
            eb.cmp(ea)
                .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
        });
        scored.truncate(limit);
        scored.into_iter().map(|(_, c)| c).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(rows: &[(&str, Option<&str>)]) -> ReferenceIndex<String> {
        ReferenceIndex::build(
            rows.iter()
                .enumerate()
                .map(|(i, (k, v))| (i + 1, k.to_string(), v.map(str::to_string))),
        )
    }

    fn value<'a>(out: &LookupOutcome<'a, String>) -> Option<&'a str> {
        out.matched().and_then(|c| c.value).map(String::as_str)
    }

    #[test]
    fn exact_match_case_insensitive() {
        let idx = index(&[("Tetris", Some("1984")), ("Doom", Some("1993"))]);
        let out = idx.lookup("DOOM", &LookupOptions::default());
        let c = out.matched().unwrap();
        assert_eq!(c.key, "Doom");
        assert_eq!(c.score, 100.0);
        assert_eq!(c.row, 2);
        assert_eq!(value(&out), Some("1993"));
    }

    #[test]
    fn near_match_above_threshold() {
        let idx = index(&[("Halo 3: ODST", Some("2009")), ("Fable", Some("2004"))]);
        let out = idx.lookup("Halo 3", &LookupOptions::default());
        assert_eq!(value(&out), Some("2009"));
    }

    #[test]
    fn below_threshold_reports_best() {
        let idx = index(&[("Gran Turismo", Some("1997"))]);
        match idx.lookup("The Sims", &LookupOptions::default()) {
            LookupOutcome::BelowThreshold(c) => {
                assert_eq!(c.key, "Gran Turismo");
                assert!(c.score < DEFAULT_THRESHOLD);
            }
            other => panic!("expected BelowThreshold, got {other:?}"),
        }
    }

    #[test]
    fn empty_index_is_no_match() {
        let idx: ReferenceIndex<String> = index(&[]);
        assert!(matches!(
            idx.lookup("anything", &LookupOptions::default()),
            LookupOutcome::Empty
        ));
    }

    #[test]
    fn blank_keys_are_skipped() {
        let idx = index(&[("", Some("x")), ("  ", Some("y")), ("Quake", Some("1996"))]);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.skipped(), 2);
    }

    #[test]
    fn ties_go_to_first_reference_row() {
        let idx = index(&[("Doom", Some("1993")), ("doom", Some("2016"))]);
        let out = idx.lookup("Doom", &LookupOptions::default());
        assert_eq!(value(&out), Some("1993"));
    }

    #[test]
    fn blank_value_still_matches_key() {
        let idx = index(&[("Myst", None)]);
        let out = idx.lookup("myst", &LookupOptions::default());
        let c = out.matched().unwrap();
        assert!(c.value.is_none());
    }

    #[test]
    fn threshold_is_inclusive() {
        let idx = index(&[("Doom", Some("1993"))]);
        let opts = LookupOptions::new(Scorer::Ratio, 100.0).unwrap();
        assert!(idx.lookup("doom", &opts).matched().is_some());
    }

    #[test]
    fn threshold_validation() {
        assert!(LookupOptions::new(Scorer::Ratio, 101.0).is_err());
        assert!(LookupOptions::new(Scorer::Ratio, -1.0).is_err());
        assert!(LookupOptions::new(Scorer::Ratio, f64::NAN).is_err());
        assert!(LookupOptions::new(Scorer::Ratio, 0.0).is_ok());
    }

    #[test]
    fn ranked_orders_by_score() {
        let idx = index(&[
            ("Gran Turismo", Some("1997")),
            ("Tetris", Some("1984")),
            ("Tetris Effect", Some("2018")),
        ]);
        let top = idx.ranked("tetris", Scorer::Weighted, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].key, "Tetris");
        assert_eq!(top[1].key, "Tetris Effect");
    }

    #[test]
    fn exact_key_beats_earlier_token_superset() {
        let idx = index(&[("Mario Kart 8 Deluxe", Some("2017")), ("Mario Kart", Some("1992"))]);
        let opts = LookupOptions::new(Scorer::TokenSet, 80.0).unwrap();
        let out = idx.lookup("Mario Kart", &opts);
        let c = out.matched().unwrap();
        assert_eq!(c.key, "Mario Kart");
        assert_eq!(c.row, 2);
        assert_eq!(value(&out), Some("1992"));

        let top = idx.ranked("Mario Kart", Scorer::TokenSet, 2);
        assert_eq!(top[0].key, "Mario Kart");
        assert_eq!(top[1].key, "Mario Kart 8 Deluxe");
    }

    #[test]
    fn exact_key_beats_earlier_substring() {
        let idx = index(&[("Doom Eternal", Some("2020")), ("Doom", Some("1993"))]);
        let opts = LookupOptions::new(Scorer::Partial, 80.0).unwrap();
        let out = idx.lookup("DOOM", &opts);
        assert_eq!(out.matched().unwrap().row, 2);
        assert_eq!(value(&out), Some("1993"));

        let top = idx.ranked("doom", Scorer::Partial, 2);
        assert_eq!(top[0].key, "Doom");
    }

    #[test]
    fn full_fuzzy_score_still_matches_without_exact_key() {
        let idx = index(&[("Gran Turismo", Some("1997")), ("Mario Kart 8 Deluxe", Some("2017"))]);
        let opts = LookupOptions::new(Scorer::TokenSet, 80.0).unwrap();
        let out = idx.lookup("mario kart", &opts);
        assert_eq!(out.matched().unwrap().score, 100.0);
        assert_eq!(value(&out), Some("2017"));
    }
}
