//! Heuristic advisory scorer.
//!
//! Produces a rough [`AdvisoryReport`] for one answer: keyword coverage
//! against the question's hints, a sentence-density fluency score, a
//! pressure estimate derived from fluency, and two warning flags. Nothing
//! here is authoritative; the interviewer's own rating always wins.

use std::collections::HashSet;
use std::sync::LazyLock;

use parking_lot::Mutex;
use regex::Regex;
use rostrum_core::advisory::{AdvisoryFlags, AdvisoryReport, Advisor};
use rostrum_core::questions::Question;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

const SENTENCE_ENDINGS: [char; 6] = ['.', '。', '!', '！', '?', '？'];

/// Characters per expected sentence when judging fluency.
const CHARS_PER_SENTENCE: f64 = 50.0;

const MEMORIZATION_OVERLAP: f64 = 0.7;
const STUFFING_DENSITY: f64 = 0.15;

const DEFAULT_FILLER: &[&str] = &[
    "technical", "technology", "analysis", "analyze", "suggest", "suggestion", "evaluate",
    "evaluation", "compare", "comparison", "impact", "技术", "分析", "建议", "评估", "比较",
    "影响",
];

pub struct HeuristicGrader {
    filler: HashSet<String>,
    // Token sets of earlier answers in the current interview.
    previous: Mutex<Vec<HashSet<String>>>,
}

impl Default for HeuristicGrader {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicGrader {
    pub fn new() -> Self {
        Self::with_filler_terms(DEFAULT_FILLER.iter().copied())
    }

    /// Use a custom list of generic terms for the stuffing check.
    pub fn with_filler_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            filler: terms.into_iter().map(|t| t.as_ref().to_lowercase()).collect(),
            previous: Mutex::new(Vec::new()),
        }
    }

    fn looks_memorized(&self, tokens: &HashSet<String>) -> bool {
        let mut previous = self.previous.lock();
        let hit = previous
            .iter()
            .any(|earlier| overlap(tokens, earlier) > MEMORIZATION_OVERLAP);
        previous.push(tokens.clone());
        hit
    }

    fn filler_density(&self, words: &[String]) -> f64 {
        if words.is_empty() {
            return 0.0;
        }
        let found = words.iter().filter(|w| self.filler.contains(*w)).count();
        found as f64 / words.len() as f64
    }
}

impl Advisor for HeuristicGrader {
    fn score(&self, question: &Question, answer: &str) -> AdvisoryReport {
        let words = tokenize(answer);
        let distinct: HashSet<String> = words.iter().cloned().collect();

        let keyword_coverage = keyword_coverage(&question.keyword_hints, answer);
        let fluency = fluency(answer);
        let pressure = pressure(fluency);
        let flags = AdvisoryFlags {
            possible_memorization: self.looks_memorized(&distinct),
            keyword_stuffing: self.filler_density(&words) > STUFFING_DENSITY,
        };

        if flags.possible_memorization || flags.keyword_stuffing {
            tracing::debug!(
                memorization = flags.possible_memorization,
                stuffing = flags.keyword_stuffing,
                "answer flagged"
            );
        }

        AdvisoryReport {
            keyword_coverage,
            fluency,
            pressure,
            suggested_rating: suggested_rating(keyword_coverage),
            flags,
        }
    }

    fn reset(&self) {
        self.previous.lock().clear();
    }
}

fn tokenize(text: &str) -> Vec<String> {
    TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Share of distinct hint tokens that appear anywhere in the answer.
fn keyword_coverage(hints: &str, answer: &str) -> f64 {
    let keywords: HashSet<String> = tokenize(hints).into_iter().collect();
    if keywords.is_empty() {
        return 0.0;
    }
    let answer = answer.to_lowercase();
    let matched = keywords.iter().filter(|k| answer.contains(k.as_str())).count();
    matched as f64 / keywords.len() as f64
}

fn fluency(answer: &str) -> f64 {
    let chars = answer.chars().count();
    if chars == 0 {
        return 1.0;
    }
    let sentences = answer.chars().filter(|c| SENTENCE_ENDINGS.contains(c)).count();
    (sentences as f64 / (chars as f64 / CHARS_PER_SENTENCE)).min(1.0)
}

fn pressure(fluency: f64) -> f64 {
    (1.5 - 1.5 * fluency).clamp(0.0, 1.0)
}

fn suggested_rating(coverage: f64) -> i32 {
    (1 + (coverage * 4.0).floor() as i32).min(5)
}

fn overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / larger as f64
}
