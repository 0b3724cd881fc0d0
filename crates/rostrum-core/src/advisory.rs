//! Advisory answer scoring.
//!
//! The session core treats the scorer as a black box: it hands over the
//! current question and the raw answer text and gets back a report that is
//! shown to the interviewer. Nothing in the report feeds back into ratings.

use serde::Serialize;

use crate::questions::Question;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryFlags {
    /// The answer overlaps heavily with an earlier answer in this interview.
    pub possible_memorization: bool,
    /// Generic filler terms make up an unusual share of the answer.
    pub keyword_stuffing: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryReport {
    /// Fraction of the question's keyword hints found in the answer, 0..=1.
    pub keyword_coverage: f64,
    /// Sentence density heuristic, 0..=1.
    pub fluency: f64,
    /// Estimated pressure, 0..=1, derived from fluency.
    pub pressure: f64,
    /// Suggested rating on a 1..=5 scale.
    pub suggested_rating: i32,
    pub flags: AdvisoryFlags,
}

/// Best-effort answer scorer.
pub trait Advisor: Send + Sync {
    fn score(&self, question: &Question, answer: &str) -> AdvisoryReport;

    /// Forget per-interview memory. Called when a new candidate takes the stage.
    fn reset(&self) {}
}
