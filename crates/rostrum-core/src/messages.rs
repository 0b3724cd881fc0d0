//! Inbound message shapes for both channels.
//!
//! Raw text frames are decoded exactly once, at the transport boundary,
//! into one of two closed enums. Anything that does not match a known
//! shape becomes a [`MessageError`] and is dropped by the caller.

use serde::Deserialize;

/// Rating and comment attached to `next`, `last` and `finish`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct GradePayload {
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub comment: String,
}

/// Messages a candidate connection may send.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CandidateMessage {
    Ready,
    Start,
    /// Free-text answer, scored by the advisory grader and then discarded.
    Answer { text: String },
}

/// Messages the interviewer connection may send.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InterviewerMessage {
    Next(GradePayload),
    Last(GradePayload),
    Finish(GradePayload),
    Select { selection: Vec<i64> },
    Hint,
}

impl CandidateMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Start => "start",
            Self::Answer { .. } => "answer",
        }
    }
}

impl InterviewerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Next(_) => "next",
            Self::Last(_) => "last",
            Self::Finish(_) => "finish",
            Self::Select { .. } => "select",
            Self::Hint => "hint",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("unrecognized message shape: {0}")]
    UnknownShape(serde_json::Error),
}

impl MessageError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::UnknownShape(_) => "unknown_shape",
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, MessageError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(MessageError::InvalidJson)?;
    serde_json::from_value(value).map_err(MessageError::UnknownShape)
}

/// Decode a candidate-channel text frame.
pub fn decode_candidate(raw: &str) -> Result<CandidateMessage, MessageError> {
    decode(raw)
}

/// Decode an interviewer-channel text frame.
pub fn decode_interviewer(raw: &str) -> Result<InterviewerMessage, MessageError> {
    decode(raw)
}
