//! Outbound view shapes, one enum per recipient role.
//!
//! Every view is a full snapshot: clients replace their state with whatever
//! they receive last.

use serde::Serialize;

use crate::advisory::AdvisoryReport;

/// Shared payload for preparing and queued candidates.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueView {
    pub queue_count: usize,
    pub question_titles: Vec<String>,
    pub queue_question_count: usize,
}

/// Payload for the candidate on stage.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub current_question: usize,
    /// Empty unless the interviewer revealed the hint.
    pub question_hint: String,
    pub question_titles: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CandidateView {
    Preparing(QueueView),
    Waiting(QueueView),
    Counting(StageView),
    Interviewing(StageView),
    Finish,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountingView {
    pub question_titles: Vec<String>,
    pub available_questions: Vec<usize>,
    pub question_mains: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewingView {
    /// Position inside the active selection.
    pub current_question: usize,
    /// Absolute index into the question bank.
    pub real_current_question: usize,
    pub question_main: String,
    pub question_keywords: String,
    pub question_hint: String,
    pub rating: Option<i32>,
    pub comment: String,
    pub hint: bool,
    pub available_questions: Vec<usize>,
    pub question_mains: Vec<String>,
    pub question_titles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<AdvisoryReport>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InterviewerView {
    Idle,
    Counting(CountingView),
    Interviewing(Box<InterviewingView>),
    /// Sent to an interviewer that has been replaced by a newer connection.
    Reject,
}

impl CandidateView {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Preparing(_) => "preparing",
            Self::Waiting(_) => "waiting",
            Self::Counting(_) => "counting",
            Self::Interviewing(_) => "interviewing",
            Self::Finish => "finish",
        }
    }
}

impl InterviewerView {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Counting(_) => "counting",
            Self::Interviewing(_) => "interviewing",
            Self::Reject => "reject",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unit_views_serialize_to_bare_type() {
        assert_eq!(serde_json::to_value(CandidateView::Finish).unwrap(), json!({"type": "finish"}));
        assert_eq!(serde_json::to_value(InterviewerView::Idle).unwrap(), json!({"type": "idle"}));
        assert_eq!(serde_json::to_value(InterviewerView::Reject).unwrap(), json!({"type": "reject"}));
    }

    #[test]
    fn waiting_view_uses_camel_case() {
        let view = CandidateView::Waiting(QueueView {
            queue_count: 1,
            question_titles: vec!["1".into(), "2".into()],
            queue_question_count: 2,
        });
        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            json!({
                "type": "waiting",
                "queueCount": 1,
                "questionTitles": ["1", "2"],
                "queueQuestionCount": 2
            })
        );
    }

    #[test]
    fn stage_view_shape() {
        let view = CandidateView::Counting(StageView {
            current_question: 0,
            question_hint: String::new(),
            question_titles: vec!["1".into()],
        });
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["type"], "counting");
        assert_eq!(value["currentQuestion"], 0);
        assert_eq!(value["questionHint"], "");
    }

    #[test]
    fn interviewing_view_omits_missing_advisory() {
        let view = InterviewerView::Interviewing(Box::new(InterviewingView {
            current_question: 1,
            real_current_question: 2,
            question_main: "main".into(),
            question_keywords: "kw".into(),
            question_hint: "hint".into(),
            rating: None,
            comment: String::new(),
            hint: false,
            available_questions: vec![0, 2, 4],
            question_mains: vec!["a".into(), "b".into(), "main".into()],
            question_titles: vec!["1".into(), "2".into(), "3".into()],
            advisory: None,
        }));
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["type"], "interviewing");
        assert_eq!(value["realCurrentQuestion"], 2);
        assert!(value["rating"].is_null());
        assert_eq!(value["availableQuestions"], json!([0, 2, 4]));
        assert!(value.get("advisory").is_none());
    }

    #[test]
    fn kinds_match_wire_tags() {
        assert_eq!(CandidateView::Finish.kind(), "finish");
        assert_eq!(InterviewerView::Reject.kind(), "reject");
    }
}
