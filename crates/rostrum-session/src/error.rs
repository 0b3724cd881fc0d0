/// Precondition violations. A rejected message leaves every piece of
/// session state untouched and never disconnects the sender.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("connection is not preparing")]
    NotPreparing,

    #[error("connection is not the active candidate")]
    NotActive,

    #[error("active candidate has already started")]
    NotCounting,

    #[error("active candidate has not started answering")]
    NotInterviewing,

    #[error("connection is not the attached interviewer")]
    NotInterviewer,

    #[error("no candidate is on stage")]
    SystemIdle,

    #[error("question pointer would leave the active selection")]
    PointerOutOfRange,

    #[error("question selection is empty")]
    EmptySelection,

    #[error("question index {0} is outside the question bank")]
    IndexOutOfBounds(i64),

    #[error("selection drops the current question {0}")]
    CurrentQuestionDropped(usize),

    #[error("no answer advisor is configured")]
    AdvisorUnavailable,
}

impl Rejection {
    /// Short classification string for logging/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotPreparing => "not_preparing",
            Self::NotActive => "not_active",
            Self::NotCounting => "not_counting",
            Self::NotInterviewing => "not_interviewing",
            Self::NotInterviewer => "not_interviewer",
            Self::SystemIdle => "system_idle",
            Self::PointerOutOfRange => "pointer_out_of_range",
            Self::EmptySelection => "empty_selection",
            Self::IndexOutOfBounds(_) => "index_out_of_bounds",
            Self::CurrentQuestionDropped(_) => "current_question_dropped",
            Self::AdvisorUnavailable => "advisor_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_details() {
        assert_eq!(
            Rejection::IndexOutOfBounds(-3).to_string(),
            "question index -3 is outside the question bank"
        );
        assert_eq!(
            Rejection::CurrentQuestionDropped(2).to_string(),
            "selection drops the current question 2"
        );
    }

    #[test]
    fn kind_strings() {
        assert_eq!(Rejection::SystemIdle.kind(), "system_idle");
        assert_eq!(Rejection::NotInterviewer.kind(), "not_interviewer");
        assert_eq!(Rejection::EmptySelection.kind(), "empty_selection");
    }
}
