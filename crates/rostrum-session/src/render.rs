//! Pure view derivation from the question bank, the candidate buckets and
//! the on-stage session.

use rostrum_core::questions::QuestionBank;
use rostrum_core::views::{
    CandidateView, CountingView, InterviewerView, InterviewingView, QueueView, StageView,
};

use crate::registry::CandidateRegistry;
use crate::state::{SessionState, Stage};

/// Titles and remaining count shown to waiting candidates. While idle the
/// default selection stands in for the next session.
fn queue_shared(bank: &QuestionBank, session: Option<&SessionState>) -> (Vec<String>, usize) {
    match session {
        Some(s) => (
            bank.titles_for(s.questions().indices()),
            s.questions().remaining(),
        ),
        None => {
            let selection = bank.default_selection();
            (bank.titles_for(&selection), selection.len())
        }
    }
}

/// View for a candidate in `Preparing`.
pub fn preparing_view(
    bank: &QuestionBank,
    registry: &CandidateRegistry,
    session: Option<&SessionState>,
) -> CandidateView {
    let (question_titles, queue_question_count) = queue_shared(bank, session);
    let on_stage = usize::from(registry.active().is_some());
    CandidateView::Preparing(QueueView {
        queue_count: registry.queued_count() + on_stage,
        question_titles,
        queue_question_count,
    })
}

/// View for the candidate at 1-based `position` in the queue.
pub fn waiting_view(
    bank: &QuestionBank,
    session: Option<&SessionState>,
    position: usize,
) -> CandidateView {
    let (question_titles, queue_question_count) = queue_shared(bank, session);
    CandidateView::Waiting(QueueView {
        queue_count: position,
        question_titles,
        queue_question_count,
    })
}

/// View for the candidate on stage.
pub fn stage_view(bank: &QuestionBank, session: &SessionState) -> CandidateView {
    let current = session.current();
    let question_hint = if session.hint_revealed(current) {
        bank.get(current)
            .map(|q| q.candidate_hint.clone())
            .unwrap_or_default()
    } else {
        String::new()
    };
    let view = StageView {
        current_question: session.questions().ptr(),
        question_hint,
        question_titles: bank.titles_for(session.questions().indices()),
    };
    match session.stage() {
        Stage::Counting => CandidateView::Counting(view),
        Stage::Interviewing => CandidateView::Interviewing(view),
    }
}

/// View for the interviewer.
pub fn interviewer_view(bank: &QuestionBank, session: Option<&SessionState>) -> InterviewerView {
    let Some(session) = session else {
        return InterviewerView::Idle;
    };
    let selection = session.questions();
    let question_titles = bank.titles_for(selection.indices());
    let available_questions = selection.indices().to_vec();
    let question_mains = bank.main_texts();

    match session.stage() {
        Stage::Counting => InterviewerView::Counting(CountingView {
            question_titles,
            available_questions,
            question_mains,
        }),
        Stage::Interviewing => {
            let current = selection.current();
            let question = bank.get(current);
            let annotation = session.annotation(current).cloned().unwrap_or_default();
            InterviewerView::Interviewing(Box::new(InterviewingView {
                current_question: selection.ptr(),
                real_current_question: current,
                question_main: question.map(|q| q.main_text.clone()).unwrap_or_default(),
                question_keywords: question
                    .map(|q| q.keyword_hints.clone())
                    .unwrap_or_default(),
                question_hint: question
                    .map(|q| q.candidate_hint.clone())
                    .unwrap_or_default(),
                rating: annotation.rating,
                comment: annotation.comment,
                hint: annotation.hint_revealed,
                available_questions,
                question_mains,
                question_titles,
                advisory: session.current_advisory().cloned(),
            }))
        }
    }
}
