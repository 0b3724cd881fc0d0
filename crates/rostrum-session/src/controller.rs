use std::sync::Arc;

use rostrum_core::advisory::Advisor;
use rostrum_core::ids::ConnectionId;
use rostrum_core::messages::{CandidateMessage, GradePayload, InterviewerMessage};
use rostrum_core::questions::QuestionBank;
use rostrum_core::views::{CandidateView, InterviewerView};
use serde::Serialize;
use tracing::{debug, info};

use crate::broadcast::{BroadcastJob, Envelope};
use crate::error::Rejection;
use crate::registry::{CandidateRegistry, Placement, Released};
use crate::state::{Direction, SessionState, Stage};

/// Whole-system state as seen from outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemState {
    Idle,
    Counting,
    Interviewing,
}

impl SystemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Counting => "counting",
            Self::Interviewing => "interviewing",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SystemState,
    pub preparing: usize,
    pub queued: usize,
    pub finished: usize,
    pub interviewer_attached: bool,
    /// Absolute index of the question on stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<usize>,
}

/// Owns the candidate buckets, the on-stage session and the interviewer slot.
///
/// Every operation either applies completely and returns the broadcast it
/// calls for, or returns a [`Rejection`] with nothing changed. The
/// controller itself never performs I/O.
pub struct SessionController {
    bank: Arc<QuestionBank>,
    registry: CandidateRegistry,
    // Present exactly when a candidate is active.
    session: Option<SessionState>,
    interviewer: Option<ConnectionId>,
    advisor: Option<Arc<dyn Advisor>>,
}

impl SessionController {
    pub fn new(bank: Arc<QuestionBank>) -> Self {
        Self {
            bank,
            registry: CandidateRegistry::new(),
            session: None,
            interviewer: None,
            advisor: None,
        }
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn registry(&self) -> &CandidateRegistry {
        &self.registry
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    pub fn interviewer(&self) -> Option<&ConnectionId> {
        self.interviewer.as_ref()
    }

    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    pub fn system_state(&self) -> SystemState {
        match self.session.as_ref().map(SessionState::stage) {
            None => SystemState::Idle,
            Some(Stage::Counting) => SystemState::Counting,
            Some(Stage::Interviewing) => SystemState::Interviewing,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.system_state(),
            preparing: self.registry.preparing_count(),
            queued: self.registry.queued_count(),
            finished: self.registry.finished_count(),
            interviewer_attached: self.interviewer.is_some(),
            current_question: self.session.as_ref().map(SessionState::current),
        }
    }

    // ── Candidate channel ──────────────────────────────────────────────

    pub fn candidate_connected(&mut self, id: ConnectionId) -> BroadcastJob {
        let admitted = self.registry.admit(id.clone());
        self.check_invariants();
        if admitted {
            debug!(conn_id = %id, "candidate preparing");
            BroadcastJob::queue()
        } else {
            BroadcastJob::none()
        }
    }

    pub fn candidate_disconnected(&mut self, id: &ConnectionId) -> BroadcastJob {
        let job = match self.registry.release(id) {
            None | Some(Released::Preparing) | Some(Released::Finished) => BroadcastJob::none(),
            Some(Released::Queued) => BroadcastJob::queue(),
            Some(Released::Active { promoted }) => {
                info!(conn_id = %id, "active candidate left mid-interview");
                self.take_stage(promoted.as_ref());
                BroadcastJob::everyone()
            }
        };
        self.check_invariants();
        job
    }

    pub fn handle_candidate(
        &mut self,
        id: &ConnectionId,
        message: CandidateMessage,
    ) -> Result<BroadcastJob, Rejection> {
        let job = match message {
            CandidateMessage::Ready => {
                if !self.registry.take_preparing(id) {
                    return Err(Rejection::NotPreparing);
                }
                match self.registry.promote_to_active_or_queue(id.clone()) {
                    Placement::Active => {
                        self.take_stage(Some(id));
                        BroadcastJob::everyone()
                    }
                    Placement::Queued(position) => {
                        info!(conn_id = %id, position, "candidate queued");
                        BroadcastJob::queue()
                    }
                }
            }
            CandidateMessage::Start => {
                self.active_session_mut(id)?.start()?;
                info!(conn_id = %id, "interview started");
                BroadcastJob {
                    current: true,
                    interviewer: true,
                    ..BroadcastJob::none()
                }
            }
            CandidateMessage::Answer { text } => {
                self.score_answer(id, &text)?;
                BroadcastJob {
                    interviewer: true,
                    ..BroadcastJob::none()
                }
            }
        };
        self.check_invariants();
        Ok(job)
    }

    fn score_answer(&mut self, id: &ConnectionId, text: &str) -> Result<(), Rejection> {
        let advisor = self.advisor.clone().ok_or(Rejection::AdvisorUnavailable)?;
        let bank = Arc::clone(&self.bank);
        let session = self.active_session_mut(id)?;
        if session.stage() != Stage::Interviewing {
            return Err(Rejection::NotInterviewing);
        }
        let current = session.current();
        let Some(question) = bank.get(current) else {
            return Err(Rejection::IndexOutOfBounds(current as i64));
        };
        let report = advisor.score(question, text);
        debug!(
            conn_id = %id,
            question = current,
            coverage = report.keyword_coverage,
            suggested = report.suggested_rating,
            "answer scored"
        );
        session.set_advisory(current, report);
        Ok(())
    }

    // ── Interviewer channel ────────────────────────────────────────────

    /// Attach a new interviewer. An already attached one is sent `reject`
    /// and replaced.
    pub fn interviewer_connected(&mut self, id: ConnectionId) -> BroadcastJob {
        let previous = self.interviewer.replace(id.clone());
        let mut job = BroadcastJob {
            interviewer: true,
            ..BroadcastJob::none()
        };
        match previous {
            Some(old) if old != id => {
                info!(conn_id = %id, replaced = %old, "interviewer replaced");
                job = job.with_notice(Envelope::interviewer(old, InterviewerView::Reject));
            }
            _ => info!(conn_id = %id, "interviewer attached"),
        }
        job
    }

    /// Clear the slot if `id` holds it. A superseded interviewer leaving
    /// changes nothing.
    pub fn interviewer_disconnected(&mut self, id: &ConnectionId) -> BroadcastJob {
        if self.interviewer.as_ref() == Some(id) {
            self.interviewer = None;
            info!(conn_id = %id, "interviewer detached");
        }
        BroadcastJob::none()
    }

    pub fn handle_interviewer(
        &mut self,
        id: &ConnectionId,
        message: InterviewerMessage,
    ) -> Result<BroadcastJob, Rejection> {
        if self.interviewer.as_ref() != Some(id) {
            return Err(Rejection::NotInterviewer);
        }
        let bank_len = self.bank.len();
        let session = self.session.as_mut().ok_or(Rejection::SystemIdle)?;

        let job = match message {
            InterviewerMessage::Finish(grade) => self.finish_active(grade),
            InterviewerMessage::Next(grade) => {
                session.advance(Direction::Forward, grade.rating, grade.comment)?;
                BroadcastJob::everyone()
            }
            InterviewerMessage::Last(grade) => {
                session.advance(Direction::Backward, grade.rating, grade.comment)?;
                BroadcastJob::everyone()
            }
            InterviewerMessage::Select { selection } => {
                session.reselect(&selection, bank_len)?;
                BroadcastJob::everyone()
            }
            InterviewerMessage::Hint => {
                let current = session.current();
                session.reveal_hint(current);
                BroadcastJob::everyone()
            }
        };
        self.check_invariants();
        Ok(job)
    }

    /// Record the last grade, move the active candidate to `Finished` and
    /// put the queue head on stage.
    fn finish_active(&mut self, grade: GradePayload) -> BroadcastJob {
        if let Some(session) = self.session.as_mut() {
            let current = session.current();
            session.record_annotation(current, grade.rating, grade.comment);
        }
        let Some((finished, promoted)) = self.registry.finish_active() else {
            return BroadcastJob::none();
        };
        if let Some(session) = &self.session {
            log_summary(&finished, session);
        }
        self.take_stage(promoted.as_ref());
        BroadcastJob::everyone().with_notice(Envelope::candidate(finished, CandidateView::Finish))
    }

    /// Replace the session record after the active slot changed hands.
    fn take_stage(&mut self, active: Option<&ConnectionId>) {
        self.session = active.map(|id| {
            info!(conn_id = %id, "candidate on stage");
            SessionState::new(&self.bank)
        });
        if active.is_some() {
            if let Some(advisor) = &self.advisor {
                advisor.reset();
            }
        }
    }

    fn active_session_mut(&mut self, id: &ConnectionId) -> Result<&mut SessionState, Rejection> {
        if self.registry.active() != Some(id) {
            return Err(Rejection::NotActive);
        }
        self.session.as_mut().ok_or(Rejection::NotActive)
    }

    fn check_invariants(&self) {
        debug_assert!(self.registry.is_consistent());
        debug_assert_eq!(self.registry.active().is_some(), self.session.is_some());
    }
}

fn log_summary(candidate: &ConnectionId, session: &SessionState) {
    let ratings: Vec<i32> = session
        .annotations()
        .values()
        .filter_map(|a| a.rating)
        .collect();
    let average = if ratings.is_empty() {
        None
    } else {
        Some(f64::from(ratings.iter().sum::<i32>()) / ratings.len() as f64)
    };
    let hints = session
        .annotations()
        .values()
        .filter(|a| a.hint_revealed)
        .count();
    info!(
        conn_id = %candidate,
        graded = ratings.len(),
        average_rating = ?average,
        hints_revealed = hints,
        "interview finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Bucket;
    use rostrum_core::advisory::{AdvisoryFlags, AdvisoryReport};
    use rostrum_core::questions::Question;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(name: &str) -> ConnectionId {
        ConnectionId::from_raw(name)
    }

    fn bank() -> Arc<QuestionBank> {
        Arc::new(
            QuestionBank::new(
                (0..7)
                    .map(|i| Question::new(format!("main {i}"), format!("kw{i}"), format!("hint {i}")))
                    .collect(),
            )
            .unwrap(),
        )
    }

    fn grade(rating: Option<i32>, comment: &str) -> GradePayload {
        GradePayload {
            rating,
            comment: comment.into(),
        }
    }

    /// Candidate `x` on stage and interviewing, interviewer `boss` attached.
    fn interviewing() -> SessionController {
        let mut c = SessionController::new(bank());
        c.interviewer_connected(id("boss"));
        c.candidate_connected(id("x"));
        c.handle_candidate(&id("x"), CandidateMessage::Ready).unwrap();
        c.handle_candidate(&id("x"), CandidateMessage::Start).unwrap();
        c
    }

    #[derive(Default)]
    struct FixedAdvisor {
        resets: AtomicUsize,
    }

    impl Advisor for FixedAdvisor {
        fn score(&self, _question: &Question, answer: &str) -> AdvisoryReport {
            AdvisoryReport {
                keyword_coverage: 1.0,
                fluency: 1.0,
                pressure: 0.0,
                suggested_rating: answer.len().min(5) as i32,
                flags: AdvisoryFlags::default(),
            }
        }

        fn reset(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn connect_admits_once() {
        let mut c = SessionController::new(bank());
        assert_eq!(c.candidate_connected(id("a")), BroadcastJob::queue());
        assert_eq!(c.candidate_connected(id("a")), BroadcastJob::none());
        assert_eq!(c.registry().preparing_count(), 1);
        assert_eq!(c.system_state(), SystemState::Idle);
    }

    #[test]
    fn ready_while_idle_takes_stage() {
        let mut c = SessionController::new(bank());
        c.candidate_connected(id("x"));
        let job = c.handle_candidate(&id("x"), CandidateMessage::Ready).unwrap();
        assert_eq!(job, BroadcastJob::everyone());
        assert_eq!(c.system_state(), SystemState::Counting);
        assert_eq!(c.registry().active(), Some(&id("x")));
        assert_eq!(c.session().unwrap().questions().indices(), &[0, 2, 4, 6]);
    }

    #[test]
    fn ready_while_busy_queues() {
        let mut c = interviewing();
        c.candidate_connected(id("y"));
        let job = c.handle_candidate(&id("y"), CandidateMessage::Ready).unwrap();
        assert_eq!(job, BroadcastJob::queue());
        assert_eq!(c.registry().bucket_of(&id("y")), Some(Bucket::Queued));
        assert_eq!(c.system_state(), SystemState::Interviewing);
    }

    #[test]
    fn ready_twice_is_rejected() {
        let mut c = SessionController::new(bank());
        c.candidate_connected(id("x"));
        c.handle_candidate(&id("x"), CandidateMessage::Ready).unwrap();
        assert_eq!(
            c.handle_candidate(&id("x"), CandidateMessage::Ready),
            Err(Rejection::NotPreparing)
        );
        assert_eq!(
            c.handle_candidate(&id("stranger"), CandidateMessage::Ready),
            Err(Rejection::NotPreparing)
        );
    }

    #[test]
    fn start_requires_active_counting_candidate() {
        let mut c = SessionController::new(bank());
        c.candidate_connected(id("x"));
        c.candidate_connected(id("y"));
        assert_eq!(
            c.handle_candidate(&id("x"), CandidateMessage::Start),
            Err(Rejection::NotActive)
        );
        c.handle_candidate(&id("x"), CandidateMessage::Ready).unwrap();
        c.handle_candidate(&id("y"), CandidateMessage::Ready).unwrap();
        assert_eq!(
            c.handle_candidate(&id("y"), CandidateMessage::Start),
            Err(Rejection::NotActive)
        );

        let job = c.handle_candidate(&id("x"), CandidateMessage::Start).unwrap();
        assert!(job.current && job.interviewer && !job.queue);
        assert_eq!(c.system_state(), SystemState::Interviewing);
        assert_eq!(
            c.handle_candidate(&id("x"), CandidateMessage::Start),
            Err(Rejection::NotCounting)
        );
    }

    #[test]
    fn fifo_promotion_on_finish() {
        let mut c = interviewing();
        for name in ["a", "b"] {
            c.candidate_connected(id(name));
            c.handle_candidate(&id(name), CandidateMessage::Ready).unwrap();
        }

        c.handle_interviewer(&id("boss"), InterviewerMessage::Finish(grade(Some(5), "ok")))
            .unwrap();
        assert_eq!(c.registry().active(), Some(&id("a")));
        c.handle_interviewer(&id("boss"), InterviewerMessage::Finish(GradePayload::default()))
            .unwrap();
        assert_eq!(c.registry().active(), Some(&id("b")));
        c.handle_interviewer(&id("boss"), InterviewerMessage::Finish(GradePayload::default()))
            .unwrap();
        assert_eq!(c.system_state(), SystemState::Idle);
        assert_eq!(c.registry().finished_count(), 3);
    }

    #[test]
    fn finish_notifies_leaver_and_resets_session() {
        let mut c = interviewing();
        c.candidate_connected(id("y"));
        c.handle_candidate(&id("y"), CandidateMessage::Ready).unwrap();
        c.handle_interviewer(&id("boss"), InterviewerMessage::Next(grade(Some(3), "fine")))
            .unwrap();
        c.handle_interviewer(&id("boss"), InterviewerMessage::Hint).unwrap();

        let job = c
            .handle_interviewer(&id("boss"), InterviewerMessage::Finish(grade(Some(5), "ok")))
            .unwrap();
        assert_eq!(
            job.notices,
            vec![Envelope::candidate(id("x"), CandidateView::Finish)]
        );
        assert!(job.current && job.interviewer && job.queue);
        assert_eq!(c.registry().bucket_of(&id("x")), Some(Bucket::Finished));

        let fresh = c.session().unwrap();
        assert_eq!(fresh.stage(), Stage::Counting);
        assert_eq!(fresh.questions().ptr(), 0);
        assert_eq!(fresh.questions().indices(), &[0, 2, 4, 6]);
        assert!(fresh.annotations().is_empty());
    }

    #[test]
    fn interviewer_actions_require_attached_interviewer() {
        let mut c = interviewing();
        assert_eq!(
            c.handle_interviewer(&id("impostor"), InterviewerMessage::Hint),
            Err(Rejection::NotInterviewer)
        );
    }

    #[test]
    fn interviewer_actions_rejected_while_idle() {
        let mut c = SessionController::new(bank());
        c.interviewer_connected(id("boss"));
        for message in [
            InterviewerMessage::Hint,
            InterviewerMessage::Next(GradePayload::default()),
            InterviewerMessage::Last(GradePayload::default()),
            InterviewerMessage::Finish(GradePayload::default()),
            InterviewerMessage::Select { selection: vec![0] },
        ] {
            assert_eq!(
                c.handle_interviewer(&id("boss"), message),
                Err(Rejection::SystemIdle)
            );
        }
    }

    #[test]
    fn next_and_last_move_pointer_and_grade() {
        let mut c = interviewing();
        c.handle_interviewer(&id("boss"), InterviewerMessage::Next(grade(Some(4), "good")))
            .unwrap();
        let s = c.session().unwrap();
        assert_eq!(s.current(), 2);
        assert_eq!(s.annotation(0).unwrap().rating, Some(4));

        c.handle_interviewer(&id("boss"), InterviewerMessage::Last(grade(None, "revisit")))
            .unwrap();
        assert_eq!(c.session().unwrap().current(), 0);
        assert_eq!(
            c.handle_interviewer(&id("boss"), InterviewerMessage::Last(GradePayload::default())),
            Err(Rejection::PointerOutOfRange)
        );
    }

    #[test]
    fn select_failure_keeps_selection() {
        let mut c = interviewing();
        c.handle_interviewer(&id("boss"), InterviewerMessage::Next(GradePayload::default()))
            .unwrap();
        assert_eq!(
            c.handle_interviewer(&id("boss"), InterviewerMessage::Select { selection: vec![0, 4] }),
            Err(Rejection::CurrentQuestionDropped(2))
        );
        assert_eq!(
            c.handle_interviewer(&id("boss"), InterviewerMessage::Select { selection: vec![2, 99] }),
            Err(Rejection::IndexOutOfBounds(99))
        );
        assert_eq!(c.session().unwrap().questions().indices(), &[0, 2, 4, 6]);

        c.handle_interviewer(&id("boss"), InterviewerMessage::Select { selection: vec![2, 4, 6] })
            .unwrap();
        let s = c.session().unwrap();
        assert_eq!(s.questions().indices(), &[2, 4, 6]);
        assert_eq!(s.questions().ptr(), 0);
    }

    #[test]
    fn new_interviewer_replaces_old() {
        let mut c = SessionController::new(bank());
        c.interviewer_connected(id("first"));
        let job = c.interviewer_connected(id("second"));
        assert_eq!(
            job.notices,
            vec![Envelope::interviewer(id("first"), InterviewerView::Reject)]
        );
        assert!(job.interviewer);
        assert_eq!(c.interviewer(), Some(&id("second")));

        // The superseded connection closing does not clear the slot.
        c.interviewer_disconnected(&id("first"));
        assert_eq!(c.interviewer(), Some(&id("second")));
        c.interviewer_disconnected(&id("second"));
        assert_eq!(c.interviewer(), None);
    }

    #[test]
    fn active_disconnect_promotes_queue_head() {
        let mut c = interviewing();
        c.candidate_connected(id("y"));
        c.handle_candidate(&id("y"), CandidateMessage::Ready).unwrap();
        c.handle_interviewer(&id("boss"), InterviewerMessage::Hint).unwrap();

        let job = c.candidate_disconnected(&id("x"));
        assert_eq!(job, BroadcastJob::everyone());
        assert_eq!(c.registry().active(), Some(&id("y")));
        assert_eq!(c.registry().bucket_of(&id("x")), None);
        assert!(c.session().unwrap().annotations().is_empty());

        assert_eq!(c.candidate_disconnected(&id("y")), BroadcastJob::everyone());
        assert_eq!(c.system_state(), SystemState::Idle);
    }

    #[test]
    fn silent_disconnects() {
        let mut c = SessionController::new(bank());
        c.candidate_connected(id("p"));
        assert_eq!(c.candidate_disconnected(&id("p")), BroadcastJob::none());
        assert_eq!(c.candidate_disconnected(&id("unknown")), BroadcastJob::none());
    }

    #[test]
    fn queued_and_finished_disconnects() {
        let mut c = interviewing();
        for name in ["a", "b"] {
            c.candidate_connected(id(name));
            c.handle_candidate(&id(name), CandidateMessage::Ready).unwrap();
        }
        assert_eq!(c.candidate_disconnected(&id("a")), BroadcastJob::queue());
        assert_eq!(c.registry().queued().collect::<Vec<_>>(), vec![&id("b")]);
        assert_eq!(c.registry().active(), Some(&id("x")));

        c.handle_interviewer(&id("boss"), InterviewerMessage::Finish(grade(Some(4), "")))
            .unwrap();
        assert_eq!(c.registry().active(), Some(&id("b")));
        assert_eq!(c.candidate_disconnected(&id("x")), BroadcastJob::none());
        assert_eq!(c.registry().finished_count(), 0);
    }

    #[test]
    fn answer_needs_advisor() {
        let mut c = interviewing();
        assert_eq!(
            c.handle_candidate(&id("x"), CandidateMessage::Answer { text: "hi".into() }),
            Err(Rejection::AdvisorUnavailable)
        );
    }

    #[test]
    fn answer_is_scored_for_interviewer() {
        let advisor = Arc::new(FixedAdvisor::default());
        let mut c = SessionController::new(bank()).with_advisor(advisor.clone());
        c.candidate_connected(id("x"));
        c.handle_candidate(&id("x"), CandidateMessage::Ready).unwrap();
        assert_eq!(advisor.resets.load(Ordering::SeqCst), 1);

        assert_eq!(
            c.handle_candidate(&id("x"), CandidateMessage::Answer { text: "abc".into() }),
            Err(Rejection::NotInterviewing)
        );
        c.handle_candidate(&id("x"), CandidateMessage::Start).unwrap();
        let job = c
            .handle_candidate(&id("x"), CandidateMessage::Answer { text: "abc".into() })
            .unwrap();
        assert!(job.interviewer && !job.current && !job.queue);
        assert_eq!(
            c.session().unwrap().current_advisory().map(|r| r.suggested_rating),
            Some(3)
        );
    }

    #[test]
    fn snapshot_reports_counts() {
        let mut c = interviewing();
        c.candidate_connected(id("p"));
        c.candidate_connected(id("q"));
        c.handle_candidate(&id("q"), CandidateMessage::Ready).unwrap();
        let snap = c.snapshot();
        assert_eq!(
            snap,
            SessionSnapshot {
                state: SystemState::Interviewing,
                preparing: 1,
                queued: 1,
                finished: 0,
                interviewer_attached: true,
                current_question: Some(0),
            }
        );
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["state"], "interviewing");
        assert_eq!(json["interviewerAttached"], true);
    }
}
