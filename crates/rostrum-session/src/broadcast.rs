//! Broadcast fan-out.
//!
//! Every accepted mutation yields a [`BroadcastJob`] naming which audiences
//! need a fresh view. The engine renders those views from the controller
//! (after the mutation is complete) and delivers them concurrently through
//! an [`Outbox`]. A failed send is logged and counted but never aborts the
//! rest of the fan-out, and never rolls back the mutation.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use rostrum_core::ids::ConnectionId;
use rostrum_core::views::{CandidateView, InterviewerView};
use rostrum_telemetry::MetricsRecorder;
use serde::Serialize;

use crate::controller::SessionController;
use crate::render;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Candidate(CandidateView),
    Interviewer(InterviewerView),
}

impl Outbound {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Candidate(v) => v.kind(),
            Self::Interviewer(v) => v.kind(),
        }
    }
}

/// One message for one recipient.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub to: ConnectionId,
    pub payload: Outbound,
}

impl Envelope {
    pub fn candidate(to: ConnectionId, view: CandidateView) -> Self {
        Self {
            to,
            payload: Outbound::Candidate(view),
        }
    }

    pub fn interviewer(to: ConnectionId, view: InterviewerView) -> Self {
        Self {
            to,
            payload: Outbound::Interviewer(view),
        }
    }
}

/// Audiences to refresh after a mutation, plus one-off notices computed
/// at mutation time (a `finish` for the leaving candidate, a `reject` for
/// a replaced interviewer). Notices go out before the refreshed views.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BroadcastJob {
    pub notices: Vec<Envelope>,
    /// The candidate on stage.
    pub current: bool,
    pub interviewer: bool,
    /// Preparing and queued candidates.
    pub queue: bool,
}

impl BroadcastJob {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn everyone() -> Self {
        Self {
            current: true,
            interviewer: true,
            queue: true,
            ..Self::default()
        }
    }

    pub fn queue() -> Self {
        Self {
            queue: true,
            ..Self::default()
        }
    }

    pub fn with_notice(mut self, notice: Envelope) -> Self {
        self.notices.push(notice);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty() && !self.current && !self.interviewer && !self.queue
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection is not registered")]
    NotConnected,

    #[error("send queue is full")]
    QueueFull,

    #[error("connection is closed")]
    Closed,

    #[error("failed to serialize payload: {0}")]
    Serialization(String),
}

impl DeliveryError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::QueueFull => "queue_full",
            Self::Closed => "closed",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Per-connection send primitive provided by the transport.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Hand `payload` to the connection's writer.
    ///
    /// Called from the session actor while it owns session state, so
    /// implementations must only enqueue the frame and return. Never wait on
    /// socket I/O here; report a full buffer as [`DeliveryError::QueueFull`].
    async fn send(&self, to: &ConnectionId, payload: String) -> Result<(), DeliveryError>;
}

#[derive(Debug, Default, PartialEq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: Vec<(ConnectionId, DeliveryError)>,
}

pub struct BroadcastEngine {
    outbox: Arc<dyn Outbox>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl BroadcastEngine {
    pub fn new(outbox: Arc<dyn Outbox>) -> Self {
        Self {
            outbox,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Render the envelopes a job calls for, from the controller's current state.
    pub fn compose(&self, controller: &SessionController, job: BroadcastJob) -> Vec<Envelope> {
        let bank = controller.bank();
        let registry = controller.registry();
        let session = controller.session();
        let mut out = job.notices;

        if job.current {
            if let (Some(active), Some(session)) = (registry.active(), session) {
                out.push(Envelope::candidate(
                    active.clone(),
                    render::stage_view(bank, session),
                ));
            }
        }

        if job.interviewer {
            if let Some(interviewer) = controller.interviewer() {
                out.push(Envelope::interviewer(
                    interviewer.clone(),
                    render::interviewer_view(bank, session),
                ));
            }
        }

        if job.queue {
            let preparing = render::preparing_view(bank, registry, session);
            for id in registry.preparing() {
                out.push(Envelope::candidate(id.clone(), preparing.clone()));
            }
            for (i, id) in registry.queued().enumerate() {
                out.push(Envelope::candidate(
                    id.clone(),
                    render::waiting_view(bank, session, i + 1),
                ));
            }
        }

        out
    }

    /// Send every envelope concurrently and collect per-recipient failures.
    pub async fn deliver(&self, envelopes: Vec<Envelope>) -> DeliveryReport {
        let sends = envelopes.into_iter().map(|envelope| {
            let outbox = Arc::clone(&self.outbox);
            async move {
                let kind = envelope.payload.kind();
                let result = match serde_json::to_string(&envelope.payload) {
                    Ok(json) => outbox.send(&envelope.to, json).await,
                    Err(e) => Err(DeliveryError::Serialization(e.to_string())),
                };
                (envelope.to, kind, result)
            }
        });

        let mut report = DeliveryReport::default();
        for (to, kind, result) in join_all(sends).await {
            match result {
                Ok(()) => {
                    tracing::debug!(conn_id = %to, view = kind, "view delivered");
                    report.sent += 1;
                }
                Err(e) => {
                    tracing::warn!(conn_id = %to, view = kind, error = %e, "delivery failed");
                    if let Some(metrics) = &self.metrics {
                        metrics.counter_inc("deliveries_failed_total", &[("kind", e.kind())], 1);
                    }
                    report.failed.push((to, e));
                }
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.counter_inc("deliveries_sent_total", &[], report.sent as u64);
        }
        report
    }

    /// Compose and deliver in one step.
    pub async fn publish(&self, controller: &SessionController, job: BroadcastJob) -> DeliveryReport {
        if job.is_empty() {
            return DeliveryReport::default();
        }
        let envelopes = self.compose(controller, job);
        self.deliver(envelopes).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingOutbox;
    use super::*;
    use rostrum_core::ids::ConnectionId;
    use rostrum_core::messages::CandidateMessage;
    use rostrum_core::questions::QuestionBank;

    fn id(name: &str) -> ConnectionId {
        ConnectionId::from_raw(name)
    }

    fn setup() -> (Arc<RecordingOutbox>, BroadcastEngine, SessionController) {
        let outbox = Arc::new(RecordingOutbox::default());
        let engine = BroadcastEngine::new(outbox.clone());
        let controller = SessionController::new(Arc::new(QuestionBank::builtin()));
        (outbox, engine, controller)
    }

    #[test]
    fn job_builders() {
        assert!(BroadcastJob::none().is_empty());
        assert!(!BroadcastJob::queue().is_empty());
        let job = BroadcastJob::everyone();
        assert!(job.current && job.interviewer && job.queue);
        let job = BroadcastJob::none().with_notice(Envelope::candidate(id("a"), CandidateView::Finish));
        assert!(!job.is_empty());
    }

    #[test]
    fn compose_orders_notices_then_views() {
        let (_outbox, engine, mut controller) = setup();
        controller.candidate_connected(id("x"));
        controller.handle_candidate(&id("x"), CandidateMessage::Ready).unwrap();
        controller.candidate_connected(id("y"));
        controller.interviewer_connected(id("boss"));

        let job = BroadcastJob::everyone().with_notice(Envelope::candidate(id("gone"), CandidateView::Finish));
        let envelopes = engine.compose(&controller, job);
        let order: Vec<(&str, &str)> = envelopes
            .iter()
            .map(|e| (e.to.as_str(), e.payload.kind()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("gone", "finish"),
                ("x", "counting"),
                ("boss", "counting"),
                ("y", "preparing"),
            ]
        );
    }

    #[test]
    fn compose_skips_absent_audiences() {
        let (_outbox, engine, controller) = setup();
        assert!(engine.compose(&controller, BroadcastJob::everyone()).is_empty());
    }

    #[tokio::test]
    async fn one_dead_recipient_does_not_block_others() {
        let (outbox, engine, mut controller) = setup();
        for name in ["a", "b", "c"] {
            controller.candidate_connected(id(name));
        }
        outbox.kill(&id("b"));

        let report = engine.publish(&controller, BroadcastJob::queue()).await;
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, vec![(id("b"), DeliveryError::Closed)]);
        assert!(outbox.last_for(&id("a")).is_some());
        assert!(outbox.last_for(&id("c")).is_some());
    }

    #[tokio::test]
    async fn failures_are_counted() {
        let outbox = Arc::new(RecordingOutbox::default());
        let metrics = Arc::new(MetricsRecorder::new());
        let engine = BroadcastEngine::new(outbox.clone()).with_metrics(metrics.clone());
        let mut controller = SessionController::new(Arc::new(QuestionBank::builtin()));
        controller.candidate_connected(id("a"));
        controller.candidate_connected(id("b"));
        outbox.kill(&id("a"));

        engine.publish(&controller, BroadcastJob::queue()).await;
        assert_eq!(metrics.counter_get("deliveries_sent_total", &[]), 1);
        assert_eq!(metrics.counter_get("deliveries_failed_total", &[("kind", "closed")]), 1);
    }

    #[tokio::test]
    async fn empty_job_sends_nothing() {
        let (outbox, engine, mut controller) = setup();
        controller.candidate_connected(id("a"));
        let report = engine.publish(&controller, BroadcastJob::none()).await;
        assert_eq!(report, DeliveryReport::default());
        assert!(outbox.take().is_empty());
    }

    #[test]
    fn outbound_serializes_without_wrapper() {
        let value = serde_json::to_value(Outbound::Interviewer(InterviewerView::Reject)).unwrap();
        assert_eq!(value, serde_json::json!({"type": "reject"}));
    }
}
