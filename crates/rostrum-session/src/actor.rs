//! Single-owner task around [`SessionController`].
//!
//! Transport handlers never touch session state. They post
//! [`SessionEvent`]s through a cloneable [`SessionHandle`], and one task
//! applies them in arrival order, then publishes the resulting broadcast.

use std::sync::Arc;

use rostrum_core::ids::ConnectionId;
use rostrum_core::messages::{CandidateMessage, InterviewerMessage};
use rostrum_telemetry::MetricsRecorder;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastEngine, BroadcastJob};
use crate::controller::{SessionController, SessionSnapshot};
use crate::error::Rejection;

const EVENT_BUFFER: usize = 1024;

#[derive(Debug)]
pub enum SessionEvent {
    CandidateConnected(ConnectionId),
    CandidateMessage(ConnectionId, CandidateMessage),
    CandidateDisconnected(ConnectionId),
    InterviewerConnected(ConnectionId),
    InterviewerMessage(ConnectionId, InterviewerMessage),
    InterviewerDisconnected(ConnectionId),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

impl SessionEvent {
    fn role(&self) -> &'static str {
        match self {
            Self::CandidateConnected(_)
            | Self::CandidateMessage(..)
            | Self::CandidateDisconnected(_) => "candidate",
            Self::InterviewerConnected(_)
            | Self::InterviewerMessage(..)
            | Self::InterviewerDisconnected(_) => "interviewer",
            Self::Snapshot(_) => "health",
        }
    }
}

/// Cloneable sender side of the session actor.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Post an event. Returns false once the actor has stopped.
    pub async fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        if !self.send(SessionEvent::Snapshot(tx)).await {
            return None;
        }
        rx.await.ok()
    }
}

/// Spawn the actor. It runs until every [`SessionHandle`] is dropped.
pub fn spawn_session_actor(
    controller: SessionController,
    engine: BroadcastEngine,
    metrics: Option<Arc<MetricsRecorder>>,
) -> (SessionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let task = tokio::spawn(run(controller, engine, metrics, rx));
    (SessionHandle { tx }, task)
}

async fn run(
    mut controller: SessionController,
    engine: BroadcastEngine,
    metrics: Option<Arc<MetricsRecorder>>,
    mut rx: mpsc::Receiver<SessionEvent>,
) {
    info!("session actor started");
    while let Some(event) = rx.recv().await {
        let role = event.role();
        let job = match apply(&mut controller, event) {
            Ok(Some(job)) => job,
            // Read-only query, answered in place.
            Ok(None) => continue,
            Err((kind, rejection)) => {
                debug!(role, message = kind, reason = %rejection, "message rejected");
                if let Some(m) = &metrics {
                    m.counter_inc(
                        "session_rejections_total",
                        &[("role", role), ("kind", rejection.kind())],
                        1,
                    );
                }
                continue;
            }
        };

        if let Some(m) = &metrics {
            m.counter_inc("session_events_total", &[("role", role)], 1);
            record_gauges(m, &controller);
        }

        let report = engine.publish(&controller, job).await;
        if !report.failed.is_empty() {
            warn!(
                sent = report.sent,
                failed = report.failed.len(),
                "broadcast partially delivered"
            );
        }
    }
    info!("session actor stopped");
}

/// Apply one event. `None` means the event was a query and changed nothing.
/// A rejection carries the message kind for logging.
fn apply(
    controller: &mut SessionController,
    event: SessionEvent,
) -> Result<Option<BroadcastJob>, (&'static str, Rejection)> {
    let job = match event {
        SessionEvent::CandidateConnected(id) => controller.candidate_connected(id),
        SessionEvent::CandidateDisconnected(id) => controller.candidate_disconnected(&id),
        SessionEvent::CandidateMessage(id, message) => {
            let kind = message.kind();
            controller
                .handle_candidate(&id, message)
                .map_err(|r| (kind, r))?
        }
        SessionEvent::InterviewerConnected(id) => controller.interviewer_connected(id),
        SessionEvent::InterviewerDisconnected(id) => controller.interviewer_disconnected(&id),
        SessionEvent::InterviewerMessage(id, message) => {
            let kind = message.kind();
            controller
                .handle_interviewer(&id, message)
                .map_err(|r| (kind, r))?
        }
        SessionEvent::Snapshot(reply) => {
            let _ = reply.send(controller.snapshot());
            return Ok(None);
        }
    };
    Ok(Some(job))
}

fn record_gauges(metrics: &MetricsRecorder, controller: &SessionController) {
    let registry = controller.registry();
    metrics.gauge_set(
        "candidates",
        &[("bucket", "preparing")],
        registry.preparing_count() as i64,
    );
    metrics.gauge_set(
        "candidates",
        &[("bucket", "queued")],
        registry.queued_count() as i64,
    );
    metrics.gauge_set(
        "candidates",
        &[("bucket", "active")],
        i64::from(registry.active().is_some()),
    );
}
