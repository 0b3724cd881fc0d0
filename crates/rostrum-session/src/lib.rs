//! Interview session core.
//!
//! Owns the candidate buckets, the on-stage session record and the
//! interviewer slot. All mutation goes through [`SessionController`], and
//! the only concurrent entry point is the actor spawned by
//! [`spawn_session_actor`], which applies events one at a time and hands
//! each resulting [`BroadcastJob`] to the [`BroadcastEngine`].

pub mod actor;
pub mod broadcast;
pub mod controller;
pub mod error;
pub mod registry;
pub mod render;
pub mod state;

pub use actor::{spawn_session_actor, SessionEvent, SessionHandle};
pub use broadcast::{BroadcastEngine, BroadcastJob, DeliveryError, DeliveryReport, Envelope, Outbound, Outbox};
pub use controller::{SessionController, SessionSnapshot, SystemState};
pub use error::Rejection;
pub use registry::{Bucket, CandidateRegistry, Placement, Released};
pub use state::{ActiveQuestionSet, Annotation, Direction, SessionState, Stage};
