//! Candidate buckets.
//!
//! Every known candidate connection sits in exactly one bucket. `Queued`
//! is FIFO and `Active` holds at most one connection. The registry knows
//! nothing about questions; callers reset the session record whenever a
//! placement or release reports a new active candidate.

use std::collections::{HashSet, VecDeque};

use rostrum_core::ids::ConnectionId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bucket {
    Preparing,
    Queued,
    Active,
    Finished,
}

/// Where `promote_to_active_or_queue` put a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Active,
    /// 1-based position in the queue.
    Queued(usize),
}

/// What `release` removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Released {
    Preparing,
    Queued,
    /// The active candidate left; `promoted` is the queue head that took
    /// the stage, if any.
    Active { promoted: Option<ConnectionId> },
    Finished,
}

#[derive(Debug, Default)]
pub struct CandidateRegistry {
    // Insertion order is kept so broadcasts are deterministic.
    preparing: Vec<ConnectionId>,
    queued: VecDeque<ConnectionId>,
    active: Option<ConnectionId>,
    finished: HashSet<ConnectionId>,
}

impl CandidateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket_of(&self, id: &ConnectionId) -> Option<Bucket> {
        if self.active.as_ref() == Some(id) {
            Some(Bucket::Active)
        } else if self.queued.contains(id) {
            Some(Bucket::Queued)
        } else if self.preparing.contains(id) {
            Some(Bucket::Preparing)
        } else if self.finished.contains(id) {
            Some(Bucket::Finished)
        } else {
            None
        }
    }

    /// Track a new connection as `Preparing`. Returns false (and changes
    /// nothing) if it is already tracked in any bucket.
    pub fn admit(&mut self, id: ConnectionId) -> bool {
        if self.bucket_of(&id).is_some() {
            return false;
        }
        self.preparing.push(id);
        true
    }

    /// Drop a connection from whichever bucket holds it. Releasing the
    /// active candidate promotes the queue head.
    pub fn release(&mut self, id: &ConnectionId) -> Option<Released> {
        match self.bucket_of(id)? {
            Bucket::Preparing => {
                self.preparing.retain(|c| c != id);
                Some(Released::Preparing)
            }
            Bucket::Queued => {
                self.queued.retain(|c| c != id);
                Some(Released::Queued)
            }
            Bucket::Active => {
                self.active = None;
                let promoted = self.promote_next();
                Some(Released::Active { promoted })
            }
            Bucket::Finished => {
                self.finished.remove(id);
                Some(Released::Finished)
            }
        }
    }

    /// Remove a connection from `Preparing`. Returns false if it was not there.
    pub fn take_preparing(&mut self, id: &ConnectionId) -> bool {
        let before = self.preparing.len();
        self.preparing.retain(|c| c != id);
        self.preparing.len() != before
    }

    /// Put a connection on stage if nobody is there, otherwise at the
    /// tail of the queue.
    pub fn promote_to_active_or_queue(&mut self, id: ConnectionId) -> Placement {
        if self.active.is_none() {
            self.active = Some(id);
            Placement::Active
        } else {
            self.queued.push_back(id);
            Placement::Queued(self.queued.len())
        }
    }

    /// Move the active candidate to `Finished` and promote the queue head.
    /// Returns `(finished, promoted)`.
    pub fn finish_active(&mut self) -> Option<(ConnectionId, Option<ConnectionId>)> {
        let finished = self.active.take()?;
        self.finished.insert(finished.clone());
        let promoted = self.promote_next();
        Some((finished, promoted))
    }

    fn promote_next(&mut self) -> Option<ConnectionId> {
        debug_assert!(self.active.is_none());
        let next = self.queued.pop_front()?;
        self.active = Some(next.clone());
        Some(next)
    }

    pub fn active(&self) -> Option<&ConnectionId> {
        self.active.as_ref()
    }

    pub fn preparing(&self) -> impl Iterator<Item = &ConnectionId> {
        self.preparing.iter()
    }

    /// Queued connections, head first.
    pub fn queued(&self) -> impl Iterator<Item = &ConnectionId> {
        self.queued.iter()
    }

    pub fn preparing_count(&self) -> usize {
        self.preparing.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    /// Bucket membership is mutually exclusive and the active connection
    /// is never also queued.
    pub fn is_consistent(&self) -> bool {
        let mut seen: HashSet<&ConnectionId> = HashSet::new();
        let all = self
            .preparing
            .iter()
            .chain(self.queued.iter())
            .chain(self.active.iter())
            .chain(self.finished.iter());
        for id in all {
            if !seen.insert(id) {
                return false;
            }
        }
        true
    }
}
