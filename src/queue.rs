// src/queue.rs

//! FIFO queue of pending reservations.

// dependencies
use crate::errors::QueuedLimiterError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Opaque, unique identifier of a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(String);

impl ReservationId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReservationId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ReservationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A queued request for `tokens`, owning the sender half of its completion.
#[derive(Debug)]
pub(crate) struct PendingReservation {
    pub(crate) id: ReservationId,
    pub(crate) tokens: f64,
    completion: oneshot::Sender<()>,
}

impl PendingReservation {
    pub(crate) fn new(id: ReservationId, tokens: f64, completion: oneshot::Sender<()>) -> Self {
        Self {
            id,
            tokens,
            completion,
        }
    }

    /// Signal the waiting caller. Returns false if they stopped listening.
    pub(crate) fn complete(self) -> bool {
        self.completion.send(()).is_ok()
    }
}

/// Reservations in arrival order. Position in the queue is priority.
#[derive(Debug, Default)]
pub(crate) struct ReservationQueue {
    entries: VecDeque<PendingReservation>,
}

impl ReservationQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, reservation: PendingReservation) {
        self.entries.push_back(reservation);
    }

    /// Remove the reservation with `id`, keeping everyone else in place.
    pub(crate) fn remove(
        &mut self,
        id: &ReservationId,
    ) -> Result<PendingReservation, QueuedLimiterError> {
        // VecDeque::remove shifts the shorter side, order is preserved either way
        self.entries
            .iter()
            .position(|entry| &entry.id == id)
            .and_then(|position| self.entries.remove(position))
            .ok_or_else(|| QueuedLimiterError::NotFound { id: id.clone() })
    }

    /// Entries front to back, without touching the queue.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &PendingReservation> {
        self.entries.iter()
    }

    pub(crate) fn front(&self) -> Option<&PendingReservation> {
        self.entries.front()
    }

    pub(crate) fn pop_front(&mut self) -> Option<PendingReservation> {
        self.entries.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
