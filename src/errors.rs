// src/errors.rs

// error handling for the queued limiter type

// dependencies
use thiserror::Error;

use crate::clock::ClockError;
use crate::queue::ReservationId;

/// Error type for QueuedLimiter operations.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueuedLimiterError {
    /// The configuration was rejected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// More tokens were requested than the pool can ever hold, or the amount is
    /// negative or not a finite number. Nothing was queued.
    #[error("unable to reserve {requested} tokens, max tokens is {max}")]
    InvalidReservation { requested: f64, max: f64 },

    /// No queued reservation has this id. Fulfilled reservations leave the queue,
    /// so they report this too.
    #[error("no queued reservation with id {id}")]
    NotFound { id: ReservationId },

    /// Limiters run their dispatcher on the tokio runtime they are created in.
    #[error("a limiter must be created within a tokio runtime")]
    NoRuntime,

    /// Every mutation must be observable by the caller before the dispatcher
    /// runs, which only a current-thread runtime guarantees.
    #[error("a limiter must be created within a current-thread tokio runtime")]
    UnsupportedRuntime,

    #[error("clock error: {0}")]
    Clock(#[from] ClockError),
}

/// Reasons a configuration can be rejected.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cannot specify both tokens and requests in config")]
    ConflictingRate,
    #[error("must specify either tokens or requests in config")]
    MissingRate,
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be greater than 0")]
    NotPositive { field: &'static str },
    #[error("{field} is too large")]
    TooLarge { field: &'static str },
}
