// src/lib.rs

//! # Queued Limiter
//!
//! A token bucket that queues callers instead of rejecting them. Each caller
//! reserves some number of tokens and gets back a completion that resolves once
//! the pool has accumulated enough, strictly in the order reservations were made.
//!
//! Tokens regenerate lazily: every whole interval elapsed since the last
//! regeneration adds `regen` tokens, up to `max`. A background dispatcher task
//! fulfills the head of the queue as soon as it fits and otherwise sleeps until
//! the regeneration that will make it fit.
//!
//! Limiters must be created inside a current-thread tokio runtime (or a
//! `LocalSet` on one). On a multi-thread runtime construction fails with
//! [`QueuedLimiterError::UnsupportedRuntime`].
//!
//! ## Quick Example
//!
//! ```rust
//! use queued_limiter::{QueuedLimiter, QueuedLimiterConfig, TokenConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), queued_limiter::QueuedLimiterError> {
//! let config = QueuedLimiterConfig::new()
//!     .tokens(TokenConfig::new(2.0).max(10.0).initial(5.0))
//!     .interval(1000.0);
//! let limiter = QueuedLimiter::new(config)?;
//!
//! let reservation = limiter.reserve(3.0)?;
//! println!(
//!     "reservation {} ready in {:?}",
//!     reservation.id,
//!     limiter.time_until_ready(Some(&reservation.id))?
//! );
//! reservation.await;
//!
//! assert_eq!(limiter.pooled_tokens()?, 2.0);
//! # Ok(())
//! # }
//! ```

// private modules
mod clock;
mod config;
mod dispatcher;
mod errors;
mod keyed;
mod limiter;
mod queue;
mod regen;

// public API exports
pub use clock::{Clock, ClockError, SystemClock, TokioClock};
pub use config::{DEFAULT_INTERVAL_MS, LimiterSettings, QueuedLimiterConfig, TokenConfig};
pub use errors::{ConfigError, QueuedLimiterError};
pub use keyed::KeyedLimiter;
pub use limiter::{Completion, QueuedLimiter, Reservation};
pub use queue::ReservationId;
