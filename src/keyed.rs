// src/keyed.rs

// one queued limiter per key, e.g. per client or per upstream

// dependencies
use crate::clock::{Clock, TokioClock};
use crate::config::{LimiterSettings, QueuedLimiterConfig};
use crate::errors::QueuedLimiterError;
use crate::limiter::{QueuedLimiter, Reservation};
use crate::queue::ReservationId;
use dashmap::DashMap;
use std::hash::Hash;
use tracing::debug;

/// Independent limiters keyed by `K`, all built from the same configuration.
/// K is the type used to identify clients (e.g., String, u64, etc.).
/// C is the clock type, cloned into each limiter, defaulting to TokioClock.
///
/// Limiters are created on first use. Each one has its own pool, queue and
/// dispatcher; keys never share tokens.
#[derive(Debug)]
pub struct KeyedLimiter<K, C = TokioClock>
where
    K: Hash + Eq + Clone,
    C: Clock + Clone + 'static,
{
    settings: LimiterSettings,
    clock: C,
    limiters: DashMap<K, QueuedLimiter<C>>,
}

impl<K> KeyedLimiter<K, TokioClock>
where
    K: Hash + Eq + Clone,
{
    pub fn new(config: QueuedLimiterConfig) -> Result<Self, QueuedLimiterError> {
        Self::with_config(config, TokioClock::new())
    }
}

impl<K, C> KeyedLimiter<K, C>
where
    K: Hash + Eq + Clone,
    C: Clock + Clone + 'static,
{
    /// Validate `config` once; every limiter created later uses it.
    pub fn with_config(config: QueuedLimiterConfig, clock: C) -> Result<Self, QueuedLimiterError> {
        Ok(Self {
            settings: config.resolve()?,
            clock,
            limiters: DashMap::new(),
        })
    }

    /// The limiter for `key`, created if it does not exist yet.
    pub fn limiter(&self, key: K) -> Result<QueuedLimiter<C>, QueuedLimiterError> {
        if let Some(limiter) = self.limiters.get(&key) {
            return Ok(limiter.value().clone());
        }
        let limiter = self
            .limiters
            .entry(key)
            .or_try_insert_with(|| {
                QueuedLimiter::with_settings(self.settings.clone(), self.clock.clone())
            })?;
        Ok(limiter.value().clone())
    }

    /// Reserve `tokens` from the limiter for `key`.
    pub fn reserve(&self, key: K, tokens: f64) -> Result<Reservation, QueuedLimiterError> {
        self.limiter(key)?.reserve(tokens)
    }

    /// Cancel a reservation made through `key`. An unknown key is reported the
    /// same way as an unknown id.
    pub fn cancel(&self, key: &K, id: &ReservationId) -> Result<(), QueuedLimiterError> {
        match self.limiters.get(key) {
            Some(limiter) => limiter.cancel(id),
            None => Err(QueuedLimiterError::NotFound { id: id.clone() }),
        }
    }

    /// Forget the limiter for `key`. Reservations already queued on it are still
    /// fulfilled.
    pub fn remove(&self, key: &K) -> Option<QueuedLimiter<C>> {
        self.limiters.remove(key).map(|(_, limiter)| limiter)
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Drop limiters that have nothing queued and a full pool. Returns how many
    /// were removed.
    ///
    /// A limiter that a caller still holds a clone of (from [`limiter`](Self::limiter))
    /// is kept, otherwise the next lookup would start a second pool for its key.
    pub fn cleanup_idle(&self) -> usize {
        let mut removed = 0;
        self.limiters.retain(|_, limiter| {
            let idle = !limiter.is_shared() && limiter.is_idle();
            if idle {
                removed += 1;
            }
            !idle
        });
        if removed > 0 {
            debug!(removed, remaining = self.limiters.len(), "idle limiters cleaned up");
        }
        removed
    }
}
