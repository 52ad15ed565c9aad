// src/dispatcher.rs

// dispatcher: decides when the head of the queue can be fulfilled and re-arms
// its own wake-up

// dependencies
use crate::clock::{Clock, ClockError};
use crate::config::LimiterSettings;
use crate::errors::QueuedLimiterError;
use crate::queue::{ReservationId, ReservationQueue};
use crate::regen::{PoolState, wait_for_deficit};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// Outcome of a dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attempt {
    /// Nothing is queued.
    Idle,
    /// The head needs this much regeneration before it can be fulfilled.
    Wait(Duration),
}

/// Pool and queue of one limiter. Every transition happens under one lock.
#[derive(Debug)]
pub(crate) struct LimiterState {
    pub(crate) settings: LimiterSettings,
    pub(crate) pool: PoolState,
    pub(crate) queue: ReservationQueue,
}

impl LimiterState {
    pub(crate) fn new(settings: LimiterSettings, now_nanos: u64) -> Self {
        let pool = PoolState::new(settings.initial_tokens, now_nanos);
        Self {
            settings,
            pool,
            queue: ReservationQueue::new(),
        }
    }

    /// Fulfill every reservation at the front of the queue that the pool covers,
    /// then report how long the new head has to wait.
    pub(crate) fn attempt(&mut self, now_nanos: u64) -> Attempt {
        loop {
            let Some(head) = self.queue.front() else {
                return Attempt::Idle;
            };
            let tokens = head.tokens;

            let deficit = tokens - self.pool.regenerate(&self.settings, now_nanos);
            if deficit > 0.0 {
                return Attempt::Wait(wait_for_deficit(deficit, &self.settings));
            }

            let Some(reservation) = self.queue.pop_front() else {
                return Attempt::Idle;
            };
            // deduct before signalling so an update made in response lands on top
            self.pool.pooled -= tokens;
            debug!(id = %reservation.id, tokens, pooled = self.pool.pooled, "reservation fulfilled");
            if !reservation.complete() {
                trace!(tokens, "completion was dropped before fulfillment");
            }
        }
    }

    pub(crate) fn pooled_tokens(&mut self, now_nanos: u64) -> f64 {
        self.pool.regenerate(&self.settings, now_nanos)
    }

    /// Wait until the reservation `id` (or the head when `None`) is ready.
    ///
    /// Every reservation ahead of it has a claim on the pool first, so the deficit
    /// is the sum of tokens up to and including it minus the pool.
    pub(crate) fn time_until_ready(
        &mut self,
        id: Option<&ReservationId>,
        now_nanos: u64,
    ) -> Result<Duration, QueuedLimiterError> {
        let pooled = self.pool.regenerate(&self.settings, now_nanos);

        let mut claimed = 0.0;
        for entry in self.queue.iter() {
            claimed += entry.tokens;
            if id.is_none_or(|id| &entry.id == id) {
                return Ok(wait_for_deficit(claimed - pooled, &self.settings));
            }
        }

        match id {
            Some(id) => Err(QueuedLimiterError::NotFound { id: id.clone() }),
            None => Ok(Duration::ZERO),
        }
    }

    /// Wait until the whole queue has been fulfilled.
    pub(crate) fn wait_time(&mut self, now_nanos: u64) -> Duration {
        let pooled = self.pool.regenerate(&self.settings, now_nanos);
        if self.queue.is_empty() {
            return Duration::ZERO;
        }
        let claimed: f64 = self.queue.iter().map(|entry| entry.tokens).sum();
        wait_for_deficit(claimed - pooled, &self.settings)
    }

    /// Nothing queued and the pool is full, so this state is indistinguishable
    /// from a fresh one.
    pub(crate) fn is_idle(&mut self, now_nanos: u64) -> bool {
        self.queue.is_empty()
            && self.pool.regenerate(&self.settings, now_nanos) >= self.settings.max_tokens
    }
}

/// State shared between limiter handles and the driver task.
#[derive(Debug)]
pub(crate) struct Shared<C> {
    pub(crate) settings: LimiterSettings,
    pub(crate) clock: C,
    state: Mutex<LimiterState>,
    wake: Notify,
    closed: AtomicBool,
}

impl<C: Clock> Shared<C> {
    pub(crate) fn new(settings: LimiterSettings, clock: C) -> Result<Self, ClockError> {
        let state = LimiterState::new(settings.clone(), clock.now()?);
        Ok(Self {
            settings,
            clock,
            state: Mutex::new(state),
            wake: Notify::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, LimiterState> {
        // a panic mid-transition cannot leave the pool or queue half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask the driver for another pass. Calls made before it runs coalesce into one.
    pub(crate) fn schedule(&self) {
        self.wake.notify_one();
    }

    /// Last handle is gone: drain what is queued, then stop.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn run_attempt(&self) -> Attempt {
        match self.clock.now() {
            Ok(now) => self.lock().attempt(now),
            Err(err) => {
                warn!(error = %err, "clock failed during dispatch, retrying after one interval");
                Attempt::Wait(self.settings.interval)
            }
        }
    }
}

/// Dispatcher loop. Exactly one wake timer is armed at a time: each pass drops
/// the previous sleep before deciding whether to arm a new one.
pub(crate) async fn drive<C: Clock>(shared: Arc<Shared<C>>) {
    loop {
        match shared.run_attempt() {
            Attempt::Idle => {
                if shared.is_closed() {
                    debug!("limiter dropped and queue drained, dispatcher stopping");
                    return;
                }
                shared.wake.notified().await;
            }
            Attempt::Wait(wait) => {
                trace!(?wait, "arming wake timer");
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }
    }
}
