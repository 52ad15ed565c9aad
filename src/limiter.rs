// src/limiter.rs

// queued-limiter: a first-come-first-served token bucket with awaitable reservations.

// dependencies
use crate::clock::{Clock, TokioClock};
use crate::config::{LimiterSettings, QueuedLimiterConfig};
use crate::dispatcher::{self, Shared};
use crate::errors::QueuedLimiterError;
use crate::queue::{PendingReservation, ReservationId};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;
use tracing::debug;

/// The main QueuedLimiter model.
/// C is the clock type, defaulting to TokioClock.
///
/// Handles are cheap to clone and all share one pool and one queue. A dispatcher
/// task runs on the tokio runtime the limiter was created in, which must be a
/// current-thread runtime: the dispatcher only runs once the caller yields, so a
/// reservation is always still queued when `reserve` hands it back. When the last
/// handle is dropped the dispatcher fulfills whatever is still queued and then exits.
pub struct QueuedLimiter<C = TokioClock>
where
    C: Clock + 'static,
{
    handle: Arc<LimiterHandle<C>>,
}

struct LimiterHandle<C: Clock + 'static> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock + 'static> Drop for LimiterHandle<C> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl QueuedLimiter<TokioClock> {
    /// Create a limiter that measures regeneration on the tokio clock.
    pub fn new(config: QueuedLimiterConfig) -> Result<Self, QueuedLimiterError> {
        Self::with_config(config, TokioClock::new())
    }
}

// methods for the QueuedLimiter type
impl<C> QueuedLimiter<C>
where
    C: Clock + 'static,
{
    // method to create a new limiter from a config object
    pub fn with_config(config: QueuedLimiterConfig, clock: C) -> Result<Self, QueuedLimiterError> {
        let settings = config.resolve()?;
        Self::with_settings(settings, clock)
    }

    // true while a caller holds a clone besides this one
    pub(crate) fn is_shared(&self) -> bool {
        Arc::strong_count(&self.handle) > 1
    }

    pub(crate) fn with_settings(
        settings: LimiterSettings,
        clock: C,
    ) -> Result<Self, QueuedLimiterError> {
        let runtime = Handle::try_current().map_err(|_| QueuedLimiterError::NoRuntime)?;
        // a worker thread could fulfill a reservation before `reserve` returns it
        if runtime.runtime_flavor() != RuntimeFlavor::CurrentThread {
            return Err(QueuedLimiterError::UnsupportedRuntime);
        }
        let shared = Arc::new(Shared::new(settings, clock)?);
        runtime.spawn(dispatcher::drive(Arc::clone(&shared)));

        debug!(
            max_tokens = shared.settings.max_tokens,
            regen_amount = shared.settings.regen_amount,
            interval = ?shared.settings.interval,
            "queued limiter started"
        );
        Ok(Self {
            handle: Arc::new(LimiterHandle { shared }),
        })
    }

    fn shared(&self) -> &Shared<C> {
        &self.handle.shared
    }

    // accessor method to return the pool ceiling
    pub fn max_tokens(&self) -> f64 {
        self.shared().settings.max_tokens
    }

    // accessor method to return the tokens added per interval
    pub fn regen_amount(&self) -> f64 {
        self.shared().settings.regen_amount
    }

    // accessor method to return the regeneration interval
    pub fn interval(&self) -> Duration {
        self.shared().settings.interval
    }

    /// Queue a request for `tokens`.
    ///
    /// The reservation is in the queue when this returns; fulfillment happens on
    /// the dispatcher task, never inside this call. Fails with
    /// [`QueuedLimiterError::InvalidReservation`] when more than
    /// [`max_tokens`](Self::max_tokens) are asked for, or the amount is negative
    /// or not finite.
    pub fn reserve(&self, tokens: f64) -> Result<Reservation, QueuedLimiterError> {
        let max = self.max_tokens();
        if !(tokens.is_finite() && tokens >= 0.0 && tokens <= max) {
            return Err(QueuedLimiterError::InvalidReservation {
                requested: tokens,
                max,
            });
        }

        let id = ReservationId::generate();
        let (sender, receiver) = oneshot::channel();
        self.shared()
            .lock()
            .queue
            .append(PendingReservation::new(id.clone(), tokens, sender));
        debug!(%id, tokens, "reservation queued");
        self.shared().schedule();

        Ok(Reservation {
            id,
            completion: Completion::new(receiver),
        })
    }

    /// Reserve a single token.
    pub fn request(&self) -> Result<Completion, QueuedLimiterError> {
        self.reserve(1.0).map(|reservation| reservation.completion)
    }

    /// Reserve `tokens` and wait for them.
    ///
    /// Dropping the returned future does not cancel the reservation.
    pub async fn acquire(&self, tokens: f64) -> Result<(), QueuedLimiterError> {
        self.reserve(tokens)?.await;
        Ok(())
    }

    /// Remove a queued reservation. Its completion will never resolve.
    pub fn cancel(&self, id: &ReservationId) -> Result<(), QueuedLimiterError> {
        let removed = self.shared().lock().queue.remove(id)?;
        debug!(%id, tokens = removed.tokens, "reservation canceled");
        self.shared().schedule();
        Ok(())
    }

    /// Overwrite the pooled tokens with a value from an outside authority.
    ///
    /// The value is trusted as is: it is not clamped to `max_tokens`, and the
    /// regeneration checkpoint is left alone.
    pub fn update(&self, pooled: f64) {
        self.shared().lock().pool.pooled = pooled;
        debug!(pooled, "pooled tokens updated");
        self.shared().schedule();
    }

    /// Pooled tokens after applying any regeneration that is due.
    pub fn pooled_tokens(&self) -> Result<f64, QueuedLimiterError> {
        let now = self.shared().clock.now()?;
        Ok(self.shared().lock().pooled_tokens(now))
    }

    /// Time until reservation `id` is ready, or the head of the queue when `None`.
    ///
    /// An empty queue with no id reports zero. An id that is not queued fails with
    /// [`QueuedLimiterError::NotFound`].
    pub fn time_until_ready(
        &self,
        id: Option<&ReservationId>,
    ) -> Result<Duration, QueuedLimiterError> {
        let now = self.shared().clock.now()?;
        self.shared().lock().time_until_ready(id, now)
    }

    /// Time until everything currently queued is ready.
    pub fn wait_time(&self) -> Result<Duration, QueuedLimiterError> {
        let now = self.shared().clock.now()?;
        Ok(self.shared().lock().wait_time(now))
    }

    /// Number of reservations waiting.
    pub fn queued(&self) -> usize {
        self.shared().lock().queue.len()
    }

    /// True when nothing is queued and the pool is full.
    pub fn is_idle(&self) -> bool {
        match self.shared().clock.now() {
            Ok(now) => self.shared().lock().is_idle(now),
            Err(_) => false,
        }
    }
}

impl<C: Clock + 'static> Clone for QueuedLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<C: Clock + 'static> fmt::Debug for QueuedLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedLimiter")
            .field("settings", &self.shared().settings)
            .finish_non_exhaustive()
    }
}

/// A queued reservation: its id and the handle that resolves on fulfillment.
///
/// Awaiting the reservation itself awaits its completion.
#[derive(Debug)]
pub struct Reservation {
    pub id: ReservationId,
    pub completion: Completion,
}

impl IntoFuture for Reservation {
    type Output = ();
    type IntoFuture = Completion;

    fn into_future(self) -> Completion {
        self.completion
    }
}

/// Resolves once, when the dispatcher fulfills the reservation.
///
/// There is no failure path. A canceled reservation is never fulfilled, so its
/// completion stays pending; race it against `tokio::time::timeout` when a
/// deadline matters.
#[must_use = "completions do nothing unless awaited"]
#[derive(Debug)]
pub struct Completion {
    receiver: oneshot::Receiver<()>,
    abandoned: bool,
}

impl Completion {
    fn new(receiver: oneshot::Receiver<()>) -> Self {
        Self {
            receiver,
            abandoned: false,
        }
    }
}

impl Future for Completion {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.abandoned {
            return Poll::Pending;
        }
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(()),
            Poll::Ready(Err(_)) => {
                // sender dropped without firing: canceled
                self.abandoned = true;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
