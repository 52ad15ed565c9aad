// src/regen.rs

//! Token pool state and its time-based regeneration.
//!
//! Regeneration is lazy: nothing ticks in the background, the pool is brought up
//! to date whenever it is read or the dispatcher looks at it.

// dependencies
use crate::config::LimiterSettings;
use std::time::Duration;

/// Pooled tokens plus the checkpoint regeneration is measured from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PoolState {
    pub(crate) pooled: f64,
    last_regen_nanos: u64,
}

impl PoolState {
    pub(crate) fn new(pooled: f64, now_nanos: u64) -> Self {
        Self {
            pooled,
            last_regen_nanos: now_nanos,
        }
    }

    /// Add the tokens of every whole interval elapsed since the checkpoint and
    /// return the up-to-date pool.
    ///
    /// The checkpoint advances by whole intervals only, so partial progress toward
    /// the next interval is kept. A reading older than the checkpoint counts as no
    /// elapsed time.
    pub(crate) fn regenerate(&mut self, settings: &LimiterSettings, now_nanos: u64) -> f64 {
        let interval_nanos = settings.interval_nanos();
        let intervals = now_nanos.saturating_sub(self.last_regen_nanos) / interval_nanos;
        if intervals == 0 {
            return self.pooled;
        }

        self.pooled =
            (self.pooled + intervals as f64 * settings.regen_amount).min(settings.max_tokens);
        self.last_regen_nanos += intervals * interval_nanos;
        self.pooled
    }

    #[cfg(test)]
    pub(crate) fn last_regen_nanos(&self) -> u64 {
        self.last_regen_nanos
    }
}

/// Time until a shortfall of `deficit` tokens has regenerated, rounded up to whole
/// intervals. Zero when nothing is missing.
pub(crate) fn wait_for_deficit(deficit: f64, settings: &LimiterSettings) -> Duration {
    if deficit <= 0.0 {
        return Duration::ZERO;
    }
    // float to int casts saturate, as does the product
    let intervals = (deficit / settings.regen_amount).ceil() as u64;
    Duration::from_nanos(settings.interval_nanos().saturating_mul(intervals))
}
