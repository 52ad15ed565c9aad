// tests/limiter/fixtures/mod.rs


// dependencies
use queued_limiter::{QueuedLimiterConfig, TokenConfig};

/// `{ max: 10, regen: 2, initial: 5 }` every 1000ms.
pub fn bucket_config() -> QueuedLimiterConfig {
    QueuedLimiterConfig::new()
        .tokens(TokenConfig::new(2.0).max(10.0).initial(5.0))
        .interval(1000.0)
}
