// tests/limiter/reservation_tests.rs

// These tests never await, so the dispatcher task never gets to run and the
// queue can be inspected exactly as the calls left it.

#[cfg(test)]
mod tests {
    use crate::fixtures::bucket_config;
    use crate::fixtures::test_clock::TestClock;
    use queued_limiter::{QueuedLimiter, QueuedLimiterError, ReservationId};
    use std::time::Duration;

    fn limiter() -> (QueuedLimiter<TestClock>, TestClock) {
        let clock = TestClock::new(0);
        let limiter = QueuedLimiter::with_config(bucket_config(), clock.clone()).unwrap();
        (limiter, clock)
    }

    fn millis(limiter: &QueuedLimiter<TestClock>, id: &ReservationId) -> u128 {
        limiter.time_until_ready(Some(id)).unwrap().as_millis()
    }

    #[tokio::test]
    async fn reserve_queues_before_returning() {
        let (limiter, _) = limiter();
        let first = limiter.reserve(3.0).unwrap();
        let second = limiter.reserve(3.0).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(limiter.queued(), 2);
        // nothing is deducted until the dispatcher runs
        assert_eq!(limiter.pooled_tokens().unwrap(), 5.0);
    }

    #[tokio::test]
    async fn immediately_ready_when_initial_covers_it() {
        let (limiter, _) = limiter();
        let reservation = limiter.reserve(5.0).unwrap();
        assert_eq!(millis(&limiter, &reservation.id), 0);
    }

    #[tokio::test]
    async fn excess_over_initial_waits_whole_intervals() {
        let (limiter, _) = limiter();
        let reservation = limiter.reserve(8.0).unwrap();
        // 3 tokens short at 2 per interval rounds up to 2 intervals
        assert_eq!(millis(&limiter, &reservation.id), 2000);

        limiter.cancel(&reservation.id).unwrap();
        assert_eq!(limiter.queued(), 0);
        assert_eq!(limiter.pooled_tokens().unwrap(), 5.0);
    }

    #[tokio::test]
    async fn wait_times_follow_queue_order() {
        let (limiter, _) = limiter();
        let ids: Vec<ReservationId> = [2.0, 2.0, 2.0, 1.0, 1.0]
            .into_iter()
            .map(|tokens| limiter.reserve(tokens).unwrap().id)
            .collect();

        let waits: Vec<u128> = ids.iter().map(|id| millis(&limiter, id)).collect();
        assert_eq!(waits, vec![0, 0, 1000, 1000, 2000]);

        assert_eq!(limiter.time_until_ready(None).unwrap(), Duration::ZERO);
        assert_eq!(limiter.wait_time().unwrap(), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn cancel_mid_queue_closes_the_gap() {
        let (limiter, _) = limiter();
        let ids: Vec<ReservationId> = [2.0, 2.0, 2.0, 1.0, 1.0]
            .into_iter()
            .map(|tokens| limiter.reserve(tokens).unwrap().id)
            .collect();

        limiter.cancel(&ids[2]).unwrap();

        assert_eq!(limiter.queued(), 4);
        assert_eq!(millis(&limiter, &ids[0]), 0);
        assert_eq!(millis(&limiter, &ids[1]), 0);
        assert_eq!(millis(&limiter, &ids[3]), 0);
        assert_eq!(millis(&limiter, &ids[4]), 1000);
        assert!(matches!(
            limiter.time_until_ready(Some(&ids[2])),
            Err(QueuedLimiterError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn head_wait_reflects_only_the_head() {
        let (limiter, _) = limiter();
        limiter.reserve(8.0).unwrap();
        limiter.reserve(1.0).unwrap();
        assert_eq!(
            limiter.time_until_ready(None).unwrap(),
            Duration::from_millis(2000)
        );
    }

    #[tokio::test]
    async fn unknown_id_operations_leave_state_alone() {
        let (limiter, _) = limiter();
        limiter.reserve(8.0).unwrap();

        let unknown = ReservationId::from("nonExistingId");
        assert!(matches!(
            limiter.cancel(&unknown),
            Err(QueuedLimiterError::NotFound { ref id }) if id == &unknown
        ));
        assert!(matches!(
            limiter.time_until_ready(Some(&unknown)),
            Err(QueuedLimiterError::NotFound { .. })
        ));

        assert_eq!(limiter.queued(), 1);
        assert_eq!(limiter.pooled_tokens().unwrap(), 5.0);
    }

    #[tokio::test]
    async fn cancel_twice_fails_the_second_time() {
        let (limiter, _) = limiter();
        let reservation = limiter.reserve(1.0).unwrap();

        assert!(limiter.cancel(&reservation.id).is_ok());
        assert!(matches!(
            limiter.cancel(&reservation.id),
            Err(QueuedLimiterError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn over_capacity_reservation_is_rejected() {
        let (limiter, _) = limiter();
        let result = limiter.reserve(11.0);

        assert!(matches!(
            result,
            Err(QueuedLimiterError::InvalidReservation { requested, max })
                if requested == 11.0 && max == 10.0
        ));
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test]
    async fn nonsensical_amounts_are_rejected() {
        let (limiter, _) = limiter();
        for tokens in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                limiter.reserve(tokens),
                Err(QueuedLimiterError::InvalidReservation { .. })
            ));
        }
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test]
    async fn reserving_max_is_allowed() {
        let (limiter, _) = limiter();
        let reservation = limiter.reserve(10.0).unwrap();
        assert_eq!(millis(&limiter, &reservation.id), 3000);
    }

    #[tokio::test]
    async fn request_reserves_one_token() {
        let (limiter, _) = limiter();
        let _completion = limiter.request().unwrap();
        assert_eq!(limiter.queued(), 1);
        assert_eq!(limiter.wait_time().unwrap(), Duration::ZERO);
    }

    #[tokio::test]
    async fn update_overwrites_pool_without_clamping() {
        let (limiter, _) = limiter();

        limiter.update(3.0);
        assert_eq!(limiter.pooled_tokens().unwrap(), 3.0);

        limiter.update(50.0);
        assert_eq!(limiter.pooled_tokens().unwrap(), 50.0);
    }

    #[tokio::test]
    async fn update_keeps_regeneration_checkpoint() {
        let (limiter, clock) = limiter();

        clock.set_time(600);
        limiter.update(0.0);
        // the interval started at 0ms, not at the update
        clock.set_time(1000);
        assert_eq!(limiter.pooled_tokens().unwrap(), 2.0);
    }

    #[tokio::test]
    async fn regeneration_shortens_waits() {
        let (limiter, clock) = limiter();
        let reservation = limiter.reserve(8.0).unwrap();

        clock.advance(1000);
        assert_eq!(limiter.pooled_tokens().unwrap(), 7.0);
        assert_eq!(millis(&limiter, &reservation.id), 1000);

        // partial intervals do not count
        clock.advance(999);
        assert_eq!(limiter.pooled_tokens().unwrap(), 7.0);
        clock.advance(1);
        assert_eq!(limiter.pooled_tokens().unwrap(), 9.0);
        assert_eq!(millis(&limiter, &reservation.id), 0);
    }

    #[tokio::test]
    async fn repeated_reads_are_stable_and_capped() {
        let (limiter, clock) = limiter();
        assert_eq!(limiter.pooled_tokens().unwrap(), 5.0);
        assert_eq!(limiter.pooled_tokens().unwrap(), 5.0);

        clock.advance(60_000);
        assert_eq!(limiter.pooled_tokens().unwrap(), 10.0);
        assert!(limiter.is_idle());
    }
}
