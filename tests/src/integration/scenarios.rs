//! # Correlation Scenarios
//!
//! Timing and concurrency properties of the call table, sweeper and
//! correlator working together:
//!
//! 1. **Exactly once**: response, sweep and drain racing on the same ids
//! 2. **No premature timeout**: a call is never expired before its window
//! 3. **Bounded wait**: unresolved calls retire within `timeout + sweep_interval`
//! 4. **Idempotent late resolution**: stale responses change nothing
//! 5. **Drain completeness**: nothing is left pending after teardown

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use rand::seq::SliceRandom;
    use rand::Rng;
    use tokio::time::Instant;

    use rpc_correlation::{
        CallCorrelator, CallError, CallId, CallOutcome, CorrelationConfig, CorrelationError,
        PendingCall, PendingCallTable, RemoteFault, Resolution, TimeoutSweeper,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const SWEEP: Duration = Duration::from_millis(10);

    fn correlator(timeout_ms: u64) -> Arc<CallCorrelator<u64>> {
        let config = CorrelationConfig::default()
            .with_default_timeout(Duration::from_millis(timeout_ms))
            .with_sweep_interval(SWEEP);
        Arc::new(CallCorrelator::new(config).unwrap())
    }

    // =============================================================================
    // SCENARIOS FROM THE CALL LIFECYCLE
    // =============================================================================

    /// A 100ms call resolved at 50ms completes with the value
    #[tokio::test(start_paused = true)]
    async fn test_resolve_before_timeout() {
        let correlator = correlator(100);
        let sweeper = correlator.spawn_sweeper();

        let (id, handle) = correlator.issue_call().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(correlator.complete_call(id, 42), Resolution::Resolved);

        assert_eq!(handle.await, Ok(42));
        sweeper.stop().await;
        assert_eq!(correlator.stats().timed_out, 0);
    }

    /// An unresolved 100ms call times out between 100ms and 130ms
    #[tokio::test(start_paused = true)]
    async fn test_unresolved_call_times_out() {
        let correlator = correlator(100);
        let sweeper = correlator.spawn_sweeper();

        let start = Instant::now();
        let (id, handle) = correlator.issue_call().unwrap();
        let err = handle.await.unwrap_err();
        let waited = start.elapsed();

        assert_eq!(
            err,
            CallError::TimedOut {
                id,
                timeout: Duration::from_millis(100)
            }
        );
        assert!(waited >= Duration::from_millis(100), "expired early: {:?}", waited);
        assert!(waited <= Duration::from_millis(130), "expired late: {:?}", waited);
        assert_eq!(correlator.pending_count(), 0);
        sweeper.stop().await;
    }

    /// 1000 concurrent calls: 500 answered in random order, 500 time out
    #[tokio::test(start_paused = true)]
    async fn test_thousand_concurrent_calls() {
        let correlator = correlator(100);
        let sweeper = correlator.spawn_sweeper();

        let mut ids = Vec::with_capacity(1000);
        let mut waiters = Vec::with_capacity(1000);
        for _ in 0..1000 {
            let (id, handle) = correlator.issue_call().unwrap();
            ids.push(id);
            waiters.push(tokio::spawn(handle));
        }
        assert_eq!(correlator.pending_count(), 1000);

        let mut answered: Vec<CallId> = ids.iter().copied().step_by(2).collect();
        answered.shuffle(&mut rand::thread_rng());

        tokio::time::sleep(Duration::from_millis(50)).await;
        for id in &answered {
            assert_eq!(correlator.complete_call(*id, id.as_u64()), Resolution::Resolved);
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(correlator.pending_count(), 0);

        let mut completed = 0;
        let mut timed_out = 0;
        for (id, joined) in ids.iter().zip(join_all(waiters).await) {
            match joined.unwrap() {
                Ok(value) => {
                    assert_eq!(value, id.as_u64());
                    completed += 1;
                }
                Err(e) => {
                    assert!(e.is_timeout(), "unexpected outcome {:?}", e);
                    timed_out += 1;
                }
            }
        }
        assert_eq!(completed, 500);
        assert_eq!(timed_out, 500);

        let report = sweeper.stop().await;
        assert_eq!(report.expired, 500);
        let stats = correlator.stats();
        assert_eq!(stats.completed, 500);
        assert_eq!(stats.timed_out, 500);
        assert_eq!(stats.in_flight(), 0);
    }

    /// Drain before resolution cancels, and the late response is a no-op
    #[tokio::test]
    async fn test_drain_then_late_response() {
        let correlator = correlator(1_000);
        let (id, handle) = correlator.issue_call().unwrap();

        assert_eq!(correlator.drain(), 1);
        assert_eq!(handle.await, Err(CallError::Cancelled { id }));

        assert_eq!(correlator.complete_call(id, 1), Resolution::Stale);
        assert_eq!(
            correlator.fail_call(id, RemoteFault::server_error("late")),
            Resolution::Stale
        );
        assert_eq!(correlator.stats().stale, 2);
    }

    /// A duplicate registration fails and leaves the first call intact
    #[tokio::test]
    async fn test_duplicate_registration() {
        let table = PendingCallTable::<&'static str>::new();
        let (first, first_handle) = PendingCall::new(CallId::new(4), Duration::from_secs(1));
        let (second, _second_handle) = PendingCall::new(CallId::new(4), Duration::from_secs(1));

        table.register(first).unwrap();
        assert_eq!(
            table.register(second),
            Err(CorrelationError::DuplicateRegistration { id: CallId::new(4) })
        );
        assert_eq!(table.len(), 1);

        table.resolve(CallId::new(4), CallOutcome::Completed("first"));
        assert_eq!(first_handle.await, Ok("first"));
    }

    /// Zero and negative timeouts are rejected, 100ms is honored
    #[tokio::test(start_paused = true)]
    async fn test_timeout_configuration() {
        let correlator = correlator(30_000);
        assert!(correlator.configure_timeout_ms(0).is_err());
        assert!(correlator.configure_timeout_ms(-5).is_err());
        assert_eq!(correlator.default_timeout(), Duration::from_secs(30));

        correlator.configure_timeout_ms(100).unwrap();
        let sweeper = correlator.spawn_sweeper();
        let start = Instant::now();
        let (_id, handle) = correlator.issue_call().unwrap();
        assert!(handle.await.unwrap_err().is_timeout());
        assert!(start.elapsed() <= Duration::from_millis(100) + SWEEP);
        sweeper.stop().await;
    }

    // =============================================================================
    // PROPERTIES
    // =============================================================================

    /// Response, fault, sweep and drain racing: every call settles once
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exactly_once_under_races() {
        const CALLS: u64 = 256;

        for _round in 0..20 {
            let table = Arc::new(PendingCallTable::<u64>::new());
            let mut handles = Vec::new();
            for i in 0..CALLS {
                let (call, handle) = PendingCall::new(CallId::new(i), Duration::from_millis(1));
                table.register(call).unwrap();
                handles.push(handle);
            }

            let settled = Arc::new(AtomicUsize::new(0));
            let mut order: Vec<u64> = (0..CALLS).collect();
            order.shuffle(&mut rand::thread_rng());

            let mut racers = Vec::new();
            for id in order.clone() {
                let (table, settled) = (Arc::clone(&table), Arc::clone(&settled));
                racers.push(tokio::spawn(async move {
                    if table.resolve(CallId::new(id), CallOutcome::Completed(id)).retired() {
                        settled.fetch_add(1, Ordering::SeqCst);
                    }
                }));
            }
            for id in order.into_iter().rev() {
                let (table, settled) = (Arc::clone(&table), Arc::clone(&settled));
                racers.push(tokio::spawn(async move {
                    let fault = RemoteFault::server_error("racing fault");
                    if table.resolve(CallId::new(id), CallOutcome::Faulted(fault)).retired() {
                        settled.fetch_add(1, Ordering::SeqCst);
                    }
                }));
            }
            {
                let (table, settled) = (Arc::clone(&table), Arc::clone(&settled));
                racers.push(tokio::spawn(async move {
                    let far = Instant::now() + Duration::from_secs(3600);
                    settled.fetch_add(table.expire_due(far), Ordering::SeqCst);
                }));
            }
            {
                let (table, settled) = (Arc::clone(&table), Arc::clone(&settled));
                racers.push(tokio::spawn(async move {
                    settled.fetch_add(table.drain(), Ordering::SeqCst);
                }));
            }

            for racer in join_all(racers).await {
                racer.unwrap();
            }

            assert_eq!(settled.load(Ordering::SeqCst), CALLS as usize);
            assert!(table.is_empty());
            for handle in handles {
                let outcome = handle.await;
                assert!(
                    !matches!(outcome, Err(CallError::Abandoned { .. })),
                    "call left without an outcome"
                );
            }
            let stats = table.stats().snapshot();
            assert_eq!(stats.retired(), CALLS);
        }
    }

    /// Random per-call timeouts: each call retires inside its window
    #[tokio::test(start_paused = true)]
    async fn test_bounded_wait_for_mixed_timeouts() {
        let table = Arc::new(PendingCallTable::<()>::new());
        let sweeper = TimeoutSweeper::spawn(Arc::clone(&table), SWEEP);
        let mut rng = rand::thread_rng();

        let start = Instant::now();
        let mut waiters = Vec::new();
        for i in 0..200 {
            let timeout = Duration::from_millis(rng.gen_range(5..300));
            let (call, handle) = PendingCall::new(CallId::new(i), timeout);
            table.register(call).unwrap();
            waiters.push(tokio::spawn(async move {
                let err = handle.await.unwrap_err();
                (timeout, start.elapsed(), err)
            }));
        }

        for joined in join_all(waiters).await {
            let (timeout, waited, err) = joined.unwrap();
            assert!(err.is_timeout());
            assert!(waited >= timeout, "expired early: {:?} < {:?}", waited, timeout);
            assert!(waited <= timeout + SWEEP, "expired late: {:?} > {:?}", waited, timeout + SWEEP);
        }

        assert!(table.is_empty());
        assert_eq!(sweeper.stop().await.expired, 200);
    }

    /// Resolving just before the deadline still wins
    #[tokio::test(start_paused = true)]
    async fn test_no_premature_timeout() {
        let table = PendingCallTable::<u8>::new();
        let (call, handle) = PendingCall::new(CallId::new(1), Duration::from_millis(100));
        table.register(call).unwrap();

        tokio::time::advance(Duration::from_millis(99)).await;
        assert_eq!(table.expire_due(Instant::now()), 0);
        assert_eq!(table.resolve(CallId::new(1), CallOutcome::Completed(7)), Resolution::Resolved);
        assert_eq!(handle.await, Ok(7));
    }

    /// Registrations racing a drain are either cancelled or rejected
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_register_racing_drain() {
        let correlator = correlator(60_000);

        let issuers: Vec<_> = (0..8)
            .map(|_| {
                let correlator = Arc::clone(&correlator);
                tokio::spawn(async move {
                    let mut handles = Vec::new();
                    loop {
                        match correlator.issue_call() {
                            Ok((_, handle)) => handles.push(handle),
                            Err(CorrelationError::Closed { .. }) => break,
                            Err(e) => panic!("unexpected {:?}", e),
                        }
                        if handles.len() < 10_000 {
                            tokio::task::yield_now().await;
                        } else {
                            tokio::time::sleep(Duration::from_millis(1)).await;
                        }
                    }
                    handles
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        correlator.drain();

        for issuer in join_all(issuers).await {
            for handle in issuer.unwrap() {
                assert!(handle.await.unwrap_err().is_cancelled());
            }
        }
        assert_eq!(correlator.pending_count(), 0);
    }

    /// A plain thread can wait on a call resolved from async code
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_wait_from_thread() {
        let correlator = correlator(1_000);
        let (id, handle) = correlator.issue_call().unwrap();

        let waiter = tokio::task::spawn_blocking(move || handle.wait_blocking());
        tokio::time::sleep(Duration::from_millis(10)).await;
        correlator.complete_call(id, 99);

        assert_eq!(waiter.await.unwrap(), Ok(99));
    }
}
