//! # Loopback Flows
//!
//! Client, response listener and scripted peer over the in-memory transport.
//!
//! ## Flows Tested:
//!
//! 1. **Concurrent calls**: many callers share one session, each gets its own answer
//! 2. **Late response**: a call times out, its answer arrives afterwards and is dropped
//! 3. **Transport loss**: the response stream closes and every waiting call is cancelled
//! 4. **Aborted dispatch**: a peer that never answers is handled by the timeout alone

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::future::join_all;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    use rpc_correlation::adapters::loopback::{self, ScriptedPeer};
    use rpc_correlation::{
        CallError, CorrelationConfig, FrameReceiver, ResponseFrame, ResponseListener, RpcClient,
        Session, TransportError,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn session(timeout_ms: u64) -> Session<Value> {
        let config = CorrelationConfig::default()
            .with_default_timeout(Duration::from_millis(timeout_ms))
            .with_sweep_interval(Duration::from_millis(10));
        Session::open(config).unwrap()
    }

    /// Receiver fed directly by the test, standing in for a socket reader
    struct ManualReceiver(tokio::sync::Mutex<mpsc::Receiver<ResponseFrame>>);

    #[async_trait]
    impl FrameReceiver for ManualReceiver {
        async fn receive(&self) -> Result<ResponseFrame, TransportError> {
            self.0.lock().await.recv().await.ok_or(TransportError::Closed)
        }
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_get_their_own_answers() {
        let session = session(1_000);
        let (sender, receiver, end) = loopback::channel(64);
        let peer = ScriptedPeer::new(end)
            .with_latency(Duration::from_millis(3))
            .spawn();
        let listener = tokio::spawn(ResponseListener::new(session.api(), Arc::new(receiver)).run());
        let client = RpcClient::new(session.api(), Arc::new(sender));

        let calls = (0..200).map(|n| {
            let client = client.clone();
            tokio::spawn(async move { (n, client.call("echo", json!({ "n": n })).await) })
        });
        for joined in join_all(calls).await {
            let (n, result) = joined.unwrap();
            assert_eq!(result, Ok(json!({ "n": n })));
        }

        drop(client);
        assert_eq!(peer.await.unwrap().answered, 200);
        let report = listener.await.unwrap();
        assert_eq!(report.routed, 200);
        assert_eq!(report.stale, 0);

        let closed = session.close().await;
        assert_eq!(closed.cancelled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_is_stale() {
        let session = session(1_000);
        let (sender, receiver, end) = loopback::channel(8);
        let peer = ScriptedPeer::new(end)
            .with_latency(Duration::from_millis(200))
            .spawn();
        let listener = tokio::spawn(ResponseListener::new(session.api(), Arc::new(receiver)).run());
        let client = RpcClient::new(session.api(), Arc::new(sender));

        let err = client
            .call_with_timeout("echo", json!("slow"), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        drop(client);
        peer.await.unwrap();
        let report = listener.await.unwrap();
        assert_eq!(report.routed, 0);
        assert_eq!(report.stale, 1);

        let stats = session.correlator().stats();
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.stale, 1);
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_loss_cancels_waiting_calls() {
        let session = session(60_000);
        let (sender, _peer_end_kept_silent) = {
            let (sender, _receiver, end) = loopback::channel(64);
            (sender, end)
        };
        let (resp_tx, resp_rx) = mpsc::channel(8);
        let listener = tokio::spawn(
            ResponseListener::new(
                session.api(),
                Arc::new(ManualReceiver(tokio::sync::Mutex::new(resp_rx))),
            )
            .run(),
        );
        let client = RpcClient::new(session.api(), Arc::new(sender));

        let waiting: Vec<_> = (0..10)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.call("echo", Value::Null).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(session.correlator().pending_count(), 10);

        // Connection drops: no more responses will ever arrive.
        drop(resp_tx);
        let report = listener.await.unwrap();
        assert_eq!(report.drained, 10);

        for joined in join_all(waiting).await {
            assert!(matches!(joined.unwrap(), Err(CallError::Cancelled { .. })));
        }

        // New calls on the torn down session are rejected up front.
        let err = client.call("echo", Value::Null).await.unwrap_err();
        assert!(matches!(err, CallError::Rejected(_)));
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_relies_on_timeout() {
        let session = session(100);
        let (sender, receiver, end) = loopback::channel(16);
        let peer = ScriptedPeer::new(end).spawn();
        let listener = tokio::spawn(ResponseListener::new(session.api(), Arc::new(receiver)).run());
        let client = RpcClient::new(session.api(), Arc::new(sender));

        let start = tokio::time::Instant::now();
        let (silent, echo) = tokio::join!(
            client.call("silent", json!([1])),
            client.call("echo", json!([2]))
        );
        assert!(silent.unwrap_err().is_timeout());
        assert_eq!(echo, Ok(json!([2])));
        assert!(start.elapsed() <= Duration::from_millis(110));

        drop(client);
        assert_eq!(peer.await.unwrap().ignored, 1);
        listener.await.unwrap();
        session.close().await;
    }
}
