//! Bounded retry dispatch tests

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::io::AsyncReadExt;

use rust_balancer::adapter::{Destination, Network};
use rust_balancer::context::RequestContext;
use rust_balancer::error::OutboundError;
use rust_balancer::group::{OutboundGroup, MAX_ATTEMPTS};
use rust_balancer::outbound::Outbound;

use super::common::{as_outbound, harness, MockOutbound, ScriptedStrategy};

fn destination() -> Destination {
    Destination::domain("example.com", 443)
}

async fn read_tag(mut stream: rust_balancer::adapter::BoxStream) -> String {
    let mut buf = vec![0u8; 16];
    let n = stream.read(&mut buf).await.unwrap();
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

#[tokio::test]
async fn test_first_success_returns_immediately() {
    let a = MockOutbound::ok("a");
    let h = harness(ScriptedStrategy::always(as_outbound(&a)), &[a.clone()]);
    h.group.start().await.unwrap();

    let stream = h
        .group
        .dial(&RequestContext::new(), Network::Tcp, &destination())
        .await
        .unwrap();

    assert_eq!(read_tag(stream).await, "a");
    assert_eq!(a.attempts(), 1);
    assert_eq!(h.strategy.pick_count(), 1);
    assert!(h.strategy.failures().is_empty());
}

#[tokio::test]
async fn test_attempts_bounded() {
    let a = MockOutbound::failing("a");
    let h = harness(ScriptedStrategy::always(as_outbound(&a)), &[a.clone()]);
    h.group.start().await.unwrap();

    let err = h
        .group
        .dial(&RequestContext::new(), Network::Tcp, &destination())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, OutboundError::Unavailable { ref tag, .. } if tag == "a"));
    assert_eq!(a.attempts(), MAX_ATTEMPTS);
    assert_eq!(h.strategy.pick_count(), MAX_ATTEMPTS);
    assert_eq!(h.strategy.failures(), vec!["a".to_string(); MAX_ATTEMPTS]);
}

#[tokio::test]
async fn test_no_candidate() {
    let a = MockOutbound::ok("a");
    let h = harness(ScriptedStrategy::empty(), &[a.clone()]);
    h.group.start().await.unwrap();

    let err = h
        .group
        .dial(&RequestContext::new(), Network::Tcp, &destination())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, OutboundError::NoOutboundAvailable));
    assert_eq!(err.to_string(), "no outbound available");
    assert_eq!(h.strategy.pick_count(), 1);
    assert_eq!(a.attempts(), 0);
    assert!(h.strategy.failures().is_empty());
}

#[tokio::test]
async fn test_fails_over_to_next_pick() {
    let a = MockOutbound::failing("a");
    let b = MockOutbound::ok("b");
    let c = MockOutbound::ok("c");
    let strategy = ScriptedStrategy::scripted(
        vec![Some(as_outbound(&a)), Some(as_outbound(&a)), Some(as_outbound(&b))],
        None,
    );
    let h = harness(strategy, &[a.clone(), b.clone(), c.clone()]);
    h.group.start().await.unwrap();

    let stream = h
        .group
        .dial(&RequestContext::new(), Network::Tcp, &destination())
        .await
        .unwrap();

    assert_eq!(read_tag(stream).await, "b");
    assert_eq!(h.strategy.failures(), vec!["a".to_string(), "a".to_string()]);
    assert_eq!(a.attempts() + b.attempts() + c.attempts(), 3);
    assert_eq!(h.strategy.pick_count(), 3);
}

#[tokio::test]
async fn test_no_candidate_after_failures() {
    let a = MockOutbound::failing("a");
    let strategy = ScriptedStrategy::scripted(vec![Some(as_outbound(&a))], None);
    let h = harness(strategy, &[a.clone()]);
    h.group.start().await.unwrap();

    let err = h
        .group
        .dial(&RequestContext::new(), Network::Tcp, &destination())
        .await
        .err()
        .unwrap();

    // The terminal no-candidate condition replaces the earlier backend error
    assert!(matches!(err, OutboundError::NoOutboundAvailable));
    assert_eq!(h.strategy.pick_count(), 2);
    assert_eq!(h.strategy.failures(), vec!["a".to_string()]);
}

#[tokio::test]
async fn test_listen_packet_retries_over_udp() {
    let a = MockOutbound::failing_times("a", 1);
    let b = MockOutbound::ok("b");
    let strategy = ScriptedStrategy::scripted(
        vec![Some(as_outbound(&a)), Some(as_outbound(&b))],
        None,
    );
    let h = harness(strategy, &[a.clone(), b.clone()]);
    h.group.start().await.unwrap();

    let conn = h
        .group
        .listen_packet(&RequestContext::new(), &destination())
        .await
        .unwrap();

    assert!(conn.local_addr().is_ok());
    assert_eq!(a.listens.load(Ordering::SeqCst), 1);
    assert_eq!(b.listens.load(Ordering::SeqCst), 1);
    assert_eq!(a.dials.load(Ordering::SeqCst), 0);
    assert_eq!(*h.strategy.picks.lock(), vec![Network::Udp, Network::Udp]);
    assert_eq!(h.strategy.failures(), vec!["a".to_string()]);
}

#[tokio::test]
async fn test_requested_network_passed_to_pick() {
    let a = MockOutbound::ok("a");
    let h = harness(ScriptedStrategy::always(as_outbound(&a)), &[a.clone()]);
    h.group.start().await.unwrap();

    h.group
        .dial(&RequestContext::new(), Network::Udp, &destination())
        .await
        .unwrap();
    assert_eq!(*h.strategy.picks.lock(), vec![Network::Udp]);
}

#[tokio::test]
async fn test_cancellation_consumes_attempts() {
    let a = MockOutbound::hanging("a");
    let h = harness(ScriptedStrategy::always(as_outbound(&a)), &[a.clone()]);
    h.group.start().await.unwrap();

    let ctx = RequestContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        h.group.dial(&ctx, Network::Tcp, &destination()),
    )
    .await
    .expect("cancelled dispatch must return promptly");

    assert!(matches!(result, Err(OutboundError::Cancelled)));
    // Every attempt fails once the context is cancelled and each is reported
    assert_eq!(h.strategy.pick_count(), MAX_ATTEMPTS);
    assert_eq!(h.strategy.failures().len(), MAX_ATTEMPTS);
}

#[tokio::test]
async fn test_dispatch_requires_running_group() {
    let a = MockOutbound::ok("a");
    let h = harness(ScriptedStrategy::always(as_outbound(&a)), &[a.clone()]);

    let err = h
        .group
        .dial(&RequestContext::new(), Network::Tcp, &destination())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, OutboundError::Unavailable { ref tag, .. } if tag == "lb"));

    h.group.start().await.unwrap();
    h.group.close().await.unwrap();

    let err = h
        .group
        .listen_packet(&RequestContext::new(), &destination())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, OutboundError::Unavailable { .. }));
    assert_eq!(h.strategy.pick_count(), 0);
    assert_eq!(a.attempts(), 0);
}

#[tokio::test]
async fn test_concurrent_dispatch() {
    let a = MockOutbound::ok("a");
    let h = std::sync::Arc::new(harness(ScriptedStrategy::always(as_outbound(&a)), &[a.clone()]));
    h.group.start().await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let h = std::sync::Arc::clone(&h);
        tasks.push(tokio::spawn(async move {
            h.group
                .dial(&RequestContext::new(), Network::Tcp, &destination())
                .await
                .is_ok()
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap());
    }
    assert_eq!(a.attempts(), 32);
    assert_eq!(h.group.tag(), "lb");
}
