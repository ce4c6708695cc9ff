//! Hand-off of already accepted connections

use std::sync::Arc;

use rust_balancer::adapter::{Destination, InboundContext, Network, UdpPacketConn};
use rust_balancer::config::{ConnectionConfig, GroupConfig};
use rust_balancer::connection::{ConnectionManager, RelayConnectionManager};
use rust_balancer::context::RequestContext;
use rust_balancer::group::{GroupDeps, LoadBalanceGroup, OutboundGroup};
use rust_balancer::outbound::{ConnectionHandler, OutboundManager, PacketConnectionHandler};
use rust_balancer::provider::ProviderManager;

use super::common::{as_outbound, counting_close_handler, harness, MockOutbound, ScriptedStrategy};

fn metadata(network: Network) -> InboundContext {
    InboundContext::new("tun-in", network, Destination::domain("example.com", 443))
}

#[tokio::test]
async fn test_stream_handoff_without_candidate() {
    let h = harness(ScriptedStrategy::empty(), &[]);
    h.group.start().await.unwrap();

    let (client, _peer) = tokio::io::duplex(64);
    let (on_close, record) = counting_close_handler();
    h.group
        .new_connection(RequestContext::new(), Box::new(client), metadata(Network::Tcp), on_close)
        .await;

    assert_eq!(h.strategy.pick_count(), 1);
    let calls = h.connections.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].dialer_type, "error");
    assert_eq!(calls[0].dialer_tag, "lb");

    assert_eq!(record.calls(), 1);
    let outcome = record.outcome().unwrap();
    assert!(outcome.unwrap_err().contains("no outbound available"));
}

#[tokio::test]
async fn test_packet_handoff_without_candidate() {
    let h = harness(ScriptedStrategy::empty(), &[]);
    h.group.start().await.unwrap();

    let conn = UdpPacketConn::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let (on_close, record) = counting_close_handler();
    h.group
        .new_packet_connection(RequestContext::new(), Box::new(conn), metadata(Network::Udp), on_close)
        .await;

    let calls = h.connections.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].network, Network::Udp);
    assert_eq!(calls[0].dialer_type, "error");
    assert_eq!(record.calls(), 1);
    assert!(record.outcome().unwrap().unwrap_err().contains("no outbound available"));
}

#[tokio::test]
async fn test_handoff_picks_once_without_retry() {
    let a = MockOutbound::failing("a");
    let h = harness(ScriptedStrategy::always(as_outbound(&a)), &[a.clone()]);
    h.group.start().await.unwrap();

    let (client, _peer) = tokio::io::duplex(64);
    let (on_close, record) = counting_close_handler();
    h.group
        .new_connection(RequestContext::new(), Box::new(client), metadata(Network::Tcp), on_close)
        .await;

    assert_eq!(h.strategy.pick_count(), 1);
    assert_eq!(a.attempts(), 1);
    assert!(h.strategy.failures().is_empty());
    assert_eq!(record.calls(), 1);
    assert!(record.outcome().unwrap().is_err());
}

#[tokio::test]
async fn test_direct_handoff_marks_external() {
    let a = MockOutbound::with_handoff("a");
    let h = harness(ScriptedStrategy::always(as_outbound(&a)), &[a.clone()]);
    h.group.start().await.unwrap();

    let (client, _peer) = tokio::io::duplex(64);
    let (on_close, record) = counting_close_handler();
    h.group
        .new_connection(RequestContext::new(), Box::new(client), metadata(Network::Tcp), on_close)
        .await;

    let conn = UdpPacketConn::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let (packet_close, packet_record) = counting_close_handler();
    h.group
        .new_packet_connection(RequestContext::new(), Box::new(conn), metadata(Network::Udp), packet_close)
        .await;

    assert_eq!(*a.handoffs.lock(), vec![true, true]);
    assert!(h.connections.calls().is_empty());
    assert_eq!(a.attempts(), 0);
    assert_eq!(record.calls(), 1);
    assert_eq!(packet_record.calls(), 1);
    assert_eq!(*h.strategy.picks.lock(), vec![Network::Tcp, Network::Udp]);
}

#[tokio::test]
async fn test_handoff_through_connection_manager() {
    let a = MockOutbound::ok("a");
    let h = harness(ScriptedStrategy::always(as_outbound(&a)), &[a.clone()]);
    h.group.start().await.unwrap();

    let (client, _peer) = tokio::io::duplex(64);
    let (on_close, record) = counting_close_handler();
    h.group
        .new_connection(RequestContext::new(), Box::new(client), metadata(Network::Tcp), on_close)
        .await;

    let calls = h.connections.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].dialer_tag, "a");
    assert!(!calls[0].external);
    assert!(a.handoffs.lock().is_empty());
    assert_eq!(record.calls(), 1);
    assert_eq!(record.outcome(), Some(Ok(())));
}

#[tokio::test]
async fn test_handoff_before_start_fails_through_manager() {
    let a = MockOutbound::ok("a");
    let h = harness(ScriptedStrategy::always(as_outbound(&a)), &[a.clone()]);

    let (client, _peer) = tokio::io::duplex(64);
    let (on_close, record) = counting_close_handler();
    h.group
        .new_connection(RequestContext::new(), Box::new(client), metadata(Network::Tcp), on_close)
        .await;

    assert_eq!(h.strategy.pick_count(), 0);
    assert_eq!(h.connections.calls()[0].dialer_type, "error");
    assert_eq!(record.calls(), 1);
}

#[tokio::test]
async fn test_group_exposes_handoff_capability() {
    let h = harness(ScriptedStrategy::empty(), &[]);
    assert!(rust_balancer::outbound::Outbound::as_connection_handler(&h.group).is_some());
    assert!(rust_balancer::outbound::Outbound::as_packet_connection_handler(&h.group).is_some());
}

#[tokio::test]
async fn test_no_candidate_with_relay_manager() {
    let connections: Arc<dyn ConnectionManager> =
        Arc::new(RelayConnectionManager::new(&ConnectionConfig::default()));
    let deps = GroupDeps::new(
        Arc::new(OutboundManager::new()),
        Arc::new(ProviderManager::new()),
        connections,
    );
    let group = LoadBalanceGroup::new(&GroupConfig::load_balance("lb", vec![]), deps);
    group.start().await.unwrap();

    let (client, _peer) = tokio::io::duplex(64);
    let (on_close, record) = counting_close_handler();
    group
        .new_connection(RequestContext::new(), Box::new(client), metadata(Network::Tcp), on_close)
        .await;

    assert_eq!(record.calls(), 1);
    let message = record.outcome().unwrap().unwrap_err();
    assert!(message.contains("no outbound available"), "{message}");
}
