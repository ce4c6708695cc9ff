//! Group lifecycle and membership resolution

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rust_balancer::adapter::{Destination, Network};
use rust_balancer::config::{ConnectionConfig, GroupConfig};
use rust_balancer::connection::RelayConnectionManager;
use rust_balancer::context::RequestContext;
use rust_balancer::error::{GroupError, OutboundError, ProviderError, StrategyError};
use rust_balancer::group::{GroupDeps, LoadBalanceGroup, OutboundGroup};
use rust_balancer::outbound::{Outbound, OutboundManager};
use rust_balancer::provider::{MemoryProvider, Provider, ProviderManager};

use super::common::{
    as_outbound, harness, harness_with_factory, MockOutbound, ScriptedFactory, ScriptedStrategy,
};

#[tokio::test]
async fn test_close_before_start_is_noop() {
    let h = harness(ScriptedStrategy::empty(), &[]);

    h.group.close().await.unwrap();
    h.group.close().await.unwrap();
    assert_eq!(h.factory.created.load(Ordering::SeqCst), 0);
    assert_eq!(h.strategy.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_close_releases_strategy_once() {
    let h = harness(ScriptedStrategy::empty(), &[]);
    h.group.start().await.unwrap();
    assert_eq!(h.strategy.starts.load(Ordering::SeqCst), 1);

    h.group.close().await.unwrap();
    h.group.close().await.unwrap();
    assert_eq!(h.strategy.closes.load(Ordering::SeqCst), 1);
    assert!(h.group.is_closed());

    assert!(matches!(h.group.start().await, Err(GroupError::Closed { .. })));
}

#[tokio::test]
async fn test_start_twice() {
    let h = harness(ScriptedStrategy::empty(), &[]);
    h.group.start().await.unwrap();
    assert!(matches!(
        h.group.start().await,
        Err(GroupError::AlreadyStarted { ref tag }) if tag == "lb"
    ));
    assert_eq!(h.factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_member_fails_start_permanently() {
    let a = MockOutbound::ok("a");
    let h = harness(ScriptedStrategy::always(as_outbound(&a)), &[a.clone()]);
    h.outbounds.remove("a");

    let err = h.group.start().await.unwrap_err();
    assert!(matches!(
        err,
        GroupError::ProviderResolution(ProviderError::OutboundNotFound { ref tag }) if tag == "a"
    ));
    assert_eq!(h.factory.created.load(Ordering::SeqCst), 0);
    assert!(!h.group.is_running());

    // No retry after a failed start
    h.outbounds.add(as_outbound(&a));
    assert!(matches!(h.group.start().await, Err(GroupError::Failed { .. })));

    let err = h
        .group
        .dial(&RequestContext::new(), Network::Tcp, &Destination::Unspecified)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, OutboundError::Unavailable { .. }));
    assert_eq!(a.attempts(), 0);

    // Close after a failed start still succeeds
    h.group.close().await.unwrap();
}

#[tokio::test]
async fn test_strategy_construction_error_propagates() {
    let a = MockOutbound::ok("a");
    let factory = ScriptedFactory::failing();
    let h = harness_with_factory(
        ScriptedStrategy::empty(),
        Arc::clone(&factory),
        factory,
        &[a.clone()],
    );

    let err = h.group.start().await.unwrap_err();
    assert!(matches!(err, GroupError::Strategy(StrategyError::InvalidOptions(_))));
    assert!(err.to_string().contains("scripted factory failure"));
    assert!(!h.group.is_running());
}

#[tokio::test]
async fn test_strategy_start_error_propagates() {
    let strategy = ScriptedStrategy::failing_start();
    let h = harness(Arc::clone(&strategy), &[]);

    let err = h.group.start().await.unwrap_err();
    assert!(matches!(err, GroupError::Strategy(StrategyError::Start(_))));
    assert!(!h.group.is_running());

    // The failed strategy is released and never served from
    assert_eq!(strategy.closes.load(Ordering::SeqCst), 1);
    h.group.close().await.unwrap();
    assert_eq!(strategy.closes.load(Ordering::SeqCst), 1);
    assert_eq!(h.group.now(), "");
}

#[tokio::test]
async fn test_zero_providers() {
    let deps = GroupDeps::new(
        Arc::new(OutboundManager::new()),
        Arc::new(ProviderManager::new()),
        Arc::new(RelayConnectionManager::new(&ConnectionConfig::default())),
    );
    let group = LoadBalanceGroup::new(&GroupConfig::load_balance("lb", vec![]), deps);
    group.start().await.unwrap();

    assert!(group.is_running());
    assert_eq!(group.now(), "");
    assert!(group.all().is_empty());
    assert!(group.network().is_empty());

    for _ in 0..3 {
        let err = group
            .dial(&RequestContext::new(), Network::Tcp, &Destination::domain("example.com", 80))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, OutboundError::NoOutboundAvailable));
    }
    let err = group
        .listen_packet(&RequestContext::new(), &Destination::domain("example.com", 53))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, OutboundError::NoOutboundAvailable));

    group.close().await.unwrap();
}

#[tokio::test]
async fn test_now_reports_pick() {
    let a = MockOutbound::ok("a");
    let strategy = ScriptedStrategy::scripted(vec![Some(as_outbound(&a)), None], None);
    let h = harness(strategy, &[a.clone()]);

    // Not running: nothing to show and no pick
    assert_eq!(h.group.now(), "");
    assert_eq!(h.strategy.pick_count(), 0);

    h.group.start().await.unwrap();
    assert_eq!(h.group.now(), "a");
    assert_eq!(h.group.now(), "");
    assert_eq!(*h.strategy.picks.lock(), vec![Network::Tcp, Network::Tcp]);
    assert_eq!(a.attempts(), 0);
}

#[tokio::test]
async fn test_all_logs_then_lists_members() {
    let members = [MockOutbound::ok("a"), MockOutbound::ok("b"), MockOutbound::ok("c")];
    let h = harness(ScriptedStrategy::empty(), &members);
    h.group.start().await.unwrap();

    assert_eq!(h.group.all(), vec!["a", "b", "c"]);
    assert_eq!(h.strategy.log_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.group.all(), vec!["a", "b", "c"]);
    assert_eq!(h.strategy.log_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_network_comes_from_strategy() {
    let h = harness(ScriptedStrategy::with_networks(vec![Network::Udp]), &[]);
    assert!(h.group.network().is_empty());

    h.group.start().await.unwrap();
    assert_eq!(h.group.network(), vec![Network::Udp]);
    assert_eq!(h.group.networks(), vec![Network::Udp]);
    assert!(!h.group.supports(Network::Tcp));
}

#[tokio::test]
async fn test_members_then_providers() {
    let strategy = ScriptedStrategy::empty();
    let factory = ScriptedFactory::new(Arc::clone(&strategy));

    let outbounds = Arc::new(OutboundManager::new());
    outbounds.add(as_outbound(&MockOutbound::ok("m1")));
    outbounds.add(as_outbound(&MockOutbound::ok("m2")));

    let providers = Arc::new(ProviderManager::new());
    let remote: Arc<dyn Provider> = Arc::new(MemoryProvider::new(vec![
        as_outbound(&MockOutbound::ok("p1")),
        as_outbound(&MockOutbound::ok("m1")),
    ]));
    providers.add_with_tag("remote", remote);

    let deps = GroupDeps::new(
        outbounds,
        providers,
        Arc::new(RelayConnectionManager::new(&ConnectionConfig::default())),
    )
    .with_strategies(Arc::clone(&factory) as _);

    let mut config = GroupConfig::load_balance("lb", vec!["m2".into(), "m1".into()]);
    config.providers = vec!["remote".into()];
    let group = LoadBalanceGroup::new(&config, deps);
    group.start().await.unwrap();

    assert_eq!(*factory.members.lock(), vec!["m2", "m1", "p1"]);
    assert_eq!(group.all(), vec!["m2", "m1", "p1"]);
}

#[tokio::test]
async fn test_unknown_provider() {
    let strategy = ScriptedStrategy::empty();
    let deps = GroupDeps::new(
        Arc::new(OutboundManager::new()),
        Arc::new(ProviderManager::new()),
        Arc::new(RelayConnectionManager::new(&ConnectionConfig::default())),
    )
    .with_strategies(ScriptedFactory::new(strategy));

    let mut config = GroupConfig::load_balance("lb", vec![]);
    config.providers = vec!["missing".into()];
    let group = LoadBalanceGroup::new(&config, deps);

    let err = group.start().await.unwrap_err();
    assert!(matches!(
        err,
        GroupError::ProviderResolution(ProviderError::NotFound { ref tag }) if tag == "missing"
    ));
}
