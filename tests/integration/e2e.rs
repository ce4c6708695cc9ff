//! Configuration to running groups over loopback sockets

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use rust_balancer::adapter::{Destination, InboundContext, Network};
use rust_balancer::config::load_config_str;
use rust_balancer::connection::{close_handler, RelayConnectionManager};
use rust_balancer::context::RequestContext;
use rust_balancer::error::{ConnectionError, OutboundError};
use rust_balancer::group::{GroupDeps, GroupRegistry, OutboundGroup};
use rust_balancer::outbound::{ConnectionHandler, Outbound, OutboundManagerBuilder};
use rust_balancer::provider::ProviderManager;

const CONFIG: &str = r#"{
    "outbounds": [
        { "tag": "block", "type": "block" },
        { "tag": "direct", "type": "direct" }
    ],
    "groups": [
        {
            "tag": "balance",
            "type": "load-balance",
            "outbounds": ["block", "direct"],
            "strategy": { "algorithm": "round_robin", "max_failures": 1 }
        }
    ]
}"#;

async fn echo_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                while let Ok(n) = stream.read(&mut buf).await {
                    if n == 0 || stream.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

async fn build() -> (Arc<dyn OutboundGroup>, Arc<RelayConnectionManager>) {
    let config = load_config_str(CONFIG).unwrap();

    let mut builder = OutboundManagerBuilder::new();
    builder.add_all_from_config(&config.outbounds);
    let connections = Arc::new(RelayConnectionManager::new(&config.connection));
    let deps = GroupDeps::new(
        Arc::new(builder.build()),
        Arc::new(ProviderManager::new()),
        Arc::clone(&connections) as _,
    );

    let mut groups = GroupRegistry::with_defaults()
        .create_all(&config.groups, &deps)
        .unwrap();
    assert!(deps.outbounds.contains("balance"));

    let group = groups.remove(0);
    group.start().await.unwrap();
    (group, connections)
}

#[tokio::test]
async fn test_failover_from_block_to_direct() {
    let addr = echo_server().await;
    let (group, _connections) = build().await;

    assert_eq!(group.all(), vec!["block", "direct"]);
    assert_eq!(group.network(), vec![Network::Tcp, Network::Udp]);

    // Round-robin starts at block, which refuses and leaves the rotation
    let mut stream = group
        .dial(&RequestContext::new(), Network::Tcp, &Destination::from(addr))
        .await
        .unwrap();
    stream.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    // Only direct is left in rotation
    assert_eq!(group.now(), "direct");
    assert_eq!(group.now(), "direct");

    group.close().await.unwrap();
}

#[tokio::test]
async fn test_all_members_failing() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (group, _connections) = build().await;
    let err = group
        .dial(&RequestContext::new(), Network::Tcp, &Destination::from(addr))
        .await
        .err()
        .unwrap();

    // block and direct each fail once, then nothing is left to pick
    assert!(matches!(err, OutboundError::NoOutboundAvailable));
    assert_eq!(group.now(), "");
    group.close().await.unwrap();
}

#[tokio::test]
async fn test_handoff_relays_through_member() {
    let addr = echo_server().await;
    let (group, connections) = build().await;

    // Take block out of rotation first
    let _ = group
        .dial(&RequestContext::new(), Network::Tcp, &Destination::from(addr))
        .await
        .unwrap();

    let (client, mut peer) = tokio::io::duplex(64);
    let (tx, rx) = tokio::sync::oneshot::channel::<Result<(), ConnectionError>>();
    let handler = group.as_connection_handler().unwrap();
    handler
        .new_connection(
            RequestContext::new(),
            Box::new(client),
            InboundContext::new("test", Network::Tcp, Destination::from(addr)),
            close_handler(move |result| {
                let _ = tx.send(result);
            }),
        )
        .await;

    peer.write_all(b"hello").await.unwrap();
    let mut buf = [0u8; 5];
    peer.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello");
    drop(peer);

    assert!(rx.await.unwrap().is_ok());
    assert_eq!(connections.stats_snapshot().completed, 1);
    group.close().await.unwrap();
}
