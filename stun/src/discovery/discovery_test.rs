use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::*;
use crate::addr::MappedAddress;

/// Sender that answers Binding requests from a chosen set of servers
/// by pumping responses back into the manager.
struct ScriptedServers {
    manager: Arc<RequesterManager>,
    responsive: Vec<SocketAddr>,
    reflexive: SocketAddr,
    requests_seen: Mutex<Vec<SocketAddr>>,
}

#[async_trait::async_trait]
impl RequestSender for ScriptedServers {
    async fn send_request(&self, data: &[u8], to: SocketAddr) -> Result<()> {
        self.requests_seen.lock().push(to);
        if !self.responsive.contains(&to) {
            return Ok(()); // black hole
        }

        let request = Message::parse_if_stun(data).expect("request must be stun");
        let mut response = Message::new();
        response
            .build(&[&request.transaction_id, &BINDING_SUCCESS])
            .unwrap();
        let xor_addr = XorMappedAddress {
            ip: self.reflexive.ip(),
            port: self.reflexive.port(),
        };
        xor_addr.add_to(&mut response).unwrap();

        let manager = Arc::clone(&self.manager);
        tokio::spawn(async move {
            manager.handle_stun_packet(to, response).await;
        });
        Ok(())
    }
}

fn addr(last: u8, port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, last)), port)
}

#[tokio::test]
async fn test_discovery_first_server_succeeds() {
    let manager = RequesterManager::new();
    let reflexive = addr(200, 51000);
    let sender = Arc::new(ScriptedServers {
        manager: Arc::clone(&manager),
        responsive: vec![addr(1, 3478)],
        reflexive,
        requests_seen: Mutex::new(vec![]),
    });

    let discovery = StunDiscovery::new(
        manager,
        sender.clone(),
        DiscoveryConfig {
            servers: vec![addr(1, 3478), addr(2, 3478)],
            software: None,
            pattern: BackOffPattern::fixed(Duration::from_millis(20), 2),
        },
    );

    assert_eq!(discovery.discover().await.unwrap(), reflexive);
    assert_eq!(sender.requests_seen.lock().as_slice(), &[addr(1, 3478)]);
}

#[tokio::test(start_paused = true)]
async fn test_discovery_advances_past_dead_server() {
    let manager = RequesterManager::new();
    let reflexive = addr(200, 51000);
    let sender = Arc::new(ScriptedServers {
        manager: Arc::clone(&manager),
        responsive: vec![addr(2, 3478)],
        reflexive,
        requests_seen: Mutex::new(vec![]),
    });

    let discovery = StunDiscovery::new(
        manager,
        sender.clone(),
        DiscoveryConfig {
            servers: vec![addr(1, 3478), addr(2, 3478)],
            software: Some("discovery test".to_owned()),
            pattern: BackOffPattern::fixed(Duration::from_millis(20), 2),
        },
    );

    assert_eq!(discovery.discover().await.unwrap(), reflexive);
    // dead server was tried (and retried) before moving on
    let seen = sender.requests_seen.lock();
    assert!(seen.iter().filter(|a| **a == addr(1, 3478)).count() >= 2);
    assert_eq!(*seen.last().unwrap(), addr(2, 3478));
}

#[tokio::test(start_paused = true)]
async fn test_discovery_exhaustion_fails() {
    let manager = RequesterManager::new();
    let sender = Arc::new(ScriptedServers {
        manager: Arc::clone(&manager),
        responsive: vec![],
        reflexive: addr(200, 51000),
        requests_seen: Mutex::new(vec![]),
    });

    let discovery = StunDiscovery::new(
        manager,
        sender,
        DiscoveryConfig {
            servers: vec![addr(1, 3478), addr(2, 3478)],
            software: None,
            pattern: BackOffPattern::fixed(Duration::from_millis(20), 2),
        },
    );

    assert_eq!(
        discovery.discover().await.unwrap_err(),
        Error::ErrNoServersReachable
    );
}

#[tokio::test]
async fn test_discovery_accepts_plain_mapped_address() {
    // RFC 3489-era server: MAPPED-ADDRESS only
    struct LegacyServer {
        manager: Arc<RequesterManager>,
        reflexive: SocketAddr,
    }

    #[async_trait::async_trait]
    impl RequestSender for LegacyServer {
        async fn send_request(&self, data: &[u8], to: SocketAddr) -> Result<()> {
            let request = Message::parse_if_stun(data).unwrap();
            let mut response = Message::new();
            response
                .build(&[&request.transaction_id, &BINDING_SUCCESS])
                .unwrap();
            MappedAddress {
                ip: self.reflexive.ip(),
                port: self.reflexive.port(),
            }
            .add_to(&mut response)
            .unwrap();

            let manager = Arc::clone(&self.manager);
            tokio::spawn(async move {
                manager.handle_stun_packet(to, response).await;
            });
            Ok(())
        }
    }

    let manager = RequesterManager::new();
    let reflexive = addr(77, 1024);
    let sender = Arc::new(LegacyServer {
        manager: Arc::clone(&manager),
        reflexive,
    });

    let discovery = StunDiscovery::new(
        manager,
        sender,
        DiscoveryConfig {
            servers: vec![addr(1, 3478)],
            ..Default::default()
        },
    );
    assert_eq!(discovery.discover().await.unwrap(), reflexive);
}
