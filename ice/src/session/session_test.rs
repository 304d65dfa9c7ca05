use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use tokio::sync::mpsc;
use tokio::time::timeout;

use super::*;

/// Delivers frames between in-process sessions keyed by the
/// recipient's local address.
#[derive(Default)]
struct Router {
    targets: Mutex<HashMap<SocketAddr, IceSession>>,
}

impl Router {
    fn attach(&self, addr: SocketAddr, session: IceSession) {
        self.targets.lock().insert(addr, session);
    }
}

struct RouterTransport {
    router: Arc<Router>,
}

#[async_trait]
impl CheckTransport for RouterTransport {
    async fn send_from(&self, local: &Candidate, data: &[u8], remote: SocketAddr) -> Result<()> {
        let target = self.router.targets.lock().get(&remote).cloned();
        let Some(target) = target else {
            return Ok(()); // dropped on the virtual floor
        };

        let from = local.addr;
        let payload = data.to_vec();
        tokio::spawn(async move {
            match Message::parse_if_stun(&payload) {
                Some(msg) => {
                    target.handle_stun_packet(remote, from, &msg).await;
                }
                None => target.handle_packet(from, payload).await,
            }
        });
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
enum Ev {
    State(IceSessionState),
    WriteReady,
    Packet(SocketAddr, Vec<u8>),
}

struct RecObserver {
    tx: mpsc::UnboundedSender<Ev>,
}

#[async_trait]
impl IceSessionObserver for RecObserver {
    async fn on_state_change(&self, state: IceSessionState) {
        let _ = self.tx.send(Ev::State(state));
    }

    async fn on_write_ready(&self) {
        let _ = self.tx.send(Ev::WriteReady);
    }

    async fn on_packet_received(&self, from: SocketAddr, data: Vec<u8>) {
        let _ = self.tx.send(Ev::Packet(from, data));
    }
}

fn sa(last: u8, port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)), port)
}

struct Peer {
    session: IceSession,
    events: mpsc::UnboundedReceiver<Ev>,
}

fn make_peer(
    router: &Arc<Router>,
    role: Role,
    tie_breaker: u64,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    local_creds: (&str, &str),
    remote_creds: (&str, &str),
) -> Peer {
    let (tx, rx) = mpsc::unbounded_channel();
    let local = Candidate::host(local_addr, 1, 0xffff, local_creds.0);
    let remote = Candidate::host(remote_addr, 1, 0xffff, remote_creds.0);

    let session = IceSession::new(IceSessionConfig {
        role,
        tie_breaker,
        local_ufrag: local_creds.0.to_owned(),
        local_pwd: local_creds.1.to_owned(),
        remote_ufrag: remote_creds.0.to_owned(),
        remote_pwd: remote_creds.1.to_owned(),
        local_candidates: vec![local],
        remote_candidates: vec![remote],
        transport: Arc::new(RouterTransport {
            router: Arc::clone(router),
        }),
        observer: Arc::new(RecObserver { tx }),
    });
    router.attach(local_addr, session.clone());
    Peer { session, events: rx }
}

async fn wait_ready(peer: &mut Peer) {
    timeout(Duration::from_secs(120), async {
        loop {
            match peer.events.recv().await.expect("events closed") {
                Ev::State(IceSessionState::Ready) => return,
                Ev::State(IceSessionState::Failed) => panic!("session failed"),
                _ => {}
            }
        }
    })
    .await
    .expect("session never became ready");
}

#[test]
fn test_pair_priority_formula() {
    // 2^32 * min(G,D) + 2 * max(G,D) + (G>D ? 1 : 0)
    assert_eq!(pair_priority(100, 200), (1u64 << 32) * 100 + 400);
    assert_eq!(pair_priority(200, 100), (1u64 << 32) * 100 + 400 + 1);
    assert_eq!(pair_priority(7, 7), (1u64 << 32) * 7 + 14);
}

#[tokio::test]
async fn test_pairs_formed_per_component_sorted() {
    let router = Arc::new(Router::default());
    let (tx, _rx) = mpsc::unbounded_channel();

    let locals = vec![
        Candidate::host(sa(1, 4000), 1, 0xffff, "uf"),
        Candidate::relayed(sa(1, 4001), None, 1, 0xffff, "uf"),
        Candidate::host(sa(1, 4002), 2, 0xffff, "uf"),
    ];
    let remotes = vec![
        Candidate::host(sa(2, 4000), 1, 0xffff, "ruf"),
        Candidate::host(sa(2, 4002), 2, 0xffff, "ruf"),
    ];

    let session = IceSession::new(IceSessionConfig {
        role: Role::Controlling,
        tie_breaker: 42,
        local_ufrag: "uf".to_owned(),
        local_pwd: "pw".to_owned(),
        remote_ufrag: "ruf".to_owned(),
        remote_pwd: "rpw".to_owned(),
        local_candidates: locals,
        remote_candidates: remotes,
        transport: Arc::new(RouterTransport { router }),
        observer: Arc::new(RecObserver { tx }),
    });

    let pairs = session.inner.pairs.lock();
    // components must match: 2 pairs for component 1, 1 for component 2
    assert_eq!(pairs.len(), 3);
    assert!(pairs
        .iter()
        .all(|p| p.local.component == p.remote.component));

    // descending pair priority
    let role = Role::Controlling;
    for w in pairs.windows(2) {
        assert!(w[0].priority(role) >= w[1].priority(role));
    }
    // the host-host pair outranks relay-host
    assert_eq!(pairs[0].local.typ, CandidateType::Host);
}

#[tokio::test(start_paused = true)]
async fn test_connectivity_and_nomination() {
    let router = Arc::new(Router::default());
    let mut a = make_peer(
        &router,
        Role::Controlling,
        0,
        sa(1, 4000),
        sa(2, 4000),
        ("ufA", "pwA"),
        ("ufB", "pwB"),
    );
    let mut b = make_peer(
        &router,
        Role::Controlled,
        0,
        sa(2, 4000),
        sa(1, 4000),
        ("ufB", "pwB"),
        ("ufA", "pwA"),
    );

    a.session.start().await;
    b.session.start().await;

    wait_ready(&mut a).await;
    wait_ready(&mut b).await;

    let (local, remote) = a.session.selected_pair().unwrap();
    assert_eq!(local.addr, sa(1, 4000));
    assert_eq!(remote.addr, sa(2, 4000));

    // data plane: A -> B
    assert!(a.session.send_packet(b"across the pair").await);
    timeout(Duration::from_secs(30), async {
        loop {
            match b.events.recv().await.unwrap() {
                Ev::Packet(from, data) => {
                    assert_eq!(from, sa(1, 4000));
                    assert_eq!(data, b"across the pair");
                    return;
                }
                _ => {}
            }
        }
    })
    .await
    .unwrap();
}

// Both sides start controlling; the smaller tie-breaker answers 487
// and flips to controlled on its next check.
#[tokio::test(start_paused = true)]
async fn test_role_conflict_smaller_tie_breaker_switches() {
    let router = Arc::new(Router::default());
    let mut a = make_peer(
        &router,
        Role::Controlling,
        0x0000_0000_0000_0001,
        sa(1, 4000),
        sa(2, 4000),
        ("ufA", "pwA"),
        ("ufB", "pwB"),
    );
    let mut b = make_peer(
        &router,
        Role::Controlling,
        0x8000_0000_0000_0000,
        sa(2, 4000),
        sa(1, 4000),
        ("ufB", "pwB"),
        ("ufA", "pwA"),
    );

    a.session.start().await;
    b.session.start().await;

    wait_ready(&mut a).await;
    wait_ready(&mut b).await;

    assert_eq!(a.session.role(), Role::Controlled);
    assert_eq!(b.session.role(), Role::Controlling);
}

#[tokio::test]
async fn test_inbound_check_rejects_foreign_username() {
    let router = Arc::new(Router::default());
    let peer = make_peer(
        &router,
        Role::Controlled,
        0,
        sa(1, 4000),
        sa(2, 4000),
        ("ufA", "pwA"),
        ("ufB", "pwB"),
    );

    let mut msg = Message::new();
    let username = TextAttribute::new(ATTR_USERNAME, "wrong:pair".to_owned());
    msg.build(&[&TransactionId::new(), &BINDING_REQUEST, &username])
        .unwrap();
    MessageIntegrity::new_short_term("pwA")
        .add_to(&mut msg)
        .unwrap();

    assert!(
        !peer
            .session
            .handle_stun_packet(sa(1, 4000), sa(2, 4000), &msg)
            .await
    );
}

#[tokio::test]
async fn test_inbound_check_learns_peer_reflexive() {
    let router = Arc::new(Router::default());
    let peer = make_peer(
        &router,
        Role::Controlled,
        0,
        sa(1, 4000),
        sa(2, 4000),
        ("ufA", "pwA"),
        ("ufB", "pwB"),
    );

    // a validated check from an address outside the remote candidate
    // list creates a prflx pair
    let surprise = sa(9, 9999);
    let mut msg = Message::new();
    let username = TextAttribute::new(ATTR_USERNAME, "ufA:ufB".to_owned());
    msg.build(&[&TransactionId::new(), &BINDING_REQUEST, &username])
        .unwrap();
    msg.add(ATTR_PRIORITY, &0x6e00_01ffu32.to_be_bytes());
    MessageIntegrity::new_short_term("pwA")
        .add_to(&mut msg)
        .unwrap();
    FINGERPRINT.add_to(&mut msg).unwrap();

    assert!(
        peer.session
            .handle_stun_packet(sa(1, 4000), surprise, &msg)
            .await
    );

    let pairs = peer.session.inner.pairs.lock();
    let learned = pairs
        .iter()
        .find(|p| p.remote.addr == surprise)
        .expect("prflx pair missing");
    assert_eq!(learned.remote.typ, CandidateType::PeerReflexive);
    assert_eq!(learned.remote.priority, 0x6e00_01ff);
}

#[tokio::test]
async fn test_inbound_check_with_unknown_required_attr_gets_420() {
    struct CaptureTransport {
        sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    }

    #[async_trait]
    impl CheckTransport for CaptureTransport {
        async fn send_from(
            &self,
            _local: &Candidate,
            data: &[u8],
            remote: SocketAddr,
        ) -> Result<()> {
            self.sent.lock().push((remote, data.to_vec()));
            Ok(())
        }
    }

    let transport = Arc::new(CaptureTransport {
        sent: Mutex::new(vec![]),
    });
    let (tx, _rx) = mpsc::unbounded_channel();
    let session = IceSession::new(IceSessionConfig {
        role: Role::Controlled,
        tie_breaker: 0,
        local_ufrag: "ufA".to_owned(),
        local_pwd: "pwA".to_owned(),
        remote_ufrag: "ufB".to_owned(),
        remote_pwd: "pwB".to_owned(),
        local_candidates: vec![Candidate::host(sa(1, 4000), 1, 0xffff, "ufA")],
        remote_candidates: vec![Candidate::host(sa(2, 4000), 1, 0xffff, "ufB")],
        transport: transport.clone(),
        observer: Arc::new(RecObserver { tx }),
    });

    let mut msg = Message::new();
    let username = TextAttribute::new(ATTR_USERNAME, "ufA:ufB".to_owned());
    msg.build(&[&TransactionId::new(), &BINDING_REQUEST, &username])
        .unwrap();
    msg.add(stun::attributes::AttrType(0x7ffe), b"mystery0");
    MessageIntegrity::new_short_term("pwA")
        .add_to(&mut msg)
        .unwrap();
    FINGERPRINT.add_to(&mut msg).unwrap();

    assert!(session.handle_stun_packet(sa(1, 4000), sa(2, 4000), &msg).await);

    let sent = transport.sent.lock();
    assert_eq!(sent.len(), 1);
    let response = Message::parse_if_stun(&sent[0].1).unwrap();
    assert_eq!(response.typ, BINDING_ERROR);

    let mut code = ErrorCodeAttribute::default();
    code.get_from(&response).unwrap();
    assert_eq!(code.code, stun::error_code::CODE_UNKNOWN_ATTRIBUTE);

    let mut unknown = UnknownAttributes::default();
    unknown.get_from(&response).unwrap();
    assert_eq!(unknown.0, vec![stun::attributes::AttrType(0x7ffe)]);
}

#[tokio::test(start_paused = true)]
async fn test_all_pairs_failed_fails_session() {
    // transport into the void plus a tiny retry budget: the session
    // must land in Failed, not spin
    let router = Arc::new(Router::default());
    let mut peer = make_peer(
        &router,
        Role::Controlling,
        0,
        sa(1, 4000),
        sa(2, 4000),
        ("ufA", "pwA"),
        ("ufB", "pwB"),
    );
    // the remote is never attached to the router

    peer.session.start().await;

    timeout(Duration::from_secs(60), async {
        loop {
            match peer.events.recv().await.unwrap() {
                Ev::State(IceSessionState::Failed) => return,
                Ev::State(IceSessionState::Ready) => panic!("cannot be ready"),
                _ => {}
            }
        }
    })
    .await
    .expect("session never failed");
}
