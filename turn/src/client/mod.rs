
pub(crate) mod binding;
pub(crate) mod permission;
pub(crate) mod servers;

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use stun::attributes::{ATTR_REALM, ATTR_XORMAPPED_ADDRESS};
use stun::error_code::*;
use stun::fingerprint::FINGERPRINT;
use stun::integrity::MessageIntegrity;
use stun::message::*;
use stun::requester::{RequestSender, RequesterEvent, RequesterManager};
use stun::textattrs::{Nonce, Realm, TextAttribute};
use stun::uri::{ProtoType, SchemeType, StunUri};
use stun::xoraddr::XorMappedAddress;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{watch, Notify};
use tokio::time::{Duration, Instant};
use util::dns::{Resolver, SrvLookupType};
use util::{BackOffPattern, Conn};

use crate::error::*;
use crate::proto::chandata::ChannelData;
use crate::proto::channum::ChannelNumber;
use crate::proto::data::Data;
use crate::proto::dontfrag::DontFragment;
use crate::proto::lifetime::Lifetime;
use crate::proto::peeraddr::PeerAddress;
use crate::proto::relayaddr::RelayedAddress;
use crate::proto::reqtrans::RequestedTransport;
use crate::proto::ticket::MobilityTicket;
use crate::proto::PROTO_UDP;

use binding::*;
use permission::*;
use servers::*;

/// How often the maintenance tick prunes idle state and refreshes
/// permissions and channels.
const MAINTENANCE_TICK: Duration = Duration::from_secs(30);

/// How often the activation driver re-examines the server race.
const RACE_TICK: Duration = Duration::from_millis(250);

/// Stale-nonce retries per operation; the second attempt normally
/// carries the fresh nonce.
const MAX_STALE_NONCE_RETRIES: usize = 3;

const DEFAULT_LIFETIME: Duration = Duration::from_secs(600);
const DEFAULT_KEEP_ALIVE_MINIMUM: Duration = Duration::from_secs(20);
const REFRESH_BEFORE_EXPIRY: Duration = Duration::from_secs(60);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// TURN client lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnClientState {
    /// Racing candidate servers; no allocation yet.
    Pending,
    /// One server promoted, allocation live.
    Ready,
    /// Deallocating.
    ShuttingDown,
    /// Terminal; see [`TurnClient::last_error`] for the cause.
    Shutdown,
}

impl fmt::Display for TurnClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnClientState::Pending => "pending",
            TurnClientState::Ready => "ready",
            TurnClientState::ShuttingDown => "shutting down",
            TurnClientState::Shutdown => "shutdown",
        };
        write!(f, "{s}")
    }
}

/// Callbacks from the client to its owner. Indications of relayed
/// traffic arrive on `on_packet_received`; `on_write_ready` fires once
/// when the data plane becomes usable.
#[async_trait]
pub trait TurnClientObserver: Send + Sync {
    async fn on_state_change(&self, state: TurnClientState);
    async fn on_packet_received(&self, peer: SocketAddr, data: Vec<u8>);
    async fn on_write_ready(&self);
}

/// Configuration for [`TurnClient::new`].
pub struct TurnClientConfig {
    /// Ordered TURN server URIs; entries may pin a transport with
    /// `?transport=`.
    pub servers: Vec<StunUri>,
    pub username: String,
    pub password: String,
    /// Realm to assume before the server names one.
    pub realm: Option<String>,
    pub software: Option<String>,
    pub resolver: Arc<dyn Resolver + Send + Sync>,
    pub srv_lookup: SrvLookupType,
    pub use_channel_binding: bool,
    /// Restricts channel numbers to a sub-range of 0x4000-0x7FFF.
    pub channel_range: Option<(u16, u16)>,
    /// When non-empty, data-plane destinations outside the list are
    /// silently dropped.
    pub restricted_ips: Vec<IpAddr>,
    pub force_udp: bool,
    pub force_tcp: bool,
    pub dont_fragment: bool,
    /// Ask the server for a mobility ticket (RFC 8016).
    pub mobility: bool,
    pub lifetime: Duration,
    pub keep_alive_minimum: Duration,
    pub backoff: BackOffPattern,
    /// Datagram transport for UDP server entries.
    pub conn: Arc<dyn Conn + Send + Sync>,
    pub observer: Arc<dyn TurnClientObserver>,
}

impl TurnClientConfig {
    pub fn new(
        servers: Vec<StunUri>,
        username: String,
        password: String,
        conn: Arc<dyn Conn + Send + Sync>,
        resolver: Arc<dyn Resolver + Send + Sync>,
        observer: Arc<dyn TurnClientObserver>,
    ) -> Self {
        TurnClientConfig {
            servers,
            username,
            password,
            realm: None,
            software: None,
            resolver,
            srv_lookup: SrvLookupType::default(),
            use_channel_binding: false,
            channel_range: None,
            restricted_ips: vec![],
            force_udp: false,
            force_tcp: false,
            dont_fragment: false,
            mobility: false,
            lifetime: DEFAULT_LIFETIME,
            keep_alive_minimum: DEFAULT_KEEP_ALIVE_MINIMUM,
            backoff: BackOffPattern::rfc_rto(),
            conn,
            observer,
        }
    }
}

/// The live allocation on the promoted server.
#[derive(Debug, Clone)]
struct Allocation {
    server: SocketAddr,
    proto: ProtoType,
    relayed: SocketAddr,
    reflexive: Option<SocketAddr>,
    lifetime: Duration,
    ticket: Option<Vec<u8>>,
}

/// Long-term credential state learned from the server.
#[derive(Default, Clone)]
struct AuthState {
    realm: Option<String>,
    nonce: Option<String>,
    integrity: Option<MessageIntegrity>,
}

/// TURN client: races a set of candidate servers, maintains one
/// allocation with refresh, and relays datagrams through Send/Data
/// indications or bound channels.
#[derive(Clone)]
pub struct TurnClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    conn: Arc<dyn Conn + Send + Sync>,
    resolver: Arc<dyn Resolver + Send + Sync>,
    observer: Arc<dyn TurnClientObserver>,
    manager: Arc<RequesterManager>,

    username: String,
    password: String,
    software: Option<String>,
    srv_lookup: SrvLookupType,
    use_channel_binding: bool,
    restricted_ips: Vec<IpAddr>,
    force_udp: bool,
    force_tcp: bool,
    dont_fragment: bool,
    mobility: bool,
    lifetime: Duration,
    keep_alive_minimum: Duration,
    backoff: BackOffPattern,
    server_uris: Vec<StunUri>,

    state: Mutex<TurnClientState>,
    auth: Mutex<AuthState>,
    servers: Mutex<Vec<ServerEntry>>,
    active: Mutex<Option<Allocation>>,
    perms: Mutex<PermissionMap>,
    perm_tx_inflight: Mutex<bool>,
    bindings: Mutex<BindingMap>,
    last_error: Mutex<Option<Error>>,
    last_sent_at: Mutex<Instant>,
    last_perm_refresh: Mutex<Instant>,
    tcp_queues: Mutex<HashMap<SocketAddr, Arc<SendQueue>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Bounded per-server TCP write queue; overflow evicts the oldest
/// queued packet.
pub(crate) struct SendQueue {
    q: Mutex<QueueState>,
    notify: Notify,
}

struct QueueState {
    packets: std::collections::VecDeque<Vec<u8>>,
    bytes: usize,
    closed: bool,
}

impl SendQueue {
    fn new() -> Arc<Self> {
        Arc::new(SendQueue {
            q: Mutex::new(QueueState {
                packets: std::collections::VecDeque::new(),
                bytes: 0,
                closed: false,
            }),
            notify: Notify::new(),
        })
    }

    fn push(&self, packet: Vec<u8>) {
        {
            let mut q = self.q.lock();
            if q.closed {
                return;
            }
            while q.bytes + packet.len() > MAX_TCP_WRITE_QUEUE_BYTES {
                match q.packets.pop_front() {
                    Some(dropped) => {
                        q.bytes -= dropped.len();
                        log::debug!("tcp write queue full, dropping oldest packet");
                    }
                    None => break,
                }
            }
            q.bytes += packet.len();
            q.packets.push_back(packet);
        }
        self.notify.notify_one();
    }

    /// None once the queue is closed and drained; the writer task
    /// exits and drops its stream half.
    async fn pop(&self) -> Option<Vec<u8>> {
        loop {
            {
                let mut q = self.q.lock();
                if let Some(packet) = q.packets.pop_front() {
                    q.bytes -= packet.len();
                    return Some(packet);
                }
                if q.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    fn close(&self) {
        self.q.lock().closed = true;
        self.notify.notify_waiters();
    }
}

/// Routes requester retransmissions through the client's transports.
struct ClientSender {
    inner: Weak<ClientInner>,
}

#[async_trait]
impl RequestSender for ClientSender {
    async fn send_request(&self, data: &[u8], to: SocketAddr) -> stun::Result<()> {
        let Some(inner) = self.inner.upgrade() else {
            return Err(stun::Error::ErrManagerClosed);
        };
        inner
            .send_raw(data, to)
            .await
            .map_err(|e| stun::Error::Other(e.to_string()))
    }
}

impl TurnClient {
    pub fn new(config: TurnClientConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let now = Instant::now();
        let inner = Arc::new(ClientInner {
            conn: config.conn,
            resolver: config.resolver,
            observer: config.observer,
            manager: RequesterManager::new(),
            username: config.username,
            password: config.password,
            software: config.software,
            srv_lookup: config.srv_lookup,
            use_channel_binding: config.use_channel_binding,
            restricted_ips: config.restricted_ips,
            force_udp: config.force_udp,
            force_tcp: config.force_tcp,
            dont_fragment: config.dont_fragment,
            mobility: config.mobility,
            lifetime: config.lifetime,
            keep_alive_minimum: config.keep_alive_minimum,
            backoff: config.backoff,
            server_uris: config.servers,
            state: Mutex::new(TurnClientState::Pending),
            auth: Mutex::new(AuthState {
                realm: config.realm,
                nonce: None,
                integrity: None,
            }),
            servers: Mutex::new(vec![]),
            active: Mutex::new(None),
            perms: Mutex::new(PermissionMap::new()),
            perm_tx_inflight: Mutex::new(false),
            bindings: Mutex::new(BindingMap::new(config.channel_range)),
            last_error: Mutex::new(None),
            last_sent_at: Mutex::new(now),
            last_perm_refresh: Mutex::new(now),
            tcp_queues: Mutex::new(HashMap::new()),
            shutdown_tx,
            shutdown_rx,
        });
        TurnClient { inner }
    }

    /// Resolves the server list and starts the activation race.
    pub async fn start(&self) -> Result<()> {
        let endpoints = self.inner.resolve_servers().await?;
        if endpoints.is_empty() {
            self.inner.fail(Error::DnsLookupFailure).await;
            return Err(Error::DnsLookupFailure);
        }

        {
            let mut servers = self.inner.servers.lock();
            *servers = stagger_entries(endpoints, Instant::now());
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.drive_race().await;
        });
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.drive_maintenance().await;
        });
        Ok(())
    }

    /// Spawns a read loop on the UDP transport. Optional: an owner
    /// that demultiplexes a shared socket feeds [`Self::handle_inbound`]
    /// instead.
    pub fn listen(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut shutdown = inner.shutdown_rx.clone();
            let mut buf = vec![0u8; 1 << 16];
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    res = inner.conn.recv_from(&mut buf) => match res {
                        Ok((n, from)) => {
                            let data = buf[..n].to_vec();
                            if let Err(err) = inner.handle_inbound(from, &data).await {
                                log::warn!("inbound handling failed: {err}");
                            }
                        }
                        Err(err) => {
                            log::debug!("read loop ending: {err}");
                            inner.fail(Error::UnexpectedSocketFailure).await;
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Classifies and consumes one datagram from the owner's socket.
    /// Returns true when the packet belonged to this client.
    pub async fn handle_inbound(&self, from: SocketAddr, data: &[u8]) -> Result<bool> {
        self.inner.handle_inbound(from, data).await
    }

    /// Relays `data` to `peer` through the allocation. Returns false
    /// when the packet was definitely dropped locally; queuing behind
    /// a pending permission still counts as accepted.
    pub async fn send_packet(&self, peer: SocketAddr, data: &[u8], allow_channel: bool) -> bool {
        self.inner.send_packet(peer, data, allow_channel).await
    }

    /// Graceful deallocation: best-effort Refresh LIFETIME=0, then
    /// Shutdown.
    pub async fn shutdown(&self) {
        self.inner.shutdown().await;
    }

    pub fn state(&self) -> TurnClientState {
        *self.inner.state.lock()
    }

    pub fn relayed_addr(&self) -> Option<SocketAddr> {
        self.inner.active.lock().as_ref().map(|a| a.relayed)
    }

    pub fn reflexive_addr(&self) -> Option<SocketAddr> {
        self.inner.active.lock().as_ref().and_then(|a| a.reflexive)
    }

    pub fn active_server(&self) -> Option<SocketAddr> {
        self.inner.active.lock().as_ref().map(|a| a.server)
    }

    /// True when `addr` is one of this client's candidate (or the
    /// promoted) servers; owners demultiplexing a shared socket use
    /// this to gate what they offer the client.
    pub fn is_server(&self, addr: SocketAddr) -> bool {
        self.inner.servers.lock().iter().any(|e| e.addr == addr)
    }

    /// First fatal error, retained across the shutdown cascade.
    pub fn last_error(&self) -> Option<Error> {
        self.inner.last_error.lock().clone()
    }
}

impl ClientInner {
    // ---- resolution ----

    /// SRV fan-out per scheme and transport, merged UDP-first, with
    /// the option-gated fallback to a bare host lookup.
    async fn resolve_servers(&self) -> Result<Vec<(SocketAddr, ProtoType)>> {
        let mut udp: Vec<(SocketAddr, ProtoType)> = vec![];
        let mut tcp: Vec<(SocketAddr, ProtoType)> = vec![];

        for uri in &self.server_uris {
            if uri.scheme != SchemeType::Turn {
                continue;
            }
            // a bare `turn:` URI races both transports
            let mut protos: Vec<ProtoType> = match uri.transport {
                Some(proto) => vec![proto],
                None => vec![ProtoType::Udp, ProtoType::Tcp],
            };
            if self.force_udp {
                protos.retain(|p| *p == ProtoType::Udp);
            }
            if self.force_tcp {
                protos.retain(|p| *p == ProtoType::Tcp);
            }

            for proto in protos {
                let out = if proto == ProtoType::Udp { &mut udp } else { &mut tcp };
                match self.resolve_one(uri, proto).await {
                    Ok(mut endpoints) => out.append(&mut endpoints),
                    Err(err) => log::debug!("resolution of {uri} ({proto}) failed: {err}"),
                }
            }
        }

        udp.append(&mut tcp);
        Ok(udp)
    }

    async fn resolve_one(
        &self,
        uri: &StunUri,
        proto: ProtoType,
    ) -> Result<Vec<(SocketAddr, ProtoType)>> {
        // IP literals skip DNS entirely
        if let Ok(ip) = uri.host.parse::<IpAddr>() {
            return Ok(vec![(SocketAddr::new(ip, uri.port), proto)]);
        }

        let service = uri.scheme.srv_service();
        let proto_label = match proto {
            ProtoType::Udp => "udp",
            ProtoType::Tcp => "tcp",
        };

        match self
            .resolver
            .lookup_srv(service, proto_label, &uri.host)
            .await
        {
            Ok(result) => Ok(result
                .endpoints()
                .into_iter()
                .map(|(ip, port)| (SocketAddr::new(ip, port), proto))
                .collect()),
            Err(util::Error::ErrDnsNoRecords) | Err(util::Error::ErrDnsNameNotFound)
                if self.srv_lookup == SrvLookupType::AutoHostLookup =>
            {
                let ips = self.resolver.lookup_ip(&uri.host).await?;
                Ok(ips
                    .into_iter()
                    .map(|ip| (SocketAddr::new(ip, uri.port), proto))
                    .collect())
            }
            Err(err) => Err(err.into()),
        }
    }

    // ---- server race ----

    async fn drive_race(self: &Arc<Self>) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            if *shutdown.borrow() {
                return;
            }
            if self.active.lock().is_some() {
                return;
            }

            let now = Instant::now();
            let mut to_activate: Vec<(SocketAddr, ProtoType)> = vec![];
            let mut all_dead = true;
            {
                let mut servers = self.servers.lock();
                for entry in servers.iter_mut() {
                    match entry.state {
                        ServerState::Staged => {
                            all_dead = false;
                            if entry.activate_after <= now {
                                entry.state = ServerState::Activated;
                                to_activate.push((entry.addr, entry.proto));
                            }
                        }
                        ServerState::Activated | ServerState::Active => all_dead = false,
                        ServerState::Dead => {}
                    }
                }
            }

            if all_dead {
                self.fail(Error::FailedToConnectToAnyServer).await;
                return;
            }

            for (addr, proto) in to_activate {
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(err) = inner.attempt_allocation(addr, proto).await {
                        log::debug!("allocation attempt on {addr} failed: {err}");
                        inner.mark_dead(addr);
                    }
                });
            }

            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(RACE_TICK) => {}
            }
        }
    }

    fn mark_dead(&self, addr: SocketAddr) {
        let mut servers = self.servers.lock();
        if let Some(entry) = servers.iter_mut().find(|e| e.addr == addr) {
            if entry.state != ServerState::Active {
                entry.state = ServerState::Dead;
            }
        }
    }

    async fn attempt_allocation(self: &Arc<Self>, addr: SocketAddr, proto: ProtoType) -> Result<()> {
        if proto == ProtoType::Tcp {
            self.connect_tcp(addr).await?;
        }

        let allocation = self.allocate(addr, proto).await?;
        self.promote(allocation).await;
        Ok(())
    }

    /// The Allocate ladder: anonymous first, then authenticated after
    /// 401/438, shedding DONT-FRAGMENT after 420 and the mobility
    /// ticket after 403.
    async fn allocate(self: &Arc<Self>, server: SocketAddr, proto: ProtoType) -> Result<Allocation> {
        let mut include_df = self.dont_fragment;
        let mut include_ticket = self.mobility;
        let mut with_credentials = false;
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            if attempts > 6 {
                return Err(Error::AllocationFailed);
            }

            let msg = self.build_allocate(include_df, include_ticket, with_credentials)?;
            let response = match self.perform(msg, server).await? {
                RequesterEvent::Response { message, .. } => message,
                RequesterEvent::Timeout => return Err(Error::ServerUnreachable),
            };

            if response.typ.class == CLASS_SUCCESS_RESPONSE {
                return self.allocation_from_response(server, proto, &response);
            }

            let mut code = ErrorCodeAttribute::default();
            if code.get_from(&response).is_err() {
                return Err(Error::AllocationFailed);
            }

            match code.code {
                CODE_UNAUTHORIZED => {
                    if with_credentials {
                        return Err(Error::AuthenticationFailed);
                    }
                    self.adopt_challenge(&response)?;
                    with_credentials = true;
                }
                CODE_STALE_NONCE => {
                    self.adopt_nonce(&response);
                    with_credentials = true;
                }
                CODE_UNKNOWN_ATTRIBUTE if include_df => {
                    log::debug!("{server} rejected DONT-FRAGMENT, retrying without");
                    include_df = false;
                }
                CODE_FORBIDDEN if include_ticket => {
                    log::debug!("{server} forbids mobility, retrying without ticket");
                    include_ticket = false;
                }
                other => {
                    log::debug!("allocate rejected by {server}: {other:?}");
                    return Err(Error::AllocationFailed);
                }
            }
        }
    }

    fn build_allocate(
        &self,
        include_df: bool,
        include_ticket: bool,
        with_credentials: bool,
    ) -> Result<Message> {
        let mut msg = Message::new();
        let id = TransactionId::new();
        let requested = RequestedTransport {
            protocol: PROTO_UDP,
        };
        let lifetime = Lifetime(self.lifetime);

        let mut setters: Vec<&dyn Setter> = vec![
            &id,
            &ALLOCATE_REQUEST,
            &lifetime,
            &requested,
        ];

        let df = DontFragment;
        if include_df {
            setters.push(&df);
        }
        let ticket_attr = MobilityTicket(
            self.active
                .lock()
                .as_ref()
                .and_then(|a| a.ticket.clone())
                .unwrap_or_default(),
        );
        if include_ticket {
            setters.push(&ticket_attr);
        }

        let software = self
            .software
            .as_ref()
            .map(|s| TextAttribute::new(stun::attributes::ATTR_SOFTWARE, s.clone()));
        if let Some(software) = software.as_ref() {
            setters.push(software);
        }

        let auth = self.auth.lock().clone();
        let username;
        let realm_attr;
        let nonce_attr;
        let integrity;
        if with_credentials {
            let (Some(realm), Some(nonce), Some(mi)) =
                (auth.realm.clone(), auth.nonce.clone(), auth.integrity.clone())
            else {
                return Err(Error::AuthenticationFailed);
            };
            username = TextAttribute::new(stun::attributes::ATTR_USERNAME, self.username.clone());
            realm_attr = TextAttribute::new(ATTR_REALM, realm);
            nonce_attr = TextAttribute::new(stun::attributes::ATTR_NONCE, nonce);
            integrity = mi;
            setters.push(&username);
            setters.push(&realm_attr);
            setters.push(&nonce_attr);
            setters.push(&integrity);
        }

        setters.push(&FINGERPRINT);
        msg.build(&setters)?;
        Ok(msg)
    }

    fn allocation_from_response(
        &self,
        server: SocketAddr,
        proto: ProtoType,
        response: &Message,
    ) -> Result<Allocation> {
        let mut relayed = RelayedAddress::default();
        relayed.get_from(response)?;

        let reflexive = if response.contains(ATTR_XORMAPPED_ADDRESS) {
            let mut refl = XorMappedAddress::default();
            refl.get_from(response)?;
            Some(SocketAddr::new(refl.ip, refl.port))
        } else {
            None
        };

        let lifetime = if response.contains(stun::attributes::ATTR_LIFETIME) {
            let mut lt = Lifetime::default();
            lt.get_from(response)?;
            lt.0
        } else {
            self.lifetime
        };

        let ticket = if response.contains(stun::attributes::ATTR_MOBILITY_TICKET) {
            let mut t = MobilityTicket::default();
            t.get_from(response)?;
            if t.0.is_empty() {
                None
            } else {
                Some(t.0)
            }
        } else {
            None
        };

        Ok(Allocation {
            server,
            proto,
            relayed: relayed.socket_addr(),
            reflexive,
            lifetime,
            ticket,
        })
    }

    /// Captures realm and nonce from a 401 challenge and derives the
    /// long-term key.
    fn adopt_challenge(&self, response: &Message) -> Result<()> {
        let realm = Realm::get_from_as(response, ATTR_REALM)?.text;
        let nonce = Nonce::get_from_as(response, stun::attributes::ATTR_NONCE)?.text;

        let mut auth = self.auth.lock();
        auth.integrity = Some(MessageIntegrity::new_long_term(
            &self.username,
            &realm,
            &self.password,
        ));
        auth.realm = Some(realm);
        auth.nonce = Some(nonce);
        Ok(())
    }

    fn adopt_nonce(&self, response: &Message) {
        match Nonce::get_from_as(response, stun::attributes::ATTR_NONCE) {
            Ok(nonce) => {
                let mut auth = self.auth.lock();
                if auth.integrity.is_none() {
                    // 438 before any 401: derive the key from whatever
                    // realm the response (or bootstrap config) names
                    if let Ok(realm) = Realm::get_from_as(response, ATTR_REALM) {
                        auth.integrity = Some(MessageIntegrity::new_long_term(
                            &self.username,
                            &realm.text,
                            &self.password,
                        ));
                        auth.realm = Some(realm.text);
                    }
                }
                auth.nonce = Some(nonce.text);
            }
            Err(_) => log::warn!("stale nonce response without NONCE attribute"),
        }
    }

    async fn promote(self: &Arc<Self>, allocation: Allocation) {
        let server = allocation.server;
        {
            let mut active = self.active.lock();
            if active.is_some() {
                // lost the promotion race; at most one Active server
                return;
            }
            *active = Some(allocation);
        }

        // everyone else is out of the race
        let mut stale_queues: Vec<SocketAddr> = vec![];
        {
            let mut servers = self.servers.lock();
            for entry in servers.iter_mut() {
                if entry.addr == server {
                    entry.state = ServerState::Active;
                } else {
                    if entry.proto == ProtoType::Tcp && entry.connected {
                        stale_queues.push(entry.addr);
                    }
                    entry.state = ServerState::Dead;
                }
            }
        }
        {
            let mut queues = self.tcp_queues.lock();
            for addr in stale_queues {
                if let Some(queue) = queues.remove(&addr) {
                    queue.close();
                }
            }
        }

        log::debug!("promoted TURN server {server}");
        self.set_state(TurnClientState::Ready).await;
        self.observer.on_write_ready().await;

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.drive_refresh().await;
        });
    }

    // ---- refresh ----

    fn refresh_interval(&self) -> Duration {
        let lifetime = self
            .active
            .lock()
            .as_ref()
            .map(|a| a.lifetime)
            .unwrap_or(self.lifetime);

        let mut interval = if lifetime > REFRESH_BEFORE_EXPIRY + Duration::from_secs(30) {
            lifetime - REFRESH_BEFORE_EXPIRY
        } else {
            lifetime / 2
        };
        if interval < MIN_REFRESH_INTERVAL {
            interval = MIN_REFRESH_INTERVAL;
        }

        // force an early refresh when nothing has kept the NAT binding
        // warm
        let idle = Instant::now().saturating_duration_since(*self.last_sent_at.lock());
        if idle >= self.keep_alive_minimum && interval > self.keep_alive_minimum {
            interval = self.keep_alive_minimum;
        }
        interval
    }

    async fn drive_refresh(self: &Arc<Self>) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            let interval = self.refresh_interval();
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(interval) => {}
            }
            if *self.state.lock() != TurnClientState::Ready {
                return;
            }

            match self.refresh_allocation(self.lifetime).await {
                Ok(()) => {}
                Err(Error::ServerUnreachable) => {
                    self.fail(Error::RefreshTimeout).await;
                    return;
                }
                Err(err) => {
                    log::warn!("allocation refresh failed: {err}");
                    self.fail(err).await;
                    return;
                }
            }
        }
    }

    async fn refresh_allocation(self: &Arc<Self>, lifetime: Duration) -> Result<()> {
        let server = self
            .active
            .lock()
            .as_ref()
            .map(|a| a.server)
            .ok_or(Error::NotReady)?;

        for _ in 0..MAX_STALE_NONCE_RETRIES {
            let msg = self.build_refresh(lifetime)?;
            let response = match self.perform(msg, server).await? {
                RequesterEvent::Response { message, .. } => message,
                RequesterEvent::Timeout => return Err(Error::ServerUnreachable),
            };

            if response.typ.class == CLASS_SUCCESS_RESPONSE {
                let mut active = self.active.lock();
                if let Some(active) = active.as_mut() {
                    if response.contains(stun::attributes::ATTR_LIFETIME) {
                        let mut lt = Lifetime::default();
                        lt.get_from(&response)?;
                        active.lifetime = lt.0;
                    }
                    if response.contains(stun::attributes::ATTR_MOBILITY_TICKET) {
                        let mut t = MobilityTicket::default();
                        t.get_from(&response)?;
                        active.ticket = if t.0.is_empty() { None } else { Some(t.0) };
                    }
                }
                return Ok(());
            }

            let mut code = ErrorCodeAttribute::default();
            code.get_from(&response)?;
            if code.code == CODE_STALE_NONCE {
                self.adopt_nonce(&response);
                continue;
            }
            return Err(Error::AllocationFailed);
        }
        Err(Error::AllocationFailed)
    }

    fn build_refresh(&self, lifetime: Duration) -> Result<Message> {
        let mut msg = Message::new();
        let id = TransactionId::new();
        let lt = Lifetime(lifetime);

        let auth = self.auth.lock().clone();
        let (Some(realm), Some(nonce), Some(integrity)) = (auth.realm, auth.nonce, auth.integrity)
        else {
            return Err(Error::AuthenticationFailed);
        };
        let username = TextAttribute::new(stun::attributes::ATTR_USERNAME, self.username.clone());
        let realm_attr = TextAttribute::new(ATTR_REALM, realm);
        let nonce_attr = TextAttribute::new(stun::attributes::ATTR_NONCE, nonce);

        let ticket = self
            .active
            .lock()
            .as_ref()
            .and_then(|a| a.ticket.clone())
            .map(MobilityTicket);

        let mut setters: Vec<&dyn Setter> = vec![&id, &REFRESH_REQUEST, &lt];
        if let Some(ticket) = ticket.as_ref() {
            setters.push(ticket);
        }
        setters.push(&username);
        setters.push(&realm_attr);
        setters.push(&nonce_attr);
        setters.push(&integrity);
        setters.push(&FINGERPRINT);
        msg.build(&setters)?;
        Ok(msg)
    }

    // ---- maintenance ----

    async fn drive_maintenance(self: &Arc<Self>) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(MAINTENANCE_TICK) => {}
            }
            if *self.state.lock() != TurnClientState::Ready {
                continue;
            }
            let now = Instant::now();

            {
                let mut perms = self.perms.lock();
                for ip in perms.expire_idle(now) {
                    log::debug!("permission for {ip} expired idle");
                }
            }
            {
                let mut bindings = self.bindings.lock();
                for ip in bindings.expire_idle(now) {
                    log::debug!("channel for {ip} released idle");
                }
            }

            let perm_refresh_due = {
                let last = *self.last_perm_refresh.lock();
                now.saturating_duration_since(last) >= PERMISSION_REFRESH_INTERVAL
                    && self.perms.lock().len() > 0
            };
            if perm_refresh_due {
                self.spawn_permission_work();
            }

            let due = self.bindings.lock().due_for_refresh(now);
            for addr in due {
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    inner.channel_bind(addr, true).await;
                });
            }
        }
    }

    // ---- data plane ----

    async fn send_packet(self: &Arc<Self>, peer: SocketAddr, data: &[u8], allow_channel: bool) -> bool {
        if *self.state.lock() != TurnClientState::Ready {
            return false;
        }
        if !self.restricted_ips.is_empty() && !self.restricted_ips.contains(&peer.ip()) {
            log::debug!("dropping packet to non-allowlisted {peer}");
            return false;
        }

        // channel path
        if allow_channel {
            let now = Instant::now();
            let mut bound_number = None;
            let mut known_peer = false;
            let mut spawn_bind = false;
            {
                let mut bindings = self.bindings.lock();
                if let Some(b) = bindings.get_mut(&peer.ip()) {
                    known_peer = true;
                    if b.state == BindState::Bound || b.state == BindState::Refreshing {
                        b.last_sent_at = now;
                        bound_number = Some(b.number);
                    }
                    // still binding: indications below
                }
                if !known_peer && self.use_channel_binding {
                    if bindings.create(peer, now).is_some() {
                        spawn_bind = true;
                    } else {
                        log::debug!("no channel available for {peer}");
                    }
                }
            }

            if spawn_bind {
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    inner.channel_bind(peer, false).await;
                });
            }
            if let Some(number) = bound_number {
                return self.send_channel_data(number, data).await;
            }
        }

        // indication path, gated on the permission
        let indication = match self.build_send_indication(peer, data) {
            Ok(msg) => msg,
            Err(err) => {
                log::warn!("failed to build send indication: {err}");
                return false;
            }
        };

        let send_now = {
            let mut perms = self.perms.lock();
            let perm = perms.get_or_insert(peer, Instant::now());
            if perm.installed {
                perm.last_sent_at = Instant::now();
                true
            } else {
                perm.pending.push_back(indication.raw.clone());
                false
            }
        };

        if send_now {
            let server = match self.active_server_addr() {
                Some(server) => server,
                None => return false,
            };
            return self.send_raw(&indication.raw, server).await.is_ok();
        }

        self.spawn_permission_work();
        true
    }

    /// Starts a permission-transaction round unless one is already in
    /// flight; peers queued while a round runs are covered by a
    /// follow-up round.
    fn spawn_permission_work(self: &Arc<Self>) {
        {
            let mut inflight = self.perm_tx_inflight.lock();
            if *inflight {
                return;
            }
            *inflight = true;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if let Err(err) = inner.create_permissions().await {
                    log::warn!("permission install failed: {err}");
                    break;
                }
                let uninstalled_left = {
                    let perms = inner.perms.lock();
                    perms.has_uninstalled()
                };
                if !uninstalled_left {
                    break;
                }
            }
            *inner.perm_tx_inflight.lock() = false;
        });
    }

    fn build_send_indication(&self, peer: SocketAddr, data: &[u8]) -> Result<Message> {
        let mut msg = Message::new();
        let id = TransactionId::new();
        let peer_addr = PeerAddress::from(peer);
        let payload = Data(data.to_vec());
        msg.build(&[&id, &SEND_INDICATION, &peer_addr, &payload, &FINGERPRINT])?;
        Ok(msg)
    }

    async fn send_channel_data(&self, number: ChannelNumber, data: &[u8]) -> bool {
        let server = match self.active_server_addr() {
            Some(server) => server,
            None => return false,
        };
        let mut frame = ChannelData::new(number, data.to_vec());
        frame.encode();
        self.send_raw(&frame.raw, server).await.is_ok()
    }

    /// One CreatePermission covering every known peer (clamped to the
    /// learned capacity), retried through stale nonces and capacity
    /// rejections.
    async fn create_permissions(self: &Arc<Self>) -> Result<()> {
        let server = self.active_server_addr().ok_or(Error::NotReady)?;

        for _ in 0..MAX_STALE_NONCE_RETRIES {
            let batch = {
                let perms = self.perms.lock();
                perms.next_batch()
            };
            if batch.is_empty() {
                return Ok(());
            }

            let msg = self.build_create_permission(&batch)?;
            let id = msg.transaction_id;
            self.perms.lock().mark_installing(&batch, id);

            let response = match self.perform(msg, server).await? {
                RequesterEvent::Response { message, .. } => message,
                RequesterEvent::Timeout => {
                    self.perms.lock().abandon_for(&id);
                    return Err(Error::ServerUnreachable);
                }
            };

            if response.typ.class == CLASS_SUCCESS_RESPONSE {
                *self.last_perm_refresh.lock() = Instant::now();
                let flushed = self.perms.lock().install_for(&id);
                for (peer, packets) in flushed {
                    log::debug!("permission installed for {peer}, flushing {} packets", packets.len());
                    for packet in packets {
                        if self.send_raw(&packet, server).await.is_err() {
                            log::warn!("flush to {peer} failed");
                        }
                    }
                }
                return Ok(());
            }

            let mut code = ErrorCodeAttribute::default();
            code.get_from(&response)?;
            self.perms.lock().abandon_for(&id);

            if code.code == CODE_STALE_NONCE {
                self.adopt_nonce(&response);
                continue;
            }
            if code.code.is_insufficient_capacity() {
                let evicted = self.perms.lock().clamp_capacity(batch.len());
                log::debug!("permission capacity clamped, evicted {evicted:?}");
                continue;
            }
            return Err(Error::InsufficientServerCapacity);
        }
        Err(Error::AllocationFailed)
    }

    fn build_create_permission(&self, peers: &[SocketAddr]) -> Result<Message> {
        let mut msg = Message::new();
        let id = TransactionId::new();

        let auth = self.auth.lock().clone();
        let (Some(realm), Some(nonce), Some(integrity)) = (auth.realm, auth.nonce, auth.integrity)
        else {
            return Err(Error::AuthenticationFailed);
        };
        let username = TextAttribute::new(stun::attributes::ATTR_USERNAME, self.username.clone());
        let realm_attr = TextAttribute::new(ATTR_REALM, realm);
        let nonce_attr = TextAttribute::new(stun::attributes::ATTR_NONCE, nonce);
        let peer_attrs: Vec<PeerAddress> = peers.iter().map(|p| PeerAddress::from(*p)).collect();

        let mut setters: Vec<&dyn Setter> = vec![&id, &CREATE_PERMISSION_REQUEST];
        for peer in &peer_attrs {
            setters.push(peer);
        }
        setters.push(&username);
        setters.push(&realm_attr);
        setters.push(&nonce_attr);
        setters.push(&integrity);
        setters.push(&FINGERPRINT);
        msg.build(&setters)?;
        Ok(msg)
    }

    /// Issues (or refreshes) a ChannelBind for the peer's assigned
    /// number. On failure the binding is dropped and traffic falls
    /// back to Send indications.
    async fn channel_bind(self: &Arc<Self>, peer: SocketAddr, refresh: bool) {
        let Some(server) = self.active_server_addr() else { return };

        let number = {
            let mut bindings = self.bindings.lock();
            let Some(b) = bindings.get_mut(&peer.ip()) else { return };
            if refresh {
                b.state = BindState::Refreshing;
            }
            b.number
        };

        let result = self.channel_bind_transaction(server, peer, number).await;

        let mut bindings = self.bindings.lock();
        match result {
            Ok(()) => {
                if let Some(b) = bindings.get_mut(&peer.ip()) {
                    b.state = BindState::Bound;
                    b.bound_at = Instant::now();
                    log::debug!("channel {number} bound to {peer}");
                }
            }
            Err(err) => {
                log::warn!("channel bind {number} for {peer} failed: {err}");
                bindings.remove(&peer.ip());
            }
        }
    }

    async fn channel_bind_transaction(
        self: &Arc<Self>,
        server: SocketAddr,
        peer: SocketAddr,
        number: ChannelNumber,
    ) -> Result<()> {
        for _ in 0..MAX_STALE_NONCE_RETRIES {
            let msg = self.build_channel_bind(peer, number)?;
            let response = match self.perform(msg, server).await? {
                RequesterEvent::Response { message, .. } => message,
                RequesterEvent::Timeout => return Err(Error::ServerUnreachable),
            };

            if response.typ == MessageType::new(METHOD_CHANNEL_BIND, CLASS_SUCCESS_RESPONSE) {
                return Ok(());
            }

            let mut code = ErrorCodeAttribute::default();
            code.get_from(&response)?;
            if code.code == CODE_STALE_NONCE {
                self.adopt_nonce(&response);
                continue;
            }
            return Err(Error::UnexpectedResponse);
        }
        Err(Error::UnexpectedResponse)
    }

    fn build_channel_bind(&self, peer: SocketAddr, number: ChannelNumber) -> Result<Message> {
        let mut msg = Message::new();
        let id = TransactionId::new();
        let peer_addr = PeerAddress::from(peer);

        let auth = self.auth.lock().clone();
        let (Some(realm), Some(nonce), Some(integrity)) = (auth.realm, auth.nonce, auth.integrity)
        else {
            return Err(Error::AuthenticationFailed);
        };
        let username = TextAttribute::new(stun::attributes::ATTR_USERNAME, self.username.clone());
        let realm_attr = TextAttribute::new(ATTR_REALM, realm);
        let nonce_attr = TextAttribute::new(stun::attributes::ATTR_NONCE, nonce);

        msg.build(&[
            &id,
            &CHANNEL_BIND_REQUEST,
            &peer_addr,
            &number,
            &username,
            &realm_attr,
            &nonce_attr,
            &integrity,
            &FINGERPRINT,
        ])?;
        Ok(msg)
    }

    // ---- inbound ----

    async fn handle_inbound(self: &Arc<Self>, from: SocketAddr, data: &[u8]) -> Result<bool> {
        if crate::proto::chandata::is_channel_data(data) {
            return self.handle_channel_data(from, data).await;
        }
        if is_message(data) {
            // malformed framing is rejected silently
            let Some(msg) = Message::parse_if_stun(data) else {
                return Ok(false);
            };
            return self.handle_stun_packet(from, msg).await;
        }
        Ok(false)
    }

    async fn handle_stun_packet(self: &Arc<Self>, from: SocketAddr, msg: Message) -> Result<bool> {
        if msg.typ.class == CLASS_REQUEST {
            // a TURN client never serves requests
            return Ok(false);
        }

        if msg.typ.class == CLASS_INDICATION {
            if msg.typ.method == METHOD_DATA {
                let mut peer = PeerAddress::default();
                peer.get_from(&msg)?;
                let mut payload = Data::default();
                payload.get_from(&msg)?;
                log::trace!("data indication from {} ({} bytes)", peer, payload.0.len());
                self.observer
                    .on_packet_received(peer.socket_addr(), payload.0)
                    .await;
                return Ok(true);
            }
            return Ok(false);
        }

        Ok(self.manager.handle_stun_packet(from, msg).await)
    }

    async fn handle_channel_data(self: &Arc<Self>, _from: SocketAddr, data: &[u8]) -> Result<bool> {
        let mut frame = ChannelData {
            raw: data.to_vec(),
            ..Default::default()
        };
        if let Err(err) = frame.decode() {
            // out-of-range numbers and broken lengths are grounds for
            // shutting the client down
            self.fail(Error::BogusDataOnSocket).await;
            return Err(err);
        }

        self.deliver_channel_data(frame.number, frame.data).await;
        Ok(true)
    }

    /// Feeds raw TCP bytes into a server's reassembly buffer and
    /// dispatches every complete frame.
    async fn handle_tcp_bytes(self: &Arc<Self>, server: SocketAddr, bytes: &[u8]) -> Result<()> {
        {
            let mut servers = self.servers.lock();
            let Some(entry) = servers.iter_mut().find(|e| e.addr == server) else {
                return Ok(());
            };
            entry.stream.extend(bytes);
        }

        loop {
            let frame_result = {
                let mut servers = self.servers.lock();
                let Some(entry) = servers.iter_mut().find(|e| e.addr == server) else {
                    return Ok(());
                };
                entry.stream.next_frame()
            };
            let frame = match frame_result {
                Ok(frame) => frame,
                Err(err) => {
                    self.fail(Error::BogusDataOnSocket).await;
                    return Err(err);
                }
            };

            match frame {
                Some(StreamFrame::Stun(msg)) => {
                    self.handle_stun_packet(server, msg).await?;
                }
                Some(StreamFrame::ChannelData { number, data }) => {
                    self.deliver_channel_data(number, data).await;
                }
                None => return Ok(()),
            }
        }
    }

    async fn deliver_channel_data(&self, number: ChannelNumber, data: Vec<u8>) {
        let peer = {
            let bindings = self.bindings.lock();
            bindings.by_number(number).map(|b| b.addr)
        };
        match peer {
            Some(peer) => self.observer.on_packet_received(peer, data).await,
            None => log::debug!("channel data on unbound channel {number}"),
        }
    }

    // ---- transport ----

    fn active_server_addr(&self) -> Option<SocketAddr> {
        self.active.lock().as_ref().map(|a| a.server)
    }

    fn tcp_queue_for(&self, to: SocketAddr) -> Option<Arc<SendQueue>> {
        self.tcp_queues.lock().get(&to).cloned()
    }

    async fn send_raw(&self, data: &[u8], to: SocketAddr) -> Result<()> {
        *self.last_sent_at.lock() = Instant::now();
        if let Some(queue) = self.tcp_queue_for(to) {
            queue.push(data.to_vec());
            return Ok(());
        }
        self.conn.send_to(data, to).await?;
        Ok(())
    }

    async fn perform(self: &Arc<Self>, msg: Message, server: SocketAddr) -> Result<RequesterEvent> {
        let sender = Arc::new(ClientSender {
            inner: Arc::downgrade(self),
        });
        let (_requester, mut rx) = self
            .manager
            .create_requester(msg, server, self.backoff.clone(), false, sender)
            .await?;
        match rx.recv().await {
            Some(event) => Ok(event),
            None => Err(Error::UserRequestedShutdown),
        }
    }

    async fn connect_tcp(self: &Arc<Self>, server: SocketAddr) -> Result<()> {
        let stream = tokio::time::timeout(
            Duration::from_secs(10),
            tokio::net::TcpStream::connect(server),
        )
        .await
        .map_err(|_| Error::ServerUnreachable)?
        .map_err(|_| Error::ServerUnreachable)?;

        let (mut read_half, mut write_half) = stream.into_split();
        {
            let mut servers = self.servers.lock();
            if let Some(entry) = servers.iter_mut().find(|e| e.addr == server) {
                entry.connected = true;
            }
        }

        let queue = SendQueue::new();
        self.tcp_queues.lock().insert(server, Arc::clone(&queue));

        // writer: drains the bounded queue until it closes
        let writer_inner = Arc::downgrade(self);
        let writer_queue = Arc::clone(&queue);
        tokio::spawn(async move {
            while let Some(packet) = writer_queue.pop().await {
                if writer_inner.upgrade().is_none() {
                    return;
                }
                if let Err(err) = write_half.write_all(&packet).await {
                    log::debug!("tcp write to {server} failed: {err}");
                    if let Some(inner) = writer_inner.upgrade() {
                        inner.on_tcp_disconnect(server).await;
                    }
                    return;
                }
            }
        });

        // reader: feeds the reassembly buffer
        let reader_inner = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1 << 16];
            loop {
                match read_half.read(&mut buf).await {
                    Ok(0) | Err(_) => {
                        if let Some(inner) = reader_inner.upgrade() {
                            inner.on_tcp_disconnect(server).await;
                        }
                        return;
                    }
                    Ok(n) => {
                        let Some(inner) = reader_inner.upgrade() else { return };
                        let discarded = {
                            let servers = inner.servers.lock();
                            servers
                                .iter()
                                .find(|e| e.addr == server)
                                .map(|e| e.state == ServerState::Dead)
                                .unwrap_or(true)
                        };
                        if discarded {
                            return;
                        }
                        if inner.handle_tcp_bytes(server, &buf[..n]).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// A dropped TCP connection is fatal after promotion; before it,
    /// only that candidate dies.
    async fn on_tcp_disconnect(self: &Arc<Self>, server: SocketAddr) {
        self.tcp_queues.lock().remove(&server);
        let promoted = self
            .active
            .lock()
            .as_ref()
            .map(|a| a.server == server)
            .unwrap_or(false);
        if promoted {
            self.fail(Error::UnexpectedSocketFailure).await;
        } else {
            self.mark_dead(server);
        }
    }

    // ---- lifecycle ----

    async fn set_state(&self, state: TurnClientState) {
        {
            let mut current = self.state.lock();
            if *current == state || *current == TurnClientState::Shutdown {
                return;
            }
            *current = state;
        }
        log::debug!("turn client state -> {state}");
        self.observer.on_state_change(state).await;
    }

    /// Fatal-path shutdown; only the first error is retained.
    async fn fail(self: &Arc<Self>, err: Error) {
        {
            let mut last = self.last_error.lock();
            if last.is_none() {
                *last = Some(err);
            }
        }
        self.shutdown().await;
    }

    async fn shutdown(self: &Arc<Self>) {
        {
            let state = self.state.lock();
            if *state == TurnClientState::ShuttingDown || *state == TurnClientState::Shutdown {
                return;
            }
        }
        self.set_state(TurnClientState::ShuttingDown).await;

        // best-effort deallocation: fire one Refresh LIFETIME=0 and
        // walk away
        let had_allocation = self.active.lock().is_some();
        if had_allocation {
            if let Ok(msg) = self.build_refresh(Duration::from_secs(0)) {
                if let Some(server) = self.active_server_addr() {
                    let _ = self.send_raw(&msg.raw, server).await;
                }
            }
        }

        let _ = self.shutdown_tx.send(true);
        self.manager.close();
        {
            let mut active = self.active.lock();
            *active = None;
        }
        {
            let mut queues = self.tcp_queues.lock();
            for (_, queue) in queues.drain() {
                queue.close();
            }
        }
        self.set_state(TurnClientState::Shutdown).await;
    }
}

const ALLOCATE_REQUEST: MessageType = MessageType {
    method: METHOD_ALLOCATE,
    class: CLASS_REQUEST,
};
const REFRESH_REQUEST: MessageType = MessageType {
    method: METHOD_REFRESH,
    class: CLASS_REQUEST,
};
const CREATE_PERMISSION_REQUEST: MessageType = MessageType {
    method: METHOD_CREATE_PERMISSION,
    class: CLASS_REQUEST,
};
const CHANNEL_BIND_REQUEST: MessageType = MessageType {
    method: METHOD_CHANNEL_BIND,
    class: CLASS_REQUEST,
};
const SEND_INDICATION: MessageType = MessageType {
    method: METHOD_SEND,
    class: CLASS_INDICATION,
};
