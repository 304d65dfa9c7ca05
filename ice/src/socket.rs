
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use stun::discovery::{DiscoveryConfig, StunDiscovery};
use stun::message::{is_message, Message};
use stun::requester::{RequestSender, RequesterManager};
use stun::uri::{SchemeType, StunUri};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use turn::client::{TurnClient, TurnClientConfig, TurnClientObserver, TurnClientState};
use util::dns::{Resolver, SrvLookupType};
use util::{BackOffPattern, BufferPool, Conn};

use crate::candidate::{
    dedup_candidates, list_fingerprint, sort_candidates, Candidate, CandidateType,
    LOCAL_PREFERENCE_MAX,
};
use crate::error::*;
use crate::rand_util::{generate_pwd, generate_ufrag};
use crate::session::{CheckTransport, IceSession};
use crate::state::IceSocketState;

/// Rebind cadence while nothing is bound.
const REBIND_WHEN_EMPTY: Duration = Duration::from_secs(2);
/// Rebind cadence while endpoints are up.
const REBIND_WHEN_BOUND: Duration = Duration::from_secs(30);
/// Sleep evaluation cadence.
const SLEEP_TICK: Duration = Duration::from_secs(5);

const DEFAULT_REBIND_MAX_DURATION: Duration = Duration::from_secs(60);
/// Default time TURN allocations stay alive after a wakeup with no
/// user traffic.
const DEFAULT_WAKEUP_LIFETIME: Duration = Duration::from_secs(60);

/// Socket callbacks toward the owner.
#[async_trait]
pub trait IceSocketObserver: Send + Sync {
    async fn on_state_change(&self, state: IceSocketState);
    /// The deduplicated candidate list changed; fetch it with
    /// [`IceSocket::local_candidates`].
    async fn on_candidates_changed(&self);
}

/// Configuration for [`IceSocket::new`].
pub struct IceSocketConfig {
    /// Port to bind on every interface; 0 for ephemeral.
    pub port: u16,
    /// Component id carried by every candidate (1 for the primary
    /// stream socket, 2+ for linked component sockets).
    pub component: u16,
    /// Reuse the credential pair of a related socket so foundations
    /// line up across components; random when None.
    pub credentials: Option<(String, String)>,
    /// Bind exactly these addresses instead of enumerating
    /// interfaces; loopback setups and tests use this.
    pub bind_addresses: Vec<IpAddr>,
    pub ipv6_support: bool,
    pub interface_name_order: Vec<String>,
    pub stun_servers: Vec<StunUri>,
    pub turn_servers: Vec<StunUri>,
    pub turn_username: String,
    pub turn_password: String,
    pub use_channel_binding: bool,
    pub resolver: Arc<dyn Resolver + Send + Sync>,
    pub srv_lookup: SrvLookupType,
    pub software: Option<String>,
    pub rebind_max_duration: Duration,
    /// How long TURN allocations must outlive a wakeup.
    pub wakeup_lifetime: Duration,
    pub observer: Arc<dyn IceSocketObserver>,
}

impl IceSocketConfig {
    pub fn new(resolver: Arc<dyn Resolver + Send + Sync>, observer: Arc<dyn IceSocketObserver>) -> Self {
        IceSocketConfig {
            port: 0,
            component: 1,
            credentials: None,
            bind_addresses: vec![],
            ipv6_support: false,
            interface_name_order: vec![],
            stun_servers: vec![],
            turn_servers: vec![],
            turn_username: String::new(),
            turn_password: String::new(),
            use_channel_binding: false,
            resolver,
            srv_lookup: SrvLookupType::default(),
            software: None,
            rebind_max_duration: DEFAULT_REBIND_MAX_DURATION,
            wakeup_lifetime: DEFAULT_WAKEUP_LIFETIME,
            observer,
        }
    }
}

/// One bound UDP endpoint and the gathering state hanging off it.
struct Endpoint {
    conn: Arc<UdpSocket>,
    local_addr: SocketAddr,
    iface: String,
    local_preference: u16,
    /// Reflexive addresses discovered through the STUN servers.
    reflexive: Mutex<Vec<SocketAddr>>,
    discoveries_done: Mutex<bool>,
    turn_clients: Mutex<Vec<TurnClient>>,
}

/// ICE socket: binds local endpoints, gathers candidates through STUN
/// discovery and TURN allocation, and demultiplexes every inbound
/// datagram across the TURN clients and attached sessions.
#[derive(Clone)]
pub struct IceSocket {
    inner: Arc<SocketInner>,
}

struct SocketInner {
    port: u16,
    component: u16,
    bind_addresses: Vec<IpAddr>,
    ipv6_support: bool,
    interface_name_order: Vec<String>,
    stun_servers: Vec<StunUri>,
    turn_servers: Vec<StunUri>,
    turn_username: String,
    turn_password: String,
    use_channel_binding: bool,
    resolver: Arc<dyn Resolver + Send + Sync>,
    srv_lookup: SrvLookupType,
    software: Option<String>,
    rebind_max_duration: Duration,
    wakeup_lifetime: Duration,
    observer: Arc<dyn IceSocketObserver>,

    /// Immutable for the socket's lifetime.
    ufrag: String,
    pwd: String,

    manager: Arc<RequesterManager>,
    buffers: Arc<BufferPool>,
    state: Mutex<IceSocketState>,
    endpoints: Mutex<Vec<Arc<Endpoint>>>,
    sessions: Mutex<Vec<IceSession>>,
    /// (via-local address, remote source) -> session shortcut,
    /// written on attach/detach and on first match.
    quick_route: Mutex<HashMap<(SocketAddr, SocketAddr), IceSession>>,
    candidate_fingerprint: Mutex<Option<u32>>,
    last_user_traffic: Mutex<Instant>,
    sleep_deadline: Mutex<Option<Instant>>,
    rebind_started: Mutex<Option<Instant>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl IceSocket {
    pub fn new(config: IceSocketConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (ufrag, pwd) = config
            .credentials
            .unwrap_or_else(|| (generate_ufrag(), generate_pwd()));
        IceSocket {
            inner: Arc::new(SocketInner {
                port: config.port,
                component: config.component,
                bind_addresses: config.bind_addresses,
                ipv6_support: config.ipv6_support,
                interface_name_order: config.interface_name_order,
                stun_servers: config.stun_servers,
                turn_servers: config.turn_servers,
                turn_username: config.turn_username,
                turn_password: config.turn_password,
                use_channel_binding: config.use_channel_binding,
                resolver: config.resolver,
                srv_lookup: config.srv_lookup,
                software: config.software,
                rebind_max_duration: config.rebind_max_duration,
                wakeup_lifetime: config.wakeup_lifetime,
                observer: config.observer,
                ufrag,
                pwd,
                manager: RequesterManager::new(),
                buffers: Arc::new(BufferPool::new()),
                state: Mutex::new(IceSocketState::Pending),
                endpoints: Mutex::new(vec![]),
                sessions: Mutex::new(vec![]),
                quick_route: Mutex::new(HashMap::new()),
                candidate_fingerprint: Mutex::new(None),
                last_user_traffic: Mutex::new(Instant::now()),
                sleep_deadline: Mutex::new(None),
                rebind_started: Mutex::new(None),
                shutdown_tx,
                shutdown_rx,
            }),
        }
    }

    /// Binds endpoints and starts gathering; also arms the rebind and
    /// sleep timers.
    pub async fn start(&self) -> Result<()> {
        self.inner.rebind_once().await;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.drive_rebind().await;
        });
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.drive_sleep().await;
        });
        Ok(())
    }

    /// The socket's long-term local credential, fixed at construction.
    pub fn local_credentials(&self) -> (String, String) {
        (self.inner.ufrag.clone(), self.inner.pwd.clone())
    }

    pub fn state(&self) -> IceSocketState {
        *self.inner.state.lock()
    }

    /// The current deduplicated, priority-sorted candidate list.
    pub fn local_candidates(&self) -> Vec<Candidate> {
        self.inner.collect_candidates()
    }

    /// The transport handed to sessions created over this socket.
    pub fn check_transport(&self) -> Arc<dyn CheckTransport> {
        Arc::new(SocketTransport {
            inner: Arc::downgrade(&self.inner),
        })
    }

    /// Registers a session for inbound demultiplexing.
    pub fn attach_session(&self, session: IceSession) {
        self.inner.sessions.lock().push(session);
    }

    /// Removes a session and purges its quick-route entries.
    pub async fn detach_session(&self, session: &IceSession) {
        session.close().await;
        let id = session.ptr_id();
        self.inner.sessions.lock().retain(|s| s.ptr_id() != id);
        self.inner
            .quick_route
            .lock()
            .retain(|_, s| s.ptr_id() != id);
    }

    /// Keeps gathered TURN allocations alive for at least
    /// `min_lifetime` past now; once that passes with no user traffic
    /// the socket goes to sleep. Waking a Sleeping socket re-runs
    /// TURN allocation over the still-bound endpoints.
    pub fn wakeup(&self, min_lifetime: Duration) {
        let lifetime = min_lifetime.max(self.inner.wakeup_lifetime);
        *self.inner.sleep_deadline.lock() = Some(Instant::now() + lifetime);
        *self.inner.last_user_traffic.lock() = Instant::now();

        if *self.inner.state.lock() == IceSocketState::Sleeping {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                inner.set_state(IceSocketState::Ready).await;
                let endpoints: Vec<Arc<Endpoint>> = inner.endpoints.lock().clone();
                for ep in &endpoints {
                    inner.start_turn_clients(ep).await;
                }
                inner.emit_candidates_if_changed().await;
            });
        }
    }

    pub async fn shutdown(&self) {
        self.inner.shutdown().await;
    }
}

impl SocketInner {
    // ---- binding and rebinding ----

    fn wanted_addresses(&self) -> Vec<(String, IpAddr)> {
        if !self.bind_addresses.is_empty() {
            return self
                .bind_addresses
                .iter()
                .map(|ip| (String::from("configured"), *ip))
                .collect();
        }
        util::ifaces::local_interfaces(self.ipv6_support, &self.interface_name_order)
            .unwrap_or_default()
    }

    /// One enumeration pass: bind what is new, tear down what is
    /// gone.
    async fn rebind_once(self: &Arc<Self>) {
        if self.is_terminal() {
            return;
        }

        let wanted = self.wanted_addresses();
        if wanted.is_empty() {
            // stay Pending and keep retrying; fail only when the
            // budget runs out
            let begin = {
                let mut started = self.rebind_started.lock();
                *started.get_or_insert_with(Instant::now)
            };
            if Instant::now().saturating_duration_since(begin) > self.rebind_max_duration {
                self.fail_shutdown().await;
            }
            return;
        }
        *self.rebind_started.lock() = None;

        // tear down endpoints whose address disappeared
        let removed: Vec<Arc<Endpoint>> = {
            let mut endpoints = self.endpoints.lock();
            let (keep, gone): (Vec<_>, Vec<_>) = endpoints
                .drain(..)
                .partition(|ep| wanted.iter().any(|(_, ip)| *ip == ep.local_addr.ip()));
            *endpoints = keep;
            gone
        };
        for ep in &removed {
            log::debug!(
                "address {} on {} disappeared, tearing down",
                ep.local_addr,
                ep.iface
            );
            let clients: Vec<TurnClient> = ep.turn_clients.lock().drain(..).collect();
            for client in clients {
                client.shutdown().await;
            }
        }

        // bind newly appearing addresses
        let mut bound_any = false;
        for (index, (iface, ip)) in wanted.iter().enumerate() {
            let already = {
                let endpoints = self.endpoints.lock();
                endpoints.iter().any(|ep| ep.local_addr.ip() == *ip)
            };
            if already {
                bound_any = true;
                continue;
            }

            match UdpSocket::bind(SocketAddr::new(*ip, self.port)).await {
                Ok(socket) => {
                    let Ok(local_addr) = socket.local_addr() else { continue };
                    log::debug!("bound {local_addr} on {iface}");
                    let endpoint = Arc::new(Endpoint {
                        conn: Arc::new(socket),
                        local_addr,
                        iface: iface.clone(),
                        local_preference: LOCAL_PREFERENCE_MAX
                            .saturating_sub(index as u16),
                        reflexive: Mutex::new(vec![]),
                        discoveries_done: Mutex::new(false),
                        turn_clients: Mutex::new(vec![]),
                    });
                    self.endpoints.lock().push(Arc::clone(&endpoint));
                    bound_any = true;

                    self.spawn_read_loop(Arc::clone(&endpoint));
                    let inner = Arc::clone(self);
                    let ep = Arc::clone(&endpoint);
                    tokio::spawn(async move {
                        inner.gather_endpoint(ep).await;
                    });
                }
                Err(err) => {
                    log::debug!("bind {}:{} failed: {err}", ip, self.port);
                }
            }
        }

        if bound_any {
            if *self.state.lock() == IceSocketState::Pending {
                self.set_state(IceSocketState::Ready).await;
            }
            self.emit_candidates_if_changed().await;
        } else if !removed.is_empty() {
            self.emit_candidates_if_changed().await;
        }
    }

    async fn drive_rebind(self: &Arc<Self>) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            let interval = if self.endpoints.lock().is_empty() {
                REBIND_WHEN_EMPTY
            } else {
                REBIND_WHEN_BOUND
            };
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(interval) => {}
            }
            if self.is_terminal() {
                return;
            }
            self.rebind_once().await;
        }
    }

    // ---- gathering ----

    /// STUN discovery fans out first; TURN allocation starts only
    /// after every discovery on this endpoint settled, and only if no
    /// other endpoint already produced the same reflexive set.
    async fn gather_endpoint(self: &Arc<Self>, endpoint: Arc<Endpoint>) {
        let mut handles = Vec::new();
        for uri in &self.stun_servers {
            if uri.scheme != SchemeType::Stun {
                continue;
            }
            let servers = match self.resolve_uri(uri).await {
                Ok(servers) => servers,
                Err(err) => {
                    log::debug!("stun server {uri} did not resolve: {err}");
                    continue;
                }
            };

            let discovery = StunDiscovery::new(
                Arc::clone(&self.manager),
                Arc::new(EndpointSender {
                    conn: Arc::clone(&endpoint.conn),
                }),
                DiscoveryConfig {
                    servers,
                    software: self.software.clone(),
                    pattern: BackOffPattern::rfc_rto(),
                },
            );
            handles.push(tokio::spawn(async move { discovery.discover().await }));
        }

        let mut reflexive = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(addr)) => {
                    if !reflexive.contains(&addr) {
                        reflexive.push(addr);
                    }
                }
                Ok(Err(err)) => log::debug!("discovery failed: {err}"),
                Err(err) => log::debug!("discovery task panicked: {err}"),
            }
        }

        *endpoint.reflexive.lock() = reflexive.clone();
        *endpoint.discoveries_done.lock() = true;
        self.emit_candidates_if_changed().await;

        if self.turn_servers.is_empty() || self.is_terminal() {
            return;
        }

        // reflexive dedup: a second endpoint behind the same NAT path
        // would just burn a redundant allocation
        let duplicate = {
            let endpoints = self.endpoints.lock();
            endpoints.iter().any(|other| {
                !Arc::ptr_eq(other, &endpoint)
                    && *other.discoveries_done.lock()
                    && !other.turn_clients.lock().is_empty()
                    && !reflexive.is_empty()
                    && *other.reflexive.lock() == reflexive
            })
        };
        if duplicate {
            log::debug!(
                "skipping TURN on {} (duplicate reflexive set)",
                endpoint.local_addr
            );
            return;
        }

        self.start_turn_clients(&endpoint).await;
    }

    async fn start_turn_clients(self: &Arc<Self>, endpoint: &Arc<Endpoint>) {
        for uri in &self.turn_servers {
            if uri.scheme != SchemeType::Turn {
                continue;
            }
            let observer = Arc::new(TurnAdapter {
                socket: Arc::downgrade(self),
                client: Mutex::new(None),
            });
            let client = TurnClient::new(TurnClientConfig {
                use_channel_binding: self.use_channel_binding,
                ..TurnClientConfig::new(
                    vec![uri.clone()],
                    self.turn_username.clone(),
                    self.turn_password.clone(),
                    endpoint.conn.clone() as Arc<dyn Conn + Send + Sync>,
                    Arc::clone(&self.resolver),
                    observer.clone() as Arc<dyn TurnClientObserver>,
                )
            });
            *observer.client.lock() = Some(client.clone());

            if let Err(err) = client.start().await {
                log::debug!("turn client for {uri} failed to start: {err}");
                continue;
            }
            endpoint.turn_clients.lock().push(client);
        }
    }

    async fn resolve_uri(&self, uri: &StunUri) -> Result<Vec<SocketAddr>> {
        if let Ok(ip) = uri.host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, uri.port)]);
        }
        match self
            .resolver
            .lookup_srv(uri.scheme.srv_service(), "udp", &uri.host)
            .await
        {
            Ok(result) => Ok(result
                .endpoints()
                .into_iter()
                .map(|(ip, port)| SocketAddr::new(ip, port))
                .collect()),
            Err(util::Error::ErrDnsNoRecords) | Err(util::Error::ErrDnsNameNotFound)
                if self.srv_lookup == SrvLookupType::AutoHostLookup =>
            {
                let ips = self.resolver.lookup_ip(&uri.host).await?;
                Ok(ips
                    .into_iter()
                    .map(|ip| SocketAddr::new(ip, uri.port))
                    .collect())
            }
            Err(err) => Err(err.into()),
        }
    }

    // ---- candidates ----

    fn collect_candidates(&self) -> Vec<Candidate> {
        let mut out = Vec::new();
        let endpoints = self.endpoints.lock();
        for ep in endpoints.iter() {
            out.push(Candidate::host(
                ep.local_addr,
                self.component,
                ep.local_preference,
                &self.ufrag,
            ));
            for reflexive in ep.reflexive.lock().iter() {
                if *reflexive != ep.local_addr {
                    out.push(Candidate::server_reflexive(
                        *reflexive,
                        ep.local_addr,
                        self.component,
                        ep.local_preference,
                        &self.ufrag,
                    ));
                }
            }
            for client in ep.turn_clients.lock().iter() {
                if client.state() == TurnClientState::Ready {
                    if let Some(relayed) = client.relayed_addr() {
                        out.push(Candidate::relayed(
                            relayed,
                            client.reflexive_addr(),
                            self.component,
                            ep.local_preference,
                            &self.ufrag,
                        ));
                    }
                }
            }
        }
        drop(endpoints);

        let mut out = dedup_candidates(out);
        sort_candidates(&mut out);
        out
    }

    /// Candidates-changed fires only when the CRC over the sorted
    /// tuple list moves.
    async fn emit_candidates_if_changed(&self) {
        let candidates = self.collect_candidates();
        let fingerprint = list_fingerprint(&candidates);
        {
            let mut last = self.candidate_fingerprint.lock();
            if *last == Some(fingerprint) {
                return;
            }
            *last = Some(fingerprint);
        }
        log::debug!(
            "candidate list changed ({} entries, crc 0x{fingerprint:08x})",
            candidates.len()
        );
        self.observer.on_candidates_changed().await;
    }

    // ---- inbound demultiplex ----

    fn spawn_read_loop(self: &Arc<Self>, endpoint: Arc<Endpoint>) {
        let inner = Arc::downgrade(self);
        let buffers = Arc::clone(&self.buffers);
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                let mut buf = buffers.take();
                let received = tokio::select! {
                    _ = shutdown.changed() => return,
                    res = endpoint.conn.recv_from(&mut buf) => res,
                };
                let Some(inner) = inner.upgrade() else { return };
                match received {
                    Ok((n, from)) => {
                        buf.truncate(n);
                        inner.demux(&endpoint, from, &buf).await;
                        buf.resize(util::buffer::RECYCLE_BUFFER_SIZE, 0);
                        buffers.put(buf);
                    }
                    Err(err) => {
                        if util::conn::is_transient_recv_error(&util::Error::from(err)) {
                            continue;
                        }
                        log::debug!("read loop on {} ended", endpoint.local_addr);
                        return;
                    }
                }
            }
        });
    }

    /// Classification order: the endpoint's TURN clients first, then
    /// the shared requester index, then session check handling, then
    /// the quick route for application data.
    async fn demux(self: &Arc<Self>, endpoint: &Arc<Endpoint>, from: SocketAddr, data: &[u8]) {
        let via_local = endpoint.local_addr;

        // TURN: ChannelData framing, Data indications and allocation
        // transactions; only datagrams from a known server are offered
        let clients: Vec<TurnClient> = endpoint.turn_clients.lock().clone();
        for client in &clients {
            if !client.is_server(from) {
                continue;
            }
            match client.handle_inbound(from, data).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(err) => {
                    log::debug!("turn client rejected datagram: {err}");
                    return;
                }
            }
        }

        if is_message(data) {
            let Some(msg) = Message::parse_if_stun(data) else {
                return; // malformed: reject silently
            };
            if self.manager.handle_stun_packet(from, msg.clone()).await {
                return;
            }
            let sessions: Vec<IceSession> = self.sessions.lock().clone();
            for session in &sessions {
                if session.handle_stun_packet(via_local, from, &msg).await {
                    return;
                }
            }
            log::trace!("unclaimed stun packet from {from}");
            return;
        }

        self.deliver_user_data(via_local, from, data.to_vec()).await;
    }

    /// Opaque datagrams go to the owning session via the quick route,
    /// falling back to a linear probe that then warms the route.
    async fn deliver_user_data(&self, via_local: SocketAddr, from: SocketAddr, data: Vec<u8>) {
        *self.last_user_traffic.lock() = Instant::now();

        let routed = {
            let quick_route = self.quick_route.lock();
            quick_route.get(&(via_local, from)).cloned()
        };
        if let Some(session) = routed {
            session.handle_packet(from, data).await;
            return;
        }

        let sessions: Vec<IceSession> = self.sessions.lock().clone();
        for session in sessions {
            if session.accepts_route(via_local, from) {
                self.quick_route
                    .lock()
                    .insert((via_local, from), session.clone());
                session.handle_packet(from, data).await;
                return;
            }
        }
        log::trace!("dropping unroutable datagram from {from}");
    }

    /// Entry point for data surfacing out of a TURN relay: treated
    /// like a datagram that arrived on the relayed address.
    async fn demux_from_relay(self: &Arc<Self>, relayed: SocketAddr, peer: SocketAddr, data: Vec<u8>) {
        if is_message(&data) {
            if let Some(msg) = Message::parse_if_stun(&data) {
                let sessions: Vec<IceSession> = self.sessions.lock().clone();
                for session in &sessions {
                    if session.handle_stun_packet(relayed, peer, &msg).await {
                        return;
                    }
                }
                return;
            }
        }
        self.deliver_user_data(relayed, peer, data).await;
    }

    // ---- sleep ----

    async fn drive_sleep(self: &Arc<Self>) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(SLEEP_TICK) => {}
            }
            if self.is_terminal() {
                return;
            }

            let deadline = *self.sleep_deadline.lock();
            let Some(deadline) = deadline else { continue };
            let now = Instant::now();
            if now < deadline {
                continue;
            }
            let last_traffic = *self.last_user_traffic.lock();
            if last_traffic + self.wakeup_lifetime > now {
                // traffic pushed the goalpost out
                *self.sleep_deadline.lock() = Some(last_traffic + self.wakeup_lifetime);
                continue;
            }
            if *self.state.lock() != IceSocketState::Ready {
                continue;
            }

            // no user traffic through the whole window: park the TURN
            // allocations, keep the UDP endpoints
            self.set_state(IceSocketState::GoingToSleep).await;
            let clients: Vec<TurnClient> = {
                let endpoints = self.endpoints.lock();
                endpoints
                    .iter()
                    .flat_map(|ep| ep.turn_clients.lock().drain(..).collect::<Vec<_>>())
                    .collect()
            };
            for client in clients {
                client.shutdown().await;
            }
            *self.sleep_deadline.lock() = None;
            self.set_state(IceSocketState::Sleeping).await;
            self.emit_candidates_if_changed().await;
        }
    }

    // ---- lifecycle ----

    fn is_terminal(&self) -> bool {
        matches!(
            *self.state.lock(),
            IceSocketState::ShuttingDown | IceSocketState::Shutdown
        )
    }

    async fn set_state(&self, state: IceSocketState) {
        {
            let mut current = self.state.lock();
            if *current == state || *current == IceSocketState::Shutdown {
                return;
            }
            *current = state;
        }
        log::debug!("ice socket state -> {state}");
        self.observer.on_state_change(state).await;
    }

    async fn fail_shutdown(self: &Arc<Self>) {
        log::warn!("rebind budget exhausted with nothing bound");
        self.shutdown().await;
    }

    /// Shutdown cascade: sessions first, then graceful TURN
    /// deallocation, then the endpoints drop with the read loops.
    async fn shutdown(self: &Arc<Self>) {
        if self.is_terminal() {
            return;
        }
        self.set_state(IceSocketState::ShuttingDown).await;

        let sessions: Vec<IceSession> = self.sessions.lock().drain(..).collect();
        for session in sessions {
            session.close().await;
        }
        self.quick_route.lock().clear();

        let clients: Vec<TurnClient> = {
            let endpoints = self.endpoints.lock();
            endpoints
                .iter()
                .flat_map(|ep| ep.turn_clients.lock().drain(..).collect::<Vec<_>>())
                .collect()
        };
        for client in clients {
            client.shutdown().await;
        }

        let _ = self.shutdown_tx.send(true);
        self.manager.close();
        self.endpoints.lock().clear();
        self.set_state(IceSocketState::Shutdown).await;
    }
}

/// Requester sends for STUN discovery ride the endpoint's socket
/// directly.
struct EndpointSender {
    conn: Arc<UdpSocket>,
}

#[async_trait]
impl RequestSender for EndpointSender {
    async fn send_request(&self, data: &[u8], to: SocketAddr) -> stun::Result<()> {
        Conn::send_to(self.conn.as_ref(), data, to)
            .await
            .map(|_| ())
            .map_err(|e| stun::Error::Other(e.to_string()))
    }
}

/// Bridges TURN client events back into the socket: relayed inbound
/// traffic re-enters the demultiplexer, allocation state changes
/// refresh the candidate list.
struct TurnAdapter {
    socket: Weak<SocketInner>,
    client: Mutex<Option<TurnClient>>,
}

#[async_trait]
impl TurnClientObserver for TurnAdapter {
    async fn on_state_change(&self, state: TurnClientState) {
        let Some(socket) = self.socket.upgrade() else { return };
        match state {
            TurnClientState::Ready | TurnClientState::Shutdown => {
                socket.emit_candidates_if_changed().await;
            }
            _ => {}
        }
    }

    async fn on_packet_received(&self, peer: SocketAddr, data: Vec<u8>) {
        let Some(socket) = self.socket.upgrade() else { return };
        let relayed = {
            let client = self.client.lock();
            client.as_ref().and_then(|c| c.relayed_addr())
        };
        let Some(relayed) = relayed else { return };
        socket.demux_from_relay(relayed, peer, data).await;
    }

    async fn on_write_ready(&self) {}
}

/// Routes session checks and data out the right local endpoint:
/// direct UDP for host and reflexive candidates, the TURN data plane
/// for relayed ones.
struct SocketTransport {
    inner: Weak<SocketInner>,
}

#[async_trait]
impl CheckTransport for SocketTransport {
    async fn send_from(&self, local: &Candidate, data: &[u8], remote: SocketAddr) -> Result<()> {
        let Some(inner) = self.inner.upgrade() else {
            return Err(Error::NotReady);
        };
        *inner.last_user_traffic.lock() = Instant::now();

        match local.typ {
            CandidateType::Relayed => {
                let client = {
                    let endpoints = inner.endpoints.lock();
                    endpoints.iter().find_map(|ep| {
                        ep.turn_clients
                            .lock()
                            .iter()
                            .find(|c| c.relayed_addr() == Some(local.addr))
                            .cloned()
                    })
                };
                let Some(client) = client else {
                    return Err(Error::NotReady);
                };
                if client.send_packet(remote, data, true).await {
                    Ok(())
                } else {
                    Err(Error::UnexpectedSocketFailure)
                }
            }
            _ => {
                // reflexive candidates send from their base endpoint
                let base = match local.typ {
                    CandidateType::Host => local.addr,
                    _ => local.related.unwrap_or(local.addr),
                };
                let conn = {
                    let endpoints = inner.endpoints.lock();
                    endpoints
                        .iter()
                        .find(|ep| ep.local_addr == base)
                        .map(|ep| Arc::clone(&ep.conn))
                };
                let Some(conn) = conn else {
                    return Err(Error::NotReady);
                };
                Conn::send_to(conn.as_ref(), data, remote).await?;
                Ok(())
            }
        }
    }
}
