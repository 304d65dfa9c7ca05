#[cfg(test)]
mod session_test;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use stun::attributes::{ATTR_PRIORITY, ATTR_USERNAME};
use stun::error_code::{ErrorCodeAttribute, CODE_ROLE_CONFLICT, CODE_UNKNOWN_ATTRIBUTE};
use stun::fingerprint::FINGERPRINT;
use stun::integrity::MessageIntegrity;
use stun::message::*;
use stun::textattrs::{TextAttribute, Username};
use stun::uattrs::UnknownAttributes;
use stun::xoraddr::XorMappedAddress;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

use crate::candidate::{Candidate, CandidateType};
use crate::control::{AttrControl, Role, TieBreaker};
use crate::error::*;
use crate::rand_util::generate_tie_breaker;
use crate::state::IceSessionState;
use crate::usecand::UseCandidate;

/// Checks are paced by a randomized timer in this window.
pub(crate) const CHECK_PACING_MIN: Duration = Duration::from_millis(200);
pub(crate) const CHECK_PACING_MAX: Duration = Duration::from_millis(600);

/// Retransmissions of an unanswered check before its pair fails.
const MAX_CHECK_RETRIES: usize = 5;

/// Base wait for a check answer; doubles per retry up to the cap.
const CHECK_RTO: Duration = Duration::from_millis(500);
const CHECK_RTO_CAP: Duration = Duration::from_secs(3);

/// Keepalive cadence on the selected pair once nominated.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Sends check traffic for a session: `local` names the candidate
/// whose endpoint must emit the bytes (direct UDP for host/reflexive,
/// through the TURN client for relayed).
#[async_trait]
pub trait CheckTransport: Send + Sync {
    async fn send_from(&self, local: &Candidate, data: &[u8], remote: SocketAddr) -> Result<()>;
}

/// Session callbacks toward the owner.
#[async_trait]
pub trait IceSessionObserver: Send + Sync {
    async fn on_state_change(&self, state: IceSessionState);
    /// The nominated pair is usable; `send_packet` may be called.
    async fn on_write_ready(&self);
    async fn on_packet_received(&self, from: SocketAddr, data: Vec<u8>);
}

/// Pair check progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Waiting,
    InProgress,
    Succeeded,
    Failed,
}

/// RFC 5245 Section 5.7.2 pair priority: G is the controlling side's
/// candidate priority, D the controlled side's.
pub fn pair_priority(controlling: u32, controlled: u32) -> u64 {
    let (g, d) = (controlling as u64, controlled as u64);
    (1u64 << 32) * g.min(d) + 2 * g.max(d) + u64::from(g > d)
}

/// A local/remote candidate combination under test.
#[derive(Debug, Clone)]
pub struct CandidatePair {
    pub local: Candidate,
    pub remote: Candidate,
    pub state: PairState,
    pub nominated: bool,
    retries: usize,
    last_check_at: Option<Instant>,
    outstanding: Option<TransactionId>,
    outstanding_use_candidate: bool,
}

impl CandidatePair {
    fn new(local: Candidate, remote: Candidate) -> Self {
        CandidatePair {
            local,
            remote,
            state: PairState::Waiting,
            nominated: false,
            retries: 0,
            last_check_at: None,
            outstanding: None,
            outstanding_use_candidate: false,
        }
    }

    fn priority(&self, role: Role) -> u64 {
        match role {
            Role::Controlling => pair_priority(self.local.priority, self.remote.priority),
            Role::Controlled => pair_priority(self.remote.priority, self.local.priority),
        }
    }

    fn rto(&self) -> Duration {
        let mut rto = CHECK_RTO;
        for _ in 0..self.retries {
            rto = rto.saturating_mul(2);
            if rto >= CHECK_RTO_CAP {
                return CHECK_RTO_CAP;
            }
        }
        rto
    }
}

/// Configuration for [`IceSession::new`].
pub struct IceSessionConfig {
    pub role: Role,
    /// Random when zero.
    pub tie_breaker: u64,
    pub local_ufrag: String,
    pub local_pwd: String,
    pub remote_ufrag: String,
    pub remote_pwd: String,
    pub local_candidates: Vec<Candidate>,
    pub remote_candidates: Vec<Candidate>,
    pub transport: Arc<dyn CheckTransport>,
    pub observer: Arc<dyn IceSessionObserver>,
}

/// One ICE session: pairs local and remote candidates, runs
/// prioritized connectivity checks, resolves roles and nominates a
/// pair for the data plane.
#[derive(Clone)]
pub struct IceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    transport: Arc<dyn CheckTransport>,
    observer: Arc<dyn IceSessionObserver>,
    local_ufrag: String,
    local_pwd: String,
    remote_ufrag: String,
    remote_pwd: String,
    tie_breaker: u64,
    role: Mutex<Role>,
    pairs: Mutex<Vec<CandidatePair>>,
    selected: Mutex<Option<usize>>,
    state: Mutex<IceSessionState>,
    last_keepalive: Mutex<Instant>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl IceSession {
    /// Forms the pair list (same-component combinations, priority
    /// descending). Checks start with [`IceSession::start`].
    pub fn new(config: IceSessionConfig) -> Self {
        let mut pairs = Vec::new();
        for local in &config.local_candidates {
            for remote in &config.remote_candidates {
                if local.component == remote.component {
                    pairs.push(CandidatePair::new(local.clone(), remote.clone()));
                }
            }
        }
        let role = config.role;
        pairs.sort_by_key(|p| std::cmp::Reverse(p.priority(role)));

        let tie_breaker = if config.tie_breaker == 0 {
            generate_tie_breaker()
        } else {
            config.tie_breaker
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        IceSession {
            inner: Arc::new(SessionInner {
                transport: config.transport,
                observer: config.observer,
                local_ufrag: config.local_ufrag,
                local_pwd: config.local_pwd,
                remote_ufrag: config.remote_ufrag,
                remote_pwd: config.remote_pwd,
                tie_breaker,
                role: Mutex::new(role),
                pairs: Mutex::new(pairs),
                selected: Mutex::new(None),
                state: Mutex::new(IceSessionState::New),
                last_keepalive: Mutex::new(Instant::now()),
                shutdown_tx,
                shutdown_rx,
            }),
        }
    }

    /// Starts the paced check loop.
    pub async fn start(&self) {
        self.inner.set_state(IceSessionState::Searching).await;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.drive_checks().await;
        });
    }

    pub fn state(&self) -> IceSessionState {
        *self.inner.state.lock()
    }

    pub fn role(&self) -> Role {
        *self.inner.role.lock()
    }

    pub fn tie_breaker(&self) -> u64 {
        self.inner.tie_breaker
    }

    /// The nominated (local, remote) pair, once Ready.
    pub fn selected_pair(&self) -> Option<(Candidate, Candidate)> {
        let selected = self.inner.selected.lock();
        let pairs = self.inner.pairs.lock();
        selected
            .and_then(|i| pairs.get(i))
            .map(|p| (p.local.clone(), p.remote.clone()))
    }

    /// Sends user data down the selected pair. False means dropped
    /// locally.
    pub async fn send_packet(&self, data: &[u8]) -> bool {
        let Some((local, remote)) = self.selected_pair() else {
            return false;
        };
        self.inner
            .transport
            .send_from(&local, data, remote.addr)
            .await
            .is_ok()
    }

    /// Offers an inbound STUN message observed on `via_local` from
    /// `from`. Consumes check traffic for this session; anything else
    /// returns false.
    pub async fn handle_stun_packet(
        &self,
        via_local: SocketAddr,
        from: SocketAddr,
        msg: &Message,
    ) -> bool {
        self.inner.handle_stun_packet(via_local, from, msg).await
    }

    /// True when this session owns the (via-local, remote-source)
    /// path; the socket's quick-route map is built from this.
    pub fn accepts_route(&self, via_local: SocketAddr, from: SocketAddr) -> bool {
        let pairs = self.inner.pairs.lock();
        pairs
            .iter()
            .any(|p| p.local.addr == via_local && p.remote.addr == from)
    }

    /// Delivers an application datagram that arrived on this
    /// session's path.
    pub async fn handle_packet(&self, from: SocketAddr, data: Vec<u8>) {
        self.inner.observer.on_packet_received(from, data).await;
    }

    pub async fn close(&self) {
        let _ = self.inner.shutdown_tx.send(true);
        self.inner.set_state(IceSessionState::Shutdown).await;
    }

    /// Stable identity for ownership bookkeeping (quick-route purges,
    /// detach).
    pub fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl SessionInner {
    async fn set_state(&self, state: IceSessionState) {
        {
            let mut current = self.state.lock();
            if *current == state || *current == IceSessionState::Shutdown {
                return;
            }
            *current = state;
        }
        log::debug!("ice session state -> {state}");
        self.observer.on_state_change(state).await;
    }

    // ---- outbound checks ----

    async fn drive_checks(self: &Arc<Self>) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            let wait = {
                let mut rng = rand::thread_rng();
                Duration::from_millis(rng.gen_range(
                    CHECK_PACING_MIN.as_millis() as u64..=CHECK_PACING_MAX.as_millis() as u64,
                ))
            };
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(wait) => {}
            }

            let state = *self.state.lock();
            match state {
                IceSessionState::Searching => self.check_tick().await,
                IceSessionState::Ready => self.keepalive_tick().await,
                IceSessionState::New => {}
                IceSessionState::Failed | IceSessionState::Shutdown => return,
            }
        }
    }

    /// One pacing tick: at most one check leaves, highest-priority
    /// actionable pair first.
    async fn check_tick(self: &Arc<Self>) {
        let now = Instant::now();
        let role = *self.role.lock();

        enum Action {
            Send {
                index: usize,
                use_candidate: bool,
            },
            None,
            AllFailed,
        }

        let action = {
            let mut pairs = self.pairs.lock();
            let mut action = Action::None;
            let mut all_failed = !pairs.is_empty();

            for i in 0..pairs.len() {
                let pair = &mut pairs[i];
                if pair.state != PairState::Failed {
                    all_failed = false;
                }
                if !matches!(action, Action::None) {
                    continue;
                }

                match pair.state {
                    PairState::Waiting => {
                        action = Action::Send {
                            index: i,
                            use_candidate: false,
                        };
                    }
                    PairState::InProgress => {
                        let overdue = pair
                            .last_check_at
                            .map(|at| now.saturating_duration_since(at) >= pair.rto())
                            .unwrap_or(true);
                        if overdue {
                            if pair.retries >= MAX_CHECK_RETRIES {
                                log::debug!(
                                    "pair {} -> {} failed after {} checks",
                                    pair.local.addr,
                                    pair.remote.addr,
                                    pair.retries
                                );
                                pair.state = PairState::Failed;
                                pair.outstanding = None;
                            } else {
                                pair.retries += 1;
                                action = Action::Send {
                                    index: i,
                                    use_candidate: pair.outstanding_use_candidate,
                                };
                            }
                        }
                    }
                    PairState::Succeeded => {
                        // controlling: nominate the best succeeded pair
                        let overdue = pair
                            .last_check_at
                            .map(|at| now.saturating_duration_since(at) >= pair.rto())
                            .unwrap_or(true);
                        if role == Role::Controlling
                            && !pair.nominated
                            && (pair.outstanding.is_none() || overdue)
                        {
                            action = Action::Send {
                                index: i,
                                use_candidate: true,
                            };
                        }
                    }
                    PairState::Failed => {}
                }
            }

            if all_failed {
                Action::AllFailed
            } else {
                action
            }
        };

        match action {
            Action::Send {
                index,
                use_candidate,
            } => {
                if let Err(err) = self.send_check(index, use_candidate).await {
                    log::debug!("check send failed: {err}");
                }
            }
            Action::AllFailed => {
                self.set_state(IceSessionState::Failed).await;
            }
            Action::None => {}
        }
    }

    async fn keepalive_tick(self: &Arc<Self>) {
        let due = {
            let last = *self.last_keepalive.lock();
            Instant::now().saturating_duration_since(last) >= KEEPALIVE_INTERVAL
        };
        if !due {
            return;
        }
        let index = {
            let selected = self.selected.lock();
            match *selected {
                Some(index) => index,
                None => return,
            }
        };
        *self.last_keepalive.lock() = Instant::now();
        if let Err(err) = self.send_check(index, false).await {
            log::debug!("keepalive check failed: {err}");
        }
    }

    /// Builds and emits one Binding request for the pair.
    async fn send_check(self: &Arc<Self>, index: usize, use_candidate: bool) -> Result<()> {
        let role = *self.role.lock();

        let (local, remote_addr, msg) = {
            let mut pairs = self.pairs.lock();
            let Some(pair) = pairs.get_mut(index) else {
                return Ok(());
            };

            let mut msg = Message::new();
            let id = TransactionId::new();
            // USERNAME is remote-ufrag:local-ufrag from the sender's
            // point of view
            let username: Username = TextAttribute::new(
                ATTR_USERNAME,
                format!("{}:{}", self.remote_ufrag, self.local_ufrag),
            );
            let priority_value = pair.local.peer_reflexive_priority().to_be_bytes();
            let control = AttrControl {
                role,
                tie_breaker: TieBreaker(self.tie_breaker),
            };
            let integrity = MessageIntegrity::new_short_term(&self.remote_pwd);

            let mut setters: Vec<&dyn Setter> = vec![&id, &BINDING_REQUEST, &username];
            let use_cand = UseCandidate;
            if use_candidate && role == Role::Controlling {
                setters.push(&use_cand);
            }
            setters.push(&control);
            msg.build(&setters)?;
            msg.add(ATTR_PRIORITY, &priority_value);
            integrity.add_to(&mut msg)?;
            FINGERPRINT.add_to(&mut msg)?;

            if pair.state == PairState::Waiting {
                pair.state = PairState::InProgress;
            }
            pair.outstanding = Some(id);
            pair.outstanding_use_candidate = use_candidate;
            pair.last_check_at = Some(Instant::now());

            (pair.local.clone(), pair.remote.addr, msg)
        };

        log::trace!(
            "check {} -> {} (use_candidate={})",
            local.addr,
            remote_addr,
            use_candidate
        );
        self.transport.send_from(&local, &msg.raw, remote_addr).await
    }

    // ---- inbound ----

    async fn handle_stun_packet(
        self: &Arc<Self>,
        via_local: SocketAddr,
        from: SocketAddr,
        msg: &Message,
    ) -> bool {
        match msg.typ.class {
            CLASS_REQUEST if msg.typ.method == METHOD_BINDING => {
                self.handle_inbound_check(via_local, from, msg).await
            }
            CLASS_SUCCESS_RESPONSE | CLASS_ERROR_RESPONSE => {
                self.handle_check_response(via_local, from, msg).await
            }
            _ => false,
        }
    }

    /// Validates and answers a connectivity check from the remote
    /// agent.
    async fn handle_inbound_check(
        self: &Arc<Self>,
        via_local: SocketAddr,
        from: SocketAddr,
        msg: &Message,
    ) -> bool {
        // USERNAME must be local-ufrag:remote-ufrag from our point of
        // view
        let Ok(username) = TextAttribute::get_from_as(msg, ATTR_USERNAME) else {
            return false;
        };
        let expected = format!("{}:{}", self.local_ufrag, self.remote_ufrag);
        if username.text != expected {
            log::debug!("check username {} does not match {}", username.text, expected);
            return false;
        }

        let integrity = MessageIntegrity::new_short_term(&self.local_pwd);
        let mut verify = msg.clone();
        if integrity.check(&mut verify).is_err() {
            log::debug!("inbound check failed integrity validation");
            return true; // ours, but unusable
        }

        // comprehension-required attributes we cannot process: 420
        let unknown = msg.attributes.unknown_required();
        if !unknown.is_empty() {
            log::debug!("check carries unknown required attributes: {unknown:?}");
            if let Err(err) = self
                .send_unknown_attributes_response(via_local, from, msg, unknown)
                .await
            {
                log::debug!("420 response send failed: {err}");
            }
            return true;
        }

        // role conflict resolution
        let mut control = AttrControl::default();
        if control.get_from(msg).is_ok() {
            let my_role = *self.role.lock();
            if control.role == my_role {
                let remote_tb = control.tie_breaker.0;
                if self.tie_breaker < remote_tb {
                    let flipped = my_role.flipped();
                    log::debug!("role conflict, switching to {flipped}");
                    *self.role.lock() = flipped;
                    self.resort_pairs();
                }
                let _ = self
                    .send_error_response(via_local, from, msg, CODE_ROLE_CONFLICT)
                    .await;
                return true;
            }
        }

        // learn a peer-reflexive candidate for unknown sources
        self.adopt_peer_reflexive(via_local, from, msg);

        let use_candidate = UseCandidate::is_set(msg);
        if let Err(err) = self.send_success_response(via_local, from, msg).await {
            log::debug!("check response send failed: {err}");
        }

        // an inbound check is also proof the reverse path works
        let nominated_index = {
            let role = *self.role.lock();
            let mut pairs = self.pairs.lock();
            let mut nominated = None;
            for (i, pair) in pairs.iter_mut().enumerate() {
                if pair.local.addr == via_local && pair.remote.addr == from {
                    if use_candidate && role == Role::Controlled {
                        pair.nominated = true;
                        nominated = Some(i);
                    }
                    break;
                }
            }
            nominated
        };

        if let Some(index) = nominated_index {
            self.select_pair(index).await;
        }
        true
    }

    /// Routes a response to the pair that issued the matching check.
    async fn handle_check_response(
        self: &Arc<Self>,
        _via_local: SocketAddr,
        from: SocketAddr,
        msg: &Message,
    ) -> bool {
        enum Outcome {
            Succeeded { index: usize, nominated: bool },
            RoleConflict { index: usize },
            Failed { index: usize },
            Unmatched,
        }

        let outcome = {
            let role = *self.role.lock();
            let mut pairs = self.pairs.lock();
            let mut outcome = Outcome::Unmatched;

            for (i, pair) in pairs.iter_mut().enumerate() {
                if pair.outstanding != Some(msg.transaction_id) {
                    continue;
                }
                pair.outstanding = None;

                if msg.typ.class == CLASS_SUCCESS_RESPONSE {
                    // integrity with the remote password, as the
                    // request was keyed
                    let integrity = MessageIntegrity::new_short_term(&self.remote_pwd);
                    let mut verify = msg.clone();
                    if integrity.check(&mut verify).is_err() {
                        log::debug!("check response failed integrity validation");
                        outcome = Outcome::Failed { index: i };
                        break;
                    }

                    // the mapped address must name the pair's local
                    // side, otherwise a NAT rewrote us mid-path
                    let mut mapped = XorMappedAddress::default();
                    if mapped.get_from(msg).is_err() {
                        outcome = Outcome::Failed { index: i };
                        break;
                    }
                    let mapped_addr = SocketAddr::new(mapped.ip, mapped.port);
                    if mapped_addr != pair.local.addr
                        && pair.local.typ != CandidateType::Relayed
                    {
                        log::debug!(
                            "mapped address {} differs from local {}",
                            mapped_addr,
                            pair.local.addr
                        );
                    }

                    pair.state = PairState::Succeeded;
                    let nominated = pair.outstanding_use_candidate && role == Role::Controlling;
                    if nominated {
                        pair.nominated = true;
                    }
                    outcome = Outcome::Succeeded {
                        index: i,
                        nominated,
                    };
                } else {
                    let mut code = ErrorCodeAttribute::default();
                    if code.get_from(msg).is_ok() && code.code == CODE_ROLE_CONFLICT {
                        outcome = Outcome::RoleConflict { index: i };
                    } else {
                        outcome = Outcome::Failed { index: i };
                    }
                }
                break;
            }
            outcome
        };

        match outcome {
            Outcome::Succeeded { index, nominated } => {
                log::debug!("pair #{index} succeeded (nominated={nominated}) from {from}");
                if nominated {
                    self.select_pair(index).await;
                }
                true
            }
            Outcome::RoleConflict { index } => {
                // the side with the smaller tie-breaker has switched;
                // re-run the check under whatever role we now hold
                let mut pairs = self.pairs.lock();
                if let Some(pair) = pairs.get_mut(index) {
                    pair.state = PairState::Waiting;
                }
                true
            }
            Outcome::Failed { index } => {
                let mut pairs = self.pairs.lock();
                if let Some(pair) = pairs.get_mut(index) {
                    pair.state = PairState::Failed;
                }
                true
            }
            Outcome::Unmatched => false,
        }
    }

    fn resort_pairs(&self) {
        let role = *self.role.lock();
        let mut pairs = self.pairs.lock();
        pairs.sort_by_key(|p| std::cmp::Reverse(p.priority(role)));
        let mut selected = self.selected.lock();
        *selected = None; // indices shifted; reselection happens on nomination
    }

    /// Adds a peer-reflexive remote candidate (and pairs) when a valid
    /// check arrives from an address we were never told about.
    fn adopt_peer_reflexive(&self, via_local: SocketAddr, from: SocketAddr, msg: &Message) {
        let mut pairs = self.pairs.lock();
        let known = pairs.iter().any(|p| p.remote.addr == from);
        if known {
            return;
        }

        let priority = msg
            .get(ATTR_PRIORITY)
            .ok()
            .filter(|v| v.len() == 4)
            .map(|v| u32::from_be_bytes([v[0], v[1], v[2], v[3]]))
            .unwrap_or(0);

        let Some(local) = pairs
            .iter()
            .map(|p| p.local.clone())
            .find(|l| l.addr == via_local)
        else {
            return;
        };

        let remote = Candidate::peer_reflexive(
            from,
            from,
            local.component,
            priority,
            &self.remote_ufrag,
        );
        log::debug!("learned peer-reflexive candidate {remote}");
        pairs.push(CandidatePair::new(local, remote));
    }

    async fn send_success_response(
        &self,
        via_local: SocketAddr,
        from: SocketAddr,
        request: &Message,
    ) -> Result<()> {
        let mut response = Message::new();
        let mapped = XorMappedAddress {
            ip: from.ip(),
            port: from.port(),
        };
        response.build(&[&request.transaction_id, &BINDING_SUCCESS, &mapped])?;
        MessageIntegrity::new_short_term(&self.local_pwd).add_to(&mut response)?;
        FINGERPRINT.add_to(&mut response)?;

        self.send_via(via_local, &response.raw, from).await
    }

    async fn send_error_response(
        &self,
        via_local: SocketAddr,
        from: SocketAddr,
        request: &Message,
        code: stun::error_code::ErrorCode,
    ) -> Result<()> {
        let mut response = Message::new();
        response.build(&[&request.transaction_id, &BINDING_ERROR, &code])?;
        MessageIntegrity::new_short_term(&self.local_pwd).add_to(&mut response)?;
        FINGERPRINT.add_to(&mut response)?;

        self.send_via(via_local, &response.raw, from).await
    }

    async fn send_unknown_attributes_response(
        &self,
        via_local: SocketAddr,
        from: SocketAddr,
        request: &Message,
        unknown: Vec<stun::attributes::AttrType>,
    ) -> Result<()> {
        let mut response = Message::new();
        let unknown_attrs = UnknownAttributes(unknown);
        response.build(&[
            &request.transaction_id,
            &BINDING_ERROR,
            &CODE_UNKNOWN_ATTRIBUTE,
            &unknown_attrs,
        ])?;
        MessageIntegrity::new_short_term(&self.local_pwd).add_to(&mut response)?;
        FINGERPRINT.add_to(&mut response)?;

        self.send_via(via_local, &response.raw, from).await
    }

    async fn send_via(&self, via_local: SocketAddr, data: &[u8], to: SocketAddr) -> Result<()> {
        let local = {
            let pairs = self.pairs.lock();
            pairs
                .iter()
                .map(|p| p.local.clone())
                .find(|l| l.addr == via_local)
        };
        let Some(local) = local else {
            return Err(Error::Internal(format!(
                "no local candidate at {via_local}"
            )));
        };
        self.transport.send_from(&local, data, to).await
    }

    async fn select_pair(self: &Arc<Self>, index: usize) {
        {
            let mut selected = self.selected.lock();
            if selected.is_some() {
                return;
            }
            *selected = Some(index);
        }
        *self.last_keepalive.lock() = Instant::now();
        self.set_state(IceSessionState::Ready).await;
        self.observer.on_write_ready().await;
    }
}
