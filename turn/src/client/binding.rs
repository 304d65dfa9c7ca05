#[cfg(test)]
mod binding_test;

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};

use rand::Rng;
use stun::message::TransactionId;
use tokio::time::{Duration, Instant};

use crate::proto::channum::{ChannelNumber, MAX_CHANNEL_NUMBER, MIN_CHANNEL_NUMBER};

/// Bindings are refreshed one minute under the server's ten-minute
/// channel lifetime.
pub(crate) const CHANNEL_REFRESH_INTERVAL: Duration = Duration::from_secs(9 * 60);

/// A channel with no outbound traffic for this long is released.
pub(crate) const CHANNEL_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindState {
    /// ChannelBind in flight; data still goes out as Send indications.
    Requesting,
    /// ChannelBind succeeded at least once; ChannelData framing is
    /// allowed.
    Bound,
    /// ChannelBind refresh in flight on an already-bound channel.
    Refreshing,
}

/// Client-side record of one peer's channel.
pub(crate) struct ChannelBinding {
    pub number: ChannelNumber,
    pub addr: SocketAddr,
    pub state: BindState,
    pub request_id: Option<TransactionId>,
    pub bound_at: Instant,
    pub last_sent_at: Instant,
}

/// Channel table keyed by peer IP. Numbers are drawn uniformly from
/// the configured range and never reused while a binding holds them.
pub(crate) struct BindingMap {
    by_ip: HashMap<IpAddr, ChannelBinding>,
    numbers: HashMap<u16, IpAddr>,
    range: (u16, u16),
}

impl BindingMap {
    pub fn new(range: Option<(u16, u16)>) -> Self {
        let range = range.unwrap_or((MIN_CHANNEL_NUMBER, MAX_CHANNEL_NUMBER));
        BindingMap {
            by_ip: HashMap::new(),
            numbers: HashMap::new(),
            range,
        }
    }

    pub fn get(&self, ip: &IpAddr) -> Option<&ChannelBinding> {
        self.by_ip.get(ip)
    }

    pub fn get_mut(&mut self, ip: &IpAddr) -> Option<&mut ChannelBinding> {
        self.by_ip.get_mut(ip)
    }

    pub fn by_number(&self, number: ChannelNumber) -> Option<&ChannelBinding> {
        self.numbers.get(&number.0).and_then(|ip| self.by_ip.get(ip))
    }

    pub fn len(&self) -> usize {
        self.by_ip.len()
    }

    /// Picks an unused random number in the configured range, or None
    /// when every number is taken.
    fn assign_number(&self) -> Option<ChannelNumber> {
        let (start, end) = self.range;
        let span = (end - start) as usize + 1;
        if self.numbers.len() >= span {
            return None;
        }

        let mut rng = rand::thread_rng();
        loop {
            let candidate = rng.gen_range(start..=end);
            if !self.numbers.contains_key(&candidate) {
                return Some(ChannelNumber(candidate));
            }
        }
    }

    /// Creates a placeholder binding for a peer about to be
    /// ChannelBind-requested. None when the range is exhausted or the
    /// peer already has one.
    pub fn create(&mut self, addr: SocketAddr, now: Instant) -> Option<&mut ChannelBinding> {
        if self.by_ip.contains_key(&addr.ip()) {
            return None;
        }
        let number = self.assign_number()?;
        self.numbers.insert(number.0, addr.ip());
        Some(self.by_ip.entry(addr.ip()).or_insert(ChannelBinding {
            number,
            addr,
            state: BindState::Requesting,
            request_id: None,
            bound_at: now,
            last_sent_at: now,
        }))
    }

    pub fn remove(&mut self, ip: &IpAddr) -> Option<ChannelBinding> {
        let binding = self.by_ip.remove(ip)?;
        self.numbers.remove(&binding.number.0);
        Some(binding)
    }

    /// Bindings that need a ChannelBind refresh.
    pub fn due_for_refresh(&self, now: Instant) -> Vec<SocketAddr> {
        self.by_ip
            .values()
            .filter(|b| {
                b.state == BindState::Bound
                    && now.saturating_duration_since(b.bound_at) >= CHANNEL_REFRESH_INTERVAL
            })
            .map(|b| b.addr)
            .collect()
    }

    /// Drops channels with no outbound traffic for the idle timeout.
    pub fn expire_idle(&mut self, now: Instant) -> Vec<IpAddr> {
        let expired: Vec<IpAddr> = self
            .by_ip
            .iter()
            .filter(|(_, b)| now.saturating_duration_since(b.last_sent_at) > CHANNEL_IDLE_TIMEOUT)
            .map(|(ip, _)| *ip)
            .collect();
        for ip in &expired {
            self.remove(ip);
        }
        expired
    }

    /// All channel numbers currently reserved; for diagnostics.
    pub fn numbers(&self) -> HashSet<u16> {
        self.numbers.keys().copied().collect()
    }
}
