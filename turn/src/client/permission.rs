#[cfg(test)]
mod permission_test;

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};

use stun::message::TransactionId;
use tokio::time::{Duration, Instant};

/// Permissions are re-requested while active on this cadence; the
/// server-side entry lives five minutes.
pub(crate) const PERMISSION_REFRESH_INTERVAL: Duration = Duration::from_secs(4 * 60);

/// A peer with no outbound traffic for this long is forgotten
/// entirely.
pub(crate) const PERMISSION_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Client-side view of one peer's permission on the relay.
pub(crate) struct Permission {
    pub addr: SocketAddr,
    pub installed: bool,
    /// CreatePermission transaction currently covering this peer.
    pub installing_id: Option<TransactionId>,
    pub last_sent_at: Instant,
    /// Encoded Send indications parked until the permission installs;
    /// flushed strictly in arrival order.
    pub pending: VecDeque<Vec<u8>>,
}

impl Permission {
    fn new(addr: SocketAddr, now: Instant) -> Self {
        Permission {
            addr,
            installed: false,
            installing_id: None,
            last_sent_at: now,
            pending: VecDeque::new(),
        }
    }
}

/// Permission table keyed by peer IP, with the capacity clamp learned
/// from Insufficient Capacity responses.
#[derive(Default)]
pub(crate) struct PermissionMap {
    perms: HashMap<IpAddr, Permission>,
    /// Largest CreatePermission batch the server accepted; learned
    /// when a batch is rejected for capacity.
    max_batch: Option<usize>,
}

impl PermissionMap {
    pub fn new() -> Self {
        PermissionMap::default()
    }

    pub fn get(&self, ip: &IpAddr) -> Option<&Permission> {
        self.perms.get(ip)
    }

    pub fn get_mut(&mut self, ip: &IpAddr) -> Option<&mut Permission> {
        self.perms.get_mut(ip)
    }

    /// Returns the peer's record, creating an uninstalled one on first
    /// contact.
    pub fn get_or_insert(&mut self, addr: SocketAddr, now: Instant) -> &mut Permission {
        self.perms
            .entry(addr.ip())
            .or_insert_with(|| Permission::new(addr, now))
    }

    pub fn remove(&mut self, ip: &IpAddr) -> Option<Permission> {
        self.perms.remove(ip)
    }

    pub fn len(&self) -> usize {
        self.perms.len()
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.perms.values().map(|p| p.addr).collect()
    }

    pub fn max_batch(&self) -> Option<usize> {
        self.max_batch
    }

    /// Called on an Insufficient Capacity response carrying a batch of
    /// `attempted` peers: remember the clamp and evict the
    /// least-recently-used peer so the next batch fits.
    pub fn clamp_capacity(&mut self, attempted: usize) -> Option<IpAddr> {
        if attempted > 1 {
            self.max_batch = Some(attempted - 1);
        }
        let lru = self
            .perms
            .values()
            .min_by_key(|p| p.last_sent_at)
            .map(|p| p.addr.ip())?;
        self.perms.remove(&lru);
        Some(lru)
    }

    /// Peers to include in the next CreatePermission batch: every
    /// known peer, oldest traffic last so eviction keeps the busy
    /// ones, clamped to the learned capacity.
    pub fn next_batch(&self) -> Vec<SocketAddr> {
        let mut peers: Vec<&Permission> = self.perms.values().collect();
        peers.sort_by_key(|p| std::cmp::Reverse(p.last_sent_at));
        let limit = self.max_batch.unwrap_or(usize::MAX);
        peers.into_iter().take(limit).map(|p| p.addr).collect()
    }

    /// Marks every peer covered by the finished transaction installed
    /// and hands back their queued packets in order, per peer.
    pub fn install_for(&mut self, id: &TransactionId) -> Vec<(SocketAddr, Vec<Vec<u8>>)> {
        let mut flushed = Vec::new();
        for perm in self.perms.values_mut() {
            if perm.installing_id.as_ref() == Some(id) {
                perm.installed = true;
                perm.installing_id = None;
                if !perm.pending.is_empty() {
                    flushed.push((perm.addr, perm.pending.drain(..).collect()));
                }
            }
        }
        flushed
    }

    /// Clears the installing marker on a failed transaction; the peers
    /// stay queued for the next batch.
    pub fn abandon_for(&mut self, id: &TransactionId) {
        for perm in self.perms.values_mut() {
            if perm.installing_id.as_ref() == Some(id) {
                perm.installing_id = None;
            }
        }
    }

    /// Tags `peers` as being installed by transaction `id`.
    pub fn mark_installing(&mut self, peers: &[SocketAddr], id: TransactionId) {
        for peer in peers {
            if let Some(perm) = self.perms.get_mut(&peer.ip()) {
                perm.installing_id = Some(id);
            }
        }
    }

    /// True while any peer still waits for its permission.
    pub fn has_uninstalled(&self) -> bool {
        self.perms.values().any(|p| !p.installed)
    }

    /// Drops peers with no outbound traffic for the idle timeout.
    /// Returns the evicted IPs.
    pub fn expire_idle(&mut self, now: Instant) -> Vec<IpAddr> {
        let expired: Vec<IpAddr> = self
            .perms
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.last_sent_at) > PERMISSION_IDLE_TIMEOUT)
            .map(|(ip, _)| *ip)
            .collect();
        for ip in &expired {
            self.perms.remove(ip);
        }
        expired
    }
}
