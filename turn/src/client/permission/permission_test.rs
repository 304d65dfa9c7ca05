use std::net::{IpAddr, Ipv4Addr};

use super::*;

fn peer(last: u8) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, last)), 40000 + last as u16)
}

#[test]
fn test_queue_then_install_flushes_in_order() {
    let mut map = PermissionMap::new();
    let now = Instant::now();
    let id = TransactionId::new();

    let perm = map.get_or_insert(peer(7), now);
    assert!(!perm.installed);
    perm.pending.push_back(b"first".to_vec());
    perm.pending.push_back(b"second".to_vec());

    map.mark_installing(&[peer(7)], id);
    let flushed = map.install_for(&id);
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].0, peer(7));
    assert_eq!(flushed[0].1, vec![b"first".to_vec(), b"second".to_vec()]);
    assert!(map.get(&peer(7).ip()).unwrap().installed);
}

#[test]
fn test_abandon_keeps_queued_packets() {
    let mut map = PermissionMap::new();
    let now = Instant::now();
    let id = TransactionId::new();

    map.get_or_insert(peer(1), now).pending.push_back(b"x".to_vec());
    map.mark_installing(&[peer(1)], id);
    map.abandon_for(&id);

    let perm = map.get(&peer(1).ip()).unwrap();
    assert!(!perm.installed);
    assert!(perm.installing_id.is_none());
    assert_eq!(perm.pending.len(), 1);
}

#[test]
fn test_capacity_clamp_evicts_lru() {
    let mut map = PermissionMap::new();
    let base = Instant::now();

    for i in 1..=4u8 {
        let perm = map.get_or_insert(peer(i), base);
        // peer 1 has the oldest traffic
        perm.last_sent_at = base + Duration::from_secs(i as u64);
    }

    let evicted = map.clamp_capacity(4);
    assert_eq!(evicted, Some(peer(1).ip()));
    assert_eq!(map.max_batch(), Some(3));
    assert_eq!(map.len(), 3);
    assert!(map.next_batch().len() <= 3);
}

#[test]
fn test_next_batch_prefers_recent_peers() {
    let mut map = PermissionMap::new();
    let base = Instant::now();
    for i in 1..=3u8 {
        let perm = map.get_or_insert(peer(i), base);
        perm.last_sent_at = base + Duration::from_secs(i as u64);
    }
    map.clamp_capacity(3); // clamps to 2, evicts peer 1

    let batch = map.next_batch();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], peer(3));
    assert_eq!(batch[1], peer(2));
}

#[test]
fn test_expire_idle_permissions() {
    let mut map = PermissionMap::new();
    let base = Instant::now();
    map.get_or_insert(peer(1), base);
    map.get_or_insert(peer(2), base);
    map.get_mut(&peer(2).ip()).unwrap().last_sent_at =
        base + PERMISSION_IDLE_TIMEOUT;

    let expired = map.expire_idle(base + PERMISSION_IDLE_TIMEOUT + Duration::from_secs(1));
    assert_eq!(expired, vec![peer(1).ip()]);
    assert!(map.get(&peer(1).ip()).is_none());
    assert!(map.get(&peer(2).ip()).is_some());
}
