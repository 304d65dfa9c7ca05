use std::net::{IpAddr, Ipv4Addr};

use super::*;

fn peer(last: u8) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, last)), 50000 + last as u16)
}

#[test]
fn test_create_assigns_number_in_range() {
    let mut map = BindingMap::new(Some((0x4000, 0x40ff)));
    let now = Instant::now();

    let binding = map.create(peer(1), now).unwrap();
    assert!((0x4000..=0x40ff).contains(&binding.number.0));
    assert_eq!(binding.state, BindState::Requesting);
}

#[test]
fn test_numbers_unique_until_exhaustion() {
    let mut map = BindingMap::new(Some((0x4000, 0x4003)));
    let now = Instant::now();

    for i in 1..=4u8 {
        assert!(map.create(peer(i), now).is_some());
    }
    assert_eq!(map.numbers().len(), 4);
    // range exhausted
    assert!(map.create(peer(5), now).is_none());

    // releasing one frees its number
    map.remove(&peer(2).ip());
    assert!(map.create(peer(5), now).is_some());
}

#[test]
fn test_duplicate_peer_rejected() {
    let mut map = BindingMap::new(None);
    let now = Instant::now();
    assert!(map.create(peer(1), now).is_some());
    assert!(map.create(peer(1), now).is_none());
}

#[test]
fn test_lookup_by_number() {
    let mut map = BindingMap::new(Some((0x4242, 0x4242)));
    let now = Instant::now();
    map.create(peer(9), now).unwrap();

    let found = map.by_number(ChannelNumber(0x4242)).unwrap();
    assert_eq!(found.addr, peer(9));
    assert!(map.by_number(ChannelNumber(0x4243)).is_none());
}

#[test]
fn test_refresh_due_only_when_bound() {
    let mut map = BindingMap::new(None);
    let start = Instant::now();
    map.create(peer(1), start).unwrap();

    let later = start + CHANNEL_REFRESH_INTERVAL + Duration::from_secs(1);
    // requesting state: never refreshed
    assert!(map.due_for_refresh(later).is_empty());

    let b = map.get_mut(&peer(1).ip()).unwrap();
    b.state = BindState::Bound;
    b.bound_at = start;
    assert_eq!(map.due_for_refresh(later), vec![peer(1)]);
}

#[test]
fn test_expire_idle_channels() {
    let mut map = BindingMap::new(None);
    let start = Instant::now();
    map.create(peer(1), start).unwrap();
    let number = map.get(&peer(1).ip()).unwrap().number;

    let expired = map.expire_idle(start + CHANNEL_IDLE_TIMEOUT + Duration::from_secs(1));
    assert_eq!(expired, vec![peer(1).ip()]);
    assert!(map.by_number(number).is_none());
    assert_eq!(map.len(), 0);
}
