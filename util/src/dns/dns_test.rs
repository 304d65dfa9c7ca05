use std::net::Ipv4Addr;

use super::*;

fn rec(priority: u16, weight: u16, port: u16, target: &str) -> SrvRecord {
    SrvRecord {
        priority,
        weight,
        port,
        target: target.to_owned(),
        ips: vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, port as u8))],
    }
}

#[test]
fn test_sort_srv_records_by_priority() {
    let mut records = vec![rec(20, 0, 2, "b"), rec(10, 0, 1, "a"), rec(30, 0, 3, "c")];
    sort_srv_records(&mut records);
    let prio: Vec<u16> = records.iter().map(|r| r.priority).collect();
    assert_eq!(prio, vec![10, 20, 30]);
}

#[test]
fn test_sort_srv_records_keeps_groups_together() {
    let mut records = vec![
        rec(10, 5, 1, "a"),
        rec(10, 60, 2, "b"),
        rec(20, 0, 3, "c"),
        rec(10, 30, 4, "d"),
    ];
    sort_srv_records(&mut records);
    assert_eq!(records[3].priority, 20);
    for r in &records[..3] {
        assert_eq!(r.priority, 10);
    }
}

#[tokio::test]
async fn test_static_resolver_srv() {
    let mut resolver = StaticResolver::new();
    resolver.add_srv(
        "turn",
        "udp",
        "example.com",
        vec![rec(20, 0, 2, "b.example.com"), rec(10, 0, 1, "a.example.com")],
    );

    let res = resolver.lookup_srv("turn", "udp", "example.com").await.unwrap();
    assert_eq!(res.records.len(), 2);
    assert_eq!(res.records[0].target, "a.example.com");
    assert_eq!(res.endpoints().len(), 2);

    let err = resolver.lookup_srv("turn", "udp", "missing.com").await.unwrap_err();
    assert_eq!(err, Error::ErrDnsNameNotFound);
}

#[tokio::test]
async fn test_static_resolver_empty_srv_is_no_records() {
    let mut resolver = StaticResolver::new();
    resolver.add_srv("turn", "tcp", "example.com", vec![]);
    let err = resolver.lookup_srv("turn", "tcp", "example.com").await.unwrap_err();
    assert_eq!(err, Error::ErrDnsNoRecords);
}

#[tokio::test]
async fn test_static_resolver_ip() {
    let mut resolver = StaticResolver::new();
    let ip = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7));
    resolver.add_ip("turn.example.com", vec![ip]);
    assert_eq!(resolver.lookup_ip("turn.example.com").await.unwrap(), vec![ip]);
}
