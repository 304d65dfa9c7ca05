use std::net::IpAddr;

use crate::error::Result;

/// Enumerates usable local interface addresses for candidate
/// gathering. Loopback and link-local addresses are skipped, IPv6 is
/// gated by `ipv6_support`, and `name_order` (when non-empty) sorts
/// interfaces by the given preference list; unlisted interfaces come
/// last in enumeration order.
pub fn local_interfaces(ipv6_support: bool, name_order: &[String]) -> Result<Vec<(String, IpAddr)>> {
    let mut out: Vec<(String, IpAddr)> = Vec::new();

    for iface in get_if_addrs::get_if_addrs()? {
        if iface.is_loopback() {
            continue;
        }
        let ip = iface.ip();
        match ip {
            IpAddr::V4(v4) => {
                if v4.is_link_local() || v4.is_unspecified() {
                    continue;
                }
            }
            IpAddr::V6(v6) => {
                if !ipv6_support {
                    continue;
                }
                // fe80::/10
                if (v6.segments()[0] & 0xffc0) == 0xfe80 || v6.is_unspecified() {
                    continue;
                }
            }
        }
        out.push((iface.name.clone(), ip));
    }

    if !name_order.is_empty() {
        let rank = |name: &str| -> usize {
            name_order
                .iter()
                .position(|n| n == name)
                .unwrap_or(name_order.len())
        };
        out.sort_by_key(|(name, _)| rank(name));
    }

    Ok(out)
}

#[cfg(test)]
mod ifaces_test {
    use super::*;

    #[test]
    fn test_local_interfaces_enumerate() {
        // Just exercise the filter path; hosts may legitimately have
        // no non-loopback addresses in CI.
        let ifaces = local_interfaces(true, &[]).unwrap();
        for (_, ip) in &ifaces {
            assert!(!ip.is_loopback());
        }
    }

    #[test]
    fn test_name_order_ranks_first() {
        let order = vec!["en0".to_owned(), "eth0".to_owned()];
        let ifaces = local_interfaces(false, &order).unwrap();
        let mut last_rank = 0;
        for (name, _) in &ifaces {
            let rank = order.iter().position(|n| n == name).unwrap_or(order.len());
            assert!(rank >= last_rank);
            last_rank = rank;
        }
    }
}
