#[cfg(test)]
mod dns_test;

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use rand::Rng;

use crate::error::{Error, Result};

/// One SRV answer with its A/AAAA resolution attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
    pub ips: Vec<IpAddr>,
}

/// A resolved SRV query: records ordered by priority, weight-shuffled
/// within each priority group.
#[derive(Debug, Clone, Default)]
pub struct SrvResult {
    pub name: String,
    pub records: Vec<SrvRecord>,
}

impl SrvResult {
    /// Flattens the record set into dialable (ip, port) pairs in
    /// selection order.
    pub fn endpoints(&self) -> Vec<(IpAddr, u16)> {
        let mut out = Vec::new();
        for rec in &self.records {
            for ip in &rec.ips {
                out.push((*ip, rec.port));
            }
        }
        out
    }
}

/// Controls what happens when an SRV query produces no records but the
/// queried name may itself resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SrvLookupType {
    /// Fail the lookup; the caller surfaces a DNS failure.
    SrvOnly,
    /// Fall back to an A/AAAA lookup of the bare name, keeping the
    /// scheme-default port.
    #[default]
    AutoHostLookup,
}

/// RFC 2782 ordering: ascending priority, then a weight-proportional
/// shuffle inside each priority group.
pub fn sort_srv_records(records: &mut Vec<SrvRecord>) {
    records.sort_by_key(|r| r.priority);

    let mut rng = rand::thread_rng();
    let mut start = 0;
    while start < records.len() {
        let priority = records[start].priority;
        let mut end = start;
        while end < records.len() && records[end].priority == priority {
            end += 1;
        }

        // Weighted selection without replacement within [start, end).
        for slot in start..end {
            let total: u32 = records[slot..end].iter().map(|r| r.weight as u32 + 1).sum();
            let mut pick = rng.gen_range(0..total);
            for i in slot..end {
                let w = records[i].weight as u32 + 1;
                if pick < w {
                    records.swap(slot, i);
                    break;
                }
                pick -= w;
            }
        }
        start = end;
    }
}

/// The resolution contract the TURN and ICE cores depend on. The
/// recursive resolver behind it is someone else's problem; tests hand
/// in a [`StaticResolver`].
#[async_trait]
pub trait Resolver {
    /// Looks up `_service._proto.name` SRV records with their address
    /// resolutions. An empty record set is reported as
    /// [`Error::ErrDnsNoRecords`].
    async fn lookup_srv(&self, service: &str, proto: &str, name: &str) -> Result<SrvResult>;

    /// A/AAAA lookup.
    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system. SRV is not reachable
/// through the libc resolver API, so SRV queries report no records and
/// callers apply their [`SrvLookupType`] fallback.
#[derive(Debug, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup_srv(&self, _service: &str, _proto: &str, _name: &str) -> Result<SrvResult> {
        Err(Error::ErrDnsNoRecords)
    }

    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>> {
        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await?
            .map(|sa| sa.ip())
            .collect();
        if addrs.is_empty() {
            Err(Error::ErrDnsNameNotFound)
        } else {
            Ok(addrs)
        }
    }
}

/// Canned resolver for tests and loopback setups.
#[derive(Debug, Default)]
pub struct StaticResolver {
    srv: HashMap<String, Vec<SrvRecord>>,
    ips: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        StaticResolver::default()
    }

    pub fn add_srv(&mut self, service: &str, proto: &str, name: &str, records: Vec<SrvRecord>) {
        self.srv
            .insert(format!("_{service}._{proto}.{name}"), records);
    }

    pub fn add_ip(&mut self, host: &str, ips: Vec<IpAddr>) {
        self.ips.insert(host.to_owned(), ips);
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn lookup_srv(&self, service: &str, proto: &str, name: &str) -> Result<SrvResult> {
        let key = format!("_{service}._{proto}.{name}");
        match self.srv.get(&key) {
            Some(records) if !records.is_empty() => {
                let mut records = records.clone();
                sort_srv_records(&mut records);
                Ok(SrvResult {
                    name: name.to_owned(),
                    records,
                })
            }
            Some(_) => Err(Error::ErrDnsNoRecords),
            None => Err(Error::ErrDnsNameNotFound),
        }
    }

    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>> {
        self.ips
            .get(host)
            .cloned()
            .ok_or(Error::ErrDnsNameNotFound)
    }
}
