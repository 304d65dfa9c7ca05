#[cfg(test)]
mod discovery_test;

use std::net::SocketAddr;
use std::sync::Arc;

use util::BackOffPattern;

use crate::addr::MappedAddress;
use crate::attributes::{ATTR_SOFTWARE, ATTR_XORMAPPED_ADDRESS};
use crate::error::*;
use crate::fingerprint::FINGERPRINT;
use crate::message::*;
use crate::requester::*;
use crate::textattrs::{Software, TextAttribute};
use crate::xoraddr::XorMappedAddress;

/// Configuration for a server-reflexive address discovery.
pub struct DiscoveryConfig {
    /// Ordered list of server endpoints; tried one at a time.
    pub servers: Vec<SocketAddr>,
    /// Optional SOFTWARE string added to requests.
    pub software: Option<String>,
    /// Retransmission schedule per endpoint.
    pub pattern: BackOffPattern,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            servers: vec![],
            software: None,
            pattern: BackOffPattern::rfc_rto(),
        }
    }
}

/// Discovers the local endpoint's server-reflexive address by sending
/// Binding requests through the owner's transport. Inbound responses
/// must be pumped into the shared [`RequesterManager`] by the owner's
/// read loop.
pub struct StunDiscovery {
    manager: Arc<RequesterManager>,
    sender: Arc<dyn RequestSender>,
    config: DiscoveryConfig,
}

impl StunDiscovery {
    pub fn new(
        manager: Arc<RequesterManager>,
        sender: Arc<dyn RequestSender>,
        config: DiscoveryConfig,
    ) -> Self {
        StunDiscovery {
            manager,
            sender,
            config,
        }
    }

    /// Walks the server list until one endpoint yields a mapped
    /// address. Timeouts and error responses advance to the next
    /// endpoint; exhausting the list fails with
    /// [`Error::ErrNoServersReachable`].
    pub async fn discover(&self) -> Result<SocketAddr> {
        for server in &self.config.servers {
            log::debug!("binding discovery against {server}");
            match self.discover_one(*server).await {
                Ok(reflexive) => {
                    log::debug!("reflexive address {reflexive} via {server}");
                    return Ok(reflexive);
                }
                Err(err) => {
                    log::debug!("discovery via {server} failed: {err}");
                }
            }
        }
        Err(Error::ErrNoServersReachable)
    }

    async fn discover_one(&self, server: SocketAddr) -> Result<SocketAddr> {
        let mut msg = Message::new();
        let id = TransactionId::new();
        match &self.config.software {
            Some(text) => {
                let software: Software = TextAttribute::new(ATTR_SOFTWARE, text.clone());
                msg.build(&[&id, &BINDING_REQUEST, &software, &FINGERPRINT])?;
            }
            None => {
                msg.build(&[&id, &BINDING_REQUEST, &FINGERPRINT])?;
            }
        }

        let (_requester, mut result_rx) = self
            .manager
            .create_requester(
                msg,
                server,
                self.config.pattern.clone(),
                false,
                Arc::clone(&self.sender),
            )
            .await?;

        match result_rx.recv().await {
            Some(RequesterEvent::Response { message, .. }) => {
                if message.typ.class != CLASS_SUCCESS_RESPONSE {
                    return Err(Error::Other(format!("binding failed: {}", message.typ)));
                }
                Self::mapped_address(&message)
            }
            Some(RequesterEvent::Timeout) => Err(Error::ErrRequestTimeout),
            None => Err(Error::ErrRequestCancelled),
        }
    }

    /// XOR-MAPPED-ADDRESS preferred, MAPPED-ADDRESS accepted for
    /// RFC 3489-era servers.
    fn mapped_address(message: &Message) -> Result<SocketAddr> {
        if message.contains(ATTR_XORMAPPED_ADDRESS) {
            let mut xor_addr = XorMappedAddress::default();
            xor_addr.get_from(message)?;
            return Ok(SocketAddr::new(xor_addr.ip, xor_addr.port));
        }
        let mut addr = MappedAddress::default();
        addr.get_from(message)?;
        Ok(SocketAddr::new(addr.ip, addr.port))
    }
}
