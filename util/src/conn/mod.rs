#[cfg(test)]
mod conn_test;

use std::any::Any;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::error::{Error, Result};

/// Conn is the datagram seam between the NAT-traversal cores and
/// whatever actually moves bytes: a bound UDP socket in production, a
/// scripted mock in tests.
#[async_trait]
pub trait Conn {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;
    fn local_addr(&self) -> Result<SocketAddr>;
    async fn close(&self) -> Result<()>;
    fn as_any(&self) -> &(dyn Any + Send + Sync);
}

#[async_trait]
impl Conn for UdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.recv_from(buf).await?)
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        Ok(self.send_to(buf, target).await?)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr()?)
    }

    async fn close(&self) -> Result<()> {
        // Tokio UDP sockets close on drop; the owner drops its Arc.
        Ok(())
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

/// Returns true when the error indicates the peer went away rather
/// than a local fault, so read loops can keep running.
pub fn is_transient_recv_error(err: &Error) -> bool {
    if let Error::Io(io_err) = err {
        matches!(
            io_err.0.kind(),
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionRefused
        )
    } else {
        false
    }
}
