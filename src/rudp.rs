//! The seam between a reliable datagram stream (sequence numbers,
//! ACK vectors, congestion window) and the NAT-traversal core. The
//! stream state machine lives elsewhere; it sees the transport
//! through [`RudpTransport`] and hands a [`RudpSegmentSink`] down for
//! inbound traffic. Segments are opaque bytes here.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use ice::session::{IceSession, IceSessionObserver};
use ice::state::IceSessionState;

/// Lossy segment transport under a reliable stream. Callers must
/// treat `false` as "definitely dropped locally" and leave recovery
/// to their own retransmission.
#[async_trait]
pub trait RudpTransport: Send + Sync {
    /// Sends one opaque segment toward the remote peer.
    async fn send_segment(&self, data: &[u8]) -> bool;
    /// True once a route to the peer is usable.
    fn is_writable(&self) -> bool;
}

/// Inbound side of the seam, implemented by the stream layer.
#[async_trait]
pub trait RudpSegmentSink: Send + Sync {
    async fn on_segment(&self, from: SocketAddr, data: Vec<u8>);
    /// The transport below became writable.
    async fn on_writable(&self);
}

/// [`RudpTransport`] over a nominated ICE session.
pub struct SessionTransport {
    session: IceSession,
}

impl SessionTransport {
    pub fn new(session: IceSession) -> Self {
        SessionTransport { session }
    }
}

#[async_trait]
impl RudpTransport for SessionTransport {
    async fn send_segment(&self, data: &[u8]) -> bool {
        self.session.send_packet(data).await
    }

    fn is_writable(&self) -> bool {
        self.session.state() == IceSessionState::Ready
    }
}

/// Session observer forwarding datagram and writability events into a
/// [`RudpSegmentSink`]; state changes stay with the session's owner.
pub struct SegmentBridge {
    sink: Arc<dyn RudpSegmentSink>,
}

impl SegmentBridge {
    pub fn new(sink: Arc<dyn RudpSegmentSink>) -> Self {
        SegmentBridge { sink }
    }
}

#[async_trait]
impl IceSessionObserver for SegmentBridge {
    async fn on_state_change(&self, _state: IceSessionState) {}

    async fn on_write_ready(&self) {
        self.sink.on_writable().await;
    }

    async fn on_packet_received(&self, from: SocketAddr, data: Vec<u8>) {
        self.sink.on_segment(from, data).await;
    }
}

#[cfg(test)]
mod rudp_test {
    use std::net::{IpAddr, Ipv4Addr};

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecSink {
        segments: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
        writable: Mutex<usize>,
    }

    #[async_trait]
    impl RudpSegmentSink for RecSink {
        async fn on_segment(&self, from: SocketAddr, data: Vec<u8>) {
            self.segments.lock().push((from, data));
        }

        async fn on_writable(&self) {
            *self.writable.lock() += 1;
        }
    }

    #[tokio::test]
    async fn test_bridge_forwards_events() {
        let sink = Arc::new(RecSink::default());
        let bridge = SegmentBridge::new(sink.clone());

        let from = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)), 9000);
        bridge.on_write_ready().await;
        bridge.on_packet_received(from, vec![1, 2, 3]).await;
        bridge.on_state_change(IceSessionState::Ready).await;

        assert_eq!(*sink.writable.lock(), 1);
        assert_eq!(sink.segments.lock().as_slice(), &[(from, vec![1, 2, 3])]);
    }
}
