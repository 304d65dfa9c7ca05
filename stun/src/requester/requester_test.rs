use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use super::*;
use crate::message::*;

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
}

#[async_trait]
impl RequestSender for RecordingSender {
    async fn send_request(&self, data: &[u8], to: SocketAddr) -> Result<()> {
        self.sent.lock().push((data.to_vec(), to));
        Ok(())
    }
}

fn server_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 3478)
}

fn binding_request() -> Message {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_REQUEST]).unwrap();
    m
}

fn binding_response(id: TransactionId) -> Message {
    let mut m = Message::new();
    m.build(&[&id, &BINDING_SUCCESS]).unwrap();
    m
}

#[tokio::test]
async fn test_request_sent_immediately() {
    let manager = RequesterManager::new();
    let sender = Arc::new(RecordingSender::default());

    let (requester, _rx) = manager
        .create_requester(
            binding_request(),
            server_addr(),
            BackOffPattern::fixed(Duration::from_secs(10), 3),
            false,
            sender.clone() as Arc<dyn RequestSender>,
        )
        .await
        .unwrap();

    let sent = sender.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, requester.request().raw);
    assert_eq!(sent[0].1, server_addr());
}

#[tokio::test]
async fn test_response_delivered_once() {
    let manager = RequesterManager::new();
    let sender = Arc::new(RecordingSender::default());

    let (requester, mut rx) = manager
        .create_requester(
            binding_request(),
            server_addr(),
            BackOffPattern::fixed(Duration::from_secs(10), 3),
            false,
            sender as Arc<dyn RequestSender>,
        )
        .await
        .unwrap();

    let response = binding_response(requester.id());
    assert!(manager.handle_stun_packet(server_addr(), response.clone()).await);

    match rx.recv().await {
        Some(RequesterEvent::Response { from, message, .. }) => {
            assert_eq!(from, server_addr());
            assert_eq!(message.transaction_id, requester.id());
        }
        other => panic!("expected response, got {other:?}"),
    }

    // duplicate is swallowed without a second delivery
    assert!(!manager.handle_stun_packet(server_addr(), response).await);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_unmatched_response_not_handled() {
    let manager = RequesterManager::new();
    let response = binding_response(TransactionId::new());
    assert!(!manager.handle_stun_packet(server_addr(), response).await);
}

#[tokio::test(start_paused = true)]
async fn test_retransmits_then_times_out() {
    let manager = RequesterManager::new();
    let sender = Arc::new(RecordingSender::default());

    let (requester, mut rx) = manager
        .create_requester(
            binding_request(),
            server_addr(),
            BackOffPattern::fixed(Duration::from_millis(50), 3),
            false,
            sender.clone() as Arc<dyn RequestSender>,
        )
        .await
        .unwrap();

    match rx.recv().await {
        Some(RequesterEvent::Timeout) => {}
        other => panic!("expected timeout, got {other:?}"),
    }

    // initial send plus two retransmissions
    assert_eq!(sender.sent.lock().len(), 3);
    assert_eq!(requester.retries(), 2);
    assert!(manager.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_retransmission() {
    let manager = RequesterManager::new();
    let sender = Arc::new(RecordingSender::default());

    let (requester, mut rx) = manager
        .create_requester(
            binding_request(),
            server_addr(),
            BackOffPattern::fixed(Duration::from_millis(50), 5),
            false,
            sender.clone() as Arc<dyn RequestSender>,
        )
        .await
        .unwrap();

    requester.cancel();
    assert!(rx.recv().await.is_none());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(sender.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_response_from_other_ip_accepted_by_default() {
    let manager = RequesterManager::new();
    let sender = Arc::new(RecordingSender::default());

    let (requester, mut rx) = manager
        .create_requester(
            binding_request(),
            server_addr(),
            BackOffPattern::fixed(Duration::from_secs(10), 2),
            false,
            sender as Arc<dyn RequestSender>,
        )
        .await
        .unwrap();

    let rebound = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 99)), 3478);
    assert!(
        manager
            .handle_stun_packet(rebound, binding_response(requester.id()))
            .await
    );
    assert!(matches!(
        rx.recv().await,
        Some(RequesterEvent::Response { from, .. }) if from == rebound
    ));
}

#[tokio::test]
async fn test_bound_source_drops_foreign_ip() {
    let manager = RequesterManager::new();
    let sender = Arc::new(RecordingSender::default());

    let (requester, mut rx) = manager
        .create_requester(
            binding_request(),
            server_addr(),
            BackOffPattern::fixed(Duration::from_secs(10), 2),
            true,
            sender as Arc<dyn RequestSender>,
        )
        .await
        .unwrap();

    let rebound = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 99)), 3478);
    assert!(
        manager
            .handle_stun_packet(rebound, binding_response(requester.id()))
            .await
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_manager_close_rejects_new_requesters() {
    let manager = RequesterManager::new();
    let sender = Arc::new(RecordingSender::default());
    manager.close();

    let err = manager
        .create_requester(
            binding_request(),
            server_addr(),
            BackOffPattern::rfc_rto(),
            false,
            sender as Arc<dyn RequestSender>,
        )
        .await
        .unwrap_err();
    assert_eq!(err, Error::ErrManagerClosed);
}

#[tokio::test]
async fn test_dropping_requester_prunes_index() {
    let manager = RequesterManager::new();
    let sender = Arc::new(RecordingSender::default());

    let (requester, _rx) = manager
        .create_requester(
            binding_request(),
            server_addr(),
            BackOffPattern::fixed(Duration::from_secs(10), 2),
            false,
            sender as Arc<dyn RequestSender>,
        )
        .await
        .unwrap();

    let id = requester.id();
    assert!(manager.contains(&id));
    drop(requester);
    assert!(!manager.contains(&id));
    assert!(manager.is_empty());
}
