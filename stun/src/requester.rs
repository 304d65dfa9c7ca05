#[cfg(test)]
mod requester_test;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use util::BackOffPattern;

use crate::error::*;
use crate::message::{Message, TransactionId};

/// Emits encoded request bytes toward a server; supplied by whoever
/// owns the underlying transport (a bound UDP endpoint, a TURN TCP
/// stream, a test harness).
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn send_request(&self, data: &[u8], to: SocketAddr) -> Result<()>;
}

/// Terminal outcome of one outstanding request, delivered at most
/// once.
#[derive(Debug)]
pub enum RequesterEvent {
    /// A matching response arrived. `retries` counts retransmissions
    /// made before it did.
    Response {
        from: SocketAddr,
        message: Message,
        retries: usize,
    },
    /// The back-off schedule was exhausted without a response.
    Timeout,
}

struct RequesterState {
    retries: usize,
    finished: bool,
    result_tx: Option<mpsc::Sender<RequesterEvent>>,
}

/// One outstanding STUN request: the encoded packet, its destination
/// and its retransmission schedule. Created through
/// [`RequesterManager::create_requester`]; dropping the last handle
/// implicitly cancels (the manager only ever holds a weak reference).
pub struct Requester {
    id: TransactionId,
    server: SocketAddr,
    request: Message,
    pattern: BackOffPattern,
    bind_source: bool,
    state: Mutex<RequesterState>,
}

impl Requester {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// The request message as sent on the wire.
    pub fn request(&self) -> &Message {
        &self.request
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    pub fn back_off_pattern(&self) -> &BackOffPattern {
        &self.pattern
    }

    pub fn retries(&self) -> usize {
        self.state.lock().retries
    }

    /// Idempotent: stops retransmission and drops the pending result
    /// channel, so a response arriving later is ignored.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.finished = true;
        state.result_tx.take();
    }

    fn finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Marks the requester finished and hands out the event sender,
    /// exactly once.
    fn take_result_tx(&self) -> Option<mpsc::Sender<RequesterEvent>> {
        let mut state = self.state.lock();
        if state.finished {
            return None;
        }
        state.finished = true;
        state.result_tx.take()
    }
}

/// Routes inbound STUN responses to the requester that sent the
/// matching transaction id and drives per-request retransmission.
///
/// The index stores weak handles: an owner that loses interest simply
/// drops its [`Requester`], and the manager prunes the dead entry the
/// next time it touches it.
#[derive(Default)]
pub struct RequesterManager {
    requesters: Mutex<HashMap<TransactionId, Weak<Requester>>>,
    closed: Mutex<bool>,
}

impl RequesterManager {
    pub fn new() -> Arc<Self> {
        Arc::new(RequesterManager::default())
    }

    /// Registers a new requester for `request`, sends it immediately
    /// through `sender` and arms the retransmission task. Returns the
    /// requester handle and the channel on which its single terminal
    /// event will arrive.
    pub async fn create_requester(
        self: &Arc<Self>,
        request: Message,
        server: SocketAddr,
        pattern: BackOffPattern,
        bind_source: bool,
        sender: Arc<dyn RequestSender>,
    ) -> Result<(Arc<Requester>, mpsc::Receiver<RequesterEvent>)> {
        if *self.closed.lock() {
            return Err(Error::ErrManagerClosed);
        }

        let (result_tx, result_rx) = mpsc::channel(1);
        let requester = Arc::new(Requester {
            id: request.transaction_id,
            server,
            request,
            pattern,
            bind_source,
            state: Mutex::new(RequesterState {
                retries: 0,
                finished: false,
                result_tx: Some(result_tx),
            }),
        });

        {
            let mut map = self.requesters.lock();
            map.retain(|_, weak| weak.strong_count() > 0);
            if map.contains_key(&requester.id) {
                return Err(Error::ErrRequesterExists);
            }
            map.insert(requester.id, Arc::downgrade(&requester));
        }

        log::trace!(
            "start {} requester {} to {}",
            requester.request.typ,
            requester.id.key(),
            server
        );
        sender
            .send_request(&requester.request.raw, server)
            .await?;

        self.spawn_retransmit_task(Arc::downgrade(&requester), sender);
        Ok((requester, result_rx))
    }

    fn spawn_retransmit_task(self: &Arc<Self>, weak: Weak<Requester>, sender: Arc<dyn RequestSender>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut attempt = 1usize;
            loop {
                let interval = {
                    let Some(requester) = weak.upgrade() else { return };
                    if requester.finished() {
                        return;
                    }
                    requester.back_off_pattern().next_interval(attempt)
                };

                let Some(interval) = interval else {
                    // schedule exhausted: one final response window,
                    // then give up
                    let last = weak
                        .upgrade()
                        .and_then(|r| r.back_off_pattern().next_interval(attempt.saturating_sub(1)))
                        .unwrap_or(std::time::Duration::from_millis(500));
                    tokio::time::sleep(last).await;
                    manager.time_out(&weak).await;
                    return;
                };
                tokio::time::sleep(interval).await;

                let Some(requester) = weak.upgrade() else { return };
                if requester.finished() {
                    return;
                }

                log::trace!(
                    "retransmit requester {} to {} (attempt {})",
                    requester.id.key(),
                    requester.server,
                    attempt
                );
                requester.state.lock().retries += 1;
                if sender
                    .send_request(&requester.request.raw, requester.server)
                    .await
                    .is_err()
                {
                    manager.time_out(&weak).await;
                    return;
                }
                attempt += 1;
            }
        });
    }

    async fn time_out(&self, weak: &Weak<Requester>) {
        let Some(requester) = weak.upgrade() else { return };
        self.requesters.lock().remove(&requester.id);
        if let Some(tx) = requester.take_result_tx() {
            let _ = tx.send(RequesterEvent::Timeout).await;
        }
    }

    /// Offers an inbound response to the matching requester. Returns
    /// true when the packet was consumed; an id that matches nothing
    /// (including a duplicate of an already-delivered response) is
    /// left for other demultiplexer branches.
    pub async fn handle_stun_packet(&self, from: SocketAddr, message: Message) -> bool {
        let entry = {
            let mut map = self.requesters.lock();
            match map.get(&message.transaction_id) {
                Some(weak) => match weak.upgrade() {
                    Some(requester) => {
                        map.remove(&message.transaction_id);
                        Some(requester)
                    }
                    None => {
                        // owner went away; prune and swallow
                        map.remove(&message.transaction_id);
                        return true;
                    }
                },
                None => None,
            }
        };

        let Some(requester) = entry else {
            return false;
        };

        if requester.bind_source && from.ip() != requester.server.ip() {
            log::debug!(
                "dropping response for {} from unexpected source {}",
                requester.id.key(),
                from
            );
            return true;
        }

        let retries = requester.retries();
        if let Some(tx) = requester.take_result_tx() {
            let _ = tx
                .send(RequesterEvent::Response {
                    from,
                    message,
                    retries,
                })
                .await;
        }
        true
    }

    /// True if a live requester with this transaction id exists.
    pub fn contains(&self, id: &TransactionId) -> bool {
        let map = self.requesters.lock();
        map.get(id).map(|w| w.strong_count() > 0).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        let mut map = self.requesters.lock();
        map.retain(|_, weak| weak.strong_count() > 0);
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancels every outstanding requester and rejects future ones.
    pub fn close(&self) {
        *self.closed.lock() = true;
        let mut map = self.requesters.lock();
        for (_, weak) in map.drain() {
            if let Some(requester) = weak.upgrade() {
                requester.cancel();
            }
        }
    }
}
