//! Connection registry and fan-out.
//!
//! A `Hub` is an unordered set of live clients. Fan-out never awaits: every
//! receiver gets a non-blocking enqueue, so one stalled client cannot hold up
//! the sender or anyone else.

use axum::extract::ws::Message;
use dashmap::DashMap;

use crate::config::SlowConsumerPolicy;
use crate::net::ConnectionId;
use crate::relay::client::{ClientHandle, ClientInfo, Delivery};

/// Per-broadcast delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
    pub kicked: usize,
}

impl BroadcastReport {
    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Queued => self.delivered += 1,
            Delivery::Dropped => self.dropped += 1,
            Delivery::Kicked => {
                self.dropped += 1;
                self.kicked += 1;
            }
            Delivery::Closed => {}
        }
    }
}

/// Set of live clients keyed by connection.
#[derive(Debug, Default)]
pub struct Hub {
    clients: DashMap<ConnectionId, ClientHandle>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client. Returns the member count after joining.
    pub fn join(&self, handle: ClientHandle) -> usize {
        self.clients.insert(handle.id(), handle);
        self.clients.len()
    }

    /// Remove a client, returning its handle if it was a member.
    pub fn leave(&self, id: ConnectionId) -> Option<ClientHandle> {
        self.clients.remove(&id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Snapshot of every member, ordered by connection.
    pub fn clients(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<_> = self.clients.iter().map(|entry| entry.value().info()).collect();
        clients.sort_by_key(|c| c.id);
        clients
    }

    /// Hand `msg` to every member.
    ///
    /// The sender (`from`) is skipped unless `include_sender` is set.
    pub fn broadcast(
        &self,
        from: Option<ConnectionId>,
        msg: &Message,
        include_sender: bool,
        policy: SlowConsumerPolicy,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for entry in self.clients.iter() {
            if !include_sender && Some(*entry.key()) == from {
                continue;
            }
            report.record(entry.value().deliver(msg.clone(), policy));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::client::tests::test_client;

    #[test]
    fn join_and_leave_track_membership() {
        let hub = Hub::new();
        let (a, _ra) = test_client(4);
        let (b, _rb) = test_client(4);
        let a_id = a.id();

        assert_eq!(hub.join(a), 1);
        assert_eq!(hub.join(b), 2);
        assert!(hub.contains(a_id));

        assert!(hub.leave(a_id).is_some());
        assert!(!hub.contains(a_id));
        assert!(hub.leave(a_id).is_none());
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn broadcast_skips_sender() {
        let hub = Hub::new();
        let (a, mut ra) = test_client(4);
        let (b, mut rb) = test_client(4);
        let (c, mut rc) = test_client(4);
        let from = a.id();
        hub.join(a);
        hub.join(b);
        hub.join(c);

        let report = hub.broadcast(Some(from), &Message::from("hi"), false, SlowConsumerPolicy::DropMessage);
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0, kicked: 0 });
        assert!(ra.try_recv().is_err());
        assert_eq!(rb.try_recv().unwrap(), Message::from("hi"));
        assert_eq!(rc.try_recv().unwrap(), Message::from("hi"));
    }

    #[test]
    fn broadcast_can_echo_to_sender() {
        let hub = Hub::new();
        let (a, mut ra) = test_client(4);
        let from = a.id();
        hub.join(a);

        let report = hub.broadcast(Some(from), &Message::from("me"), true, SlowConsumerPolicy::DropMessage);
        assert_eq!(report.delivered, 1);
        assert_eq!(ra.try_recv().unwrap(), Message::from("me"));
    }

    #[test]
    fn slow_client_does_not_affect_others() {
        let hub = Hub::new();
        let (slow, _slow_rx) = test_client(1);
        let (fast, mut fast_rx) = test_client(8);
        hub.join(slow);
        hub.join(fast);

        for i in 0..3 {
            hub.broadcast(None, &Message::from(format!("m{i}")), true, SlowConsumerPolicy::DropMessage);
        }

        for i in 0..3 {
            assert_eq!(fast_rx.try_recv().unwrap(), Message::from(format!("m{i}")));
        }
        let slow_info = hub.clients().into_iter().find(|c| c.dropped_messages > 0).unwrap();
        assert_eq!(slow_info.dropped_messages, 2);
    }

    #[test]
    fn closed_clients_are_not_counted() {
        let hub = Hub::new();
        let (gone, gone_rx) = test_client(1);
        drop(gone_rx);
        hub.join(gone);

        let report = hub.broadcast(None, &Message::from("x"), true, SlowConsumerPolicy::DropMessage);
        assert_eq!(report, BroadcastReport::default());
    }

    #[test]
    fn binary_payload_is_forwarded_verbatim() {
        let hub = Hub::new();
        let (a, mut ra) = test_client(1);
        hub.join(a);

        let payload = Message::Binary(vec![0u8, 159, 146, 150].into());
        hub.broadcast(None, &payload, true, SlowConsumerPolicy::DropMessage);
        assert_eq!(ra.try_recv().unwrap(), payload);
    }
}
