//! Registry of live connections and group-addressed delivery.
//!
//! The hub tracks which connections are members of which [`GroupKey`] groups. Publishing is
//! strictly best-effort: events are pushed with `try_send`, so a slow consumer loses events
//! rather than ever stalling the publisher, and groups with no members swallow the event
//! silently. There is no persistence or replay; offline recipients simply never see it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use log::*;
use tokio::sync::{mpsc, RwLock};

use crate::events::{GroupKey, Handler, Notification, NotificationEvent};

pub type ConnId = u64;

#[derive(Default)]
struct HubState {
    next_conn_id: ConnId,
    groups: HashMap<GroupKey, HashMap<ConnId, mpsc::Sender<NotificationEvent>>>,
    memberships: HashMap<ConnId, Vec<GroupKey>>,
}

#[derive(Clone)]
pub struct NotificationHub {
    buffer_size: usize,
    state: Arc<RwLock<HubState>>,
}

impl NotificationHub {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size, state: Arc::new(RwLock::new(HubState::default())) }
    }

    /// Register a new connection as a member of each of the given groups. Returns the connection
    /// id and the receiving end the connection's write loop should drain.
    pub async fn subscribe(&self, groups: Vec<GroupKey>) -> (ConnId, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel(self.buffer_size);
        let mut state = self.state.write().await;
        let conn_id = state.next_conn_id;
        state.next_conn_id += 1;
        for group in &groups {
            state.groups.entry(group.clone()).or_default().insert(conn_id, tx.clone());
        }
        debug!("📡️ Connection {conn_id} joined {} group(s)", groups.len());
        state.memberships.insert(conn_id, groups);
        (conn_id, rx)
    }

    /// Remove a connection from every group it joined. Idempotent.
    pub async fn unsubscribe(&self, conn_id: ConnId) {
        let mut state = self.state.write().await;
        if let Some(groups) = state.memberships.remove(&conn_id) {
            for group in groups {
                if let Some(members) = state.groups.get_mut(&group) {
                    members.remove(&conn_id);
                    if members.is_empty() {
                        state.groups.remove(&group);
                    }
                }
            }
            debug!("📡️ Connection {conn_id} left the hub");
        }
    }

    /// Deliver `event` to every current member of `group`. Returns the number of connections the
    /// event was queued for; full or closed connection buffers drop the event for that member.
    pub async fn publish(&self, group: &GroupKey, event: &NotificationEvent) -> usize {
        let state = self.state.read().await;
        let Some(members) = state.groups.get(group) else {
            trace!("📡️ No connections in group {group}; event dropped");
            return 0;
        };
        let mut delivered = 0;
        for (conn_id, tx) in members {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("📡️ Connection {conn_id} is not keeping up; dropping event for group {group}");
                },
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    trace!("📡️ Connection {conn_id} has gone away; dropping event for group {group}");
                },
            }
        }
        delivered
    }

    /// A [`Handler`] that forwards queued notifications into this hub. This is what the server
    /// installs as its `on_notification` hook.
    pub fn forwarding_hook(&self) -> Handler<Notification> {
        let hub = self.clone();
        Arc::new(move |n: Notification| {
            let hub = hub.clone();
            Box::pin(async move {
                hub.publish(&n.group, &n.event).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
    }

    /// Number of live members of a group. Exposed for diagnostics and tests.
    pub async fn group_size(&self, group: &GroupKey) -> usize {
        self.state.read().await.groups.get(group).map(HashMap::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::Role;

    #[tokio::test]
    async fn events_reach_every_member_of_the_group() {
        let hub = NotificationHub::new(8);
        let (_, mut rx_a) = hub.subscribe(vec![GroupKey::user(1), GroupKey::role(Role::Worker)]).await;
        let (_, mut rx_b) = hub.subscribe(vec![GroupKey::user(2), GroupKey::role(Role::Worker)]).await;

        let event = NotificationEvent::connection_established();
        assert_eq!(hub.publish(&GroupKey::role(Role::Worker), &event).await, 2);
        assert_eq!(rx_a.recv().await.unwrap(), event);
        assert_eq!(rx_b.recv().await.unwrap(), event);

        assert_eq!(hub.publish(&GroupKey::user(1), &event).await, 1);
        assert_eq!(rx_a.recv().await.unwrap(), event);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishing_to_an_empty_group_is_a_no_op() {
        let hub = NotificationHub::new(8);
        let delivered = hub.publish(&GroupKey::user(99), &NotificationEvent::connection_established()).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn unsubscribed_connections_no_longer_receive() {
        let hub = NotificationHub::new(8);
        let (conn, mut rx) = hub.subscribe(vec![GroupKey::user(5)]).await;
        hub.unsubscribe(conn).await;
        assert_eq!(hub.group_size(&GroupKey::user(5)).await, 0);
        assert_eq!(hub.publish(&GroupKey::user(5), &NotificationEvent::connection_established()).await, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn slow_consumers_drop_events_instead_of_blocking() {
        let hub = NotificationHub::new(1);
        let (_, mut rx) = hub.subscribe(vec![GroupKey::user(1)]).await;
        let event = NotificationEvent::connection_established();
        assert_eq!(hub.publish(&GroupKey::user(1), &event).await, 1);
        // Buffer is full now; the next publish drops rather than waiting.
        assert_eq!(hub.publish(&GroupKey::user(1), &event).await, 0);
        assert_eq!(rx.recv().await.unwrap(), event);
    }
}
