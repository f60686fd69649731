use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use ripple_types::events::GatewayEvent;

/// Tracks which users currently hold a live gateway connection and routes
/// targeted events to them. Holds process-lifetime state only: the whole map
/// is lost on restart and rebuilt as clients reconnect.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel — every connected client receives these events
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Active connection per user: user_id -> (conn_id, targeted sender).
    /// One entry per user; a newer connection replaces the older one.
    connections: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway-wide events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register `user_id` as online. Returns the connection id plus the
    /// receiver for targeted events, and broadcasts the updated online set.
    /// A nil user id registers nothing and the returned receiver never fires.
    pub async fn register(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        if user_id.is_nil() {
            return (conn_id, rx);
        }

        self.inner
            .connections
            .write()
            .await
            .insert(user_id, (conn_id, tx));

        self.broadcast_online_set().await;
        (conn_id, rx)
    }

    /// Remove the mapping owned by `conn_id` and broadcast the updated
    /// online set. The scan keys on the connection id: if a newer connection
    /// has already replaced this user's entry, nothing matches and the
    /// successor stays registered.
    pub async fn unregister(&self, conn_id: Uuid) {
        let removed = {
            let mut connections = self.inner.connections.write().await;
            let user_id = connections
                .iter()
                .find_map(|(uid, (cid, _))| (*cid == conn_id).then_some(*uid));
            match user_id {
                Some(uid) => {
                    connections.remove(&uid);
                    true
                }
                None => false,
            }
        };

        if removed {
            self.broadcast_online_set().await;
        }
    }

    /// Best-effort targeted push. Returns whether a live channel accepted
    /// the event; `false` means the user is offline and callers move on.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> bool {
        let connections = self.inner.connections.read().await;
        match connections.get(&user_id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Snapshot of currently online users.
    pub async fn online_users(&self) -> Vec<Uuid> {
        self.inner
            .connections
            .read()
            .await
            .keys()
            .copied()
            .collect()
    }

    async fn broadcast_online_set(&self) {
        let user_ids = self.online_users().await;
        self.broadcast(GatewayEvent::OnlineUsers { user_ids });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_broadcasts_full_online_set() {
        let dispatcher = Dispatcher::new();
        let mut events = dispatcher.subscribe();

        let alice = Uuid::new_v4();
        let (_conn, _rx) = dispatcher.register(alice).await;

        match events.recv().await.unwrap() {
            GatewayEvent::OnlineUsers { user_ids } => assert_eq!(user_ids, vec![alice]),
            other => panic!("expected OnlineUsers, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unregister_removes_and_rebroadcasts() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let (conn, _rx) = dispatcher.register(alice).await;

        let mut events = dispatcher.subscribe();
        dispatcher.unregister(conn).await;

        assert!(dispatcher.online_users().await.is_empty());
        match events.recv().await.unwrap() {
            GatewayEvent::OnlineUsers { user_ids } => assert!(user_ids.is_empty()),
            other => panic!("expected OnlineUsers, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stale_disconnect_does_not_evict_newer_connection() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();

        let (old_conn, _old_rx) = dispatcher.register(alice).await;
        let (_new_conn, mut new_rx) = dispatcher.register(alice).await;

        // The replaced connection disconnects late; its cleanup must not
        // touch the successor's registration.
        dispatcher.unregister(old_conn).await;
        assert_eq!(dispatcher.online_users().await, vec![alice]);

        assert!(
            dispatcher
                .send_to_user(
                    alice,
                    GatewayEvent::MessagesSeen {
                        conversation_id: Uuid::new_v4()
                    }
                )
                .await
        );
        assert!(matches!(
            new_rx.recv().await,
            Some(GatewayEvent::MessagesSeen { .. })
        ));
    }

    #[tokio::test]
    async fn send_to_offline_user_reports_absent() {
        let dispatcher = Dispatcher::new();
        let pushed = dispatcher
            .send_to_user(
                Uuid::new_v4(),
                GatewayEvent::MessagesSeen {
                    conversation_id: Uuid::new_v4(),
                },
            )
            .await;
        assert!(!pushed);
    }

    #[tokio::test]
    async fn nil_identity_registers_nothing() {
        let dispatcher = Dispatcher::new();
        let (_conn, _rx) = dispatcher.register(Uuid::nil()).await;
        assert!(dispatcher.online_users().await.is_empty());
    }
}
