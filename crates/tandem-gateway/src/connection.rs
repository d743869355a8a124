use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// A connected client. A user may hold several connections at once
/// (multiple tabs, devices); events fan out to all of them.
#[derive(Debug)]
pub struct Connection {
    pub id: Uuid,
    pub user_id: String,
    pub tx: mpsc::UnboundedSender<String>,
}

/// Registry of live connections, keyed by connection id.
///
/// A connection is pruned on its first failed send, whether that send was a
/// turn event or a heartbeat ping.
pub struct ConnectionManager {
    connections: RwLock<HashMap<Uuid, Connection>>,
}

impl ConnectionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: RwLock::new(HashMap::new()),
        })
    }

    pub async fn add(&self, conn: Connection) {
        let id = conn.id;
        self.connections.write().await.insert(id, conn);
        info!(connection_id = %id, "Connection added");
    }

    pub async fn remove(&self, id: Uuid) {
        self.connections.write().await.remove(&id);
        info!(connection_id = %id, "Connection removed");
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Sends a message to every live connection of a user. Connections whose
    /// send fails are pruned. Returns the number of successful deliveries.
    pub async fn send_to_user(&self, user_id: &str, message: &str) -> usize {
        let mut dead = Vec::new();
        let mut delivered = 0;
        {
            let conns = self.connections.read().await;
            for conn in conns.values() {
                if conn.user_id != user_id {
                    continue;
                }
                if conn.tx.send(message.to_string()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(conn.id);
                }
            }
        }
        self.prune(dead).await;
        delivered
    }

    /// Sends a message to all connections, pruning failures.
    pub async fn broadcast(&self, message: &str) {
        let mut dead = Vec::new();
        {
            let conns = self.connections.read().await;
            for conn in conns.values() {
                if conn.tx.send(message.to_string()).is_err() {
                    dead.push(conn.id);
                }
            }
        }
        self.prune(dead).await;
    }

    async fn prune(&self, dead: Vec<Uuid>) {
        if dead.is_empty() {
            return;
        }
        let mut conns = self.connections.write().await;
        for id in dead {
            conns.remove(&id);
            debug!(connection_id = %id, "Pruned dead connection");
        }
    }

    /// Spawns the heartbeat task: pings every connection at the given
    /// interval and prunes those that no longer accept sends. Runs for the
    /// life of the process, independent of any turn.
    pub fn spawn_heartbeat(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let ping = serde_json::json!({
                    "type": "ping",
                    "timestamp": chrono::Utc::now(),
                })
                .to_string();
                manager.broadcast(&ping).await;
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn connect(user_id: &str) -> (Connection, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Connection {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn fan_out_reaches_all_of_a_users_connections() {
        let manager = ConnectionManager::new();
        let (c1, mut rx1) = connect("alice");
        let (c2, mut rx2) = connect("alice");
        let (c3, mut rx3) = connect("bob");
        manager.add(c1).await;
        manager.add(c2).await;
        manager.add(c3).await;

        let delivered = manager.send_to_user("alice", "hello").await;
        assert_eq!(delivered, 2);
        assert_eq!(rx1.recv().await.unwrap(), "hello");
        assert_eq!(rx2.recv().await.unwrap(), "hello");
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_send_prunes_the_connection() {
        let manager = ConnectionManager::new();
        let (dead, rx) = connect("alice");
        drop(rx);
        let (live, mut live_rx) = connect("alice");
        manager.add(dead).await;
        manager.add(live).await;
        assert_eq!(manager.connection_count().await, 2);

        let delivered = manager.send_to_user("alice", "ping").await;
        assert_eq!(delivered, 1);
        assert_eq!(manager.connection_count().await, 1);
        assert_eq!(live_rx.recv().await.unwrap(), "ping");
    }

    #[tokio::test]
    async fn heartbeat_pings_and_prunes() {
        let manager = ConnectionManager::new();
        let (dead, rx) = connect("alice");
        drop(rx);
        let (live, mut live_rx) = connect("bob");
        manager.add(dead).await;
        manager.add(live).await;

        let handle = manager.spawn_heartbeat(Duration::from_millis(20));

        let ping = tokio::time::timeout(Duration::from_secs(1), live_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let frame: serde_json::Value = serde_json::from_str(&ping).unwrap();
        assert_eq!(frame["type"], "ping");

        // The dead connection was pruned by the same sweep.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.connection_count().await, 1);
        handle.abort();
    }
}
