//! Connection hub
//!
//! Registry of live connections, the per-user index, and per-conversation
//! subscription sets. Lifecycle transitions (register, unregister,
//! broadcast) flow through a bounded command channel drained by one control
//! task, so all mutations of the three maps share a single logical
//! timeline. Subscription changes and targeted sends operate on the
//! concurrent maps directly; an iteration that observes a stale connection
//! just enqueues to a dead queue, which its writer discards on close.

use crate::connection::Conn;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capacity of the register/unregister lanes
const LIFECYCLE_QUEUE_SIZE: usize = 256;
/// Capacity of the broadcast lane
const BROADCAST_QUEUE_SIZE: usize = 1024;

/// A control-plane operation applied by the hub task
enum HubCommand {
    Register(Arc<Conn>),
    Unregister(Arc<Conn>),
    Broadcast { cid: String, frame: Vec<u8> },
}

/// The gateway's in-memory connection registry
pub struct Hub {
    /// All live connections by id
    conns: DashMap<String, Arc<Conn>>,
    /// uid → connection ids (a user may have several devices)
    user_conns: DashMap<String, HashSet<String>>,
    /// cid → connection ids subscribed to that conversation
    subscriptions: DashMap<String, HashSet<String>>,
    lifecycle_tx: mpsc::Sender<HubCommand>,
    broadcast_tx: mpsc::Sender<HubCommand>,
    /// Per-user connection bound; 0 disables eviction
    max_conn_per_user: usize,
}

impl Hub {
    /// Create the hub and spawn its control task
    #[must_use]
    pub fn spawn(max_conn_per_user: usize) -> Arc<Self> {
        let (lifecycle_tx, lifecycle_rx) = mpsc::channel(LIFECYCLE_QUEUE_SIZE);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(BROADCAST_QUEUE_SIZE);

        let hub = Arc::new(Self {
            conns: DashMap::new(),
            user_conns: DashMap::new(),
            subscriptions: DashMap::new(),
            lifecycle_tx,
            broadcast_tx,
            max_conn_per_user,
        });

        tokio::spawn(control_loop(hub.clone(), lifecycle_rx, broadcast_rx));
        hub
    }

    /// Register a connection; evicts the user's oldest beyond the bound
    pub async fn register(&self, conn: Arc<Conn>) {
        if self
            .lifecycle_tx
            .send(HubCommand::Register(conn))
            .await
            .is_err()
        {
            tracing::error!("hub control task is gone");
        }
    }

    /// Unregister a connection from all three maps; idempotent
    pub async fn unregister(&self, conn: Arc<Conn>) {
        if self
            .lifecycle_tx
            .send(HubCommand::Unregister(conn))
            .await
            .is_err()
        {
            tracing::error!("hub control task is gone");
        }
    }

    /// Fan a frame out to every subscriber of a conversation
    pub async fn broadcast(&self, cid: &str, frame: Vec<u8>) {
        if self
            .broadcast_tx
            .send(HubCommand::Broadcast {
                cid: cid.to_string(),
                frame,
            })
            .await
            .is_err()
        {
            tracing::error!("hub control task is gone");
        }
    }

    /// Subscribe a registered connection to a conversation
    ///
    /// The caller has already authorized. Returns false for a connection
    /// the hub does not know (already torn down).
    pub fn subscribe(&self, conn: &Conn, cid: &str) -> bool {
        if !self.conns.contains_key(conn.id()) {
            return false;
        }

        self.subscriptions
            .entry(cid.to_string())
            .or_default()
            .insert(conn.id().to_string());

        tracing::debug!(conn_id = %conn.id(), cid = %cid, "subscribed");
        true
    }

    /// Drop one subscription; idempotent
    pub fn unsubscribe(&self, conn: &Conn, cid: &str) {
        if let Some(mut subs) = self.subscriptions.get_mut(cid) {
            subs.remove(conn.id());
        }
        self.subscriptions.remove_if(cid, |_, subs| subs.is_empty());
    }

    /// Send a frame to every connection of one user
    pub fn send_to_user(&self, uid: &str, frame: &[u8]) -> usize {
        let ids: Vec<String> = self
            .user_conns
            .get(uid)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();

        let mut sent = 0;
        for id in ids {
            if let Some(conn) = self.conns.get(&id) {
                if conn.send(frame.to_vec()) {
                    sent += 1;
                }
            }
        }
        sent
    }

    /// Look up a connection by id
    pub fn get_conn(&self, conn_id: &str) -> Option<Arc<Conn>> {
        self.conns.get(conn_id).map(|c| c.clone())
    }

    /// Total live connections
    #[must_use]
    pub fn total_conns(&self) -> usize {
        self.conns.len()
    }

    /// Users with at least one live connection
    #[must_use]
    pub fn online_users(&self) -> usize {
        self.user_conns.len()
    }

    /// Subscriber count of a conversation
    #[must_use]
    pub fn subscriber_count(&self, cid: &str) -> usize {
        self.subscriptions.get(cid).map_or(0, |s| s.len())
    }

    /// Whether a connection is subscribed to a conversation
    #[must_use]
    pub fn is_subscribed(&self, cid: &str, conn_id: &str) -> bool {
        self.subscriptions
            .get(cid)
            .is_some_and(|subs| subs.contains(conn_id))
    }

    /// Check the registry invariant: every indexed id keys `conns`
    ///
    /// Used by tests; cheap enough to call in debug assertions.
    #[must_use]
    pub fn check_invariants(&self) -> bool {
        let users_ok = self.user_conns.iter().all(|entry| {
            entry
                .value()
                .iter()
                .all(|id| self.conns.contains_key(id))
        });
        let subs_ok = self.subscriptions.iter().all(|entry| {
            entry
                .value()
                .iter()
                .all(|id| self.conns.contains_key(id))
        });
        users_ok && subs_ok
    }

    fn apply(&self, command: HubCommand) {
        match command {
            HubCommand::Register(conn) => self.apply_register(conn),
            HubCommand::Unregister(conn) => self.apply_unregister(&conn),
            HubCommand::Broadcast { cid, frame } => self.apply_broadcast(&cid, frame),
        }
    }

    fn apply_register(&self, conn: Arc<Conn>) {
        let conn_id = conn.id().to_string();
        let uid = conn.uid().to_string();

        self.conns.insert(conn_id.clone(), conn.clone());

        let over_bound = {
            let mut set = self.user_conns.entry(uid.clone()).or_default();
            set.insert(conn_id.clone());
            self.max_conn_per_user > 0 && set.len() > self.max_conn_per_user
        };

        if over_bound {
            let victim = {
                let Some(set) = self.user_conns.get(&uid) else {
                    return;
                };
                set.iter()
                    .filter(|id| **id != conn_id)
                    .filter_map(|id| self.conns.get(id).map(|c| c.clone()))
                    .min_by_key(|c| c.created_at())
            };

            if let Some(victim) = victim {
                tracing::info!(
                    uid = %uid,
                    evicted = %victim.id(),
                    "connection bound exceeded, evicting oldest"
                );
                victim.close();
                self.apply_unregister(&victim);
            }
        }

        tracing::info!(
            conn_id = %conn_id,
            uid = %uid,
            device_id = %conn.device_id(),
            "connection registered"
        );
    }

    fn apply_unregister(&self, conn: &Conn) {
        let conn_id = conn.id();

        self.conns.remove(conn_id);

        let empty = self
            .user_conns
            .get_mut(conn.uid())
            .map(|mut set| {
                set.remove(conn_id);
                set.is_empty()
            })
            .unwrap_or(false);
        if empty {
            self.user_conns
                .remove_if(conn.uid(), |_, set| set.is_empty());
        }

        for mut entry in self.subscriptions.iter_mut() {
            entry.value_mut().remove(conn_id);
        }
        self.subscriptions.retain(|_, subs| !subs.is_empty());

        tracing::info!(conn_id = %conn_id, uid = %conn.uid(), "connection unregistered");
    }

    fn apply_broadcast(&self, cid: &str, frame: Vec<u8>) {
        let ids: Vec<String> = match self.subscriptions.get(cid) {
            Some(subs) => subs.iter().cloned().collect(),
            None => return,
        };

        for id in ids {
            if let Some(conn) = self.conns.get(&id) {
                conn.send(frame.clone());
            }
        }
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("conns", &self.conns.len())
            .field("users", &self.user_conns.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

/// Drain both command lanes, applying each operation serially
///
/// Strictly CPU-bound: no I/O happens here, so the control plane cannot
/// stall on a slow peer.
async fn control_loop(
    hub: Arc<Hub>,
    mut lifecycle_rx: mpsc::Receiver<HubCommand>,
    mut broadcast_rx: mpsc::Receiver<HubCommand>,
) {
    loop {
        tokio::select! {
            command = lifecycle_rx.recv() => match command {
                Some(command) => hub.apply(command),
                None => break,
            },
            command = broadcast_rx.recv() => match command {
                Some(command) => hub.apply(command),
                None => break,
            },
        }
    }

    tracing::debug!("hub control loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::Receiver;

    fn make_conn(id: &str, uid: &str) -> (Arc<Conn>, Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(crate::connection::SEND_QUEUE_SIZE);
        (Conn::new(id, uid, "dev", "test", tx), rx)
    }

    /// Wait until the control task has caught up with a condition
    async fn settle(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("hub did not settle");
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let hub = Hub::spawn(0);
        let (conn, _rx) = make_conn("c1", "alice");

        hub.register(conn.clone()).await;
        settle(|| hub.total_conns() == 1).await;
        assert_eq!(hub.online_users(), 1);

        hub.unregister(conn).await;
        settle(|| hub.total_conns() == 0).await;
        assert_eq!(hub.online_users(), 0);
        assert!(hub.check_invariants());
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let hub = Hub::spawn(0);
        let (conn, _rx) = make_conn("c1", "alice");

        hub.register(conn.clone()).await;
        settle(|| hub.total_conns() == 1).await;

        hub.unregister(conn.clone()).await;
        hub.unregister(conn).await;
        settle(|| hub.total_conns() == 0).await;
        assert!(hub.check_invariants());
    }

    #[tokio::test]
    async fn test_subscribe_requires_registration() {
        let hub = Hub::spawn(0);
        let (conn, _rx) = make_conn("c1", "alice");

        // Not registered yet.
        assert!(!hub.subscribe(&conn, "g:team"));
        assert_eq!(hub.subscriber_count("g:team"), 0);

        hub.register(conn.clone()).await;
        settle(|| hub.total_conns() == 1).await;
        assert!(hub.subscribe(&conn, "g:team"));
        assert!(hub.is_subscribed("g:team", conn.id()));
    }

    #[tokio::test]
    async fn test_unregister_removes_subscriptions() {
        let hub = Hub::spawn(0);
        let (conn, _rx) = make_conn("c1", "alice");

        hub.register(conn.clone()).await;
        settle(|| hub.total_conns() == 1).await;
        hub.subscribe(&conn, "g:team");
        hub.subscribe(&conn, "d:alice:bob");

        hub.unregister(conn.clone()).await;
        settle(|| hub.total_conns() == 0).await;

        assert!(!hub.is_subscribed("g:team", conn.id()));
        assert!(!hub.is_subscribed("d:alice:bob", conn.id()));
        assert!(hub.check_invariants());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_exactly_the_subscribers() {
        let hub = Hub::spawn(0);
        let (alpha, mut alpha_rx) = make_conn("a", "alice");
        let (beta, mut beta_rx) = make_conn("b", "bob");
        let (carol, mut carol_rx) = make_conn("c", "carol");

        for conn in [&alpha, &beta, &carol] {
            hub.register(conn.clone()).await;
        }
        settle(|| hub.total_conns() == 3).await;

        hub.subscribe(&alpha, "g:team");
        hub.subscribe(&beta, "g:team");
        // carol never subscribes

        hub.broadcast("g:team", vec![0xAB]).await;

        let frame = tokio::time::timeout(Duration::from_secs(1), alpha_rx.recv())
            .await
            .unwrap();
        assert_eq!(frame, Some(vec![0xAB]));
        let frame = tokio::time::timeout(Duration::from_secs(1), beta_rx.recv())
            .await
            .unwrap();
        assert_eq!(frame, Some(vec![0xAB]));

        // Carol must receive nothing.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribed_connection_stops_receiving() {
        let hub = Hub::spawn(0);
        let (conn, mut rx) = make_conn("c1", "alice");

        hub.register(conn.clone()).await;
        settle(|| hub.total_conns() == 1).await;
        hub.subscribe(&conn, "g:team");

        hub.broadcast("g:team", vec![1]).await;
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap(),
            Some(vec![1])
        );

        hub.unsubscribe(&conn, "g:team");
        hub.broadcast("g:team", vec![2]).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_order_per_subscriber() {
        let hub = Hub::spawn(0);
        let (conn, mut rx) = make_conn("c1", "alice");

        hub.register(conn.clone()).await;
        settle(|| hub.total_conns() == 1).await;
        hub.subscribe(&conn, "g:team");

        for i in 0..20u8 {
            hub.broadcast("g:team", vec![i]).await;
        }

        for i in 0..20u8 {
            let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap();
            assert_eq!(frame, Some(vec![i]));
        }
    }

    #[tokio::test]
    async fn test_eviction_of_oldest_connection() {
        let hub = Hub::spawn(2);
        let (c1, _rx1) = make_conn("c1", "alice");
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (c2, _rx2) = make_conn("c2", "alice");
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (c3, _rx3) = make_conn("c3", "alice");

        hub.register(c1.clone()).await;
        hub.register(c2.clone()).await;
        settle(|| hub.total_conns() == 2).await;

        hub.register(c3.clone()).await;
        settle(|| hub.get_conn("c1").is_none()).await;

        // The oldest connection was closed and dropped from the registry.
        assert!(c1.is_closed());
        assert!(!c2.is_closed());
        assert!(hub.get_conn("c2").is_some());
        assert!(hub.get_conn("c3").is_some());
        assert!(hub.check_invariants());
    }

    #[tokio::test]
    async fn test_no_eviction_when_unbounded() {
        let hub = Hub::spawn(0);
        let mut conns = Vec::new();
        for i in 0..8 {
            let (conn, rx) = make_conn(&format!("c{i}"), "alice");
            hub.register(conn.clone()).await;
            conns.push((conn, rx));
        }
        settle(|| hub.total_conns() == 8).await;
        assert!(conns.iter().all(|(c, _)| !c.is_closed()));
    }

    #[tokio::test]
    async fn test_send_to_user_hits_all_devices() {
        let hub = Hub::spawn(0);
        let (phone, mut phone_rx) = make_conn("c1", "alice");
        let (laptop, mut laptop_rx) = make_conn("c2", "alice");
        let (other, mut other_rx) = make_conn("c3", "bob");

        for conn in [&phone, &laptop, &other] {
            hub.register(conn.clone()).await;
        }
        settle(|| hub.total_conns() == 3).await;

        let sent = hub.send_to_user("alice", &[7]);
        assert_eq!(sent, 2);
        assert_eq!(phone_rx.recv().await, Some(vec![7]));
        assert_eq!(laptop_rx.recv().await, Some(vec![7]));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invariants_after_interleaving() {
        let hub = Hub::spawn(3);

        for round in 0..5 {
            let mut conns = Vec::new();
            for i in 0..6 {
                let (conn, rx) = make_conn(&format!("r{round}-c{i}"), &format!("u{}", i % 2));
                hub.register(conn.clone()).await;
                conns.push((conn, rx));
            }
            settle(|| hub.check_invariants() && hub.total_conns() > 0).await;

            for (i, (conn, _)) in conns.iter().enumerate() {
                if hub.get_conn(conn.id()).is_some() {
                    hub.subscribe(conn, if i % 2 == 0 { "g:even" } else { "g:odd" });
                }
            }

            for (conn, _rx) in &conns {
                hub.unregister(conn.clone()).await;
            }
            settle(|| hub.total_conns() == 0).await;
            assert!(hub.check_invariants());
            assert_eq!(hub.subscriber_count("g:even"), 0);
            assert_eq!(hub.subscriber_count("g:odd"), 0);
        }
    }
}
