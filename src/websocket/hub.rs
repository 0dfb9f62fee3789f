//! Connection registry and topic fan-out

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::messages::{ServerMessage, WsEvent};

pub type ConnectionId = String;

/// Topic families clients may subscribe to, besides `system`
const TOPIC_PREFIXES: [&str; 2] = ["vault.", "tables."];

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Upgrades beyond this many open sockets are refused
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 256,
        }
    }
}

/// One open socket: its outbound queue and the topics it follows
struct Peer {
    outbox: mpsc::UnboundedSender<ServerMessage>,
    topics: HashSet<String>,
}

/// Peers and the reverse topic index, kept consistent under one lock
#[derive(Default)]
struct Registry {
    peers: HashMap<ConnectionId, Peer>,
    followers: HashMap<String, HashSet<ConnectionId>>,
}

impl Registry {
    fn drop_follower(&mut self, topic: &str, id: &str) {
        if let Some(ids) = self.followers.get_mut(topic) {
            ids.remove(id);
            if ids.is_empty() {
                self.followers.remove(topic);
            }
        }
    }

    /// Peers following `topic` directly or through its `family.*` wildcard,
    /// each listed once
    fn recipients(&self, topic: &str) -> HashSet<&ConnectionId> {
        let mut ids: HashSet<&ConnectionId> = HashSet::new();
        if let Some(direct) = self.followers.get(topic) {
            ids.extend(direct);
        }
        if let Some((family, _)) = topic.split_once('.') {
            if let Some(wildcard) = self.followers.get(&format!("{}.*", family)) {
                ids.extend(wildcard);
            }
        }
        ids
    }

    fn deliver(&self, event: &WsEvent) -> usize {
        let reached = self
            .recipients(&event.topic)
            .into_iter()
            .filter_map(|id| self.peers.get(id))
            .filter(|peer| peer.outbox.send(event.message.clone()).is_ok())
            .count();

        if reached > 0 {
            tracing::trace!(topic = %event.topic, reached, "Delivered change notification");
        }
        reached
    }
}

/// Fans change notifications out to subscribed WebSocket clients
pub struct ConnectionHub {
    registry: Arc<RwLock<Registry>>,
    config: HubConfig,
}

impl ConnectionHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            config,
        }
    }

    /// Admit a socket, refusing it once `max_connections` are open
    pub async fn register(
        &self,
        outbox: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<ConnectionId, HubError> {
        let mut registry = self.registry.write().await;
        if registry.peers.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = Uuid::new_v4().to_string();
        registry.peers.insert(
            id.clone(),
            Peer {
                outbox,
                topics: HashSet::new(),
            },
        );

        tracing::info!(connection_id = %id, open = registry.peers.len(), "WebSocket client joined");
        Ok(id)
    }

    /// Forget a socket and everything it followed
    pub async fn unregister(&self, id: &str) {
        let mut registry = self.registry.write().await;
        let Some(peer) = registry.peers.remove(id) else {
            return;
        };
        for topic in &peer.topics {
            registry.drop_follower(topic, id);
        }

        tracing::info!(connection_id = %id, open = registry.peers.len(), "WebSocket client left");
    }

    /// Follow topics; invalid ones are skipped and left out of the result
    pub async fn subscribe(&self, id: &str, topics: Vec<String>) -> Result<Vec<String>, HubError> {
        let mut registry = self.registry.write().await;
        if !registry.peers.contains_key(id) {
            return Err(HubError::ConnectionNotFound);
        }

        let (accepted, rejected): (Vec<String>, Vec<String>) =
            topics.into_iter().partition(|t| is_valid_topic(t));
        if !rejected.is_empty() {
            tracing::warn!(connection_id = %id, topics = ?rejected, "Ignoring unknown topics");
        }

        for topic in &accepted {
            registry
                .followers
                .entry(topic.clone())
                .or_default()
                .insert(id.to_string());
            if let Some(peer) = registry.peers.get_mut(id) {
                peer.topics.insert(topic.clone());
            }
        }

        tracing::debug!(connection_id = %id, topics = ?accepted, "Following topics");
        Ok(accepted)
    }

    /// Stop following topics; returns the ones that were actually followed
    pub async fn unsubscribe(&self, id: &str, topics: Vec<String>) -> Result<Vec<String>, HubError> {
        let mut registry = self.registry.write().await;
        let peer = registry.peers.get_mut(id).ok_or(HubError::ConnectionNotFound)?;

        let dropped: Vec<String> = topics
            .into_iter()
            .filter(|topic| peer.topics.remove(topic))
            .collect();
        for topic in &dropped {
            registry.drop_follower(topic, id);
        }

        tracing::debug!(connection_id = %id, topics = ?dropped, "Unfollowed topics");
        Ok(dropped)
    }

    /// Returns how many sockets the event reached
    pub async fn broadcast(&self, event: &WsEvent) -> usize {
        self.registry.read().await.deliver(event)
    }

    /// Fire-and-forget broadcast for callers outside an async context
    pub fn publish(&self, event: WsEvent) {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            registry.read().await.deliver(&event);
        });
    }

    pub async fn send_to(&self, id: &str, message: ServerMessage) -> Result<(), HubError> {
        let registry = self.registry.read().await;
        let peer = registry.peers.get(id).ok_or(HubError::ConnectionNotFound)?;
        peer.outbox.send(message).map_err(|_| HubError::SendFailed)
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.peers.len()
    }

    /// Sockets following exactly `topic` (wildcard followers not counted)
    pub async fn subscription_count(&self, topic: &str) -> usize {
        self.registry
            .read()
            .await
            .followers
            .get(topic)
            .map_or(0, HashSet::len)
    }
}

/// `system`, `vault.*`, `vault.{key}`, `tables.*` or `tables.{name}`
fn is_valid_topic(topic: &str) -> bool {
    topic == "system"
        || TOPIC_PREFIXES
            .iter()
            .any(|prefix| topic.strip_prefix(prefix).is_some_and(|rest| !rest.is_empty()))
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Unknown WebSocket connection")]
    ConnectionNotFound,

    #[error("Client outbox closed")]
    SendFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{RecordAction, RecordEvent};
    use crate::vault::{StorageEvent, StorageEventKind};

    fn record(table: &str) -> WsEvent {
        WsEvent::record(&RecordEvent {
            table: table.to_string(),
            id: "1".to_string(),
            action: RecordAction::Created,
        })
    }

    async fn joined(hub: &ConnectionHub) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (hub.register(tx).await.unwrap(), rx)
    }

    #[test]
    fn test_topic_names() {
        for ok in ["vault.clients", "vault.*", "tables.invoices", "system"] {
            assert!(is_valid_topic(ok), "{ok}");
        }
        for bad in ["vault.", "metrics.mood", "", "invalid"] {
            assert!(!is_valid_topic(bad), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_leaving_clears_follows() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (id, _rx) = joined(&hub).await;
        hub.subscribe(&id, vec!["tables.clients".to_string()]).await.unwrap();
        assert_eq!(hub.connection_count().await, 1);

        hub.unregister(&id).await;
        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(hub.subscription_count("tables.clients").await, 0);
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (id, _rx) = joined(&hub).await;

        let followed = hub
            .subscribe(&id, vec!["vault.clients".to_string(), "bogus".to_string()])
            .await
            .unwrap();
        assert_eq!(followed, vec!["vault.clients"]);
        assert_eq!(hub.subscription_count("vault.clients").await, 1);

        let dropped = hub
            .unsubscribe(&id, vec!["vault.clients".to_string(), "vault.never".to_string()])
            .await
            .unwrap();
        assert_eq!(dropped, vec!["vault.clients"]);
        assert_eq!(hub.subscription_count("vault.clients").await, 0);

        assert!(matches!(
            hub.subscribe("ghost", vec!["system".to_string()]).await,
            Err(HubError::ConnectionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let hub = ConnectionHub::new(HubConfig { max_connections: 2 });
        let _first = joined(&hub).await;
        let _second = joined(&hub).await;

        let (tx, _) = mpsc::unbounded_channel();
        assert!(matches!(
            hub.register(tx).await,
            Err(HubError::TooManyConnections(2))
        ));
    }

    #[tokio::test]
    async fn test_only_followers_are_notified() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (follower, mut follower_rx) = joined(&hub).await;
        let (_bystander, mut bystander_rx) = joined(&hub).await;

        hub.subscribe(&follower, vec!["vault.invoices".to_string()]).await.unwrap();

        let event = WsEvent::storage(&StorageEvent::new("invoices", StorageEventKind::Saved, 7));
        assert_eq!(hub.broadcast(&event).await, 1);

        assert!(matches!(
            follower_rx.try_recv(),
            Ok(ServerMessage::StorageChanged { stamp: 7, .. })
        ));
        assert!(bystander_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_wildcard_subscription() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (id, mut rx) = joined(&hub).await;

        hub.subscribe(&id, vec!["tables.*".to_string(), "tables.clients".to_string()])
            .await
            .unwrap();

        // Direct and wildcard subscription still deliver once
        assert_eq!(hub.broadcast(&record("clients")).await, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        assert_eq!(hub.broadcast(&record("employees")).await, 1);
        assert_eq!(hub.broadcast(&WsEvent::system("hello")).await, 0);
    }
}
