use log::debug;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use wsstack::{Connection, ConnectionId};

use crate::connection::WampConnection;

/// A pub/sub channel, identified by its fully resolved URI.
///
/// Keeps the connections subscribed to it so an application can fan events
/// out with [`Topic::broadcast`].
pub struct Topic {
    uri: String,
    subscribers: RwLock<HashMap<ConnectionId, Arc<WampConnection>>>,
}

impl Topic {
    /// Creates a topic without subscribers.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// The resolved URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Subscribes `conn`. Returns false if it already was.
    pub fn add(&self, conn: &Arc<WampConnection>) -> bool {
        self.subscribers
            .write()
            .insert(conn.id(), conn.clone())
            .is_none()
    }

    /// Unsubscribes connection `id`. Returns false if it was not subscribed.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.subscribers.write().remove(&id).is_some()
    }

    /// Returns true if connection `id` is subscribed.
    pub fn has(&self, id: ConnectionId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns true if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// The subscribed connections.
    pub fn subscribers(&self) -> Vec<Arc<WampConnection>> {
        self.subscribers.read().values().cloned().collect()
    }

    /// Sends an EVENT with `payload` to every subscriber whose session id is
    /// not in `exclude` and, when `eligible` is not empty, is in `eligible`.
    ///
    /// Returns the number of subscribers the event was delivered to. A failed
    /// delivery is logged and skipped.
    pub fn broadcast(&self, payload: &Value, exclude: &[String], eligible: &[String]) -> usize {
        let mut delivered = 0;
        for subscriber in self.subscribers() {
            let session_id = subscriber.session_id();
            if exclude.iter().any(|id| id == session_id) {
                continue;
            }
            if !eligible.is_empty() && !eligible.iter().any(|id| id == session_id) {
                continue;
            }
            match subscriber.event(&self.uri, payload.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => debug!(
                    "dropping event on {} for connection {}: {}",
                    self.uri,
                    subscriber.id(),
                    err
                ),
            }
        }
        delivered
    }
}

impl PartialEq for Topic {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Topic {}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("uri", &self.uri)
            .field("subscribers", &self.len())
            .finish()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}
