use log::trace;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use wsstack::ConnectionId;

use crate::topic::Topic;

/// Every live [`Topic`] of a server, by resolved URI.
///
/// Shared by all connections; at most one instance exists per URI.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: Mutex<HashMap<String, Arc<Topic>>>,
}

impl TopicRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a topic is registered for `uri`.
    pub fn has(&self, uri: &str) -> bool {
        self.topics.lock().contains_key(uri)
    }

    /// The topic registered for `uri`.
    pub fn get(&self, uri: &str) -> Option<Arc<Topic>> {
        self.topics.lock().get(uri).cloned()
    }

    /// Registers `topic` unless its URI is taken, returning the registered instance.
    pub fn add(&self, topic: Arc<Topic>) -> Arc<Topic> {
        self.topics
            .lock()
            .entry(topic.uri().to_string())
            .or_insert(topic)
            .clone()
    }

    /// The topic for `uri`, registering a new one if needed.
    pub fn get_or_insert(&self, uri: &str) -> Arc<Topic> {
        let mut topics = self.topics.lock();
        if let Some(topic) = topics.get(uri) {
            return topic.clone();
        }
        trace!("registering topic {}", uri);
        let topic = Arc::new(Topic::new(uri));
        topics.insert(uri.to_string(), topic.clone());
        topic
    }

    /// Unregisters the topic for `uri`.
    pub fn remove(&self, uri: &str) -> Option<Arc<Topic>> {
        self.topics.lock().remove(uri)
    }

    /// Unsubscribes connection `id` from every topic.
    pub fn unsubscribe_all(&self, id: ConnectionId) {
        let topics: Vec<_> = self.topics.lock().values().cloned().collect();
        for topic in topics {
            topic.remove(id);
        }
    }

    /// Number of registered topics.
    pub fn len(&self) -> usize {
        self.topics.lock().len()
    }

    /// Returns true if no topic is registered.
    pub fn is_empty(&self) -> bool {
        self.topics.lock().is_empty()
    }
}
