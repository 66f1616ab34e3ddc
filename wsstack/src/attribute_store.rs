//! Per-connection scratch space shared by the layers of a stack.
//!
//! Each layer derives some state from the connection (the parsed request, the
//! session, the WAMP session id) and leaves it here for the layers after it,
//! without having to change the connection's type.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;

/// Boxed attribute value.
pub type Attribute = Box<dyn Any + Send + Sync>;

/// A string-keyed map of typed values scoped to exactly one connection.
#[derive(Default)]
pub struct AttributeStore {
    attributes: RwLock<HashMap<String, Attribute>>,
}

impl AttributeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the value stored under `key`.
    ///
    /// `None` is returned when nothing is stored or when the stored value is not a `T`.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + 'static,
    {
        let attributes = self.attributes.read();
        attributes
            .get(key)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Returns the value stored under `key`, or `default` when absent.
    pub fn get_or<T>(&self, key: &str, default: T) -> T
    where
        T: Clone + 'static,
    {
        self.get(key).unwrap_or(default)
    }

    /// Runs `f` against the value stored under `key` without cloning it.
    pub fn with<T, R>(&self, key: &str, f: impl FnOnce(&T) -> R) -> Option<R>
    where
        T: 'static,
    {
        let attributes = self.attributes.read();
        attributes
            .get(key)
            .and_then(|value| value.downcast_ref::<T>())
            .map(f)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.attributes.write().insert(key.into(), Box::new(value));
    }

    /// Whether anything is stored under `key`.
    pub fn has(&self, key: &str) -> bool {
        self.attributes.read().contains_key(key)
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&self, key: &str) -> Option<Attribute> {
        self.attributes.write().remove(key)
    }

    /// Names of all stored attributes.
    pub fn keys(&self) -> Vec<String> {
        self.attributes.read().keys().cloned().collect()
    }

    /// Replaces the whole content of the store.
    pub fn replace(&self, attributes: impl IntoIterator<Item = (String, Attribute)>) {
        let mut current = self.attributes.write();
        current.clear();
        current.extend(attributes);
    }

    /// Removes every attribute.
    pub fn clear(&self) {
        self.attributes.write().clear();
    }

    /// Number of stored attributes.
    pub fn len(&self) -> usize {
        self.attributes.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.attributes.read().is_empty()
    }
}

impl std::fmt::Debug for AttributeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeStore")
            .field("keys", &self.keys())
            .finish()
    }
}
