use parking_lot::RwLock;
use std::sync::Arc;

/// Identity sent in a WELCOME frame unless the application sets its own.
pub const DEFAULT_SERVER_IDENTITY: &str = concat!("wsstack-wamp/", env!("CARGO_PKG_VERSION"));

/// Shared, replaceable server identity.
///
/// Clones share the same value, so the application can keep a handle and
/// change the identity while the server runs; every WELCOME sent afterwards
/// carries the new value.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    inner: Arc<RwLock<String>>,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_IDENTITY)
    }
}

impl ServerIdentity {
    /// Creates an identity handle.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(identity.into())),
        }
    }

    /// The current identity.
    pub fn get(&self) -> String {
        self.inner.read().clone()
    }

    /// Replaces the identity.
    pub fn set(&self, identity: impl Into<String>) {
        *self.inner.write() = identity.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_value() {
        let identity = ServerIdentity::default();
        assert!(identity.get().starts_with("wsstack-wamp/"));

        let handle = identity.clone();
        handle.set("MyServer/1.0");
        assert_eq!(identity.get(), "MyServer/1.0");
    }
}
