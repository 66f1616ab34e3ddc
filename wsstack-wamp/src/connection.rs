use bytes::Bytes;
use log::trace;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;

use wsstack::{AttributeStore, Connection, ConnectionId, ConnectionRef, Error, Result};

use crate::message_type::MessageType;

/// WAMP protocol version announced in WELCOME.
pub const PROTOCOL_VERSION: i64 = 1;

/// A connection speaking WAMP.
///
/// Wraps the base connection for the lifetime of one WAMP session and adds the
/// session id, the CURIE prefixes registered by the client, and helpers for
/// the server → client frames. Attributes are shared with the base connection.
pub struct WampConnection {
    inner: ConnectionRef,
    session_id: String,
    prefixes: RwLock<HashMap<String, String>>,
}

impl std::fmt::Debug for WampConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WampConnection")
            .field("id", &self.inner.id())
            .field("session_id", &self.session_id)
            .field("prefixes", &*self.prefixes.read())
            .finish()
    }
}

impl WampConnection {
    /// Wraps `inner` for the WAMP session `session_id`.
    pub fn new(inner: ConnectionRef, session_id: impl Into<String>) -> Self {
        Self {
            inner,
            session_id: session_id.into(),
            prefixes: RwLock::new(HashMap::new()),
        }
    }

    /// The WAMP session id announced in WELCOME.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The base connection.
    pub fn inner(&self) -> &ConnectionRef {
        &self.inner
    }

    /// Maps CURIE `prefix` to `uri`, replacing any earlier mapping.
    pub fn add_prefix(&self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.prefixes.write().insert(prefix.into(), uri.into());
    }

    /// The registered CURIE prefixes.
    pub fn prefixes(&self) -> HashMap<String, String> {
        self.prefixes.read().clone()
    }

    /// Expands a CURIE such as `event:chat` with the registered prefixes.
    ///
    /// Anything that is not a CURIE with a registered prefix is returned as is.
    pub fn resolve_uri(&self, uri: &str) -> String {
        if let Some((prefix, suffix)) = split_curie(uri) {
            if let Some(base) = self.prefixes.read().get(prefix) {
                return format!("{base}{suffix}");
            }
        }
        uri.to_string()
    }

    /// Sends `[WELCOME, sessionId, 1, identity]`.
    pub fn welcome(&self, identity: &str) -> Result<()> {
        self.send_frame(&json!([
            MessageType::Welcome.code(),
            self.session_id,
            PROTOCOL_VERSION,
            identity
        ]))
    }

    /// Sends `[CALLRESULT, callId, result]`.
    pub fn call_result(&self, call_id: &str, result: Value) -> Result<()> {
        self.send_frame(&json!([MessageType::CallResult.code(), call_id, result]))
    }

    /// Sends `[CALLERROR, callId, errorUri, description]`, with `details`
    /// appended when given.
    pub fn call_error(
        &self,
        call_id: &str,
        error_uri: &str,
        description: &str,
        details: Option<Value>,
    ) -> Result<()> {
        let mut frame = vec![
            json!(MessageType::CallError.code()),
            json!(call_id),
            json!(error_uri),
            json!(description),
        ];
        if let Some(details) = details {
            frame.push(details);
        }
        self.send_frame(&Value::Array(frame))
    }

    /// Sends `[EVENT, topicUri, payload]`.
    pub fn event(&self, topic_uri: &str, payload: Value) -> Result<()> {
        self.send_frame(&json!([MessageType::Event.code(), topic_uri, payload]))
    }

    fn send_frame(&self, frame: &Value) -> Result<()> {
        let encoded =
            serde_json::to_vec(frame).map_err(|err| Error::InvalidMessage(err.to_string()))?;
        trace!("connection {} <- {}", self.inner.id(), String::from_utf8_lossy(&encoded));
        self.inner.send(Bytes::from(encoded))
    }
}

impl Connection for WampConnection {
    fn id(&self) -> ConnectionId {
        self.inner.id()
    }

    fn attributes(&self) -> &AttributeStore {
        self.inner.attributes()
    }

    fn send(&self, data: Bytes) -> Result<()> {
        self.inner.send(data)
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

/// Splits `prefix:suffix` when `uri` has the shape of a CURIE.
fn split_curie(uri: &str) -> Option<(&str, &str)> {
    let (prefix, suffix) = uri.split_once(':')?;
    let valid_prefix = !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid_prefix && !suffix.is_empty() && !suffix.starts_with("//") {
        Some((prefix, suffix))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wsstack::QueuedConnection;

    fn setup() -> (Arc<QueuedConnection>, WampConnection) {
        let queued = Arc::new(QueuedConnection::new());
        let wamp = WampConnection::new(queued.clone(), "s1");
        (queued, wamp)
    }

    fn frame(queued: &QueuedConnection) -> Value {
        serde_json::from_slice(&queued.poll_transmit().unwrap()).unwrap()
    }

    #[test]
    fn resolves_registered_curies() {
        let (_queued, wamp) = setup();
        assert_eq!(wamp.resolve_uri("event:chat"), "event:chat");

        wamp.add_prefix("event", "https://example.com/event#");
        assert_eq!(wamp.resolve_uri("event:chat"), "https://example.com/event#chat");
        assert_eq!(
            wamp.resolve_uri("https://example.com/event#chat"),
            "https://example.com/event#chat"
        );

        wamp.add_prefix("event", "https://example.org/");
        assert_eq!(wamp.resolve_uri("event:chat"), "https://example.org/chat");
    }

    #[test]
    fn absolute_uris_are_never_expanded() {
        let (_queued, wamp) = setup();
        wamp.add_prefix("https", "urn:broken:");
        assert_eq!(wamp.resolve_uri("https://example.com/a"), "https://example.com/a");
        assert_eq!(wamp.resolve_uri("https:"), "https:");
    }

    #[test]
    fn resolving_is_idempotent_for_absolute_uris() {
        let (_queued, wamp) = setup();
        wamp.add_prefix("ex", "https://example.com/");
        let once = wamp.resolve_uri("ex:topic");
        assert_eq!(wamp.resolve_uri(&once), once);
    }

    #[test]
    fn sends_outbound_frames() {
        let (queued, wamp) = setup();

        wamp.welcome("Test/1.0").unwrap();
        assert_eq!(frame(&queued), json!([0, "s1", 1, "Test/1.0"]));

        wamp.call_result("c1", json!({"sum": 3})).unwrap();
        assert_eq!(frame(&queued), json!([3, "c1", {"sum": 3}]));

        wamp.call_error("c2", "https://example.com/error#nope", "Nope", None)
            .unwrap();
        assert_eq!(frame(&queued), json!([4, "c2", "https://example.com/error#nope", "Nope"]));

        wamp.call_error("c3", "err", "Bad", Some(json!(["detail"])))
            .unwrap();
        assert_eq!(frame(&queued), json!([4, "c3", "err", "Bad", ["detail"]]));

        wamp.event("https://example.com/topic", json!("hi")).unwrap();
        assert_eq!(frame(&queued), json!([8, "https://example.com/topic", "hi"]));
    }

    #[test]
    fn delegates_to_base_connection() {
        let (queued, wamp) = setup();
        assert_eq!(wamp.id(), queued.id());

        wamp.attributes().set("k", 1u8);
        assert_eq!(queued.attributes().get::<u8>("k"), Some(1));

        wamp.close().unwrap();
        assert!(queued.is_closed());
    }
}
