use bytes::Bytes;
use dashmap::DashMap;
use log::{debug, trace};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;
use std::sync::Arc;

use wsstack::{
    Connection, ConnectionId, ConnectionRef, Error, RequestAwareMiddleware, Result,
    ServerMiddleware,
};

use crate::connection::WampConnection;
use crate::identity::ServerIdentity;
use crate::message_type::MessageType;
use crate::middleware::WampServerMiddleware;
use crate::topic::Topic;
use crate::topic_registry::TopicRegistry;

/// Attribute key holding the WAMP session id (`String`) on the base connection.
pub const SESSION_ID_ATTRIBUTE: &str = "wamp.session_id";

/// Sub-protocol token this layer adds to the negotiation.
pub const SUB_PROTOCOL: &str = "wamp";

const SESSION_ID_BYTES: usize = 32;

/// WAMP v1 layer: decodes frames and dispatches them to a
/// [`WampServerMiddleware`].
///
/// Each opened connection gets a [`WampConnection`] and a WELCOME frame. The
/// WAMP connection lives in a side table keyed by connection id until the
/// connection closes.
///
/// ```text
///   [1, prefix, uri]            PREFIX       registers a CURIE prefix
///   [2, callId, procUri, ...]   CALL         on_call
///   [5, topicUri]               SUBSCRIBE    on_subscribe
///   [6, topicUri]               UNSUBSCRIBE  on_unsubscribe
///   [7, topicUri, event, ...]   PUBLISH      on_publish
/// ```
pub struct ParseWampMessage<M> {
    middleware: M,
    topics: Arc<TopicRegistry>,
    identity: ServerIdentity,
    connections: DashMap<ConnectionId, Arc<WampConnection>>,
}

impl<M: WampServerMiddleware> ParseWampMessage<M> {
    /// Wraps the application `middleware`, resolving topics through `topics`.
    pub fn new(middleware: M, topics: Arc<TopicRegistry>) -> Self {
        Self {
            middleware,
            topics,
            identity: ServerIdentity::default(),
            connections: DashMap::new(),
        }
    }

    /// Uses `identity` in WELCOME frames.
    pub fn with_server_identity(mut self, identity: ServerIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Identity sent in WELCOME frames.
    pub fn server_identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// The application.
    pub fn middleware(&self) -> &M {
        &self.middleware
    }

    /// The topic registry.
    pub fn topics(&self) -> &Arc<TopicRegistry> {
        &self.topics
    }

    /// The WAMP connection wrapping connection `id`, while it is open.
    pub fn connection(&self, id: ConnectionId) -> Option<Arc<WampConnection>> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    /// Number of open WAMP sessions.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn topic(&self, conn: &WampConnection, uri: &str) -> Arc<Topic> {
        self.topics.get_or_insert(&conn.resolve_uri(uri))
    }

    fn dispatch(&self, conn: &Arc<WampConnection>, data: &[u8]) -> Result<()> {
        let message: Value = serde_json::from_slice(data)
            .map_err(|err| Error::InvalidMessage(format!("invalid WAMP message: {err}")))?;

        let frame = match message {
            Value::Array(frame) => frame,
            _ => return Err(Error::InvalidMessage("invalid WAMP message format".into())),
        };

        if let Some(target) = frame.get(1) {
            if !matches!(target, Value::String(_) | Value::Number(_)) {
                return Err(Error::InvalidMessage("invalid topic, must be a string".into()));
            }
        }

        let code = frame
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::InvalidMessage("message type must be an integer".into()))?;
        let message_type = MessageType::try_from(code)?;
        if !message_type.is_inbound() {
            return Err(Error::UnsupportedMessageType(code));
        }
        trace!("connection {} -> {}", conn.id(), message_type);

        match message_type {
            MessageType::Prefix => {
                let prefix = string_like(&frame, 1)?;
                let uri = string_at(&frame, 2)?;
                conn.add_prefix(prefix, uri);
                Ok(())
            }
            MessageType::Call => {
                let call_id = string_like(&frame, 1)?;
                let procedure = conn.resolve_uri(&string_at(&frame, 2)?);
                let mut params: Vec<Value> = frame.into_iter().skip(3).collect();
                if params.len() == 1 && params[0].is_array() {
                    if let Some(Value::Array(inner)) = params.pop() {
                        params = inner;
                    }
                }
                self.middleware.on_call(conn, &call_id, &procedure, params)
            }
            MessageType::Subscribe => {
                let topic = self.topic(conn, &string_like(&frame, 1)?);
                self.middleware.on_subscribe(conn, &topic)
            }
            MessageType::Unsubscribe => {
                let topic = self.topic(conn, &string_like(&frame, 1)?);
                self.middleware.on_unsubscribe(conn, &topic)
            }
            MessageType::Publish => {
                let uri = string_like(&frame, 1)?;
                let event = match frame.get(2) {
                    Some(event @ (Value::String(_) | Value::Array(_) | Value::Object(_))) => {
                        event.clone()
                    }
                    _ => {
                        return Err(Error::InvalidMessage(
                            "PUBLISH event must be a string or an array".into(),
                        ))
                    }
                };
                let exclude = match frame.get(3) {
                    Some(Value::Array(ids)) => session_ids(ids)?,
                    Some(flag) if is_truthy(flag) => vec![conn.session_id().to_string()],
                    _ => Vec::new(),
                };
                let eligible = match frame.get(4) {
                    Some(Value::Array(ids)) => session_ids(ids)?,
                    None | Some(Value::Null) => Vec::new(),
                    Some(_) => {
                        return Err(Error::InvalidMessage(
                            "PUBLISH eligible list must be an array".into(),
                        ))
                    }
                };
                let topic = self.topic(conn, &uri);
                self.middleware
                    .on_publish(conn, &topic, event, exclude, eligible)
            }
            _ => Err(Error::UnsupportedMessageType(code)),
        }
    }
}

/// The element at `index` as a string; numbers are accepted and formatted.
fn string_like(frame: &[Value], index: usize) -> Result<String> {
    match frame.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(Error::InvalidMessage(format!(
            "element {index} must be a string"
        ))),
    }
}

fn string_at(frame: &[Value], index: usize) -> Result<String> {
    frame
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidMessage(format!("element {index} must be a string")))
}

fn session_ids(ids: &[Value]) -> Result<Vec<String>> {
    ids.iter()
        .map(|id| {
            id.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidMessage("session ids must be strings".into()))
        })
        .collect()
}

/// Loose truthiness of a non-array PUBLISH exclude flag.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

impl<M: WampServerMiddleware> ServerMiddleware for ParseWampMessage<M> {
    fn on_open(&self, conn: &ConnectionRef) -> Result<()> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let session_id = hex::encode(bytes);

        conn.attributes().set(SESSION_ID_ATTRIBUTE, session_id.clone());
        let wamp = Arc::new(WampConnection::new(conn.clone(), session_id));
        wamp.welcome(&self.identity.get())?;

        self.connections.insert(conn.id(), wamp.clone());
        debug!(
            "connection {} opened WAMP session {}",
            conn.id(),
            wamp.session_id()
        );

        self.middleware.on_open(&wamp)
    }

    fn on_message(&self, conn: &ConnectionRef, data: Bytes) -> Result<()> {
        let wamp = self
            .connection(conn.id())
            .ok_or(Error::UnknownConnection(conn.id()))?;
        self.dispatch(&wamp, &data)
    }

    fn on_close(&self, conn: &ConnectionRef) -> Result<()> {
        match self.connections.remove(&conn.id()) {
            Some((_, wamp)) => {
                debug!(
                    "connection {} closed WAMP session {}",
                    conn.id(),
                    wamp.session_id()
                );
                self.middleware.on_close(&wamp)
            }
            None => {
                debug!("connection {} closed without a WAMP session", conn.id());
                Ok(())
            }
        }
    }

    fn on_error(&self, conn: &ConnectionRef, err: Error) -> Result<()> {
        match self.connection(conn.id()) {
            Some(wamp) => {
                let decorated: ConnectionRef = wamp;
                self.middleware.on_error(&decorated, err)
            }
            None => self.middleware.on_error(conn, err),
        }
    }

    fn sub_protocols(&self) -> Vec<String> {
        let mut protocols = self.middleware.sub_protocols();
        protocols.push(SUB_PROTOCOL.to_string());
        protocols
    }
}

impl<M: WampServerMiddleware> RequestAwareMiddleware for ParseWampMessage<M> {}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use serde_json::json;
    use wsstack::QueuedConnection;

    #[derive(Debug, PartialEq)]
    enum Event {
        Open(String),
        Call {
            call_id: String,
            procedure: String,
            params: Vec<Value>,
        },
        Subscribe(String),
        Unsubscribe(String),
        Publish {
            topic: String,
            event: Value,
            exclude: Vec<String>,
            eligible: Vec<String>,
        },
        Close(String),
        Error(Error),
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        fn last(&self) -> Option<Event> {
            self.events.lock().pop()
        }
    }

    impl WampServerMiddleware for Recorder {
        fn on_open(&self, conn: &Arc<WampConnection>) -> Result<()> {
            self.events
                .lock()
                .push(Event::Open(conn.session_id().to_string()));
            Ok(())
        }

        fn on_call(
            &self,
            _conn: &Arc<WampConnection>,
            call_id: &str,
            procedure: &str,
            params: Vec<Value>,
        ) -> Result<()> {
            self.events.lock().push(Event::Call {
                call_id: call_id.into(),
                procedure: procedure.into(),
                params,
            });
            Ok(())
        }

        fn on_subscribe(&self, _conn: &Arc<WampConnection>, topic: &Arc<Topic>) -> Result<()> {
            self.events
                .lock()
                .push(Event::Subscribe(topic.uri().into()));
            Ok(())
        }

        fn on_unsubscribe(&self, _conn: &Arc<WampConnection>, topic: &Arc<Topic>) -> Result<()> {
            self.events
                .lock()
                .push(Event::Unsubscribe(topic.uri().into()));
            Ok(())
        }

        fn on_publish(
            &self,
            _conn: &Arc<WampConnection>,
            topic: &Arc<Topic>,
            event: Value,
            exclude: Vec<String>,
            eligible: Vec<String>,
        ) -> Result<()> {
            self.events.lock().push(Event::Publish {
                topic: topic.uri().into(),
                event,
                exclude,
                eligible,
            });
            Ok(())
        }

        fn on_close(&self, conn: &Arc<WampConnection>) -> Result<()> {
            self.events
                .lock()
                .push(Event::Close(conn.session_id().to_string()));
            Ok(())
        }

        fn on_error(&self, _conn: &ConnectionRef, err: Error) -> Result<()> {
            self.events.lock().push(Event::Error(err));
            Ok(())
        }

        fn sub_protocols(&self) -> Vec<String> {
            vec!["ws".into()]
        }
    }

    struct Fixture {
        stage: ParseWampMessage<Recorder>,
        queued: Arc<QueuedConnection>,
        conn: ConnectionRef,
        session_id: String,
    }

    impl Fixture {
        fn open() -> Self {
            let stage = ParseWampMessage::new(Recorder::default(), Arc::new(TopicRegistry::new()));
            let queued = Arc::new(QueuedConnection::new());
            let conn: ConnectionRef = queued.clone();
            stage.on_open(&conn).unwrap();

            let welcome: Value = serde_json::from_slice(&queued.poll_transmit().unwrap()).unwrap();
            let session_id = welcome[1].as_str().unwrap().to_string();
            stage.middleware().events.lock().clear();

            Self {
                stage,
                queued,
                conn,
                session_id,
            }
        }

        fn send(&self, frame: Value) -> Result<()> {
            self.stage.on_message(&self.conn, Bytes::from(frame.to_string()))
        }

        fn last(&self) -> Option<Event> {
            self.stage.middleware().last()
        }
    }

    #[test]
    fn sends_welcome_on_open() {
        let stage = ParseWampMessage::new(Recorder::default(), Arc::new(TopicRegistry::new()));
        let queued = Arc::new(QueuedConnection::new());
        let conn: ConnectionRef = queued.clone();
        stage.on_open(&conn).unwrap();

        let welcome: Value = serde_json::from_slice(&queued.poll_transmit().unwrap()).unwrap();
        let session_id = welcome[1].as_str().unwrap();
        assert_eq!(welcome[0], json!(0));
        assert_eq!(session_id.len(), 64);
        assert!(session_id.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(welcome[2], json!(1));
        assert_eq!(welcome[3], json!(crate::DEFAULT_SERVER_IDENTITY));

        assert_eq!(
            conn.attributes().get::<String>(SESSION_ID_ATTRIBUTE).as_deref(),
            Some(session_id)
        );
        assert_eq!(stage.middleware().last(), Some(Event::Open(session_id.into())));
        assert_eq!(stage.connection_count(), 1);
    }

    #[test]
    fn session_ids_are_not_reused() {
        let a = Fixture::open();
        let b = Fixture::open();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn welcome_uses_current_identity() {
        let identity = ServerIdentity::new("First/1.0");
        let stage = ParseWampMessage::new(Recorder::default(), Arc::new(TopicRegistry::new()))
            .with_server_identity(identity.clone());
        identity.set("Second/2.0");

        let queued = Arc::new(QueuedConnection::new());
        let conn: ConnectionRef = queued.clone();
        stage.on_open(&conn).unwrap();

        let welcome: Value = serde_json::from_slice(&queued.poll_transmit().unwrap()).unwrap();
        assert_eq!(welcome[3], json!("Second/2.0"));
    }

    #[test]
    fn prefix_expands_later_uris() {
        let fixture = Fixture::open();
        fixture.send(json!([1, "ex", "https://example.com/"])).unwrap();
        fixture.send(json!([5, "ex:topic"])).unwrap();

        assert_eq!(
            fixture.last(),
            Some(Event::Subscribe("https://example.com/topic".into()))
        );
        let wamp = fixture.stage.connection(fixture.conn.id()).unwrap();
        assert_eq!(wamp.prefixes()["ex"], "https://example.com/");
    }

    #[test]
    fn call_passes_positional_params() {
        let fixture = Fixture::open();
        for (frame, expected) in [
            (json!([2, "c1", "https://example.com/add", 1, 2]), vec![json!(1), json!(2)]),
            (json!([2, "c1", "https://example.com/add", [1, 2]]), vec![json!(1), json!(2)]),
            (
                json!([2, "c1", "https://example.com/add", "hi", [1, 2]]),
                vec![json!("hi"), json!([1, 2])],
            ),
            (
                json!([2, "c1", "https://example.com/add", [1, 2], "hi"]),
                vec![json!([1, 2]), json!("hi")],
            ),
            (json!([2, "c1", "https://example.com/add", {"a": 1}]), vec![json!({"a": 1})]),
            (json!([2, "c1", "https://example.com/add"]), vec![]),
        ] {
            fixture.send(frame).unwrap();
            assert_eq!(
                fixture.last(),
                Some(Event::Call {
                    call_id: "c1".into(),
                    procedure: "https://example.com/add".into(),
                    params: expected,
                })
            );
        }
    }

    #[test]
    fn call_accepts_numeric_call_id_and_curie() {
        let fixture = Fixture::open();
        fixture.send(json!([1, "calc", "https://example.com/calc#"])).unwrap();
        fixture.send(json!([2, 42, "calc:add", 1])).unwrap();
        assert_eq!(
            fixture.last(),
            Some(Event::Call {
                call_id: "42".into(),
                procedure: "https://example.com/calc#add".into(),
                params: vec![json!(1)],
            })
        );
    }

    #[test]
    fn subscribe_and_unsubscribe_share_topic_instance() {
        let fixture = Fixture::open();
        fixture.send(json!([5, "https://example.com/t"])).unwrap();
        let topic = fixture.stage.topics().get("https://example.com/t").unwrap();

        fixture.send(json!([6, "https://example.com/t"])).unwrap();
        assert_eq!(
            fixture.last(),
            Some(Event::Unsubscribe("https://example.com/t".into()))
        );
        assert!(Arc::ptr_eq(
            &topic,
            &fixture.stage.topics().get("https://example.com/t").unwrap()
        ));
        assert_eq!(fixture.stage.topics().len(), 1);
    }

    #[test]
    fn publish_exclude_semantics() {
        let fixture = Fixture::open();
        let topic = "https://example.com/t";
        let cases = [
            (json!([7, topic, "hi", true]), vec![fixture.session_id.clone()]),
            (json!([7, topic, "hi", ["a", "b"]]), vec!["a".to_string(), "b".to_string()]),
            (json!([7, topic, "hi", false]), vec![]),
            (json!([7, topic, "hi"]), vec![]),
            (json!([7, topic, "hi", "0"]), vec![]),
            (json!([7, topic, "hi", 1]), vec![fixture.session_id.clone()]),
        ];

        for (frame, expected) in cases {
            fixture.send(frame).unwrap();
            assert_matches!(
                fixture.last(),
                Some(Event::Publish { exclude, eligible, .. })
                    if exclude == expected && eligible.is_empty()
            );
        }
    }

    #[test]
    fn publish_forwards_eligible_and_payload() {
        let fixture = Fixture::open();
        fixture
            .send(json!([7, "https://example.com/t", ["x", 1], [], ["s2"]]))
            .unwrap();
        assert_eq!(
            fixture.last(),
            Some(Event::Publish {
                topic: "https://example.com/t".into(),
                event: json!(["x", 1]),
                exclude: vec![],
                eligible: vec!["s2".into()],
            })
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        let fixture = Fixture::open();

        assert_matches!(
            fixture.stage.on_message(&fixture.conn, Bytes::from_static(b"not json")),
            Err(Error::InvalidMessage(_))
        );
        assert_matches!(fixture.send(json!({"0": 5})), Err(Error::InvalidMessage(_)));
        assert_matches!(fixture.send(json!([5, {"uri": "x"}])), Err(Error::InvalidMessage(_)));
        assert_matches!(fixture.send(json!(["5", "x"])), Err(Error::InvalidMessage(_)));
        assert_matches!(fixture.send(json!([2, "c1"])), Err(Error::InvalidMessage(_)));
        assert_matches!(fixture.send(json!([7, "t"])), Err(Error::InvalidMessage(_)));
        assert_matches!(fixture.send(json!([7, "t", "e", [1]])), Err(Error::InvalidMessage(_)));
        assert_matches!(fixture.send(json!([7, "t", 5])), Err(Error::InvalidMessage(_)));
        assert_matches!(fixture.send(json!([7, "t", "e", [], 3])), Err(Error::InvalidMessage(_)));
        assert!(fixture.last().is_none());
        assert!(fixture.stage.topics().is_empty());
    }

    #[test]
    fn rejected_publish_leaves_registry_untouched() {
        let fixture = Fixture::open();
        for i in 0..100 {
            assert!(fixture.send(json!([7, format!("junk/{i}")])).is_err());
            assert!(fixture.send(json!([7, format!("bad/{i}"), "e", [1]])).is_err());
        }
        assert!(fixture.stage.topics().is_empty());

        fixture.send(json!([7, "good", "e"])).unwrap();
        assert_eq!(fixture.stage.topics().len(), 1);
    }

    #[test]
    fn rejects_outbound_and_unknown_types() {
        let fixture = Fixture::open();
        assert_matches!(
            fixture.send(json!([8, "https://example.com/t", "hi"])),
            Err(Error::UnsupportedMessageType(8))
        );
        assert_matches!(fixture.send(json!([0, "x"])), Err(Error::UnsupportedMessageType(0)));
        assert_matches!(fixture.send(json!([99])), Err(Error::UnsupportedMessageType(99)));
        assert!(fixture.last().is_none());
    }

    #[test]
    fn close_forwards_once() {
        let fixture = Fixture::open();
        fixture.stage.on_close(&fixture.conn).unwrap();
        assert_eq!(fixture.last(), Some(Event::Close(fixture.session_id.clone())));
        assert_eq!(fixture.stage.connection_count(), 0);

        fixture.stage.on_close(&fixture.conn).unwrap();
        assert!(fixture.last().is_none());
        assert!(fixture.queued.drain_transmits().is_empty());
    }

    #[test]
    fn message_for_unknown_connection_fails() {
        let fixture = Fixture::open();
        let stranger: ConnectionRef = Arc::new(QueuedConnection::new());
        assert_matches!(
            fixture.stage.on_message(&stranger, Bytes::from_static(b"[5,\"t\"]")),
            Err(Error::UnknownConnection(id)) if id == stranger.id()
        );
    }

    #[test]
    fn errors_reach_the_application() {
        let fixture = Fixture::open();
        fixture
            .stage
            .on_error(&fixture.conn, Error::Transport("reset".into()))
            .unwrap();
        assert_eq!(fixture.last(), Some(Event::Error(Error::Transport("reset".into()))));

        let stranger: ConnectionRef = Arc::new(QueuedConnection::new());
        fixture.stage.on_error(&stranger, Error::ConnectionClosed).unwrap();
        assert_eq!(fixture.last(), Some(Event::Error(Error::ConnectionClosed)));
    }

    #[test]
    fn appends_wamp_sub_protocol() {
        let fixture = Fixture::open();
        assert_eq!(
            fixture.stage.sub_protocols(),
            vec!["ws".to_string(), "wamp".to_string()]
        );
    }

    #[test]
    fn truthiness() {
        let falsy_values = [
            json!(null),
            json!(false),
            json!(0),
            json!(0.0),
            json!(""),
            json!("0"),
            json!({}),
        ];
        for falsy in falsy_values {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(-1), json!("no"), json!({"a": 1}), json!(0.5)] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }
}
