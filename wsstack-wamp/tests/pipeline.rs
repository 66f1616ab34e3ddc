use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

use wsstack::{Connection, ConnectionRef, Error, QueuedConnection, Result, Server};
use wsstack_http::ParseHttpRequest;
use wsstack_session::{
    InitializeSession, LegacyReader, MemorySessionHandler, Session, SessionFactory,
    SessionHandler, SessionOptions, SessionValue, SESSION_ATTRIBUTE,
};
use wsstack_wamp::{
    ParseWampMessage, ServerIdentity, Topic, TopicRegistry, WampConnection, WampServerMiddleware,
};

/// Echoes calls, relays publishes and remembers failures.
#[derive(Default)]
struct Chat {
    users: Mutex<Vec<String>>,
    closed: Mutex<Vec<String>>,
    errors: Mutex<Vec<Error>>,
}

impl WampServerMiddleware for Chat {
    fn on_open(&self, conn: &Arc<WampConnection>) -> Result<()> {
        let user = conn
            .attributes()
            .get::<Arc<Session>>(SESSION_ATTRIBUTE)
            .and_then(|session| session.get("user"))
            .and_then(|user| user.as_str().map(str::to_string))
            .unwrap_or_else(|| "anonymous".into());
        self.users.lock().push(user);
        Ok(())
    }

    fn on_call(
        &self,
        conn: &Arc<WampConnection>,
        call_id: &str,
        procedure: &str,
        params: Vec<Value>,
    ) -> Result<()> {
        match procedure {
            "https://example.com/rpc#echo" => conn.call_result(call_id, Value::Array(params)),
            _ => conn.call_error(
                call_id,
                "https://example.com/error#unknown",
                "Unknown procedure",
                None,
            ),
        }
    }

    fn on_subscribe(&self, conn: &Arc<WampConnection>, topic: &Arc<Topic>) -> Result<()> {
        topic.add(conn);
        Ok(())
    }

    fn on_unsubscribe(&self, conn: &Arc<WampConnection>, topic: &Arc<Topic>) -> Result<()> {
        topic.remove(conn.id());
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
        topic.broadcast(&event, &exclude, &eligible);
        Ok(())
    }

    fn on_close(&self, conn: &Arc<WampConnection>) -> Result<()> {
        self.closed.lock().push(conn.session_id().to_string());
        Ok(())
    }

    fn on_error(&self, _conn: &ConnectionRef, err: Error) -> Result<()> {
        self.errors.lock().push(err);
        Ok(())
    }
}

type Stack = ParseHttpRequest<InitializeSession<ParseWampMessage<Arc<Chat>>>>;

fn server(chat: Arc<Chat>, handler: Arc<MemorySessionHandler>, auto_start: bool) -> Server<Stack> {
    let mut options = SessionOptions::default();
    options.auto_start(auto_start);
    let factory = SessionFactory::new(handler, Arc::new(LegacyReader), options);

    let wamp = ParseWampMessage::new(chat, Arc::new(TopicRegistry::new()))
        .with_server_identity(ServerIdentity::new("Pipeline/1.0"));
    Server::new(ParseHttpRequest::new(InitializeSession::new(wamp, factory)))
}

fn upgrade(cookie: &str) -> Bytes {
    Bytes::from(format!(
        "GET /chat HTTP/1.1\r\nHost: example.com\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nCookie: {cookie}\r\n\r\n"
    ))
}

fn frames(queued: &QueuedConnection) -> Vec<Value> {
    queued
        .drain_transmits()
        .iter()
        .map(|frame| serde_json::from_slice(frame).unwrap())
        .collect()
}

fn connect(server: &Server<Stack>, cookie: &str) -> (Arc<QueuedConnection>, ConnectionRef, String) {
    let queued = Arc::new(QueuedConnection::new());
    let conn: ConnectionRef = queued.clone();
    server.transport_active(&conn).unwrap();
    server.handle_read(&conn, upgrade(cookie)).unwrap();

    let welcome = frames(&queued).remove(0);
    assert_eq!(welcome[0], json!(0));
    assert_eq!(welcome[3], json!("Pipeline/1.0"));
    let session_id = welcome[1].as_str().unwrap().to_string();
    (queued, conn, session_id)
}

fn send(server: &Server<Stack>, conn: &ConnectionRef, frame: Value) {
    server.handle_read(conn, Bytes::from(frame.to_string())).unwrap();
}

#[test]
fn negotiates_wamp_sub_protocol() {
    let server = server(Arc::default(), Arc::default(), false);
    assert_eq!(server.sub_protocols(), vec!["wamp".to_string()]);
}

#[test]
fn session_reaches_the_application() {
    let chat = Arc::new(Chat::default());
    let handler = Arc::new(MemorySessionHandler::new());
    handler.write("abc", b"user|s:5:\"alice\";").unwrap();
    let server = server(chat.clone(), handler, true);

    let (_queued, conn, _) = connect(&server, "sid=abc; theme=dark");

    assert_eq!(*chat.users.lock(), vec!["alice".to_string()]);
    let session = conn
        .attributes()
        .get::<Arc<Session>>(SESSION_ATTRIBUTE)
        .unwrap();
    assert_eq!(session.get("user"), Some(SessionValue::from("alice")));
}

#[test]
fn rpc_round_trip() {
    let server = server(Arc::default(), Arc::default(), false);
    let (queued, conn, _) = connect(&server, "sid=abc");

    send(&server, &conn, json!([1, "rpc", "https://example.com/rpc#"]));
    send(&server, &conn, json!([2, "c1", "rpc:echo", ["a", "b"]]));
    send(&server, &conn, json!([2, "c2", "rpc:missing"]));

    assert_eq!(
        frames(&queued),
        vec![
            json!([3, "c1", ["a", "b"]]),
            json!([4, "c2", "https://example.com/error#unknown", "Unknown procedure"]),
        ]
    );
}

#[test]
fn publish_excluding_self() {
    let server = server(Arc::default(), Arc::default(), false);
    let (alice, alice_conn, _) = connect(&server, "sid=a");
    let (bob, bob_conn, _) = connect(&server, "sid=b");

    for conn in [&alice_conn, &bob_conn] {
        send(&server, conn, json!([5, "https://example.com/room"]));
    }
    send(&server, &alice_conn, json!([7, "https://example.com/room", "hello", true]));

    assert!(frames(&alice).is_empty());
    assert_eq!(
        frames(&bob),
        vec![json!([8, "https://example.com/room", "hello"])]
    );
}

#[test]
fn publish_to_eligible_sessions_only() {
    let server = server(Arc::default(), Arc::default(), false);
    let (alice, alice_conn, _) = connect(&server, "sid=a");
    let (bob, bob_conn, bob_id) = connect(&server, "sid=b");
    let (carol, carol_conn, _) = connect(&server, "sid=c");

    for conn in [&alice_conn, &bob_conn, &carol_conn] {
        send(&server, conn, json!([5, "https://example.com/room"]));
    }
    send(
        &server,
        &alice_conn,
        json!([7, "https://example.com/room", {"text": "psst"}, [], [bob_id]]),
    );

    assert!(frames(&alice).is_empty());
    assert!(frames(&carol).is_empty());
    assert_eq!(frames(&bob).len(), 1);
}

#[test]
fn malformed_frames_reach_on_error() {
    let chat = Arc::new(Chat::default());
    let server = server(chat.clone(), Arc::default(), false);
    let (_queued, conn, _) = connect(&server, "sid=abc");

    send(&server, &conn, json!([8, "https://example.com/room", "spoofed"]));
    server
        .handle_read(&conn, Bytes::from_static(b"{broken"))
        .unwrap();

    let errors = chat.errors.lock();
    assert_eq!(errors[0], Error::UnsupportedMessageType(8));
    assert!(matches!(errors[1], Error::InvalidMessage(_)));
}

#[test]
fn malformed_cookie_never_opens_wamp() {
    let chat = Arc::new(Chat::default());
    let server = server(chat.clone(), Arc::default(), false);
    let queued = Arc::new(QueuedConnection::new());
    let conn: ConnectionRef = queued.clone();

    server.transport_active(&conn).unwrap();
    server.handle_read(&conn, upgrade("garbage")).unwrap();

    let response = queued.poll_transmit().unwrap();
    assert!(response.starts_with(b"HTTP/1.1 400"));
    assert!(queued.is_closed());
    assert!(chat.users.lock().is_empty());
    assert!(matches!(chat.errors.lock()[0], Error::InvalidRequestHeader { .. }));
}

#[test]
fn oversized_upgrade_is_rejected_with_413() {
    let chat = Arc::new(Chat::default());
    let server = server(chat.clone(), Arc::default(), false);
    let queued = Arc::new(QueuedConnection::new());
    let conn: ConnectionRef = queued.clone();

    server.transport_active(&conn).unwrap();
    let filler = format!("GET / HTTP/1.1\r\nX-Filler: {}\r\n", "a".repeat(5000));
    server.handle_read(&conn, Bytes::from(filler)).unwrap();

    assert!(queued.poll_transmit().unwrap().starts_with(b"HTTP/1.1 413"));
    assert!(chat.users.lock().is_empty());
}

#[test]
fn close_after_handshake_is_forwarded_once() {
    let chat = Arc::new(Chat::default());
    let server = server(chat.clone(), Arc::default(), false);
    let (_queued, conn, session_id) = connect(&server, "sid=abc");

    server.transport_inactive(&conn).unwrap();
    server.transport_inactive(&conn).unwrap();

    assert_eq!(*chat.closed.lock(), vec![session_id]);
    assert_eq!(server.stack().middleware().middleware().connection_count(), 0);
    assert!(chat.errors.lock().is_empty());
}
