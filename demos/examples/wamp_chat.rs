use bytes::Bytes;
use clap::Parser;
use log::info;
use serde_json::{json, Value};
use std::{str::FromStr, sync::Arc};

use wsstack::{ConnectionRef, QueuedConnection, Server, ServerMiddleware};
use wsstack_demos::helpers::{init_logger, ChatApp};
use wsstack_http::{BufferedRequestParser, ParseHttpRequest, ParserOptions};
use wsstack_session::{
    InitializeSession, LegacyReader, MemorySessionHandler, ReadOnlySessionHandler, SessionFactory,
    SessionHandler, SessionOptions,
};
use wsstack_wamp::{ParseWampMessage, ServerIdentity, TopicRegistry};

#[derive(Parser)]
#[command(name = "WAMP Chat")]
#[command(version = "0.0.0")]
#[command(about = "Scripted WAMP chat through the HTTP, session and WAMP layers", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
    #[arg(long, default_value_t = format!("WampChat/0.0.0"))]
    identity: String,
    #[arg(long, default_value_t = format!("sid"))]
    cookie_name: String,
    #[arg(long, default_value_t = 4096)]
    max_header_size: usize,
}

struct Client {
    name: &'static str,
    queued: Arc<QueuedConnection>,
    conn: ConnectionRef,
}

impl Client {
    fn new(name: &'static str) -> Self {
        let queued = Arc::new(QueuedConnection::new());
        let conn: ConnectionRef = queued.clone();
        Self { name, queued, conn }
    }

    fn print_received(&self) {
        for frame in self.queued.drain_transmits() {
            info!("{} <- {}", self.name, String::from_utf8_lossy(&frame));
        }
    }
}

fn send<M: ServerMiddleware>(
    server: &Server<M>,
    client: &Client,
    frame: Value,
) -> anyhow::Result<()> {
    info!("{} -> {}", client.name, frame);
    server.handle_read(&client.conn, Bytes::from(frame.to_string()))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    if cli.debug {
        init_logger(log_level);
    }

    let sessions = Arc::new(MemorySessionHandler::new());
    sessions.write("alice-sid", b"user|s:5:\"alice\";")?;
    sessions.write("bob-sid", b"user|s:3:\"bob\";")?;

    let mut session_options = SessionOptions::default();
    session_options.name(cli.cookie_name.clone()).auto_start(true);
    let factory = SessionFactory::new(
        Arc::new(ReadOnlySessionHandler::new(sessions)),
        Arc::new(LegacyReader),
        session_options,
    );

    let mut parser_options = ParserOptions::default();
    parser_options.max_header_size(cli.max_header_size);

    let topics = Arc::new(TopicRegistry::new());
    let wamp = ParseWampMessage::new(ChatApp::new(topics.clone()), topics)
        .with_server_identity(ServerIdentity::new(cli.identity));
    let server = Server::new(ParseHttpRequest::with_parser(
        InitializeSession::new(wamp, factory),
        BufferedRequestParser::new(parser_options),
    ));
    info!("offering sub-protocols {:?}", server.sub_protocols());

    let clients = [Client::new("alice"), Client::new("bob")];
    for client in &clients {
        let upgrade = format!(
            "GET /chat HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Protocol: wamp\r\nCookie: {}={}-sid\r\n\r\n",
            cli.cookie_name, client.name
        );
        server.transport_active(&client.conn)?;
        server.handle_read(&client.conn, Bytes::from(upgrade))?;
        client.print_received();
    }

    let [alice, bob] = &clients;
    send(&server, alice, json!([1, "chat", "https://example.com/chat#"]))?;
    send(&server, alice, json!([5, "chat:lobby"]))?;
    send(&server, bob, json!([5, "https://example.com/chat#lobby"]))?;
    send(&server, alice, json!([7, "chat:lobby", "hello everyone", true]))?;
    send(&server, bob, json!([2, "c1", "https://example.com/rpc#whoami"]))?;
    send(&server, bob, json!([2, "c2", "https://example.com/rpc#echo", [1, 2, 3]]))?;
    send(&server, bob, json!([2, "c3", "https://example.com/rpc#missing"]))?;
    send(&server, bob, json!([8, "chat:lobby", "spoofed event"]))?;

    for client in &clients {
        client.print_received();
        server.transport_inactive(&client.conn)?;
    }

    Ok(())
}
