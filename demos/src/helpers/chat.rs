use log::info;
use serde_json::{json, Value};
use std::sync::Arc;

use wsstack::{Connection, ConnectionRef, Error, Result};
use wsstack_session::{Session, SESSION_ATTRIBUTE};
use wsstack_wamp::{Topic, TopicRegistry, WampConnection, WampServerMiddleware};

/// Base URI of the procedures [`ChatApp`] answers.
pub const RPC_BASE: &str = "https://example.com/rpc#";

/// A chat room: topics relay publishes, and two procedures are callable.
///
/// - `rpc#whoami` returns the `user` attribute of the caller's session
/// - `rpc#echo` returns its parameters
pub struct ChatApp {
    topics: Arc<TopicRegistry>,
}

impl ChatApp {
    /// Creates the app over the registry the WAMP layer resolves topics with.
    pub fn new(topics: Arc<TopicRegistry>) -> Self {
        Self { topics }
    }

    fn user(conn: &WampConnection) -> String {
        conn.attributes()
            .get::<Arc<Session>>(SESSION_ATTRIBUTE)
            .and_then(|session| session.get("user"))
            .and_then(|user| user.as_str().map(str::to_string))
            .unwrap_or_else(|| "anonymous".to_string())
    }
}

impl WampServerMiddleware for ChatApp {
    fn on_open(&self, conn: &Arc<WampConnection>) -> Result<()> {
        info!("{} joined as {}", Self::user(conn), conn.session_id());
        Ok(())
    }

    fn on_call(
        &self,
        conn: &Arc<WampConnection>,
        call_id: &str,
        procedure: &str,
        params: Vec<Value>,
    ) -> Result<()> {
        match procedure.strip_prefix(RPC_BASE) {
            Some("whoami") => conn.call_result(call_id, json!(Self::user(conn))),
            Some("echo") => conn.call_result(call_id, Value::Array(params)),
            _ => conn.call_error(
                call_id,
                "https://example.com/error#not-found",
                &format!("no procedure {procedure}"),
                None,
            ),
        }
    }

    fn on_subscribe(&self, conn: &Arc<WampConnection>, topic: &Arc<Topic>) -> Result<()> {
        if topic.add(conn) {
            info!("{} subscribed to {}", Self::user(conn), topic);
        }
        Ok(())
    }

    fn on_unsubscribe(&self, conn: &Arc<WampConnection>, topic: &Arc<Topic>) -> Result<()> {
        topic.remove(conn.id());
        Ok(())
    }

    fn on_publish(
        &self,
        conn: &Arc<WampConnection>,
        topic: &Arc<Topic>,
        event: Value,
        exclude: Vec<String>,
        eligible: Vec<String>,
    ) -> Result<()> {
        let delivered = topic.broadcast(&event, &exclude, &eligible);
        info!(
            "{} published to {} ({} recipients)",
            Self::user(conn),
            topic,
            delivered
        );
        Ok(())
    }

    fn on_close(&self, conn: &Arc<WampConnection>) -> Result<()> {
        self.topics.unsubscribe_all(conn.id());
        info!("{} left", Self::user(conn));
        Ok(())
    }

    fn on_error(&self, conn: &ConnectionRef, err: Error) -> Result<()> {
        log::error!("connection {} failed: {}", conn.id(), err);
        Ok(())
    }
}
