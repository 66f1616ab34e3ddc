use serde_json::Value;
use std::sync::Arc;

use wsstack::{ConnectionRef, Error, Result};

use crate::connection::WampConnection;
use crate::topic::Topic;

/// The application behind a WAMP server.
///
/// [`crate::ParseWampMessage`] decodes every inbound frame and calls the
/// matching method with the connection's [`WampConnection`]. Earlier layers'
/// state, such as the upgrade request or the session, stays reachable through
/// the connection's attributes.
pub trait WampServerMiddleware: Send + Sync {
    /// A WAMP session started; WELCOME has already been sent.
    fn on_open(&self, conn: &Arc<WampConnection>) -> Result<()>;

    /// CALL of `procedure` (CURIEs already expanded). Reply with
    /// [`WampConnection::call_result`] or [`WampConnection::call_error`].
    fn on_call(
        &self,
        conn: &Arc<WampConnection>,
        call_id: &str,
        procedure: &str,
        params: Vec<Value>,
    ) -> Result<()>;

    /// SUBSCRIBE to `topic`.
    fn on_subscribe(&self, conn: &Arc<WampConnection>, topic: &Arc<Topic>) -> Result<()>;

    /// UNSUBSCRIBE from `topic`.
    fn on_unsubscribe(&self, conn: &Arc<WampConnection>, topic: &Arc<Topic>) -> Result<()>;

    /// PUBLISH of `event` to `topic`.
    ///
    /// `exclude` and `eligible` are lists of WAMP session ids; an empty
    /// `eligible` list means everybody.
    fn on_publish(
        &self,
        conn: &Arc<WampConnection>,
        topic: &Arc<Topic>,
        event: Value,
        exclude: Vec<String>,
        eligible: Vec<String>,
    ) -> Result<()>;

    /// The WAMP session ended.
    fn on_close(&self, conn: &Arc<WampConnection>) -> Result<()>;

    /// A failure nothing earlier recovered from. `conn` is the WAMP connection
    /// when the session had started, the base connection otherwise.
    fn on_error(&self, conn: &ConnectionRef, err: Error) -> Result<()>;

    /// WebSocket sub-protocols the application speaks besides `wamp`.
    fn sub_protocols(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<M> WampServerMiddleware for Arc<M>
where
    M: WampServerMiddleware + ?Sized,
{
    fn on_open(&self, conn: &Arc<WampConnection>) -> Result<()> {
        (**self).on_open(conn)
    }

    fn on_call(
        &self,
        conn: &Arc<WampConnection>,
        call_id: &str,
        procedure: &str,
        params: Vec<Value>,
    ) -> Result<()> {
        (**self).on_call(conn, call_id, procedure, params)
    }

    fn on_subscribe(&self, conn: &Arc<WampConnection>, topic: &Arc<Topic>) -> Result<()> {
        (**self).on_subscribe(conn, topic)
    }

    fn on_unsubscribe(&self, conn: &Arc<WampConnection>, topic: &Arc<Topic>) -> Result<()> {
        (**self).on_unsubscribe(conn, topic)
    }

    fn on_publish(
        &self,
        conn: &Arc<WampConnection>,
        topic: &Arc<Topic>,
        event: Value,
        exclude: Vec<String>,
        eligible: Vec<String>,
    ) -> Result<()> {
        (**self).on_publish(conn, topic, event, exclude, eligible)
    }

    fn on_close(&self, conn: &Arc<WampConnection>) -> Result<()> {
        (**self).on_close(conn)
    }

    fn on_error(&self, conn: &ConnectionRef, err: Error) -> Result<()> {
        (**self).on_error(conn, err)
    }

    fn sub_protocols(&self) -> Vec<String> {
        (**self).sub_protocols()
    }
}
