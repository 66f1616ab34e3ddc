use bytes::Bytes;
use http::StatusCode;
use log::{debug, warn};

use wsstack::{ConnectionRef, Result};

/// Value of the `X-Powered-By` header on responses written while rejecting an upgrade.
pub const POWERED_BY: &str = concat!("wsstack/", env!("CARGO_PKG_VERSION"));

/// Writes a bodyless HTTP response with `status` and closes the connection.
///
/// Used while the connection is still speaking HTTP, i.e. before the upgrade
/// completed, so the peer learns why it was rejected.
pub fn close_with_response(conn: &ConnectionRef, status: StatusCode) -> Result<()> {
    warn!("closing connection {} with status {}", conn.id(), status);

    let response = format!(
        "HTTP/1.1 {} {}\r\nX-Powered-By: {}\r\nContent-Length: 0\r\n\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or(""),
        POWERED_BY,
    );

    // the peer may already be gone
    if let Err(err) = conn.send(Bytes::from(response)) {
        debug!("could not write {} response to {}: {}", status, conn.id(), err);
    }

    conn.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wsstack::QueuedConnection;

    #[test]
    fn writes_status_line_then_closes() {
        let queued = Arc::new(QueuedConnection::new());
        let conn: ConnectionRef = queued.clone();

        close_with_response(&conn, StatusCode::PAYLOAD_TOO_LARGE).unwrap();

        let sent = queued.poll_transmit().unwrap();
        let text = String::from_utf8(sent.to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert!(text.contains("X-Powered-By: wsstack/"));
        assert!(text.ends_with("\r\n\r\n"));
        assert!(queued.is_closed());
    }

    #[test]
    fn closing_twice_is_harmless() {
        let queued = Arc::new(QueuedConnection::new());
        let conn: ConnectionRef = queued.clone();

        close_with_response(&conn, StatusCode::BAD_REQUEST).unwrap();
        close_with_response(&conn, StatusCode::INTERNAL_SERVER_ERROR).unwrap();

        assert_eq!(queued.drain_transmits().len(), 1);
        assert!(conn.attributes().is_empty());
    }
}
