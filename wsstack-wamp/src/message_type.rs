use std::fmt;

use wsstack::Error;

/// Type code in the first element of every WAMP v1 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// server → client, sent once on open
    Welcome = 0,
    /// client → server, registers a CURIE prefix
    Prefix = 1,
    /// client → server, remote procedure call
    Call = 2,
    /// server → client, successful call
    CallResult = 3,
    /// server → client, failed call
    CallError = 4,
    /// client → server
    Subscribe = 5,
    /// client → server
    Unsubscribe = 6,
    /// client → server
    Publish = 7,
    /// server → client, a published event
    Event = 8,
}

impl MessageType {
    /// The wire code.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Returns true for the types a client may send.
    pub fn is_inbound(self) -> bool {
        matches!(
            self,
            MessageType::Prefix
                | MessageType::Call
                | MessageType::Subscribe
                | MessageType::Unsubscribe
                | MessageType::Publish
        )
    }
}

impl TryFrom<i64> for MessageType {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => MessageType::Welcome,
            1 => MessageType::Prefix,
            2 => MessageType::Call,
            3 => MessageType::CallResult,
            4 => MessageType::CallError,
            5 => MessageType::Subscribe,
            6 => MessageType::Unsubscribe,
            7 => MessageType::Publish,
            8 => MessageType::Event,
            _ => return Err(Error::UnsupportedMessageType(code)),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Welcome => "WELCOME",
            MessageType::Prefix => "PREFIX",
            MessageType::Call => "CALL",
            MessageType::CallResult => "CALLRESULT",
            MessageType::CallError => "CALLERROR",
            MessageType::Subscribe => "SUBSCRIBE",
            MessageType::Unsubscribe => "UNSUBSCRIBE",
            MessageType::Publish => "PUBLISH",
            MessageType::Event => "EVENT",
        };
        f.write_str(name)
    }
}
