use log::trace;

use wsstack::{Error, Result};

use super::{decode_value, Reader};
use crate::value::SessionData;

/// The `name|value` session format.
///
/// A document is a run of entries, each an attribute name, a `|`, then one
/// encoded value. Decoding stops only once every byte is consumed; a repeated
/// name keeps the last value.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyReader;

impl LegacyReader {
    /// Creates the reader.
    pub fn new() -> Self {
        Self
    }
}

impl Reader for LegacyReader {
    fn read(&self, data: &[u8]) -> Result<SessionData> {
        let mut session = SessionData::new();
        let mut pos = 0;

        while pos < data.len() {
            let bar = data[pos..]
                .iter()
                .position(|b| *b == b'|')
                .map(|offset| pos + offset)
                .ok_or_else(|| {
                    let reason = format!("missing '|' after the name at offset {pos}");
                    Error::invalid_session(data, reason)
                })?;
            let name = std::str::from_utf8(&data[pos..bar]).map_err(|_| {
                Error::invalid_session(data, format!("name at offset {pos} is not valid UTF-8"))
            })?;

            let (value, end) = decode_value(data, bar + 1)?;
            if session.insert(name.to_string(), value).is_some() {
                trace!("session attribute \"{}\" repeated, keeping the last value", name);
            }
            pos = end;
        }

        Ok(session)
    }

    fn encode(&self, data: &SessionData) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for (name, value) in data {
            if name.contains('|') {
                return Err(Error::invalid_session(
                    name.as_bytes(),
                    "attribute names cannot contain '|'",
                ));
            }
            out.extend_from_slice(name.as_bytes());
            out.push(b'|');
            value.encode_into(&mut out);
        }
        Ok(out)
    }
}
