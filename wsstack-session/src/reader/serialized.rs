use wsstack::{Error, Result};

use super::{decode_value, Reader};
use crate::value::{ArrayKey, SessionData, SessionValue};

/// The whole-blob session format: one encoded array whose keys are the
/// attribute names.
///
/// Integer keys are read back as their decimal string.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializedReader;

impl SerializedReader {
    /// Creates the reader.
    pub fn new() -> Self {
        Self
    }
}

impl Reader for SerializedReader {
    fn read(&self, data: &[u8]) -> Result<SessionData> {
        if data.is_empty() {
            return Ok(SessionData::new());
        }

        let (value, end) = decode_value(data, 0)?;
        if end != data.len() {
            return Err(Error::invalid_session(
                data,
                format!("unexpected bytes after offset {end}"),
            ));
        }

        match value {
            SessionValue::Array(entries) => Ok(entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect()),
            _ => Err(Error::invalid_session(data, "session data is not an array")),
        }
    }

    fn encode(&self, data: &SessionData) -> Result<Vec<u8>> {
        let entries = data
            .iter()
            .map(|(name, value)| (ArrayKey::String(name.clone()), value.clone()))
            .collect();
        Ok(SessionValue::Array(entries).encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn reads_array_blob() {
        let session = SerializedReader
            .read(b"a:2:{s:4:\"user\";s:5:\"alice\";i:7;d:1.5;}")
            .unwrap();
        assert_eq!(session["user"], SessionValue::from("alice"));
        assert_eq!(session["7"], SessionValue::Float(1.5));
    }

    #[test]
    fn rejects_non_array_blob() {
        assert_matches!(
            SerializedReader.read(b"s:3:\"abc\";"),
            Err(Error::InvalidSession { reason, .. }) if reason.contains("not an array")
        );
        assert_matches!(
            SerializedReader.read(b"a:0:{}N;"),
            Err(Error::InvalidSession { .. })
        );
    }

    #[test]
    fn encodes_what_it_reads() {
        let data = b"a:2:{s:1:\"a\";N;s:1:\"b\";a:1:{i:0;b:0;}}";
        let session = SerializedReader.read(data).unwrap();
        assert_eq!(SerializedReader.encode(&session).unwrap(), data.to_vec());
    }
}
