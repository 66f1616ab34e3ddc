//! Session storage formats.
//!
//! A session backend hands back an opaque byte blob; a [`Reader`] turns it into
//! [`SessionData`] and back. Both formats share one single-pass decoder over the
//! self-describing value grammar:
//!
//! ```text
//! value  := "N;"
//!         | "b:" ("0" | "1") ";"
//!         | "i:" ["-"] digits ";"
//!         | "d:" number ";"
//!         | "s:" length ":\"" <length bytes> "\";"
//!         | "a:" count ":{" (value value){count} "}"
//! ```
//!
//! Object, custom-serialized and reference markers (`O`, `C`, `E`, `r`, `R`)
//! exist in the wider format but are rejected: session storage is not trusted
//! to instantiate anything.

use wsstack::{Error, Result};

use crate::value::{ArrayKey, SessionData, SessionValue};

pub(crate) mod legacy;
pub(crate) mod serialized;

/// Deepest array nesting accepted by the decoder.
pub const MAX_DEPTH: usize = 512;

/// A session storage format.
pub trait Reader: Send + Sync {
    /// Decodes a stored blob. An empty blob is an empty session.
    fn read(&self, data: &[u8]) -> Result<SessionData>;

    /// Encodes session data so that [`Reader::read`] returns it unchanged.
    fn encode(&self, data: &SessionData) -> Result<Vec<u8>>;
}

/// Decodes one value starting at `pos`, returning it together with the offset
/// just past it. Failures carry the whole `input`.
pub(crate) fn decode_value(input: &[u8], pos: usize) -> Result<(SessionValue, usize)> {
    Decoder { input }
        .value(pos, 0)
        .map_err(|reason| Error::invalid_session(input, reason))
}

struct Decoder<'a> {
    input: &'a [u8],
}

type Step<T> = std::result::Result<T, String>;

impl<'a> Decoder<'a> {
    fn value(&self, pos: usize, depth: usize) -> Step<(SessionValue, usize)> {
        if depth > MAX_DEPTH {
            return Err(format!("arrays nested deeper than {MAX_DEPTH} levels"));
        }

        let tag = *self
            .input
            .get(pos)
            .ok_or_else(|| format!("expected a value at offset {pos}"))?;

        match tag {
            b'N' => {
                let end = self.expect(pos + 1, b";")?;
                Ok((SessionValue::Null, end))
            }
            b'b' => {
                let (digits, end) = self.field(pos, ';')?;
                match digits {
                    "0" => Ok((SessionValue::Bool(false), end)),
                    "1" => Ok((SessionValue::Bool(true), end)),
                    _ => Err(format!("invalid boolean \"{digits}\" at offset {pos}")),
                }
            }
            b'i' => {
                let (digits, end) = self.field(pos, ';')?;
                Ok((SessionValue::Int(parse_int(digits, pos)?), end))
            }
            b'd' => {
                let (number, end) = self.field(pos, ';')?;
                Ok((SessionValue::Float(parse_float(number, pos)?), end))
            }
            b's' => {
                let (len, start) = self.length(pos)?;
                let start = self.expect(start, b"\"")?;
                let end = start
                    .checked_add(len)
                    .filter(|end| *end <= self.input.len())
                    .ok_or_else(|| format!("string of {len} bytes at offset {pos} is truncated"))?;
                let text = std::str::from_utf8(&self.input[start..end])
                    .map_err(|_| format!("string at offset {pos} is not valid UTF-8"))?;
                let end = self.expect(end, b"\";")?;
                Ok((SessionValue::String(text.to_string()), end))
            }
            b'a' => {
                let (count, mut cursor) = self.length(pos)?;
                cursor = self.expect(cursor, b"{")?;
                let mut entries = Vec::new();
                for _ in 0..count {
                    let (key, next) = self.value(cursor, depth + 1)?;
                    let key = match key {
                        SessionValue::Int(i) => ArrayKey::Int(i),
                        SessionValue::String(s) => ArrayKey::String(s),
                        _ => {
                            return Err(format!(
                                "array key at offset {cursor} is not an integer or string"
                            ))
                        }
                    };
                    let (value, next) = self.value(next, depth + 1)?;
                    entries.push((key, value));
                    cursor = next;
                }
                match self.input.get(cursor) {
                    Some(b'}') => Ok((SessionValue::Array(entries), cursor + 1)),
                    _ => Err(format!(
                        "array at offset {pos} holds more than its declared {count} entries"
                    )),
                }
            }
            b'O' | b'C' | b'E' | b'r' | b'R' => Err(format!(
                "unsupported marker '{}' at offset {pos}",
                tag as char
            )),
            _ => Err(format!(
                "unrecognized type tag '{}' at offset {pos}",
                tag.escape_ascii()
            )),
        }
    }

    /// Checks that `literal` starts at `pos` and returns the offset after it.
    fn expect(&self, pos: usize, literal: &[u8]) -> Step<usize> {
        let end = pos + literal.len();
        if self.input.get(pos..end) == Some(literal) {
            Ok(end)
        } else {
            Err(format!(
                "expected \"{}\" at offset {pos}",
                literal.escape_ascii()
            ))
        }
    }

    /// Reads `<tag>:<text><terminator>` and returns the text and the offset after
    /// the terminator.
    fn field(&self, pos: usize, terminator: char) -> Step<(&'a str, usize)> {
        let start = self.expect(pos + 1, b":")?;
        let input: &'a [u8] = self.input;
        let rest = input.get(start..).unwrap_or_default();
        let len = rest
            .iter()
            .position(|b| *b == terminator as u8)
            .ok_or_else(|| format!("unterminated value at offset {pos}"))?;
        let text = std::str::from_utf8(&rest[..len])
            .map_err(|_| format!("invalid number at offset {pos}"))?;
        Ok((text, start + len + 1))
    }

    /// Reads the `<tag>:<length>:` prefix of strings and arrays.
    fn length(&self, pos: usize) -> Step<(usize, usize)> {
        let (digits, end) = self.field(pos, ':')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid length \"{digits}\" at offset {pos}"));
        }
        let len = digits
            .parse::<usize>()
            .map_err(|_| format!("length \"{digits}\" at offset {pos} is out of range"))?;
        Ok((len, end))
    }
}

fn parse_int(digits: &str, pos: usize) -> Step<i64> {
    let unsigned = digits.strip_prefix('-').unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid integer \"{digits}\" at offset {pos}"));
    }
    digits
        .parse::<i64>()
        .map_err(|_| format!("integer \"{digits}\" at offset {pos} is out of range"))
}

/// Accepts `-?digits(.digits)?([eE][+-]?digits)?` and the `INF`, `-INF`, `NAN`
/// spellings.
fn parse_float(number: &str, pos: usize) -> Step<f64> {
    match number {
        "INF" => return Ok(f64::INFINITY),
        "-INF" => return Ok(f64::NEG_INFINITY),
        "NAN" => return Ok(f64::NAN),
        _ => {}
    }

    let invalid = || format!("invalid float \"{number}\" at offset {pos}");
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let unsigned = number.strip_prefix('-').unwrap_or(number);
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, Some(exponent)),
        None => (unsigned, None),
    };
    let (whole, fraction) = match mantissa.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (mantissa, None),
    };
    let exponent_ok = exponent.map_or(true, |exp| {
        all_digits(exp.strip_prefix(['+', '-']).unwrap_or(exp))
    });
    if !all_digits(whole) || !fraction.map_or(true, all_digits) || !exponent_ok {
        return Err(invalid());
    }

    number.parse::<f64>().map_err(|_| invalid())
}
