//! Binary codec
//!
//! The realtime channel carries MsgPack maps with integer field keys; field
//! numbers are stable and unknown fields are skipped, so old decoders keep
//! working against newer peers. JSON never appears on this channel.

use crate::envelope::{Command, Envelope, PROTOCOL_VERSION};
use crate::event::Event;
use rmpv::Value;

/// Codec failure modes
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Input did not parse as the expected shape
    #[error("decode error: {0}")]
    Decode(String),

    /// Envelope version this peer does not speak
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u32),

    /// Serialization failed (should not happen for well-formed values)
    #[error("encode error: {0}")]
    Encode(String),
}

impl CodecError {
    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

fn write_value(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, value).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

fn read_value(data: &[u8]) -> Result<Value, CodecError> {
    let mut cursor = data;
    rmpv::decode::read_value(&mut cursor).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Encode an envelope to its binary frame
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    let mut entries = vec![
        (Value::from(0u8), Value::from(envelope.version)),
        (Value::from(1u8), Value::from(envelope.cmd.as_str())),
        (Value::from(2u8), Value::from(envelope.seq)),
    ];
    if let Some(sid) = &envelope.sid {
        entries.push((Value::from(3u8), Value::from(sid.as_str())));
    }
    if envelope.body != Value::Nil {
        entries.push((Value::from(4u8), envelope.body.clone()));
    }
    if let Some(ext) = &envelope.ext {
        entries.push((Value::from(15u8), ext.clone()));
    }

    write_value(&Value::Map(entries))
}

/// Decode a binary frame into an envelope
///
/// # Errors
/// [`CodecError::Decode`] for malformed input,
/// [`CodecError::UnsupportedVersion`] when the version field is not ours.
pub fn decode_envelope(data: &[u8]) -> Result<Envelope, CodecError> {
    let value = read_value(data)?;
    let entries = value
        .as_map()
        .ok_or_else(|| CodecError::decode("envelope is not a map"))?;

    let mut version = 0;
    let mut cmd = None;
    let mut seq = 0;
    let mut sid = None;
    let mut body = Value::Nil;
    let mut ext = None;

    for (key, val) in entries {
        match key.as_u64() {
            Some(0) => version = val.as_u64().unwrap_or_default() as u32,
            Some(1) => {
                let tag = val
                    .as_str()
                    .ok_or_else(|| CodecError::decode("envelope cmd is not a string"))?;
                cmd = Some(Command::parse(tag));
            }
            Some(2) => seq = val.as_i64().unwrap_or_default(),
            Some(3) => sid = val.as_str().map(str::to_string),
            Some(4) => body = val.clone(),
            Some(15) => ext = Some(val.clone()),
            _ => {}
        }
    }

    if version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let cmd = cmd.ok_or_else(|| CodecError::decode("envelope is missing cmd"))?;

    Ok(Envelope {
        version,
        cmd,
        seq,
        sid,
        body,
        ext,
    })
}

/// Encode an event to its standalone binary form
pub fn encode_event(event: &Event) -> Result<Vec<u8>, CodecError> {
    write_value(&event.to_value())
}

/// Decode a standalone binary event
pub fn decode_event(data: &[u8]) -> Result<Event, CodecError> {
    Event::from_value(&read_value(data)?)
}
