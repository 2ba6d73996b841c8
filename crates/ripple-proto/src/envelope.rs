//! Transport envelope
//!
//! Every frame on the realtime channel is one envelope: a protocol version,
//! a command tag, the client sequence number, and a command-dependent body.
//! Server pushes carry `seq = 0`; replies echo the originating sequence.

use crate::codec::CodecError;
use crate::error::ErrorCode;
use crate::event::Event;
use rmpv::Value;

/// Current envelope protocol version
pub const PROTOCOL_VERSION: u32 = 1;

/// Sequence number reserved for server-initiated frames
pub const SERVER_SEQ: i64 = 0;

/// Command tag of an envelope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client heartbeat request
    Ping,
    /// Server heartbeat reply
    Pong,
    /// In-band authentication request
    Auth,
    /// Authentication outcome
    AuthResult,
    /// Subscribe to a conversation (body: cid string)
    Subscribe,
    /// Unsubscribe from a conversation (body: cid string)
    Unsubscribe,
    /// History synchronization request
    Sync,
    /// A conversation event (client send, server push, and sync replies)
    Event,
    /// Positive acknowledgement of a client request
    Ack,
    /// Error reply
    Error,
    /// A tag this peer does not know; rejected by the dispatcher
    Unknown(String),
}

impl Command {
    /// Wire tag string
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Auth => "auth",
            Self::AuthResult => "auth_result",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Sync => "sync",
            Self::Event => "event",
            Self::Ack => "ack",
            Self::Error => "error",
            Self::Unknown(tag) => tag,
        }
    }

    /// Parse a wire tag, preserving unknown tags
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        match tag {
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "auth" => Self::Auth,
            "auth_result" => Self::AuthResult,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "sync" => Self::Sync,
            "event" => Self::Event,
            "ack" => Self::Ack,
            "error" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport frame
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub version: u32,
    pub cmd: Command,
    pub seq: i64,
    pub sid: Option<String>,
    /// Command-dependent payload; `Value::Nil` when absent
    pub body: Value,
    /// Extension slot for forward compatibility
    pub ext: Option<Value>,
}

impl Envelope {
    /// Create an envelope at the current protocol version
    #[must_use]
    pub fn new(cmd: Command, seq: i64, body: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            cmd,
            seq,
            sid: None,
            body,
            ext: None,
        }
    }

    /// Acknowledgement reply
    #[must_use]
    pub fn ack(seq: i64, mid: i64) -> Self {
        Self::new(Command::Ack, seq, AckBody { seq, mid }.to_value())
    }

    /// Error reply carrying the code's default message
    #[must_use]
    pub fn error(code: ErrorCode, seq: i64) -> Self {
        Self::error_with_message(code, code.default_message(), seq)
    }

    /// Error reply with an explicit message
    #[must_use]
    pub fn error_with_message(code: ErrorCode, message: impl Into<String>, seq: i64) -> Self {
        Self::new(
            Command::Error,
            seq,
            ErrorBody {
                code: code.as_i32(),
                message: message.into(),
                seq,
            }
            .to_value(),
        )
    }

    /// Heartbeat reply echoing the request sequence
    #[must_use]
    pub fn pong(seq: i64) -> Self {
        Self::new(Command::Pong, seq, Value::Nil)
    }

    /// Server push of an event (`seq = 0`)
    #[must_use]
    pub fn event_push(event: &Event) -> Self {
        Self::new(Command::Event, SERVER_SEQ, event.to_value())
    }

    /// Reply to a request with an event-framed body on the same sequence
    #[must_use]
    pub fn event_reply(seq: i64, body: Value) -> Self {
        Self::new(Command::Event, seq, body)
    }

    /// Body as a cid string (for `subscribe`/`unsubscribe`)
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_str()
    }
}

/// Acknowledgement body
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AckBody {
    /// Acknowledged client sequence
    pub seq: i64,
    /// Assigned mid; 0 when the request did not persist an event
    pub mid: i64,
}

impl AckBody {
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            (Value::from(0u8), Value::from(self.seq)),
            (Value::from(1u8), Value::from(self.mid)),
        ])
    }

    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let entries = value.as_map()?;
        let mut body = Self { seq: 0, mid: 0 };
        for (key, val) in entries {
            match key.as_u64() {
                Some(0) => body.seq = val.as_i64()?,
                Some(1) => body.mid = val.as_i64()?,
                _ => {}
            }
        }
        Some(body)
    }
}

/// Error body
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
    /// Originating request sequence; 0 for transport-level notices
    pub seq: i64,
}

impl ErrorBody {
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            (Value::from(0u8), Value::from(self.code)),
            (Value::from(1u8), Value::from(self.message.as_str())),
            (Value::from(2u8), Value::from(self.seq)),
        ])
    }

    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let entries = value.as_map()?;
        let mut body = Self {
            code: 0,
            message: String::new(),
            seq: 0,
        };
        for (key, val) in entries {
            match key.as_u64() {
                Some(0) => body.code = val.as_i64()? as i32,
                Some(1) => body.message = val.as_str()?.to_string(),
                Some(2) => body.seq = val.as_i64()?,
                _ => {}
            }
        }
        Some(body)
    }
}

/// In-band authentication request body
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AuthBody {
    pub token: String,
    pub device_id: String,
    pub platform: String,
}

impl AuthBody {
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            (Value::from(0u8), Value::from(self.token.as_str())),
            (Value::from(1u8), Value::from(self.device_id.as_str())),
            (Value::from(2u8), Value::from(self.platform.as_str())),
        ])
    }

    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let entries = value.as_map()?;
        let mut body = Self {
            token: String::new(),
            device_id: String::new(),
            platform: String::new(),
        };
        for (key, val) in entries {
            match key.as_u64() {
                Some(0) => body.token = val.as_str()?.to_string(),
                Some(1) => body.device_id = val.as_str()?.to_string(),
                Some(2) => body.platform = val.as_str()?.to_string(),
                _ => {}
            }
        }
        Some(body)
    }
}

/// Authentication outcome body
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AuthResultBody {
    pub success: bool,
    pub uid: String,
    pub message: String,
}

impl AuthResultBody {
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            (Value::from(0u8), Value::from(self.success)),
            (Value::from(1u8), Value::from(self.uid.as_str())),
            (Value::from(2u8), Value::from(self.message.as_str())),
        ])
    }
}

/// History synchronization request body
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SyncBody {
    pub cid: String,
    /// Incremental sync: return events with `mid > last_mid`; 0 for a tail fetch
    #[serde(default)]
    pub last_mid: i64,
    #[serde(default)]
    pub limit: u32,
    /// Upper timestamp bound, exclusive; 0 disables
    #[serde(default)]
    pub before: i64,
    /// Lower timestamp bound, exclusive; 0 disables
    #[serde(default)]
    pub after: i64,
}

impl SyncBody {
    /// Parse the MsgPack map form
    pub fn from_value(value: &Value) -> Result<Self, CodecError> {
        let entries = value
            .as_map()
            .ok_or_else(|| CodecError::decode("sync body is not a map"))?;

        let mut body = Self::default();
        for (key, val) in entries {
            match key.as_u64() {
                Some(0) => {
                    body.cid = val
                        .as_str()
                        .ok_or_else(|| CodecError::decode("sync cid is not a string"))?
                        .to_string();
                }
                Some(1) => body.last_mid = val.as_i64().unwrap_or_default(),
                Some(2) => body.limit = val.as_u64().unwrap_or_default() as u32,
                Some(3) => body.before = val.as_i64().unwrap_or_default(),
                Some(4) => body.after = val.as_i64().unwrap_or_default(),
                _ => {}
            }
        }

        if body.cid.is_empty() {
            return Err(CodecError::decode("sync body is missing cid"));
        }
        Ok(body)
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            (Value::from(0u8), Value::from(self.cid.as_str())),
            (Value::from(1u8), Value::from(self.last_mid)),
            (Value::from(2u8), Value::from(self.limit)),
            (Value::from(3u8), Value::from(self.before)),
            (Value::from(4u8), Value::from(self.after)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cid::Cid;

    #[test]
    fn test_command_tags() {
        assert_eq!(Command::parse("ping"), Command::Ping);
        assert_eq!(Command::parse("event"), Command::Event);
        assert_eq!(Command::parse("auth_result"), Command::AuthResult);
        assert_eq!(
            Command::parse("search"),
            Command::Unknown("search".to_string())
        );
        assert_eq!(Command::Subscribe.as_str(), "subscribe");
    }

    #[test]
    fn test_ack_body_roundtrip() {
        let body = AckBody { seq: 7, mid: 42 };
        assert_eq!(AckBody::from_value(&body.to_value()), Some(body));
    }

    #[test]
    fn test_error_body_roundtrip() {
        let body = ErrorBody {
            code: ErrorCode::Forbidden.as_i32(),
            message: "you are muted".to_string(),
            seq: 3,
        };
        assert_eq!(ErrorBody::from_value(&body.to_value()), Some(body));
    }

    #[test]
    fn test_error_envelope_defaults() {
        let env = Envelope::error(ErrorCode::NotInConversation, 9);
        assert_eq!(env.cmd, Command::Error);
        assert_eq!(env.seq, 9);

        let body = ErrorBody::from_value(&env.body).unwrap();
        assert_eq!(body.code, 4002);
        assert_eq!(body.seq, 9);
        assert_eq!(body.message, "not in conversation");
    }

    #[test]
    fn test_event_push_is_server_seq() {
        let event = Event::text(Cid::parse("d:alice:bob").unwrap(), "alice", "hi");
        let env = Envelope::event_push(&event);
        assert_eq!(env.seq, SERVER_SEQ);
        assert_eq!(env.cmd, Command::Event);
    }

    #[test]
    fn test_sync_body_roundtrip() {
        let body = SyncBody {
            cid: "g:team".to_string(),
            last_mid: 10,
            limit: 50,
            before: 0,
            after: 0,
        };
        let back = SyncBody::from_value(&body.to_value()).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn test_sync_body_requires_cid() {
        assert!(SyncBody::from_value(&Value::Map(vec![])).is_err());
        assert!(SyncBody::from_value(&Value::from(1)).is_err());
    }

    #[test]
    fn test_auth_body_roundtrip() {
        let body = AuthBody {
            token: "tok".to_string(),
            device_id: "dev-1".to_string(),
            platform: "ios".to_string(),
        };
        assert_eq!(AuthBody::from_value(&body.to_value()), Some(body));
    }
}
