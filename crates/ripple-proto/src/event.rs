//! Conversation events
//!
//! The in-memory event holds a typed body per kind; the integer-keyed `data`
//! map is purely an on-wire layout. Kinds this decoder does not know flow
//! through untouched as [`EventBody::Other`], so a newer peer's events still
//! persist and fan out.

use crate::cid::Cid;
use crate::codec::CodecError;
use crate::tags::{self, Tag};
use rmpv::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Current event schema version
pub const EVENT_VERSION: u32 = 1;

/// Reaction action: add the emoji
pub const REACTION_ADD: i64 = 1;
/// Reaction action: remove the emoji
pub const REACTION_REMOVE: i64 = 2;

/// Forward type: a single message
pub const FORWARD_SINGLE: i64 = 1;
/// Forward type: a merged bundle of messages
pub const FORWARD_MERGE: i64 = 2;

/// Known event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EventKind {
    Text = 1,
    File = 3,
    Revoke = 5,
    Edit = 7,
    ReadReceipt = 10,
    Typing = 11,
    Reaction = 12,
    Forward = 13,
}

impl EventKind {
    /// Raw wire value
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Look up a kind from its raw wire value
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Text),
            3 => Some(Self::File),
            5 => Some(Self::Revoke),
            7 => Some(Self::Edit),
            10 => Some(Self::ReadReceipt),
            11 => Some(Self::Typing),
            12 => Some(Self::Reaction),
            13 => Some(Self::Forward),
            _ => None,
        }
    }

    /// Name used in logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
            Self::Revoke => "revoke",
            Self::Edit => "edit",
            Self::ReadReceipt => "read_receipt",
            Self::Typing => "typing",
            Self::Reaction => "reaction",
            Self::Forward => "forward",
        }
    }

    /// Whether events of this kind are persisted by the relay
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        !matches!(self, Self::Typing)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed event payload, one variant per kind
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    /// Plain text message
    Text { content: String },
    /// File attachment descriptor (the blob lives in object storage)
    File {
        fid: String,
        name: String,
        size: i64,
        mime: String,
        sha256: String,
        url: String,
    },
    /// Revocation of an earlier message (target carried as a tag)
    Revoke { scope: i64, reason: String },
    /// Edit of an earlier text message (target carried as a tag)
    Edit { content: String, revision: i64 },
    /// Read progress marker
    ReadReceipt { last_read_mid: i64 },
    /// Typing indicator; never persisted
    Typing { state: i64 },
    /// Emoji reaction on a target message
    Reaction { emoji: String, action: i64 },
    /// Forwarded content with an opaque snapshot
    Forward { forward_type: i64, snapshot: Value },
    /// A kind this decoder does not know; data preserved verbatim
    Other { kind: i32, data: BTreeMap<u32, Value> },
}

impl EventBody {
    /// Wire kind of this body
    #[must_use]
    pub fn kind_code(&self) -> i32 {
        match self {
            Self::Text { .. } => EventKind::Text.as_i32(),
            Self::File { .. } => EventKind::File.as_i32(),
            Self::Revoke { .. } => EventKind::Revoke.as_i32(),
            Self::Edit { .. } => EventKind::Edit.as_i32(),
            Self::ReadReceipt { .. } => EventKind::ReadReceipt.as_i32(),
            Self::Typing { .. } => EventKind::Typing.as_i32(),
            Self::Reaction { .. } => EventKind::Reaction.as_i32(),
            Self::Forward { .. } => EventKind::Forward.as_i32(),
            Self::Other { kind, .. } => *kind,
        }
    }

    /// Typed kind, when known
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_i32(self.kind_code())
    }

    /// On-wire `data` map for this body
    #[must_use]
    pub fn to_data(&self) -> BTreeMap<u32, Value> {
        let mut data = BTreeMap::new();
        match self {
            Self::Text { content } => {
                data.insert(0, Value::from(content.as_str()));
            }
            Self::File {
                fid,
                name,
                size,
                mime,
                sha256,
                url,
            } => {
                data.insert(0, Value::from(fid.as_str()));
                data.insert(1, Value::from(name.as_str()));
                data.insert(2, Value::from(*size));
                data.insert(3, Value::from(mime.as_str()));
                data.insert(4, Value::from(sha256.as_str()));
                data.insert(5, Value::from(url.as_str()));
            }
            Self::Revoke { scope, reason } => {
                data.insert(0, Value::from(*scope));
                data.insert(1, Value::from(reason.as_str()));
            }
            Self::Edit { content, revision } => {
                data.insert(0, Value::from(content.as_str()));
                data.insert(1, Value::from(*revision));
            }
            Self::ReadReceipt { last_read_mid } => {
                data.insert(0, Value::from(*last_read_mid));
            }
            Self::Typing { state } => {
                data.insert(0, Value::from(*state));
            }
            Self::Reaction { emoji, action } => {
                data.insert(0, Value::from(emoji.as_str()));
                data.insert(1, Value::from(*action));
            }
            Self::Forward {
                forward_type,
                snapshot,
            } => {
                data.insert(0, Value::from(*forward_type));
                data.insert(1, snapshot.clone());
            }
            Self::Other { data: raw, .. } => {
                data.clone_from(raw);
            }
        }
        data
    }

    /// Rebuild a body from a wire kind and `data` map
    ///
    /// Decoding is lenient: a missing or mistyped entry becomes its default.
    /// The dispatcher enforces shape where it matters.
    #[must_use]
    pub fn from_data(kind: i32, data: BTreeMap<u32, Value>) -> Self {
        let text = |idx: u32| -> String {
            data.get(&idx)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let int = |idx: u32| -> i64 { data.get(&idx).and_then(Value::as_i64).unwrap_or_default() };

        match EventKind::from_i32(kind) {
            Some(EventKind::Text) => Self::Text { content: text(0) },
            Some(EventKind::File) => Self::File {
                fid: text(0),
                name: text(1),
                size: int(2),
                mime: text(3),
                sha256: text(4),
                url: text(5),
            },
            Some(EventKind::Revoke) => Self::Revoke {
                scope: int(0),
                reason: text(1),
            },
            Some(EventKind::Edit) => Self::Edit {
                content: text(0),
                revision: int(1),
            },
            Some(EventKind::ReadReceipt) => Self::ReadReceipt {
                last_read_mid: int(0),
            },
            Some(EventKind::Typing) => Self::Typing { state: int(0) },
            Some(EventKind::Reaction) => Self::Reaction {
                emoji: text(0),
                action: int(1),
            },
            Some(EventKind::Forward) => Self::Forward {
                forward_type: int(0),
                snapshot: data.get(&1).cloned().unwrap_or(Value::Nil),
            },
            None => Self::Other { kind, data },
        }
    }
}

/// A conversation event
///
/// `mid` and `timestamp` are 0 until the relay assigns them at persistence
/// time; `sender` is overwritten by the gateway from the authenticated
/// session, never trusted from the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub version: u32,
    pub cid: Cid,
    pub mid: i64,
    pub timestamp: i64,
    pub flags: u32,
    pub tags: Vec<Tag>,
    pub body: EventBody,
    pub sig: Option<String>,
    pub sender: String,
}

impl Event {
    /// Create an event with an unassigned mid and timestamp
    #[must_use]
    pub fn new(cid: Cid, sender: impl Into<String>, body: EventBody) -> Self {
        Self {
            version: EVENT_VERSION,
            cid,
            mid: 0,
            timestamp: 0,
            flags: 0,
            tags: Vec::new(),
            body,
            sig: None,
            sender: sender.into(),
        }
    }

    /// Text message
    #[must_use]
    pub fn text(cid: Cid, sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(
            cid,
            sender,
            EventBody::Text {
                content: content.into(),
            },
        )
    }

    /// Revocation of `target_mid`
    #[must_use]
    pub fn revoke(
        cid: Cid,
        sender: impl Into<String>,
        target_mid: i64,
        scope: i64,
        reason: impl Into<String>,
    ) -> Self {
        let mut event = Self::new(
            cid,
            sender,
            EventBody::Revoke {
                scope,
                reason: reason.into(),
            },
        );
        event.tags.push(Tag::Target(target_mid));
        event
    }

    /// Edit of `target_mid`
    #[must_use]
    pub fn edit(
        cid: Cid,
        sender: impl Into<String>,
        target_mid: i64,
        content: impl Into<String>,
        revision: i64,
    ) -> Self {
        let mut event = Self::new(
            cid,
            sender,
            EventBody::Edit {
                content: content.into(),
                revision,
            },
        );
        event.tags.push(Tag::Target(target_mid));
        event
    }

    /// Read progress marker
    #[must_use]
    pub fn read_receipt(cid: Cid, sender: impl Into<String>, last_read_mid: i64) -> Self {
        Self::new(cid, sender, EventBody::ReadReceipt { last_read_mid })
    }

    /// Typing indicator
    #[must_use]
    pub fn typing(cid: Cid, sender: impl Into<String>, state: i64) -> Self {
        Self::new(cid, sender, EventBody::Typing { state })
    }

    /// Reaction on `target_mid`
    #[must_use]
    pub fn reaction(
        cid: Cid,
        sender: impl Into<String>,
        target_mid: i64,
        emoji: impl Into<String>,
        action: i64,
    ) -> Self {
        let mut event = Self::new(
            cid,
            sender,
            EventBody::Reaction {
                emoji: emoji.into(),
                action,
            },
        );
        event.tags.push(Tag::Target(target_mid));
        event
    }

    /// Forward from another conversation
    ///
    /// Single-message forwards also carry the source mid.
    #[must_use]
    pub fn forward(
        cid: Cid,
        sender: impl Into<String>,
        source_cid: impl Into<String>,
        source_mid: i64,
        forward_type: i64,
        snapshot: Value,
    ) -> Self {
        let mut event = Self::new(
            cid,
            sender,
            EventBody::Forward {
                forward_type,
                snapshot,
            },
        );
        event.tags.push(Tag::ForwardCid(source_cid.into()));
        if forward_type == FORWARD_SINGLE {
            event.tags.push(Tag::ForwardMid(source_mid));
        }
        event
    }

    /// Attach a reply reference
    #[must_use]
    pub fn with_reply(mut self, mid: i64) -> Self {
        self.tags.push(Tag::Reply(mid));
        self
    }

    /// Attach a mention
    #[must_use]
    pub fn with_mention(mut self, uid: impl Into<String>) -> Self {
        self.tags.push(Tag::Mention(uid.into()));
        self
    }

    /// Attach a mention of every member
    #[must_use]
    pub fn with_mention_all(mut self) -> Self {
        self.tags.push(Tag::mention_all());
        self
    }

    /// Wire kind
    #[must_use]
    pub fn kind_code(&self) -> i32 {
        self.body.kind_code()
    }

    /// Typed kind, when known
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        self.body.kind()
    }

    /// Target mid from the tags, if present
    #[must_use]
    pub fn target_mid(&self) -> Option<i64> {
        tags::target_mid(&self.tags)
    }

    /// MsgPack form: a map with integer keys
    #[must_use]
    pub fn to_value(&self) -> Value {
        let data: Vec<(Value, Value)> = self
            .body
            .to_data()
            .into_iter()
            .map(|(k, v)| (Value::from(k), v))
            .collect();
        let tags: Vec<Value> = self.tags.iter().map(Tag::to_value).collect();

        let mut entries = vec![
            (Value::from(0u8), Value::from(self.version)),
            (Value::from(1u8), Value::from(self.cid.as_str())),
            (Value::from(2u8), Value::from(self.kind_code())),
            (Value::from(3u8), Value::from(self.mid)),
            (Value::from(4u8), Value::from(self.timestamp)),
            (Value::from(5u8), Value::from(self.flags)),
            (Value::from(6u8), Value::Array(tags)),
            (Value::from(7u8), Value::Map(data)),
        ];
        if let Some(sig) = &self.sig {
            entries.push((Value::from(8u8), Value::from(sig.as_str())));
        }
        entries.push((Value::from(9u8), Value::from(self.sender.as_str())));

        Value::Map(entries)
    }

    /// Parse the MsgPack map form
    ///
    /// Unknown keys are skipped; `cid` and `kind` are required.
    pub fn from_value(value: &Value) -> Result<Self, CodecError> {
        let entries = value
            .as_map()
            .ok_or_else(|| CodecError::decode("event is not a map"))?;

        let mut version = EVENT_VERSION;
        let mut cid = None;
        let mut kind = None;
        let mut mid = 0;
        let mut timestamp = 0;
        let mut flags = 0;
        let mut tags = Vec::new();
        let mut data = BTreeMap::new();
        let mut sig = None;
        let mut sender = String::new();

        for (key, val) in entries {
            match key.as_u64() {
                Some(0) => version = val.as_u64().unwrap_or(u64::from(EVENT_VERSION)) as u32,
                Some(1) => {
                    let raw = val
                        .as_str()
                        .ok_or_else(|| CodecError::decode("event cid is not a string"))?;
                    cid = Some(Cid::parse(raw).map_err(|e| CodecError::decode(e.to_string()))?);
                }
                Some(2) => {
                    kind = Some(
                        val.as_i64()
                            .ok_or_else(|| CodecError::decode("event kind is not an integer"))?
                            as i32,
                    );
                }
                Some(3) => mid = val.as_i64().unwrap_or_default(),
                Some(4) => timestamp = val.as_i64().unwrap_or_default(),
                Some(5) => flags = val.as_u64().unwrap_or_default() as u32,
                Some(6) => {
                    let items = val
                        .as_array()
                        .ok_or_else(|| CodecError::decode("event tags is not an array"))?;
                    tags = items.iter().filter_map(Tag::from_value).collect();
                }
                Some(7) => {
                    let map = val
                        .as_map()
                        .ok_or_else(|| CodecError::decode("event data is not a map"))?;
                    for (dk, dv) in map {
                        if let Some(idx) = dk.as_u64() {
                            data.insert(idx as u32, dv.clone());
                        }
                    }
                }
                Some(8) => sig = val.as_str().map(str::to_string),
                Some(9) => sender = val.as_str().unwrap_or_default().to_string(),
                _ => {}
            }
        }

        let cid = cid.ok_or_else(|| CodecError::decode("event is missing cid"))?;
        let kind = kind.ok_or_else(|| CodecError::decode("event is missing kind"))?;

        Ok(Self {
            version,
            cid,
            mid,
            timestamp,
            flags,
            tags,
            body: EventBody::from_data(kind, data),
            sig,
            sender,
        })
    }
}

// JSON shape for the RPC transport: named keys.
#[derive(Serialize, Deserialize)]
struct EventJson {
    #[serde(rename = "ev_v", default = "default_version")]
    version: u32,
    cid: Cid,
    #[serde(rename = "k")]
    kind: i32,
    #[serde(default)]
    mid: i64,
    #[serde(rename = "t", default)]
    timestamp: i64,
    #[serde(rename = "flg", default)]
    flags: u32,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    data: BTreeMap<u32, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sig: Option<String>,
    #[serde(default)]
    sender: String,
}

fn default_version() -> u32 {
    EVENT_VERSION
}

impl Serialize for Event {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        EventJson {
            version: self.version,
            cid: self.cid.clone(),
            kind: self.kind_code(),
            mid: self.mid,
            timestamp: self.timestamp,
            flags: self.flags,
            tags: self.tags.clone(),
            data: self.body.to_data(),
            sig: self.sig.clone(),
            sender: self.sender.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = EventJson::deserialize(deserializer)?;
        Ok(Self {
            version: wire.version,
            cid: wire.cid,
            mid: wire.mid,
            timestamp: wire.timestamp,
            flags: wire.flags,
            tags: wire.tags,
            body: EventBody::from_data(wire.kind, wire.data),
            sig: wire.sig,
            sender: wire.sender,
        })
    }
}
