//! Event tags
//!
//! A tag is a `(type, value)` record attached to an event: reply references,
//! mentions, the target of a revoke/edit/reaction, and forward provenance.
//! Unknown tag types survive decode and re-encode untouched.

use rmpv::Value;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Tag type: reply reference, value is a mid
pub const TAG_REPLY: i64 = 1;
/// Tag type: mention, value is a uid or `"all"`
pub const TAG_MENTION: i64 = 2;
/// Tag type: target message of a revoke/edit/reaction, value is a mid
pub const TAG_TARGET: i64 = 6;
/// Tag type: forward source conversation, value is a cid
pub const TAG_FORWARD_CID: i64 = 8;
/// Tag type: forward source message, value is a mid
pub const TAG_FORWARD_MID: i64 = 9;

/// Sentinel mention value addressing every member
pub const MENTION_ALL: &str = "all";

/// A typed tag record
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    /// Reply to an earlier message
    Reply(i64),
    /// Mention of a member (or [`MENTION_ALL`])
    Mention(String),
    /// Target of a revoke, edit, or reaction
    Target(i64),
    /// Conversation a forward originated from
    ForwardCid(String),
    /// Message a forward originated from
    ForwardMid(i64),
    /// Tag type this decoder does not know; preserved verbatim
    Other { tag_type: i64, value: Value },
}

impl Tag {
    /// Mention addressed to every member of the conversation
    #[must_use]
    pub fn mention_all() -> Self {
        Self::Mention(MENTION_ALL.to_string())
    }

    /// Wire tag type
    #[must_use]
    pub fn tag_type(&self) -> i64 {
        match self {
            Self::Reply(_) => TAG_REPLY,
            Self::Mention(_) => TAG_MENTION,
            Self::Target(_) => TAG_TARGET,
            Self::ForwardCid(_) => TAG_FORWARD_CID,
            Self::ForwardMid(_) => TAG_FORWARD_MID,
            Self::Other { tag_type, .. } => *tag_type,
        }
    }

    /// Wire value
    #[must_use]
    pub fn value(&self) -> Value {
        match self {
            Self::Reply(mid) | Self::Target(mid) | Self::ForwardMid(mid) => Value::from(*mid),
            Self::Mention(uid) => Value::from(uid.as_str()),
            Self::ForwardCid(cid) => Value::from(cid.as_str()),
            Self::Other { value, .. } => value.clone(),
        }
    }

    /// MsgPack form: a map `{0: type, 1: value}`
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            (Value::from(0u8), Value::from(self.tag_type())),
            (Value::from(1u8), self.value()),
        ])
    }

    /// Parse the MsgPack map form; `None` when the shape is not a tag map
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let entries = value.as_map()?;
        let mut tag_type = None;
        let mut tag_value = Value::Nil;
        for (key, val) in entries {
            match key.as_u64() {
                Some(0) => tag_type = val.as_i64(),
                Some(1) => tag_value = val.clone(),
                _ => {}
            }
        }
        Some(Self::from_parts(tag_type?, tag_value))
    }

    /// Assemble a tag from its wire `(type, value)` pair
    #[must_use]
    pub fn from_parts(tag_type: i64, value: Value) -> Self {
        match (tag_type, &value) {
            (TAG_REPLY, v) if v.as_i64().is_some() => Self::Reply(v.as_i64().unwrap_or(0)),
            (TAG_TARGET, v) if v.as_i64().is_some() => Self::Target(v.as_i64().unwrap_or(0)),
            (TAG_FORWARD_MID, v) if v.as_i64().is_some() => {
                Self::ForwardMid(v.as_i64().unwrap_or(0))
            }
            (TAG_MENTION, Value::String(s)) => {
                Self::Mention(s.as_str().unwrap_or_default().to_string())
            }
            (TAG_FORWARD_CID, Value::String(s)) => {
                Self::ForwardCid(s.as_str().unwrap_or_default().to_string())
            }
            _ => Self::Other { tag_type, value },
        }
    }
}

// JSON shape: {"type": <i64>, "value": <any>}
#[derive(Serialize, Deserialize)]
struct TagWire {
    #[serde(rename = "type")]
    tag_type: i64,
    value: Value,
}

impl Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        TagWire {
            tag_type: self.tag_type(),
            value: self.value(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = TagWire::deserialize(deserializer)?;
        if wire.tag_type < 0 {
            return Err(D::Error::custom("negative tag type"));
        }
        Ok(Tag::from_parts(wire.tag_type, wire.value))
    }
}

/// First target mid among the tags, if any
#[must_use]
pub fn target_mid(tags: &[Tag]) -> Option<i64> {
    tags.iter().find_map(|t| match t {
        Tag::Target(mid) => Some(*mid),
        _ => None,
    })
}

/// First reply mid among the tags, if any
#[must_use]
pub fn reply_mid(tags: &[Tag]) -> Option<i64> {
    tags.iter().find_map(|t| match t {
        Tag::Reply(mid) => Some(*mid),
        _ => None,
    })
}

/// All mentioned uids, excluding the mention-all sentinel
#[must_use]
pub fn mentions(tags: &[Tag]) -> Vec<&str> {
    tags.iter()
        .filter_map(|t| match t {
            Tag::Mention(uid) if uid != MENTION_ALL => Some(uid.as_str()),
            _ => None,
        })
        .collect()
}

/// Whether the tags mention every member of the conversation
#[must_use]
pub fn mentions_all(tags: &[Tag]) -> bool {
    tags.iter()
        .any(|t| matches!(t, Tag::Mention(uid) if uid == MENTION_ALL))
}

/// Forward provenance: `(source cid, source mid)`
#[must_use]
pub fn forward_source(tags: &[Tag]) -> (Option<&str>, Option<i64>) {
    let cid = tags.iter().find_map(|t| match t {
        Tag::ForwardCid(cid) => Some(cid.as_str()),
        _ => None,
    });
    let mid = tags.iter().find_map(|t| match t {
        Tag::ForwardMid(mid) => Some(*mid),
        _ => None,
    });
    (cid, mid)
}
