//! Conversation identifiers
//!
//! A conversation id is either a direct pair (`d:<uid>:<uid>`, members in
//! lexicographic order so the same pair always maps to the same id) or a
//! group (`g:<group-id>`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Prefix for direct (one-to-one) conversations
pub const DIRECT_PREFIX: &str = "d:";

/// Prefix for group conversations
pub const GROUP_PREFIX: &str = "g:";

/// A validated conversation identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(String);

impl Cid {
    /// Build a direct conversation id from a pair of user ids
    ///
    /// The pair is ordered lexicographically, so `direct(a, b)` and
    /// `direct(b, a)` produce the same id.
    ///
    /// # Errors
    /// Returns an error if either uid is empty, contains `:`, or the two
    /// uids are equal.
    pub fn direct(uid_a: &str, uid_b: &str) -> Result<Self, CidError> {
        if uid_a.is_empty() || uid_b.is_empty() {
            return Err(CidError::EmptyMember);
        }
        if uid_a.contains(':') || uid_b.contains(':') {
            return Err(CidError::InvalidMember);
        }
        if uid_a == uid_b {
            return Err(CidError::SelfConversation);
        }

        let (lo, hi) = if uid_a < uid_b {
            (uid_a, uid_b)
        } else {
            (uid_b, uid_a)
        };
        Ok(Self(format!("{DIRECT_PREFIX}{lo}:{hi}")))
    }

    /// Build a group conversation id
    ///
    /// # Errors
    /// Returns an error if the group id is empty.
    pub fn group(group_id: &str) -> Result<Self, CidError> {
        if group_id.is_empty() {
            return Err(CidError::EmptyMember);
        }
        Ok(Self(format!("{GROUP_PREFIX}{group_id}")))
    }

    /// Parse and validate a raw conversation id string
    pub fn parse(raw: &str) -> Result<Self, CidError> {
        if let Some(rest) = raw.strip_prefix(DIRECT_PREFIX) {
            let mut parts = rest.splitn(2, ':');
            let lo = parts.next().unwrap_or_default();
            let hi = parts.next().ok_or(CidError::InvalidShape)?;
            if lo.is_empty() || hi.is_empty() || hi.contains(':') {
                return Err(CidError::InvalidShape);
            }
            if lo >= hi {
                return Err(CidError::UnorderedPair);
            }
            return Ok(Self(raw.to_string()));
        }

        if let Some(group_id) = raw.strip_prefix(GROUP_PREFIX) {
            if group_id.is_empty() {
                return Err(CidError::InvalidShape);
            }
            return Ok(Self(raw.to_string()));
        }

        Err(CidError::UnknownPrefix)
    }

    /// Whether this is a direct conversation
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.0.starts_with(DIRECT_PREFIX)
    }

    /// Whether this is a group conversation
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.0.starts_with(GROUP_PREFIX)
    }

    /// The two member uids of a direct conversation, lexicographic order
    #[must_use]
    pub fn direct_members(&self) -> Option<(&str, &str)> {
        let rest = self.0.strip_prefix(DIRECT_PREFIX)?;
        let mut parts = rest.splitn(2, ':');
        Some((parts.next()?, parts.next()?))
    }

    /// The group id of a group conversation
    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        self.0.strip_prefix(GROUP_PREFIX)
    }

    /// The raw string form
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Cid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Cid {
    type Err = CidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::parse(s)
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

impl Serialize for Cid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Cid::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Errors produced while validating a conversation id
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CidError {
    #[error("conversation id must start with 'd:' or 'g:'")]
    UnknownPrefix,

    #[error("malformed conversation id")]
    InvalidShape,

    #[error("direct conversation members must be in lexicographic order")]
    UnorderedPair,

    #[error("member id is empty")]
    EmptyMember,

    #[error("member id contains reserved characters")]
    InvalidMember,

    #[error("cannot open a conversation with yourself")]
    SelfConversation,
}
