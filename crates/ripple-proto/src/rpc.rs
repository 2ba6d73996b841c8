//! Inter-service JSON-RPC surface
//!
//! JSON-RPC 2.0 envelope plus the typed request/response shapes exchanged
//! between the gateway, relay, and directory. This is the only place the
//! protocol maps to JSON; the realtime channel stays binary.

use crate::event::Event;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// JSON-RPC protocol marker
pub const JSONRPC_VERSION: &str = "2.0";

/// Reserved error code: malformed JSON
pub const RPC_PARSE_ERROR: i32 = -32700;
/// Reserved error code: not a valid request object
pub const RPC_INVALID_REQUEST: i32 = -32600;
/// Reserved error code: unknown method
pub const RPC_METHOD_NOT_FOUND: i32 = -32601;
/// Reserved error code: params did not match the method
pub const RPC_INVALID_PARAMS: i32 = -32602;
/// Reserved error code: application-level failure
pub const RPC_APP_ERROR: i32 = -32000;

/// RPC method names
pub mod methods {
    pub const RELAY_STORE_EVENT: &str = "relay.storeEvent";
    pub const RELAY_GET_EVENT: &str = "relay.getEvent";
    pub const RELAY_QUERY_EVENTS: &str = "relay.queryEvents";
    pub const RELAY_SYNC_EVENTS: &str = "relay.syncEvents";
    pub const RELAY_UPDATE_READ_RECEIPT: &str = "relay.updateReadReceipt";
    pub const RELAY_GET_READ_RECEIPTS: &str = "relay.getReadReceipts";
    pub const RELAY_ADD_REACTION: &str = "relay.addReaction";
    pub const RELAY_REMOVE_REACTION: &str = "relay.removeReaction";
    pub const RELAY_REACTION_SUMMARY: &str = "relay.reactionSummary";
    pub const RELAY_VALIDATE_REVOKE: &str = "relay.validateRevoke";
    pub const RELAY_VALIDATE_EDIT: &str = "relay.validateEdit";

    // The directory keeps its historical wire prefix.
    pub const DIRECTORY_CHECK_ACCESS: &str = "seaking.checkAccess";
    pub const DIRECTORY_GET_CONVERSATION: &str = "seaking.getConversation";
    pub const DIRECTORY_GET_CONVERSATION_MEMBERS: &str = "seaking.getConversationMembers";
    pub const DIRECTORY_CREATE_CONVERSATION: &str = "seaking.createConversation";
    pub const DIRECTORY_VALIDATE_TOKEN: &str = "seaking.validateToken";
}

/// JSON-RPC request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub id: String,
}

impl RpcRequest {
    /// Build a request with serialized params
    ///
    /// # Errors
    /// Returns an error if the params fail to serialize.
    pub fn new<P: Serialize>(
        method: &str,
        params: &P,
        id: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params: Some(serde_json::to_value(params)?),
            id: id.into(),
        })
    }
}

/// JSON-RPC response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub id: String,
}

impl RpcResponse {
    /// Successful response
    #[must_use]
    pub fn success(result: serde_json::Value, id: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id: id.into(),
        }
    }

    /// Failed response
    #[must_use]
    pub fn failure(code: i32, message: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id: id.into(),
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("rpc error [{code}]: {message}")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Relay methods
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEventParams {
    pub event: Event,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StoreEventResponse {
    pub mid: i64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetEventParams {
    pub mid: i64,
}

/// An event as the relay stores it: tags and data are opaque JSON blobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEventData {
    pub mid: i64,
    pub cid: String,
    pub kind: i32,
    pub sender: String,
    pub tags: String,
    pub data: String,
    #[serde(default)]
    pub flags: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryEventsParams {
    pub cid: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub last_mid: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub before: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub after: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<i32>,
    #[serde(default)]
    pub limit: u32,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEventsParams {
    pub cid: String,
    #[serde(default)]
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<StoredEventData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReadReceiptParams {
    pub cid: String,
    pub uid: String,
    pub last_read_mid: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceiptsParams {
    pub cid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceiptData {
    pub cid: String,
    pub uid: String,
    pub last_read_mid: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadReceiptsResponse {
    pub receipts: Vec<ReadReceiptData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddReactionParams {
    pub mid: i64,
    pub cid: String,
    pub uid: String,
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveReactionParams {
    pub mid: i64,
    pub uid: String,
    pub emoji: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReactionSummaryParams {
    pub mid: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactionSummaryResponse {
    pub summary: BTreeMap<String, i64>,
}

/// Generic success acknowledgement
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OkResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRevokeParams {
    pub cid: String,
    pub uid: String,
    pub target_mid: i64,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateEditParams {
    pub cid: String,
    pub uid: String,
    pub target_mid: i64,
}

/// Outcome of a revoke/edit validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationOutcome {
    #[must_use]
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Directory methods
// ---------------------------------------------------------------------------

/// Membership role within a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(i32)]
pub enum Role {
    #[default]
    Member = 0,
    Admin = 1,
    Owner = 2,
}

impl Role {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Member),
            1 => Some(Self::Admin),
            2 => Some(Self::Owner),
            _ => None,
        }
    }

    /// Admins and owners can moderate
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }
}

impl Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = i32::deserialize(deserializer)?;
        Self::from_i32(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown role: {value}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAccessParams {
    pub uid: String,
    pub cid: String,
}

/// Authorization decision for `(uid, cid)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub has_access: bool,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub muted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AccessDecision {
    #[must_use]
    pub fn granted(role: Role, muted: bool) -> Self {
        Self {
            has_access: true,
            role,
            muted,
            reason: None,
        }
    }

    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            has_access: false,
            role: Role::Member,
            muted: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetConversationParams {
    pub cid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub cid: String,
    #[serde(rename = "type")]
    pub conv_type: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetConversationMembersParams {
    pub cid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub uid: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembersResponse {
    pub members: Vec<MemberInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConversationParams {
    /// 1 = direct, 2 = group
    #[serde(rename = "type")]
    pub conv_type: i32,
    pub creator_id: String,
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConversationResponse {
    pub cid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateTokenParams {
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenInfo {
    pub valid: bool,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub platform: String,
}
