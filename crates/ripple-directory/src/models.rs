//! Directory models

use chrono::{DateTime, Utc};

/// Conversation type: direct pair
pub const CONV_TYPE_DIRECT: i32 = 1;
/// Conversation type: group
pub const CONV_TYPE_GROUP: i32 = 2;

/// A conversation
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Conversation {
    /// The cid (`d:...` or `g:...`)
    pub id: String,
    pub conv_type: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Membership of one user in one conversation
///
/// Role and mute state are authorization inputs; the gateway asks for them
/// on every frame.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ConversationMember {
    pub conversation_id: String,
    pub uid: String,
    pub role: i32,
    pub muted: bool,
    pub joined_at: DateTime<Utc>,
}
