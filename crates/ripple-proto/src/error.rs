//! Wire-stable error codes
//!
//! Numeric codes carried in `error` frames and in JSON-RPC application
//! errors. Values are part of the protocol and must never be renumbered.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Protocol error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Malformed body or missing required fields
    InvalidParam = 1001,
    /// Missing or unusable credentials
    Unauthorized = 1002,
    /// Muted, blocked, or action disallowed
    Forbidden = 1003,
    /// Referenced resource missing
    NotFound = 1004,
    /// Upstream RPC or persistence failure
    Internal = 1005,
    /// Quota exceeded
    RateLimit = 1006,
    /// Token failed signature or claims validation
    InvalidToken = 2001,
    /// Token past its expiry
    TokenExpired = 2002,
    /// Access check failed for the conversation
    NotInConversation = 4002,
    /// Referenced mid does not exist
    MessageNotFound = 5001,
    /// Revoke validation rejected
    CannotRevoke = 5003,
    /// Edit validation rejected
    CannotEdit = 5004,
}

impl ErrorCode {
    /// Raw wire value
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Look up a code from its raw wire value
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1001 => Some(Self::InvalidParam),
            1002 => Some(Self::Unauthorized),
            1003 => Some(Self::Forbidden),
            1004 => Some(Self::NotFound),
            1005 => Some(Self::Internal),
            1006 => Some(Self::RateLimit),
            2001 => Some(Self::InvalidToken),
            2002 => Some(Self::TokenExpired),
            4002 => Some(Self::NotInConversation),
            5001 => Some(Self::MessageNotFound),
            5003 => Some(Self::CannotRevoke),
            5004 => Some(Self::CannotEdit),
            _ => None,
        }
    }

    /// Default human-readable message for this code
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::InvalidParam => "invalid parameter",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Internal => "internal error",
            Self::RateLimit => "rate limit exceeded",
            Self::InvalidToken => "invalid token",
            Self::TokenExpired => "token expired",
            Self::NotInConversation => "not in conversation",
            Self::MessageNotFound => "message not found",
            Self::CannotRevoke => "cannot revoke this message",
            Self::CannotEdit => "cannot edit this message",
        }
    }

    /// Whether the client caused this error (retrying without change is futile)
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        !matches!(self, Self::Internal)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.default_message(), self.as_i32())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = i32::deserialize(deserializer)?;
        Self::from_i32(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown error code: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for code in [
            ErrorCode::InvalidParam,
            ErrorCode::Unauthorized,
            ErrorCode::Forbidden,
            ErrorCode::NotFound,
            ErrorCode::Internal,
            ErrorCode::RateLimit,
            ErrorCode::InvalidToken,
            ErrorCode::TokenExpired,
            ErrorCode::NotInConversation,
            ErrorCode::MessageNotFound,
            ErrorCode::CannotRevoke,
            ErrorCode::CannotEdit,
        ] {
            assert_eq!(ErrorCode::from_i32(code.as_i32()), Some(code));
        }
        assert_eq!(ErrorCode::from_i32(9999), None);
    }

    #[test]
    fn test_wire_values_are_stable() {
        assert_eq!(ErrorCode::InvalidParam.as_i32(), 1001);
        assert_eq!(ErrorCode::Internal.as_i32(), 1005);
        assert_eq!(ErrorCode::NotInConversation.as_i32(), 4002);
        assert_eq!(ErrorCode::MessageNotFound.as_i32(), 5001);
        assert_eq!(ErrorCode::CannotRevoke.as_i32(), 5003);
        assert_eq!(ErrorCode::CannotEdit.as_i32(), 5004);
    }

    #[test]
    fn test_classification() {
        assert!(ErrorCode::CannotRevoke.is_client_error());
        assert!(!ErrorCode::Internal.is_client_error());
    }
}
