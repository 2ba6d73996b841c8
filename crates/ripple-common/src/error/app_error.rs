//! Application error types
//!
//! One error type across the three services, with a stable mapping onto the
//! wire error codes clients see in `error` frames.

use ripple_proto::{ErrorBody, ErrorCode};

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Request errors
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not in conversation")]
    NotInConversation,

    #[error("rate limit exceeded")]
    RateLimit,

    // Message errors
    #[error("message {0} not found")]
    MessageNotFound(i64),

    #[error("cannot revoke: {0}")]
    CannotRevoke(String),

    #[error("cannot edit: {0}")]
    CannotEdit(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    // Infrastructure errors
    #[error("database error: {0}")]
    Database(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),

    // Protocol errors
    #[error(transparent)]
    Codec(#[from] ripple_proto::CodecError),
}

impl AppError {
    /// The wire code carried in client-facing `error` frames
    #[must_use]
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            Self::InvalidParam(_) | Self::Codec(_) => ErrorCode::InvalidParam,
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::InvalidToken => ErrorCode::InvalidToken,
            Self::TokenExpired => ErrorCode::TokenExpired,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::NotInConversation => ErrorCode::NotInConversation,
            Self::RateLimit => ErrorCode::RateLimit,
            Self::MessageNotFound(_) => ErrorCode::MessageNotFound,
            Self::CannotRevoke(_) => ErrorCode::CannotRevoke,
            Self::CannotEdit(_) => ErrorCode::CannotEdit,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Database(_)
            | Self::Cache(_)
            | Self::Rpc(_)
            | Self::Config(_)
            | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Client-facing message
    ///
    /// Infrastructure details never cross the wire; those errors collapse
    /// to the code's default message and are logged server-side instead.
    #[must_use]
    pub fn wire_message(&self) -> String {
        match self {
            Self::Forbidden(reason) | Self::CannotRevoke(reason) | Self::CannotEdit(reason) => {
                reason.clone()
            }
            Self::InvalidParam(msg) => msg.clone(),
            Self::Codec(e) => e.to_string(),
            other => other.wire_code().default_message().to_string(),
        }
    }

    /// The `error` frame body answering request `seq`
    #[must_use]
    pub fn error_body(&self, seq: i64) -> ErrorBody {
        ErrorBody {
            code: self.wire_code().as_i32(),
            message: self.wire_message(),
            seq,
        }
    }

    /// Whether the client caused this error
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.wire_code().is_client_error()
    }

    /// Create an invalid-parameter error
    #[must_use]
    pub fn invalid_param(msg: impl std::fmt::Display) -> Self {
        Self::InvalidParam(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(AppError::Unauthorized.wire_code(), ErrorCode::Unauthorized);
        assert_eq!(
            AppError::NotInConversation.wire_code(),
            ErrorCode::NotInConversation
        );
        assert_eq!(
            AppError::CannotRevoke("revoke window exceeded".to_string()).wire_code(),
            ErrorCode::CannotRevoke
        );
        assert_eq!(
            AppError::Database("connection refused".to_string()).wire_code(),
            ErrorCode::Internal
        );
        assert_eq!(
            AppError::MessageNotFound(5).wire_code(),
            ErrorCode::MessageNotFound
        );
    }

    #[test]
    fn test_infrastructure_details_do_not_leak() {
        let err = AppError::Database("password authentication failed".to_string());
        assert_eq!(err.wire_message(), "internal error");

        let err = AppError::Rpc("connect timeout to 10.0.0.3".to_string());
        assert_eq!(err.wire_message(), "internal error");
    }

    #[test]
    fn test_validation_reasons_cross_the_wire() {
        let err = AppError::CannotEdit("edit window exceeded".to_string());
        assert_eq!(err.wire_message(), "edit window exceeded");

        let err = AppError::Forbidden("you are muted".to_string());
        assert_eq!(err.wire_message(), "you are muted");
    }

    #[test]
    fn test_error_body() {
        let body = AppError::NotInConversation.error_body(9);
        assert_eq!(body.code, 4002);
        assert_eq!(body.seq, 9);
    }

    #[test]
    fn test_classification() {
        assert!(AppError::InvalidParam("x".to_string()).is_client_error());
        assert!(!AppError::Cache("down".to_string()).is_client_error());
    }
}
