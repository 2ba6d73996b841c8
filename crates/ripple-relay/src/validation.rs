//! Revoke and edit policy
//!
//! Stateless checks against an already-loaded target event. The RPC layer
//! does the lookup; these functions decide. An invalid outcome is a client
//! error, never an upstream failure.

use crate::models::StoredEvent;
use ripple_proto::rpc::ValidationOutcome;
use ripple_proto::EventKind;

/// Seconds a sender may revoke their own message; admins are exempt
pub const REVOKE_WINDOW_SECS: i64 = 120;

/// Seconds a sender may edit their own text message
pub const EDIT_WINDOW_SECS: i64 = 86_400;

/// Decide whether `uid` may revoke the target message
pub fn check_revoke(
    target: Option<&StoredEvent>,
    cid: &str,
    uid: &str,
    is_admin: bool,
    now: i64,
) -> ValidationOutcome {
    let Some(target) = target else {
        return ValidationOutcome::invalid("message not found");
    };

    if target.cid != cid {
        return ValidationOutcome::invalid("not in this conversation");
    }

    if target.sender != uid && !is_admin {
        return ValidationOutcome::invalid("no permission");
    }

    if now - target.timestamp > REVOKE_WINDOW_SECS && !is_admin {
        return ValidationOutcome::invalid("revoke window exceeded");
    }

    ValidationOutcome::valid()
}

/// Decide whether `uid` may edit the target message
pub fn check_edit(
    target: Option<&StoredEvent>,
    cid: &str,
    uid: &str,
    now: i64,
) -> ValidationOutcome {
    let Some(target) = target else {
        return ValidationOutcome::invalid("message not found");
    };

    if target.cid != cid {
        return ValidationOutcome::invalid("not in this conversation");
    }

    if target.sender != uid {
        return ValidationOutcome::invalid("not your message");
    }

    if target.kind != EventKind::Text.as_i32() {
        return ValidationOutcome::invalid("only text editable");
    }

    if now - target.timestamp > EDIT_WINDOW_SECS {
        return ValidationOutcome::invalid("edit window exceeded");
    }

    ValidationOutcome::valid()
}
