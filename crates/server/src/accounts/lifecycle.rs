//! Transition rules of the account state machine.
//!
//! ```text
//!   pending ──approve──▶ approved ──approve / set_role──▶ approved
//!      │
//!      └──reject──▶ rejected   (terminal)
//! ```
//!
//! Role and status are separate columns but the policy couples them: only an
//! approved account holds `user` or `admin`; everyone else holds `pending`.

use crate::entity::user::{AccountStatus, Role};
use crate::error::AuthError;

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether an account in this state may be issued a session credential.
    pub fn may_hold_session(&self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Approving is allowed from pending, and again from approved (re-approval).
    pub fn check_approve(&self) -> Result<(), AuthError> {
        match self {
            Self::Pending | Self::Approved => Ok(()),
            Self::Rejected => Err(self.transition_error("approve")),
        }
    }

    pub fn check_reject(&self) -> Result<(), AuthError> {
        match self {
            Self::Pending => Ok(()),
            Self::Approved | Self::Rejected => Err(self.transition_error("reject")),
        }
    }

    pub fn check_role_change(&self) -> Result<(), AuthError> {
        match self {
            Self::Approved => Ok(()),
            Self::Pending | Self::Rejected => Err(AuthError::AccountNotApproved),
        }
    }

    fn transition_error(&self, action: &'static str) -> AuthError {
        AuthError::InvalidStatusTransition {
            action,
            from: self.as_str().to_string(),
        }
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Parse a role an administrator may grant. `pending` is not grantable.
    pub fn assignable(value: &str) -> Result<Self, AuthError> {
        match value {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(AuthError::InvalidRoleValue(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
