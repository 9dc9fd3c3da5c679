//! Error kinds for the authentication and approval flow.
//!
//! Every variant is terminal for the request that produced it. The HTTP
//! rendering carries a machine-readable `error` kind plus a description that
//! never includes signing material, provider response bodies or database
//! details; those go to the log instead.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing state parameter")]
    MissingState,
    #[error("invalid or expired state")]
    InvalidOrExpiredState,
    #[error("missing authorization code")]
    MissingCode,
    #[error("authorization code exchange failed: {0}")]
    CodeExchangeFailed(String),
    #[error("identity exchange was cancelled")]
    ExchangeCancelled,
    #[error("failed to fetch provider profile: {0}")]
    ProfileFetchFailed(String),
    #[error("malformed provider profile: {0}")]
    MalformedProfile(String),
    #[error("missing Authorization header")]
    MissingCredential,
    #[error("Authorization header must use the Bearer scheme")]
    MalformedAuthorizationHeader,
    #[error("session credential is malformed")]
    MalformedCredential,
    #[error("session credential signature is invalid")]
    CredentialSignatureInvalid,
    #[error("session credential has expired")]
    CredentialExpired,
    #[error("session credential uses an unsupported signing algorithm")]
    CredentialAlgorithmMismatch,
    #[error("failed to issue session credential: {0}")]
    CredentialIssueFailed(String),
    #[error("secure random source unavailable: {0}")]
    RandomnessUnavailable(String),
    #[error("administrator role required")]
    InsufficientRole,
    #[error("account is not approved")]
    AccountNotApproved,
    #[error("invalid role '{0}', must be 'user' or 'admin'")]
    InvalidRoleValue(String),
    #[error("cannot {action} an account that is {from}")]
    InvalidStatusTransition { action: &'static str, from: String },
    #[error("account not found")]
    AccountNotFound,
    #[error("email address is already used by another account")]
    EmailInUse,
    #[error("storage error: {0}")]
    Storage(#[from] sea_orm::DbErr),
}

impl AuthError {
    /// Stable snake_case identifier sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingState => "missing_state",
            Self::InvalidOrExpiredState => "invalid_or_expired_state",
            Self::MissingCode => "missing_code",
            Self::CodeExchangeFailed(_) => "code_exchange_failed",
            Self::ExchangeCancelled => "exchange_cancelled",
            Self::ProfileFetchFailed(_) => "profile_fetch_failed",
            Self::MalformedProfile(_) => "malformed_profile",
            Self::MissingCredential => "missing_credential",
            Self::MalformedAuthorizationHeader => "malformed_authorization_header",
            Self::MalformedCredential => "malformed_credential",
            Self::CredentialSignatureInvalid => "credential_signature_invalid",
            Self::CredentialExpired => "credential_expired",
            Self::CredentialAlgorithmMismatch => "credential_algorithm_mismatch",
            Self::CredentialIssueFailed(_) => "credential_issue_failed",
            Self::RandomnessUnavailable(_) => "server_error",
            Self::InsufficientRole => "insufficient_role",
            Self::AccountNotApproved => "account_not_approved",
            Self::InvalidRoleValue(_) => "invalid_role_value",
            Self::InvalidStatusTransition { .. } => "invalid_status_transition",
            Self::AccountNotFound => "account_not_found",
            Self::EmailInUse => "email_in_use",
            Self::Storage(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingState
            | Self::InvalidOrExpiredState
            | Self::MissingCode
            | Self::InvalidRoleValue(_)
            | Self::InvalidStatusTransition { .. } => StatusCode::BAD_REQUEST,
            Self::CodeExchangeFailed(_)
            | Self::MissingCredential
            | Self::MalformedAuthorizationHeader
            | Self::MalformedCredential
            | Self::CredentialSignatureInvalid
            | Self::CredentialExpired
            | Self::CredentialAlgorithmMismatch => StatusCode::UNAUTHORIZED,
            Self::InsufficientRole | Self::AccountNotApproved => StatusCode::FORBIDDEN,
            Self::AccountNotFound => StatusCode::NOT_FOUND,
            Self::EmailInUse => StatusCode::CONFLICT,
            Self::ProfileFetchFailed(_) | Self::MalformedProfile(_) => StatusCode::BAD_GATEWAY,
            Self::ExchangeCancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::CredentialIssueFailed(_) | Self::RandomnessUnavailable(_) | Self::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the caller.
    pub fn public_message(&self) -> String {
        match self {
            Self::CodeExchangeFailed(_) => "Failed to exchange authorization code".to_string(),
            Self::ProfileFetchFailed(_) => "Failed to get user info".to_string(),
            Self::MalformedProfile(_) => "Failed to decode user info".to_string(),
            Self::CredentialIssueFailed(_) | Self::RandomnessUnavailable(_) | Self::Storage(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// JSON error payload returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Error kind (e.g. "invalid_or_expired_state", "insufficient_role")
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl From<&AuthError> for ErrorBody {
    fn from(err: &AuthError) -> Self {
        Self {
            error: err.kind().to_string(),
            error_description: Some(err.public_message()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "request rejected");
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}
