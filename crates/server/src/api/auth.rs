//! Request and role gates.
//!
//! [`require_session`] turns a `Authorization: Bearer <credential>` header into
//! an [`AuthenticatedUser`] request extension; [`require_admin`] runs after it
//! and admits only administrators. Handlers read the caller through the
//! [`CurrentUser`] extractor.

use crate::AppState;
use crate::entity::user::Role;
use crate::error::AuthError;
use crate::session::SessionClaims;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};

/// The caller, as asserted by a verified session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub account_id: String,
    pub email: String,
    pub role: Role,
}

impl From<SessionClaims> for AuthenticatedUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            account_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Pull the credential out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::MalformedAuthorizationHeader)?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("Bearer") => {
            let token = token.trim();
            if token.is_empty() {
                Err(AuthError::MalformedAuthorizationHeader)
            } else {
                Ok(token)
            }
        }
        _ => Err(AuthError::MalformedAuthorizationHeader),
    }
}

/// Only administrators pass.
pub fn authorize_admin(user: Option<&AuthenticatedUser>) -> Result<(), AuthError> {
    match user {
        Some(user) if user.role.is_admin() => Ok(()),
        _ => Err(AuthError::InsufficientRole),
    }
}

/// Middleware admitting requests that carry a valid session credential.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers())?;
    let claims = state.credentials.verify(token)?;
    tracing::debug!(account_id = %claims.sub, role = %claims.role, "session verified");

    request
        .extensions_mut()
        .insert(AuthenticatedUser::from(claims));
    Ok(next.run(request).await)
}

/// Middleware admitting administrators. Must be layered inside [`require_session`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AuthError> {
    authorize_admin(request.extensions().get::<AuthenticatedUser>())?;
    Ok(next.run(request).await)
}

/// Extractor for the caller established by [`require_session`].
pub struct CurrentUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::MissingCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(authorization).unwrap(),
        );
        headers
    }

    fn user(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            account_id: "acct-1".into(),
            email: "test@example.com".into(),
            role,
        }
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn missing_header_is_distinct_from_malformed_header() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingCredential)
        ));
        for value in ["InvalidToken", "Basic dXNlcjpwYXNz", "Bearer ", "Bearer    "] {
            assert!(
                matches!(
                    bearer_token(&headers(value)),
                    Err(AuthError::MalformedAuthorizationHeader)
                ),
                "{value:?}"
            );
        }
    }

    #[test]
    fn role_gate_admits_only_admins() {
        assert!(authorize_admin(Some(&user(Role::Admin))).is_ok());
        assert!(matches!(
            authorize_admin(Some(&user(Role::User))),
            Err(AuthError::InsufficientRole)
        ));
        assert!(matches!(
            authorize_admin(Some(&user(Role::Pending))),
            Err(AuthError::InsufficientRole)
        ));
        assert!(matches!(authorize_admin(None), Err(AuthError::InsufficientRole)));
    }
}
