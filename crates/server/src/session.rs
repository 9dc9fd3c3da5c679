//! Session credentials: HS256-signed JWTs carrying a snapshot of the
//! account's id, email and role.
//!
//! Issuance and verification are pure functions of the token, the signing
//! secret and the clock. There is no revocation list; a credential stays valid
//! until its `exp` even after logout.

use crate::clock::Clock;
use crate::entity::user::Role;
use crate::error::AuthError;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

/// The only algorithm accepted on verification.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Default credential lifetime.
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionClaims {
    /// Account id
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

pub struct CredentialService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CredentialService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialService")
            .field("algorithm", &SIGNING_ALGORITHM)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialService {
    pub fn new(secret: &[u8], ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[tracing::instrument(skip(self, email))]
    pub fn issue(&self, sub: &str, email: &str, role: Role) -> Result<String, AuthError> {
        let iat = self.clock.now().unix_timestamp();
        let claims = SessionClaims {
            sub: sub.to_string(),
            email: email.to_string(),
            role,
            iat,
            exp: iat + self.ttl.as_secs() as i64,
        };
        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding)
            .map_err(|e| AuthError::CredentialIssueFailed(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        // exp is checked below against the injected clock, without leeway
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidAlgorithm => AuthError::CredentialAlgorithmMismatch,
                ErrorKind::InvalidSignature => AuthError::CredentialSignatureInvalid,
                ErrorKind::ExpiredSignature => AuthError::CredentialExpired,
                _ => AuthError::MalformedCredential,
            }
        })?;

        if self.clock.now().unix_timestamp() >= data.claims.exp {
            return Err(AuthError::CredentialExpired);
        }
        Ok(data.claims)
    }
}
