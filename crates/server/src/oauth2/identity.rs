//! Authorization-code exchange against the external identity provider.
//!
//! The exchanger builds the consent URL for a login attempt and, on callback,
//! trades the authorization code for an access token and fetches the
//! caller's profile. Codes are single use, so nothing here retries.

use crate::config::{ConfigError, ProviderConfig};
use crate::error::AuthError;
use crate::oauth2::state::CorrelationToken;
use oauth2::basic::BasicClient;
use oauth2::url::Url;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

type ProviderClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Canonical identity resolved from the provider's profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExternalIdentity {
    /// Provider-assigned subject id
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
}

/// Raw userinfo payload. Google's v2 endpoint uses `id`, OpenID Connect uses `sub`.
#[derive(Debug, Deserialize)]
struct ProviderProfile {
    #[serde(alias = "sub")]
    id: Option<String>,
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl TryFrom<ProviderProfile> for ExternalIdentity {
    type Error = AuthError;

    fn try_from(profile: ProviderProfile) -> Result<Self, Self::Error> {
        let id = profile
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AuthError::MalformedProfile("missing subject id".into()))?;
        let email = profile
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AuthError::MalformedProfile("missing email".into()))?;
        Ok(Self {
            id,
            email,
            name: profile.name.unwrap_or_default(),
            picture: profile.picture.unwrap_or_default(),
        })
    }
}

/// Drives the OAuth2 authorization-code flow for one configured provider.
pub struct IdentityExchanger {
    client: ProviderClient,
    http: reqwest::Client,
    userinfo_url: Url,
    scopes: Vec<Scope>,
}

impl IdentityExchanger {
    pub fn new(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let invalid = |field: &str, e: &dyn std::fmt::Display| {
            ConfigError::Validation(format!("invalid oauth.{field}: {e}"))
        };

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(config.auth_url.clone()).map_err(|e| invalid("auth_url", &e))?,
            )
            .set_token_uri(
                TokenUrl::new(config.token_url.clone()).map_err(|e| invalid("token_url", &e))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_url.clone())
                    .map_err(|e| invalid("redirect_url", &e))?,
            );

        let userinfo_url =
            Url::parse(&config.userinfo_url).map_err(|e| invalid("userinfo_url", &e))?;

        // Redirects stay disabled so an authorization code can never be replayed elsewhere.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.http_timeout())
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| invalid("http client", &e))?;

        Ok(Self {
            client,
            http,
            userinfo_url,
            scopes: config.scopes.iter().cloned().map(Scope::new).collect(),
        })
    }

    /// Consent URL for a login attempt, carrying `token` as the `state` parameter.
    pub fn authorization_url(&self, token: &CorrelationToken) -> Url {
        let state = token.secret().to_string();
        let (url, _) = self
            .client
            .authorize_url(|| CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned())
            .url();
        url
    }

    /// Trade an authorization code for the caller's identity.
    #[tracing::instrument(skip_all)]
    pub async fn exchange(&self, code: &str) -> Result<ExternalIdentity, AuthError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "authorization code exchange failed");
                AuthError::CodeExchangeFailed(e.to_string())
            })?;

        let response = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                tracing::warn!(error = %e, "profile fetch failed");
                AuthError::ProfileFetchFailed(e.to_string())
            })?;

        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::ProfileFetchFailed(e.to_string()))?;
        let profile: ProviderProfile = serde_json::from_slice(&body)
            .map_err(|e| AuthError::MalformedProfile(e.to_string()))?;
        let identity = ExternalIdentity::try_from(profile)?;

        tracing::info!(subject = %identity.id, "resolved external identity");
        Ok(identity)
    }

    /// Like [`exchange`](Self::exchange), abandoned as soon as `cancel` fires.
    ///
    /// Nothing is persisted by the exchange itself, so an abandoned call leaves
    /// no trace beyond the consumed authorization code.
    pub async fn exchange_cancellable(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<ExternalIdentity, AuthError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AuthError::ExchangeCancelled),
            result = self.exchange(code) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::oauth2::state::{DEFAULT_STATE_TTL, StateTracker};
    use std::sync::Arc;

    fn provider_config() -> ProviderConfig {
        ProviderConfig {
            client_id: "client-123".into(),
            client_secret: "shh".into(),
            redirect_url: "http://localhost:8080/api/v1/auth/google/callback".into(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".into(),
            scopes: vec!["email".into(), "profile".into()],
            http_timeout_secs: 5,
        }
    }

    #[test]
    fn authorization_url_embeds_state_and_scopes() {
        let exchanger = IdentityExchanger::new(&provider_config()).unwrap();
        let tracker = StateTracker::new(DEFAULT_STATE_TTL, Arc::new(ManualClock::starting_now()));
        let token = tracker.issue().unwrap();

        let url = exchanger.authorization_url(&token);
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(query.get("state").map(String::as_str), Some(token.secret()));
        assert_eq!(query.get("client_id").map(String::as_str), Some("client-123"));
        assert_eq!(query.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(query.get("scope").map(String::as_str), Some("email profile"));
        assert!(!url.as_str().contains("shh"));
    }

    #[test]
    fn invalid_endpoint_is_a_config_error() {
        let mut config = provider_config();
        config.token_url = "not a url".into();
        assert!(matches!(
            IdentityExchanger::new(&config),
            Err(ConfigError::Validation(msg)) if msg.contains("token_url")
        ));
    }

    #[test]
    fn profile_accepts_oidc_subject_claim() {
        let profile: ProviderProfile =
            serde_json::from_str(r#"{"sub":"abc","email":"a@example.com"}"#).unwrap();
        let identity = ExternalIdentity::try_from(profile).unwrap();
        assert_eq!(identity.id, "abc");
        assert_eq!(identity.name, "");
        assert_eq!(identity.picture, "");
    }

    #[test]
    fn profile_without_email_is_malformed() {
        let profile: ProviderProfile = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert!(matches!(
            ExternalIdentity::try_from(profile),
            Err(AuthError::MalformedProfile(_))
        ));
    }

    #[test]
    fn profile_with_empty_subject_is_malformed() {
        let profile: ProviderProfile =
            serde_json::from_str(r#"{"id":"","email":"a@example.com"}"#).unwrap();
        assert!(matches!(
            ExternalIdentity::try_from(profile),
            Err(AuthError::MalformedProfile(_))
        ));
    }
}
