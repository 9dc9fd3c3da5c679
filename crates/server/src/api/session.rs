//! Google sign-in endpoints.
//!
//! - `GET /auth/google/login` - Start a login attempt
//! - `GET /auth/google/callback` - Finish it after the provider redirects back
//! - `POST /auth/logout` - Drop the session cookie

use crate::AppState;
use crate::api::users::AccountView;
use crate::entity::user::AccountStatus;
use crate::error::{AuthError, ErrorBody};
use axum::{
    Json,
    extract::{Query, State},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const AUTH_TAG: &str = "Authentication";

/// Cookie mirroring the correlation token of the current login attempt.
pub const STATE_COOKIE: &str = "oauth_state";
/// Cookie carrying the session credential.
pub const SESSION_COOKIE: &str = "auth_token";

const PENDING_MESSAGE: &str = "Authentication successful. Please wait for admin approval.";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Provider consent URL to send the browser to
    pub url: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Correlation token issued by the login endpoint
    pub state: Option<String>,
    /// Authorization code issued by the provider
    pub code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallbackResponse {
    pub user: AccountView,
    pub status: AccountStatus,
    /// Session credential, present once the account is approved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(login))
        .routes(routes!(callback))
        .routes(routes!(logout))
}

fn session_cookie(
    name: &'static str,
    value: String,
    max_age: Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age.as_secs() as i64))
        .build()
}

/// A cookie instructing the browser to drop `name`, sent whether or not the
/// request carried it.
fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).path("/").http_only(true).build();
    cookie.make_removal();
    cookie
}

/// Begin a login attempt.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/auth/google/login",
    tag = AUTH_TAG,
    operation_id = "Google Login",
    summary = "Start Google sign-in",
    description = "Issues a single-use correlation token and returns the provider consent URL \
                   carrying it as `state`. The token expires after five minutes by default and \
                   is mirrored in the `oauth_state` cookie.",
    responses(
        (status = 200, description = "Consent URL", body = LoginResponse),
        (status = 500, description = "Internal server error", body = ErrorBody),
    )
)]
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LoginResponse>), AuthError> {
    let token = state.states.issue()?;
    let url = state.identity.authorization_url(&token);

    let cookie = session_cookie(
        STATE_COOKIE,
        token.secret().to_string(),
        state.config.session.state_ttl(),
        state.config.session.cookie_secure,
    );
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            url: url.to_string(),
        }),
    ))
}

/// Finish a login attempt.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/auth/google/callback",
    tag = AUTH_TAG,
    operation_id = "Google Callback",
    summary = "Complete Google sign-in",
    description = "Redeems the correlation token, exchanges the authorization code and maps the \
                   provider identity onto an account.\n\n\
                   - New and pending accounts get `status: pending` and no credential.\n\
                   - Approved accounts get a session credential in the body and in the \
                   `auth_token` cookie.\n\
                   - Rejected accounts get `403 account_not_approved`.",
    params(CallbackParams),
    responses(
        (status = 200, description = "Signed in, or waiting for approval", body = CallbackResponse),
        (status = 400, description = "Missing, unknown, used or expired state", body = ErrorBody),
        (status = 401, description = "Authorization code rejected by the provider", body = ErrorBody),
        (status = 403, description = "Account was rejected", body = ErrorBody),
        (status = 409, description = "Email already belongs to another account", body = ErrorBody),
        (status = 502, description = "Provider profile unavailable", body = ErrorBody),
    )
)]
async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Json<CallbackResponse>), AuthError> {
    let correlation = params
        .state
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingState)?;
    state.states.verify_and_consume(&correlation)?;
    let jar = jar.add(removal_cookie(STATE_COOKIE));

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingCode)?;
    let identity = state
        .identity
        .exchange_cancellable(&code, &state.shutdown)
        .await?;
    let account = state.accounts.reconcile(&identity).await?;

    match account.status {
        AccountStatus::Pending => Ok((
            jar,
            Json(CallbackResponse {
                status: account.status,
                user: account.into(),
                token: None,
                message: Some(PENDING_MESSAGE.to_string()),
            }),
        )),
        AccountStatus::Approved => {
            let token = state
                .accounts
                .issue_credential(&account, &state.credentials)?;
            tracing::info!(account_id = %account.id, role = %account.role, "session issued");
            let cookie = session_cookie(
                SESSION_COOKIE,
                token.clone(),
                state.credentials.ttl(),
                state.config.session.cookie_secure,
            );
            Ok((
                jar.add(cookie),
                Json(CallbackResponse {
                    status: account.status,
                    user: account.into(),
                    token: Some(token),
                    message: None,
                }),
            ))
        }
        AccountStatus::Rejected => Err(AuthError::AccountNotApproved),
    }
}

/// End the browser session.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = AUTH_TAG,
    operation_id = "Logout",
    summary = "Clear the session cookie",
    description = "Removes the `auth_token` cookie. Credentials are not revoked server side and \
                   stay valid until they expire.",
    responses(
        (status = 200, description = "Cookie cleared", body = MessageResponse),
    )
)]
async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.add(removal_cookie(SESSION_COOKIE)),
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}
