//! Account endpoints for signed-in users.
//!
//! - `GET /users/me` - The caller's own account
//! - `GET /users` - Every account

use crate::AppState;
use crate::api::auth::CurrentUser;
use crate::entity::user::{self, AccountStatus, Role};
use crate::error::{AuthError, ErrorBody};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const USERS_TAG: &str = "Users";

/// Public view of an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountView {
    /// Account identifier
    pub id: String,
    pub email: String,
    pub name: String,
    /// Avatar URL supplied by the identity provider
    pub picture: String,
    /// Subject id at the identity provider
    pub google_id: String,
    pub role: Role,
    pub status: AccountStatus,
    /// Administrator who approved the account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option",
        default
    )]
    pub approved_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<user::Model> for AccountView {
    fn from(account: user::Model) -> Self {
        Self {
            id: account.id,
            email: account.email,
            name: account.name,
            picture: account.picture,
            google_id: account.provider_subject,
            role: account.role,
            status: account.status,
            approved_by: account.approved_by,
            approved_at: account.approved_at,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(current_user))
        .routes(routes!(list_users))
}

/// Return the caller's account.
#[tracing::instrument(skip(state, user), fields(account_id = %user.account_id))]
#[utoipa::path(
    get,
    path = "/users/me",
    tag = USERS_TAG,
    operation_id = "Current User",
    summary = "Get the signed-in account",
    description = "Returns the account behind the session credential. The account is read \
                   from storage, so status and role reflect any change made after the \
                   credential was issued.",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "The caller's account", body = AccountView),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 404, description = "Account no longer exists", body = ErrorBody),
    )
)]
async fn current_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<AccountView>, AuthError> {
    let account = state.accounts.find(&user.account_id).await?;
    Ok(Json(account.into()))
}

/// List every account.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/users",
    tag = USERS_TAG,
    operation_id = "List Users",
    summary = "List all accounts",
    description = "Returns every known account, newest first.",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "All accounts", body = Vec<AccountView>),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
    )
)]
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<AccountView>>, AuthError> {
    let accounts = state.accounts.list().await?;
    Ok(Json(accounts.into_iter().map(AccountView::from).collect()))
}
