//! Administrator endpoints for the approval workflow.
//!
//! - `GET /admin/pending-users` - Accounts waiting for a decision
//! - `POST /admin/approve-user/{id}` - Approve an account
//! - `POST /admin/reject-user/{id}` - Reject an account
//! - `PUT /admin/users/{id}/role` - Grant `user` or `admin`

use crate::AppState;
use crate::api::auth::CurrentUser;
use crate::api::users::AccountView;
use crate::error::{AuthError, ErrorBody};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const ADMIN_TAG: &str = "Administration";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountActionResponse {
    pub message: String,
    pub user: AccountView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    /// Either "user" or "admin"
    pub role: String,
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(pending_users))
        .routes(routes!(approve_user))
        .routes(routes!(reject_user))
        .routes(routes!(update_role))
}

/// List accounts waiting for approval.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/admin/pending-users",
    tag = ADMIN_TAG,
    operation_id = "Pending Users",
    summary = "List pending accounts",
    description = "Returns accounts that signed in but have not been approved or rejected yet, \
                   oldest first.",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "Pending accounts", body = Vec<AccountView>),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 403, description = "Administrator role required", body = ErrorBody),
    )
)]
async fn pending_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountView>>, AuthError> {
    let accounts = state.accounts.list_pending().await?;
    Ok(Json(accounts.into_iter().map(AccountView::from).collect()))
}

/// Approve an account.
#[tracing::instrument(skip(state, admin), fields(approver = %admin.account_id))]
#[utoipa::path(
    post,
    path = "/admin/approve-user/{id}",
    tag = ADMIN_TAG,
    operation_id = "Approve User",
    summary = "Approve an account",
    description = "Moves a pending account to approved with role `user`, recording the \
                   approving administrator. Approving an approved account refreshes the \
                   approval and resets its role to `user`. Rejected accounts cannot be approved.",
    params(("id" = String, Path, description = "Account id")),
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "Account approved", body = AccountActionResponse),
        (status = 400, description = "Account is rejected", body = ErrorBody),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 403, description = "Administrator role required", body = ErrorBody),
        (status = 404, description = "Unknown account", body = ErrorBody),
    )
)]
async fn approve_user(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<AccountActionResponse>, AuthError> {
    let account = state.accounts.approve(&id, &admin.account_id).await?;
    Ok(Json(AccountActionResponse {
        message: "User approved successfully".to_string(),
        user: account.into(),
    }))
}

/// Reject an account.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/admin/reject-user/{id}",
    tag = ADMIN_TAG,
    operation_id = "Reject User",
    summary = "Reject an account",
    description = "Moves a pending account to rejected. Rejection is final.",
    params(("id" = String, Path, description = "Account id")),
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "Account rejected", body = AccountActionResponse),
        (status = 400, description = "Account is not pending", body = ErrorBody),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 403, description = "Administrator role required", body = ErrorBody),
        (status = 404, description = "Unknown account", body = ErrorBody),
    )
)]
async fn reject_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccountActionResponse>, AuthError> {
    let account = state.accounts.reject(&id).await?;
    Ok(Json(AccountActionResponse {
        message: "User rejected successfully".to_string(),
        user: account.into(),
    }))
}

/// Change the role of an approved account.
#[tracing::instrument(skip(state, body), fields(role = %body.role))]
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    tag = ADMIN_TAG,
    operation_id = "Update User Role",
    summary = "Grant a role",
    description = "Sets the role of an approved account to `user` or `admin`. The new role \
                   applies to credentials issued from the next sign-in on.",
    params(("id" = String, Path, description = "Account id")),
    request_body(content = UpdateRoleRequest, content_type = "application/json"),
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "Role updated", body = AccountActionResponse),
        (status = 400, description = "Invalid role value", body = ErrorBody),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 403, description = "Administrator role required, or account not approved", body = ErrorBody),
        (status = 404, description = "Unknown account", body = ErrorBody),
    )
)]
async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<AccountActionResponse>, AuthError> {
    let account = state.accounts.set_role(&id, &body.role).await?;
    Ok(Json(AccountActionResponse {
        message: "User role updated successfully".to_string(),
        user: account.into(),
    }))
}
