//! Accounts known to the dashboard and the admin approval workflow.
//!
//! An account is created the first time an identity signs in and starts out
//! pending. Only an administrator can move it on; see [`lifecycle`] for the
//! allowed transitions.

pub mod lifecycle;

use crate::clock::Clock;
use crate::entity::user::{self, AccountStatus, Role};
use crate::error::AuthError;
use crate::oauth2::identity::ExternalIdentity;
use crate::session::CredentialService;
use sea_orm::prelude::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, UpdateMany,
};
use std::sync::Arc;
use uuid::Uuid;

/// Attempts at a conditional status update before giving up on a hot row.
const MAX_TRANSITION_ATTEMPTS: usize = 3;

pub struct AccountService {
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(db: Arc<DatabaseConnection>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Map a provider identity onto an account, creating a pending one on first sight.
    ///
    /// Returning users get their email, name and picture refreshed from the
    /// provider. Status and role are never touched here.
    #[tracing::instrument(skip(self, identity), fields(subject = %identity.id))]
    pub async fn reconcile(&self, identity: &ExternalIdentity) -> Result<user::Model, AuthError> {
        if let Some(existing) = self.find_by_subject(&identity.id).await? {
            return self.refresh_profile(existing, identity).await;
        }

        self.create_pending(identity).await
    }

    async fn create_pending(&self, identity: &ExternalIdentity) -> Result<user::Model, AuthError> {
        let now = self.clock.now();
        let account = user::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            email: Set(identity.email.clone()),
            name: Set(identity.name.clone()),
            picture: Set(identity.picture.clone()),
            provider_subject: Set(identity.id.clone()),
            role: Set(Role::Pending),
            status: Set(AccountStatus::Pending),
            approved_by: Set(None),
            approved_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match account.insert(self.db.as_ref()).await {
            Ok(created) => {
                tracing::info!(account_id = %created.id, "created pending account");
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => {
                // Either a concurrent first login for the same subject won the
                // insert, or the email belongs to a different subject.
                match self.find_by_subject(&identity.id).await? {
                    Some(existing) => Ok(existing),
                    None => {
                        tracing::warn!(email = %identity.email, "email already held by another account");
                        Err(AuthError::EmailInUse)
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_profile(
        &self,
        existing: user::Model,
        identity: &ExternalIdentity,
    ) -> Result<user::Model, AuthError> {
        if existing.email == identity.email
            && existing.name == identity.name
            && existing.picture == identity.picture
        {
            return Ok(existing);
        }
        let account_id = existing.id.clone();
        let mut active: user::ActiveModel = existing.into();
        active.email = Set(identity.email.clone());
        active.name = Set(identity.name.clone());
        active.picture = Set(identity.picture.clone());
        active.updated_at = Set(self.clock.now());
        match active.update(self.db.as_ref()).await {
            Ok(updated) => Ok(updated),
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!(%account_id, email = %identity.email, "email already held by another account");
                Err(AuthError::EmailInUse)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find()
            .filter(user::Column::ProviderSubject.eq(subject))
            .one(self.db.as_ref())
            .await
    }

    pub async fn find(&self, account_id: &str) -> Result<user::Model, AuthError> {
        user::Entity::find_by_id(account_id)
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::AccountNotFound)
    }

    pub async fn list(&self) -> Result<Vec<user::Model>, AuthError> {
        Ok(user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn list_pending(&self) -> Result<Vec<user::Model>, AuthError> {
        Ok(user::Entity::find()
            .filter(user::Column::Status.eq(AccountStatus::Pending.to_value()))
            .order_by_asc(user::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?)
    }

    /// Sign a session credential for `account`. Refused unless it is approved.
    pub fn issue_credential(
        &self,
        account: &user::Model,
        credentials: &CredentialService,
    ) -> Result<String, AuthError> {
        if !account.status.may_hold_session() {
            return Err(AuthError::AccountNotApproved);
        }
        credentials.issue(&account.id, &account.email, account.role)
    }

    /// Approve a pending account, or re-approve an approved one. The role is reset to `user`.
    #[tracing::instrument(skip(self))]
    pub async fn approve(
        &self,
        account_id: &str,
        approver_id: &str,
    ) -> Result<user::Model, AuthError> {
        let now = self.clock.now();
        let approved = self
            .transition(account_id, AccountStatus::check_approve, |update| {
                update
                    .col_expr(user::Column::Status, Expr::value(AccountStatus::Approved.to_value()))
                    .col_expr(user::Column::Role, Expr::value(Role::User.to_value()))
                    .col_expr(user::Column::ApprovedBy, Expr::value(approver_id.to_string()))
                    .col_expr(user::Column::ApprovedAt, Expr::value(now))
                    .col_expr(user::Column::UpdatedAt, Expr::value(now))
            })
            .await?;
        tracing::info!(account_id, approver_id, "account approved");
        Ok(approved)
    }

    #[tracing::instrument(skip(self))]
    pub async fn reject(&self, account_id: &str) -> Result<user::Model, AuthError> {
        let now = self.clock.now();
        let rejected = self
            .transition(account_id, AccountStatus::check_reject, |update| {
                update
                    .col_expr(user::Column::Status, Expr::value(AccountStatus::Rejected.to_value()))
                    .col_expr(user::Column::UpdatedAt, Expr::value(now))
            })
            .await?;
        tracing::info!(account_id, "account rejected");
        Ok(rejected)
    }

    /// Grant `user` or `admin` to an approved account.
    #[tracing::instrument(skip(self))]
    pub async fn set_role(&self, account_id: &str, role: &str) -> Result<user::Model, AuthError> {
        let role = Role::assignable(role)?;
        let now = self.clock.now();
        let updated = self
            .transition(account_id, AccountStatus::check_role_change, |update| {
                update
                    .col_expr(user::Column::Role, Expr::value(role.to_value()))
                    .col_expr(user::Column::UpdatedAt, Expr::value(now))
            })
            .await?;
        tracing::info!(account_id, %role, "account role updated");
        Ok(updated)
    }

    /// Apply `changes` to the account if `check` allows it from the current status.
    ///
    /// The update is conditional on the status that was checked, so a
    /// concurrent transition makes it affect no rows; the check then runs
    /// again against the fresh status.
    async fn transition(
        &self,
        account_id: &str,
        check: fn(&AccountStatus) -> Result<(), AuthError>,
        changes: impl Fn(UpdateMany<user::Entity>) -> UpdateMany<user::Entity>,
    ) -> Result<user::Model, AuthError> {
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let current = self.find(account_id).await?;
            check(&current.status)?;

            let result = changes(user::Entity::update_many())
                .filter(user::Column::Id.eq(account_id))
                .filter(user::Column::Status.eq(current.status.to_value()))
                .exec(self.db.as_ref())
                .await?;

            if result.rows_affected == 1 {
                return self.find(account_id).await;
            }
            tracing::debug!(account_id, "account changed concurrently; re-checking");
        }
        Err(AuthError::Storage(DbErr::Custom(format!(
            "account {account_id} kept changing during update"
        ))))
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
