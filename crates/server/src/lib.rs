//! Google sign-in, session credentials and administrator approval for the
//! Surfer Kubernetes dashboard.
//!
//! A login attempt is bound to its callback by a single-use correlation token,
//! the callback trades the authorization code for a Google identity, and the
//! identity is mapped onto an account that an administrator has to approve
//! before any session credential is issued.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;

use crate::accounts::AccountService;
use crate::clock::Clock;
use crate::config::{AppConfig, ConfigError};
use crate::oauth2::{IdentityExchanger, StateTracker};
use crate::session::CredentialService;

pub mod accounts;
pub mod api;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod oauth2;
pub mod session;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub states: Arc<StateTracker>,
    pub identity: Arc<IdentityExchanger>,
    pub credentials: Arc<CredentialService>,
    pub accounts: Arc<AccountService>,
    /// Cancelled when the server shuts down; aborts in-flight identity exchanges.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: Arc<DatabaseConnection>,
        clock: Arc<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigError> {
        let secret = config.session.signing_secret()?;
        let identity = IdentityExchanger::new(&config.oauth)?;
        let states = StateTracker::new(config.session.state_ttl(), clock.clone());
        let credentials = CredentialService::new(
            secret.as_bytes(),
            config.session.credential_ttl(),
            clock.clone(),
        );
        let accounts = AccountService::new(db, clock);

        Ok(Self {
            config: Arc::new(config),
            states: Arc::new(states),
            identity: Arc::new(identity),
            credentials: Arc::new(credentials),
            accounts: Arc::new(accounts),
            shutdown,
        })
    }
}
