//! CSRF correlation state for the OAuth2 login handshake.
//!
//! Every login attempt gets a single-use token that must come back on the
//! provider callback before it expires. Tokens live in a sharded in-memory
//! map owned by the [`StateTracker`]; a background reaper evicts the ones
//! that were never redeemed.

use crate::clock::Clock;
use crate::error::AuthError;
use dashmap::DashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default lifetime of a correlation token.
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(5 * 60);
/// Default interval between reaper sweeps.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Bytes of OS randomness behind each token (256 bits).
const TOKEN_BYTES: usize = 32;

/// A freshly issued correlation token.
#[derive(Clone, PartialEq, Eq)]
pub struct CorrelationToken {
    value: String,
    expires_at: OffsetDateTime,
}

impl CorrelationToken {
    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }
}

impl std::fmt::Debug for CorrelationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationToken")
            .field("value", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues and redeems single-use correlation tokens.
pub struct StateTracker {
    states: DashMap<String, OffsetDateTime>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl StateTracker {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            states: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Generate a URL-safe token from the OS CSPRNG.
    pub fn generate_token() -> Result<String, AuthError> {
        use base64::Engine;
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::fill(&mut bytes).map_err(|e| AuthError::RandomnessUnavailable(e.to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Mint a token for a new login attempt and start tracking it.
    pub fn issue(&self) -> Result<CorrelationToken, AuthError> {
        let value = Self::generate_token()?;
        let expires_at = self.clock.now() + self.ttl;
        self.states.insert(value.clone(), expires_at);
        tracing::debug!(outstanding = self.states.len(), "issued correlation token");
        Ok(CorrelationToken { value, expires_at })
    }

    /// Redeem a token returned by the provider callback.
    ///
    /// The entry is removed before the expiry check, so of any number of
    /// concurrent calls with the same token at most one can succeed, and an
    /// expired token is dropped on first sight.
    pub fn verify_and_consume(&self, token: &str) -> Result<(), AuthError> {
        let Some((_, expires_at)) = self.states.remove(token) else {
            tracing::debug!("unknown or already used correlation token");
            return Err(AuthError::InvalidOrExpiredState);
        };
        if self.clock.now() > expires_at {
            tracing::debug!(%expires_at, "expired correlation token");
            return Err(AuthError::InvalidOrExpiredState);
        }
        Ok(())
    }

    /// Evict every expired token. Returns how many were removed.
    pub fn reap(&self) -> usize {
        let now = self.clock.now();
        let mut evicted = 0;
        self.states.retain(|_, expires_at| {
            let keep = *expires_at >= now;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    /// Number of tokens currently tracked, expired or not.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Run [`reap`](Self::reap) every `interval` until `shutdown` is cancelled.
    ///
    /// A panicking sweep is logged and the task carries on with the next tick.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        tracing::info!("correlation state reaper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match catch_unwind(AssertUnwindSafe(|| tracker.reap())) {
                            Ok(0) => {}
                            Ok(evicted) => tracing::debug!(
                                evicted,
                                remaining = tracker.len(),
                                "reaped expired correlation tokens"
                            ),
                            Err(_) => tracing::error!(
                                "correlation state sweep panicked; retrying on next tick"
                            ),
                        }
                    }
                }
            }
        })
    }
}
