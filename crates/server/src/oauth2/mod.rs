//! OAuth2 client side of Google sign-in.
//!
//! - [`state`] - single-use CSRF correlation tokens and their reaper
//! - [`identity`] - authorization-code exchange and profile lookup

pub mod identity;
pub mod state;

pub use identity::{ExternalIdentity, IdentityExchanger};
pub use state::{CorrelationToken, StateTracker};
