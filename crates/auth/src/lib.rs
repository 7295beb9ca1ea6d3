//! Bearer token lifecycle for the remote provider.
//!
//! [`TokenManager`] owns the session credentials of one driver instance
//! and hands out an access token that is valid at call time, refreshing
//! or re-authenticating through an [`AuthBackend`] when it has expired.

mod backend;
mod error;
mod manager;
mod session;

pub use backend::{AuthBackend, Credentials, TokenGrant};
pub use error::{AuthError, AuthFailure};
pub use manager::TokenManager;
pub use session::SessionCredentials;
