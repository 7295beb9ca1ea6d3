//! `reqwest` client for the remote storage provider.
//!
//! [`ProviderClient`] implements the token endpoints
//! ([`AuthBackend`](panbridge_auth::AuthBackend)), the upload node
//! endpoints ([`UploadProvider`](panbridge_upload::UploadProvider)) and
//! the bearer-authenticated file management calls.

mod auth;
pub mod client;
pub mod config;
pub mod files;
#[cfg(any(test, feature = "test-util"))]
pub mod mock_server;
mod upload;

pub use client::ProviderClient;
pub use config::ProviderConfig;
pub use files::ItemKind;
