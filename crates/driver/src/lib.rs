//! Storage driver over the remote provider.
//!
//! [`PanDriver`] owns one account's session and exposes the operations a
//! host file manager expects: list, link, make_dir, rename, move, remove
//! and a resumable `put`.

pub mod config;
mod driver;
mod error;
mod object;

pub use config::DriverConfig;
pub use driver::PanDriver;
pub use error::DriverError;
pub use object::RemoteObject;

pub use panbridge_provider::ItemKind;
pub use panbridge_transfer::{NoProgress, ProgressSink, StreamSource};
pub use panbridge_upload::UploadConfig;
