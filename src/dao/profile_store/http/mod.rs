//! Profile store backed by a remote profile/XP HTTP service.

pub mod config;
pub mod error;
pub mod store;

pub use config::ProfileServiceConfig;
pub use store::HttpProfileStore;
