//! Shared types for ComponentVault

pub mod error;

pub use error::{Result, VaultError};
