//! ComponentVault - a community library of UI components
//!
//! JSON API over a document store, with a hosted search index kept in sync
//! from store change events.
//!
//! ## Services
//!
//! - **Resources**: components, collections, favorites, follows, reviews,
//!   comments, users and profiles
//! - **Leaderboard**: ranked contributor boards and a sitewide summary
//! - **Stats**: platform-wide counts and trending components
//! - **Achievements**: rule table evaluated per user on demand
//! - **Search sync**: change-event driven mirroring into the search index

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod search;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, VaultError};
