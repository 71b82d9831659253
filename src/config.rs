//! Configuration for ComponentVault
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

/// ComponentVault - discover, upload and browse UI components
#[derive(Parser, Debug, Clone)]
#[command(name = "component-vault")]
#[command(about = "JSON API for the ComponentVault component library")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory fallbacks, dev JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "component_vault")]
    pub mongodb_db: String,

    /// Shared secret of the identity provider (HS256, required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Expected `iss` claim of identity provider tokens
    #[arg(long, env = "JWT_ISSUER")]
    pub jwt_issuer: Option<String>,

    /// Meilisearch URL for the hosted search index
    /// When unset, an in-memory index is used
    #[arg(long, env = "MEILI_URL")]
    pub meili_url: Option<String>,

    /// Meilisearch admin API key
    #[arg(long, env = "MEILI_KEY")]
    pub meili_key: Option<String>,

    /// Whether this instance mirrors store changes into the search index
    #[arg(long, env = "SEARCH_SYNC_ENABLED", default_value = "true")]
    pub search_sync_enabled: bool,

    /// Retry attempts for a failed search sync event
    #[arg(long, env = "SEARCH_SYNC_MAX_RETRIES", default_value = "3")]
    pub search_sync_max_retries: u32,

    /// Seconds between repair passes over sync events that could not be applied
    #[arg(long, env = "SEARCH_SYNC_REPAIR_SECS", default_value = "30")]
    pub search_sync_repair_secs: u64,

    /// URL of the media storage service for image cleanup
    /// (e.g., "http://localhost:8091")
    #[arg(long, env = "STORAGE_URL")]
    pub storage_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, one event per line
    Pretty,
    /// One JSON object per event
    Json,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> Option<String> {
        match &self.jwt_secret {
            Some(secret) => Some(secret.clone()),
            None if self.dev_mode => Some(crate::auth::jwt::DEV_SECRET.to_string()),
            None => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if let Some(ref secret) = self.jwt_secret {
            if secret.len() < 32 {
                return Err("JWT_SECRET must be at least 32 characters".to_string());
            }
        }

        if self.meili_url.is_some() && self.meili_key.is_none() && !self.dev_mode {
            return Err("MEILI_KEY is required when MEILI_URL is set".to_string());
        }

        Ok(())
    }

    /// Arguments for tests and embedded use: dev mode, no external services
    pub fn for_dev() -> Self {
        Self::parse_from(["component-vault", "--dev-mode"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_args_are_valid() {
        let args = Args::for_dev();
        assert!(args.dev_mode);
        assert!(args.validate().is_ok());
        assert!(args.jwt_secret().is_some());
    }

    #[test]
    fn test_production_requires_secret() {
        let args = Args::parse_from(["component-vault"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let args = Args::parse_from(["component-vault", "--jwt-secret", "short"]);
        assert_eq!(
            args.validate().unwrap_err(),
            "JWT_SECRET must be at least 32 characters"
        );
    }

    #[test]
    fn test_log_format_parse() {
        let args = Args::parse_from(["component-vault", "--dev-mode", "--log-format", "json"]);
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
