//! Configuration Module
//!
//! Handles loading and resolving cache configuration, either programmatically
//! or from environment variables.

use std::env;

use tracing::warn;

use crate::cache::current_timestamp_ms;
use crate::error::{CacheError, Result};

/// Max age applied when none is configured.
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 60;

/// Cache configuration parameters.
///
/// Unset fields fall back to defaults when the configuration is resolved.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Age in seconds after which an entry expires
    pub max_age_seconds: Option<u64>,
    /// Friendly name reported in observer events
    pub name: Option<String>,
    /// Emit per-operation debug traces
    pub show_debug_messages: bool,
}

/// Configuration after defaults have been applied and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub max_age_seconds: u64,
    pub name: String,
    pub show_debug_messages: bool,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `QUICACHE_MAX_AGE` - Max entry age in seconds (default: 60)
    /// - `QUICACHE_NAME` - Cache name (default: creation timestamp)
    /// - `QUICACHE_DEBUG` - `true`/`1` enables debug traces (default: false)
    pub fn from_env() -> Self {
        Self {
            max_age_seconds: env::var("QUICACHE_MAX_AGE")
                .ok()
                .and_then(|v| v.parse().ok()),
            name: env::var("QUICACHE_NAME").ok().filter(|v| !v.is_empty()),
            show_debug_messages: env::var("QUICACHE_DEBUG")
                .ok()
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    /// Sets the max age in seconds.
    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age_seconds = Some(seconds);
        self
    }

    /// Sets the cache name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enables or disables debug traces.
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.show_debug_messages = enabled;
        self
    }

    // == Resolve ==
    /// Applies defaults and validates the configuration.
    ///
    /// A missing max age or name is not an error; each is replaced by its
    /// default and a warning is logged. A max age of zero is rejected.
    pub fn resolve(self) -> Result<ResolvedConfig> {
        let max_age_seconds = match self.max_age_seconds {
            Some(0) => return Err(CacheError::InvalidMaxAge(0)),
            Some(seconds) => seconds,
            None => {
                warn!(
                    "No max age provided, defaulting to {} seconds",
                    DEFAULT_MAX_AGE_SECONDS
                );
                DEFAULT_MAX_AGE_SECONDS
            }
        };

        let name = match self.name {
            Some(name) => name,
            None => {
                let fallback = current_timestamp_ms().to_string();
                warn!("No cache name provided, falling back to {}", fallback);
                fallback
            }
        };

        Ok(ResolvedConfig {
            max_age_seconds,
            name,
            show_debug_messages: self.show_debug_messages,
        })
    }
}
