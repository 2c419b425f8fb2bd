//! Registry configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`):
//!
//! | Variable | Default |
//! |---|---|
//! | `CHAT_MAX_ROOMS` | 50 |
//! | `CHAT_OPEN_ROOM_TIMEOUT_MS` | 5000 |

use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::ChatError;

/// Default room capacity
const DEFAULT_MAX_ROOMS: usize = 50;

/// Default wait for room capacity, in milliseconds
const DEFAULT_OPEN_TIMEOUT_MS: u64 = 5_000;

/// Registry construction parameters
///
/// Fixed for the lifetime of a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of simultaneously open rooms.
    pub max_rooms: usize,

    /// How long callers should wait for room capacity by default.
    pub open_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_rooms: DEFAULT_MAX_ROOMS,
            open_timeout: Duration::from_millis(DEFAULT_OPEN_TIMEOUT_MS),
        }
    }
}

impl RegistryConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    /// Unset variables fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidConfig`] if a variable is set but cannot
    /// be parsed, or if the resulting configuration is invalid.
    pub fn from_env() -> Result<Self, ChatError> {
        dotenvy::dotenv().ok();

        let max_rooms = parse_env("CHAT_MAX_ROOMS", DEFAULT_MAX_ROOMS)?;
        let open_timeout_ms = parse_env("CHAT_OPEN_ROOM_TIMEOUT_MS", DEFAULT_OPEN_TIMEOUT_MS)?;

        let config = Self {
            max_rooms,
            open_timeout: Duration::from_millis(open_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the room capacity is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidConfig`] if `max_rooms` is zero or larger
    /// than the semaphore can hold.
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.max_rooms == 0 {
            return Err(ChatError::InvalidConfig(
                "max_rooms must be at least 1".to_string(),
            ));
        }
        if self.max_rooms > Semaphore::MAX_PERMITS {
            return Err(ChatError::InvalidConfig(format!(
                "max_rooms must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(())
    }
}

/// Parses an environment variable as `T`, returning `default` when unset.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ChatError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ChatError::InvalidConfig(format!("{key}: cannot parse '{raw}'"))),
        Err(_) => Ok(default),
    }
}
