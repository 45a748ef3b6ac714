//! Lobby engine configuration

use std::env;

use anyhow::{Context, Result};
use duelgate_domain::{DEFAULT_CODE_LENGTH, SAFE_ALPHABET};

/// Lobby engine configuration loaded from environment
///
/// Every timing and bounds tunable is adjustable without code changes; the
/// defaults match the production values of the original deployment.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// How long an empty lobby survives before eviction (seconds)
    pub empty_grace_seconds: u64,
    /// How long a Waiting lobby may sit with no activity (seconds)
    pub waiting_timeout_seconds: u64,
    /// Warning lead time before a timeout closes a lobby (seconds)
    pub warning_window_seconds: u64,
    /// Cleanup sweeper tick interval (seconds)
    pub sweep_interval_seconds: u64,
    /// Minimum players required to start a game
    pub min_players: u8,
    /// Upper bound for a lobby's configured capacity
    pub max_players: u8,
    /// Lobby code length
    pub code_length: usize,
    /// Lobby code alphabet (defaults exclude ambiguous characters)
    pub code_alphabet: String,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            empty_grace_seconds: 60,
            waiting_timeout_seconds: 600,
            warning_window_seconds: 30,
            sweep_interval_seconds: 60,
            min_players: 2,
            max_players: 8,
            code_length: DEFAULT_CODE_LENGTH,
            code_alphabet: SAFE_ALPHABET.to_string(),
        }
    }
}

impl LobbyConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            empty_grace_seconds: env_u64("LOBBY_EMPTY_GRACE_SECONDS", defaults.empty_grace_seconds),
            waiting_timeout_seconds: env_u64(
                "LOBBY_WAITING_TIMEOUT_SECONDS",
                defaults.waiting_timeout_seconds,
            ),
            warning_window_seconds: env_u64(
                "LOBBY_WARNING_WINDOW_SECONDS",
                defaults.warning_window_seconds,
            ),
            sweep_interval_seconds: env_u64(
                "LOBBY_SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval_seconds,
            ),
            min_players: env::var("LOBBY_MIN_PLAYERS")
                .unwrap_or_else(|_| defaults.min_players.to_string())
                .parse()
                .context("LOBBY_MIN_PLAYERS must be a valid player count")?,
            max_players: env::var("LOBBY_MAX_PLAYERS")
                .unwrap_or_else(|_| defaults.max_players.to_string())
                .parse()
                .context("LOBBY_MAX_PLAYERS must be a valid player count")?,
            code_length: env::var("LOBBY_CODE_LENGTH")
                .unwrap_or_else(|_| defaults.code_length.to_string())
                .parse()
                .context("LOBBY_CODE_LENGTH must be a valid length")?,
            code_alphabet: env::var("LOBBY_CODE_ALPHABET")
                .unwrap_or(defaults.code_alphabet),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_values() {
        let config = LobbyConfig::default();
        assert_eq!(config.empty_grace_seconds, 60);
        assert_eq!(config.waiting_timeout_seconds, 600);
        assert_eq!(config.warning_window_seconds, 30);
        assert_eq!(config.sweep_interval_seconds, 60);
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 8);
        assert_eq!(config.code_length, 6);
    }

    #[test]
    fn test_from_env_falls_back_to_defaults() {
        // Keys unset in the test environment fall through to defaults.
        let config = LobbyConfig::from_env().expect("loads");
        assert_eq!(config.sweep_interval_seconds, 60);
        assert_eq!(config.code_alphabet, SAFE_ALPHABET);
    }
}
