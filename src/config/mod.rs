//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::GameConfig;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origin for CORS; any origin when unset
    pub client_origin: Option<String>,
    /// Settings applied to sessions created without their own
    pub game_defaults: GameConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let mut game_defaults = GameConfig::default();
        if let Some(v) = parse_var("TNT_SCORE_REQUIRED")? {
            game_defaults.score_required = v;
        }
        if let Some(v) = parse_var("TNT_SCORE_PER_KILL")? {
            game_defaults.score_per_kill = v;
        }
        if let Some(v) = parse_var("TNT_ASSIST_SCORE")? {
            game_defaults.assist_score = v;
        }
        if let Some(v) = parse_var("TNT_MULTI_KILL_BONUS")? {
            game_defaults.multi_kill_bonus = v;
        }
        if let Some(secs) = parse_var::<u32>("TNT_GRACE_PERIOD_SECS")? {
            game_defaults.initial_grace_period = secs > 0;
            game_defaults.grace_period_secs = secs;
        }
        if let Some(v) = parse_var("TNT_TEAM_KILLS")? {
            game_defaults.team_kills = v;
        }
        if let Some(v) = parse_var("TNT_STREAKS")? {
            game_defaults.streaks = v;
        }
        if let Some(v) = parse_var("TNT_MAX_ACTIVE_ORDNANCE")? {
            game_defaults.max_active_ordnance = v;
        }
        game_defaults.validate()?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|o| !o.is_empty()),

            game_defaults,
        })
    }
}

/// Read an optional variable, failing if it is set but unparseable
fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Parse { key, value: raw }),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Could not parse {key}={value}")]
    Parse { key: &'static str, value: String },

    #[error("Invalid game settings: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_is_none() {
        let value: Option<i32> = parse_var("TNT_TEST_UNSET_VARIABLE").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn garbage_value_is_a_parse_error() {
        env::set_var("TNT_TEST_GARBAGE_VARIABLE", "lots");
        let result: Result<Option<i32>, _> = parse_var("TNT_TEST_GARBAGE_VARIABLE");
        assert!(matches!(result, Err(ConfigError::Parse { key, .. }) if key == "TNT_TEST_GARBAGE_VARIABLE"));
        env::remove_var("TNT_TEST_GARBAGE_VARIABLE");
    }

    #[test]
    fn booleans_and_numbers_parse() {
        env::set_var("TNT_TEST_BOOL_VARIABLE", "true");
        env::set_var("TNT_TEST_NUM_VARIABLE", " 25 ");
        assert_eq!(parse_var::<bool>("TNT_TEST_BOOL_VARIABLE").unwrap(), Some(true));
        assert_eq!(parse_var::<u32>("TNT_TEST_NUM_VARIABLE").unwrap(), Some(25));
        env::remove_var("TNT_TEST_BOOL_VARIABLE");
        env::remove_var("TNT_TEST_NUM_VARIABLE");
    }
}
