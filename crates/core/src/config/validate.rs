use super::{types::Config, ConfigError};

/// Validate configuration invariants not already enforced by serde/figment
/// extraction. `WorkerConfig::clamp` (applied during load) keeps
/// `fuzzy_threshold`/`check_interval_hours` in range, so this only needs to
/// catch the one thing clamping cannot fix: a bind port of 0.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }
    if config.database_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "database_url must not be empty".to_string(),
        ));
    }
    Ok(())
}
