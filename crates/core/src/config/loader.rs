use figment::providers::{Env, Serialized};
use figment::Figment;

use super::{types::Config, ConfigError};

/// Map one bare environment variable name onto a dotted config path. The
/// variables are flat and unprefixed (`DATABASE_URL`, `OLLAMA_URL`, ...)
/// rather than following a nested `WATCHLIST_SECTION_FIELD` scheme, so each
/// is merged individually instead of relying on figment's
/// `Env::prefixed(...).split("_")` auto-nesting, which would require a
/// uniform prefix these variables don't share.
fn env_field(var: &'static str, path: &'static str) -> Env {
    Env::raw().only(&[var]).map(move |_| path.into())
}

/// Load configuration from the process environment, falling back to
/// [`Config::default`] for every unset field.
pub fn load_config() -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(env_field("DATABASE_URL", "database_url"))
        .merge(env_field("HOST", "server.host"))
        .merge(env_field("PORT", "server.port"))
        .merge(env_field("CHECK_INTERVAL_HOURS", "worker.check_interval_hours"))
        .merge(env_field("RUN_WORKER_ON_START", "worker.run_worker_on_start"))
        .merge(env_field("FUZZY_THRESHOLD", "worker.fuzzy_threshold"))
        .merge(env_field("DISABLE_PLAYWRIGHT", "worker.disable_playwright"))
        .merge(env_field("USE_ENTITY_MATCHING", "entity_matching.enabled"))
        .merge(env_field("OLLAMA_URL", "entity_matching.ollama_url"))
        .merge(env_field("OLLAMA_MODEL", "entity_matching.ollama_model"))
        .merge(env_field("TWILIO_ACCOUNT_SID", "sms.twilio_account_sid"))
        .merge(env_field("TWILIO_AUTH_TOKEN", "sms.twilio_auth_token"))
        .merge(env_field("TWILIO_FROM_NUMBER", "sms.twilio_from_number"))
        .merge(env_field("ALERT_TO_NUMBER", "sms.alert_to_number"));

    let mut config: Config = figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.worker.clamp();
    Ok(config)
}
