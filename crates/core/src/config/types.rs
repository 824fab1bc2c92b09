use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Root configuration, entirely environment-sourced — there is no config
/// file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub entity_matching: EntityMatchingConfig,

    #[serde(default)]
    pub sms: SmsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            server: ServerConfig::default(),
            worker: WorkerConfig::default(),
            entity_matching: EntityMatchingConfig::default(),
            sms: SmsConfig::default(),
        }
    }
}

fn default_database_url() -> String {
    "watchlist.sqlite3".to_string()
}

/// API bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Worker/scheduler knobs: `CHECK_INTERVAL_HOURS`, `RUN_WORKER_ON_START`,
/// `FUZZY_THRESHOLD`, `DISABLE_PLAYWRIGHT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_check_interval_hours")]
    pub check_interval_hours: u64,
    #[serde(default)]
    pub run_worker_on_start: bool,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default)]
    pub disable_playwright: bool,
    #[serde(default = "default_per_item_cap")]
    pub per_item_cap: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            check_interval_hours: default_check_interval_hours(),
            run_worker_on_start: false,
            fuzzy_threshold: default_fuzzy_threshold(),
            disable_playwright: false,
            per_item_cap: default_per_item_cap(),
        }
    }
}

fn default_check_interval_hours() -> u64 {
    6
}

fn default_fuzzy_threshold() -> f64 {
    0.78
}

fn default_per_item_cap() -> usize {
    5
}

impl WorkerConfig {
    /// Clamp `fuzzy_threshold` into `[0,1]` and floor `check_interval_hours`
    /// at 1.
    pub fn clamp(&mut self) {
        self.fuzzy_threshold = self.fuzzy_threshold.clamp(0.0, 1.0);
        if self.check_interval_hours == 0 {
            self.check_interval_hours = 1;
        }
    }
}

/// `USE_ENTITY_MATCHING`, `OLLAMA_URL`, `OLLAMA_MODEL`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMatchingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
}

impl Default for EntityMatchingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ollama_url: default_ollama_url(),
            ollama_model: default_ollama_model(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

/// Twilio SMS quadruple; all four must be non-empty for SMS to fire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default)]
    pub twilio_account_sid: Option<String>,
    #[serde(default)]
    pub twilio_auth_token: Option<String>,
    #[serde(default)]
    pub twilio_from_number: Option<String>,
    #[serde(default)]
    pub alert_to_number: Option<String>,
}

impl SmsConfig {
    /// True only when all four values are set and non-empty.
    pub fn is_complete(&self) -> bool {
        [
            &self.twilio_account_sid,
            &self.twilio_auth_token,
            &self.twilio_from_number,
            &self.alert_to_number,
        ]
        .iter()
        .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

/// Secrets-redacted view for API responses (`GET /api/config`-style
/// diagnostics).
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub worker: WorkerConfig,
    pub entity_matching_enabled: bool,
    pub sms_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            worker: config.worker.clone(),
            entity_matching_enabled: config.entity_matching.enabled,
            sms_configured: config.sms.is_complete(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_absent_environment() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert!(!config.worker.run_worker_on_start);
        assert_eq!(config.worker.fuzzy_threshold, 0.78);
        assert_eq!(config.worker.check_interval_hours, 6);
    }

    #[test]
    fn sms_is_complete_requires_all_four() {
        let mut sms = SmsConfig::default();
        assert!(!sms.is_complete());
        sms.twilio_account_sid = Some("AC123".to_string());
        sms.twilio_auth_token = Some("tok".to_string());
        sms.twilio_from_number = Some("+1".to_string());
        assert!(!sms.is_complete());
        sms.alert_to_number = Some("+2".to_string());
        assert!(sms.is_complete());
    }

    #[test]
    fn worker_config_clamps_fuzzy_threshold() {
        let mut worker = WorkerConfig {
            fuzzy_threshold: 1.5,
            check_interval_hours: 0,
            ..WorkerConfig::default()
        };
        worker.clamp();
        assert_eq!(worker.fuzzy_threshold, 1.0);
        assert_eq!(worker.check_interval_hours, 1);
    }

    #[test]
    fn sanitized_config_redacts_sms_to_a_boolean() {
        let mut config = Config::default();
        config.sms.twilio_account_sid = Some("AC123".to_string());
        let sanitized = SanitizedConfig::from(&config);
        assert!(!sanitized.sms_configured);
    }
}
