use std::sync::Arc;

use quarryscout_core::{Config, Engine, SanitizedConfig};

/// Shared application state. Everything a handler needs beyond `config`
/// hangs off `Engine`, which is the one value threaded through both the
/// worker and the API.
pub struct AppState {
    pub config: Config,
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<Engine>) -> Arc<Self> {
        Arc::new(Self { config, engine })
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }
}
