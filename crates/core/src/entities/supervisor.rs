//! LLM process supervisor: detects whether the LLM server is already
//! running; if not, spawns it; health-probes until ready; terminates on
//! shutdown.

use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

const PROBE_INTERVAL: Duration = Duration::from_secs(1);
const PROBE_BUDGET: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("LLM endpoint did not become ready within {0:?}")]
    NotReady(Duration),

    #[error("failed to spawn LLM server process: {0}")]
    SpawnFailed(std::io::Error),
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// Owns the optional child process and the readiness lifecycle for the
/// local LLM. Constructed once per process when entity matching is enabled;
/// skipped entirely when playwright-driven scraping is also disabled, since
/// there would be nothing left to feed it.
pub struct LlmSupervisor {
    client: reqwest::Client,
    api_base: String,
    model: String,
    child: Option<Child>,
}

impl LlmSupervisor {
    /// Probe the endpoint; if unreachable, spawn `command` and poll once a
    /// second for up to 30s. On success, issues a synchronous warm-up
    /// generation call. Failure beyond the probe budget is a configuration
    /// warning, not a hard error — callers degrade to fuzzy-only.
    pub async fn start(api_base: impl Into<String>, model: impl Into<String>, command: Option<&str>) -> Self {
        let api_base = api_base.into();
        let model = model.into();
        let client = reqwest::Client::new();
        let mut supervisor = Self {
            client,
            api_base,
            model,
            child: None,
        };

        if supervisor.probe_tags().await.is_ok() {
            info!("LLM endpoint already reachable");
        } else if let Some(command) = command {
            match supervisor.spawn(command) {
                Ok(()) => {
                    if supervisor.wait_until_ready().await.is_err() {
                        warn!("LLM server did not become ready within the probe budget; entity matching degrades to fuzzy-only");
                    } else {
                        supervisor.warm_up().await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to spawn LLM server");
                }
            }
        } else {
            warn!("LLM endpoint unreachable and no spawn command configured; entity matching degrades to fuzzy-only");
        }

        supervisor
    }

    fn spawn(&mut self, command: &str) -> Result<(), SupervisorError> {
        let mut parts = command.split_whitespace();
        let program = parts.next().unwrap_or(command);
        let child = Command::new(program)
            .args(parts)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(SupervisorError::SpawnFailed)?;
        self.child = Some(child);
        Ok(())
    }

    async fn wait_until_ready(&self) -> Result<(), SupervisorError> {
        let deadline = tokio::time::Instant::now() + PROBE_BUDGET;
        while tokio::time::Instant::now() < deadline {
            if self.probe_tags().await.is_ok() {
                return Ok(());
            }
            sleep(PROBE_INTERVAL).await;
        }
        Err(SupervisorError::NotReady(PROBE_BUDGET))
    }

    /// GET the model-listing route; readiness additionally requires the
    /// configured model to appear, with prefix match sufficient.
    async fn probe_tags(&self) -> Result<(), ()> {
        let result = timeout(
            Duration::from_secs(5),
            self.client.get(format!("{}/api/tags", self.api_base)).send(),
        )
        .await;

        let response = match result {
            Ok(Ok(r)) if r.status().is_success() => r,
            _ => return Err(()),
        };

        let tags: TagsResponse = match response.json().await {
            Ok(t) => t,
            Err(_) => return Err(()),
        };

        if tags.models.iter().any(|m| m.name.starts_with(&self.model)) {
            Ok(())
        } else {
            Err(())
        }
    }

    async fn warm_up(&self) {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": "warm up",
            "stream": false,
        });
        let result = self
            .client
            .post(format!("{}/api/generate", self.api_base))
            .json(&body)
            .send()
            .await;
        match result {
            Ok(r) if r.status().is_success() => info!("LLM warm-up generation succeeded"),
            _ => warn!("LLM warm-up generation failed; continuing anyway"),
        }
    }

    /// Signal and reap any spawned child. A no-op if the endpoint was
    /// already running at startup.
    pub async fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill LLM child process");
            }
            let _ = child.wait().await;
            info!("LLM child process reaped");
        }
    }
}
