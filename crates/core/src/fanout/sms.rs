use std::time::Duration;

use thiserror::Error;

const SMS_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("upstream returned {0}")]
    NonSuccess(u16),
}

/// Thin wrapper over a Twilio-compatible message-create endpoint. Non-2xx
/// responses are surfaced as a typed error rather than panicking; callers
/// log and continue.
pub struct SmsClient {
    client: reqwest::Client,
    endpoint: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    to_number: String,
}

impl SmsClient {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
        to_number: impl Into<String>,
    ) -> Self {
        let account_sid = account_sid.into();
        Self {
            client: reqwest::Client::new(),
            endpoint: format!(
                "https://api.twilio.com/2010-04-01/Accounts/{account_sid}/Messages.json"
            ),
            account_sid,
            auth_token: auth_token.into(),
            from_number: from_number.into(),
            to_number: to_number.into(),
        }
    }

    /// Override the upstream endpoint; used by tests to point at a
    /// `wiremock` server instead of the real Twilio API.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub async fn send(&self, body: &str) -> Result<(), SmsError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .timeout(SMS_TIMEOUT)
            .form(&[
                ("From", self.from_number.as_str()),
                ("To", self.to_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|e| SmsError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SmsError::NonSuccess(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn successful_send_returns_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Messages.json"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = SmsClient::new("AC123", "token", "+15551230000", "+15559990000")
            .with_endpoint(format!("{}/Messages.json", server.uri()));

        client.send("New match for Dune 2021").await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_reported_as_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Messages.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = SmsClient::new("AC123", "badtoken", "+15551230000", "+15559990000")
            .with_endpoint(format!("{}/Messages.json", server.uri()));

        let result = client.send("New match for Dune 2021").await;
        assert!(matches!(result, Err(SmsError::NonSuccess(401))));
    }
}
