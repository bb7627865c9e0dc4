use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::errors::AgentError;
use crate::oracle::{Instruction, OracleConnector, OracleReply, OracleSession};

#[derive(Debug, Clone)]
pub struct HttpOracleConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    /// Persistent browser profile holding a logged-in session.
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub request_timeout: Duration,
}

/// Connector for an agent service reachable over HTTP.
pub struct HttpOracleConnector {
    client: Client,
    base: Url,
    config: HttpOracleConfig,
}

impl HttpOracleConnector {
    pub fn new(config: HttpOracleConfig) -> Result<Self, AgentError> {
        let base = Url::parse(config.api_base.trim_end_matches('/'))
            .map_err(|err| AgentError::session_start(format!("invalid oracle base url: {err}")))?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| {
                AgentError::session_start(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), path)
    }
}

#[derive(Serialize)]
struct StartSessionRequest<'a> {
    starting_page: &'a str,
    user_data_dir: Option<&'a PathBuf>,
    headless: bool,
}

#[derive(Deserialize)]
struct StartSessionResponse {
    session_id: String,
}

#[derive(Serialize)]
struct ActRequest<'a> {
    prompt: &'a str,
    schema: Option<Value>,
    max_steps: u32,
}

#[derive(Deserialize)]
struct ActResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    matches_schema: bool,
    #[serde(default)]
    parsed_response: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

async fn ensure_success(response: Response, what: &str) -> Result<Response, AgentError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "<response unavailable>".to_string());
    Err(AgentError::transport(format!(
        "{what} returned {status}: {text}"
    )))
}

#[async_trait]
impl OracleConnector for HttpOracleConnector {
    async fn open(&self, starting_page: &str) -> Result<Box<dyn OracleSession>, AgentError> {
        let body = StartSessionRequest {
            starting_page,
            user_data_dir: self.config.user_data_dir.as_ref(),
            headless: self.config.headless,
        };
        let mut request = self.client.post(self.endpoint("sessions")).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|err| AgentError::session_start(format!("request failed: {err}")))?;
        let response = ensure_success(response, "session start")
            .await
            .map_err(|err| AgentError::session_start(err.to_string()))?;
        let started: StartSessionResponse = response
            .json()
            .await
            .map_err(|err| AgentError::session_start(format!("malformed start reply: {err}")))?;
        debug!(session = %started.session_id, page = starting_page, "oracle session started");

        Ok(Box::new(HttpOracleSession {
            client: self.client.clone(),
            session_url: self.endpoint(&format!("sessions/{}", started.session_id)),
            api_key: self.config.api_key.clone(),
            id: started.session_id,
            stopped: false,
        }))
    }
}

struct HttpOracleSession {
    client: Client,
    session_url: String,
    api_key: Option<String>,
    id: String,
    stopped: bool,
}

#[async_trait]
impl OracleSession for HttpOracleSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(&mut self, instruction: &Instruction) -> Result<OracleReply, AgentError> {
        let body = ActRequest {
            prompt: &instruction.prompt,
            schema: instruction.shape.as_ref().map(|shape| shape.schema()),
            max_steps: instruction.step_budget,
        };
        let mut request = self
            .client
            .post(format!("{}/act", self.session_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                AgentError::Timeout(format!("act request: {err}"))
            } else {
                AgentError::transport(format!("act request failed: {err}"))
            }
        })?;
        let response = ensure_success(response, "act").await?;
        let payload: ActResponse = response
            .json()
            .await
            .map_err(|err| AgentError::InvalidResponse(err.to_string()))?;
        if let Some(error) = payload.error.filter(|e| !e.trim().is_empty()) {
            return Err(AgentError::instruction(error));
        }
        Ok(OracleReply {
            raw_text: payload.response.unwrap_or_default(),
            matches_shape: payload.matches_schema,
            parsed_value: payload.parsed_response,
        })
    }

    async fn stop(&mut self) -> Result<(), AgentError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        let mut request = self.client.delete(&self.session_url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|err| AgentError::transport(format!("session stop failed: {err}")))?;
        if let Err(err) = ensure_success(response, "session stop").await {
            warn!(session = %self.id, %err, "oracle session did not stop cleanly");
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> HttpOracleConfig {
        HttpOracleConfig {
            api_base: base.to_string(),
            api_key: None,
            user_data_dir: None,
            headless: true,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            HttpOracleConnector::new(config("not a url")),
            Err(AgentError::SessionStart(_))
        ));
    }

    #[test]
    fn builds_endpoints_without_double_slashes() {
        let connector = HttpOracleConnector::new(config("http://127.0.0.1:8080/api/")).unwrap();
        assert_eq!(
            connector.endpoint("sessions"),
            "http://127.0.0.1:8080/api/sessions"
        );
    }

    #[test]
    fn act_response_tolerates_missing_fields() {
        let parsed: ActResponse = serde_json::from_str(r#"{"response":"YES"}"#).unwrap();
        assert_eq!(parsed.response.as_deref(), Some("YES"));
        assert!(!parsed.matches_schema);
        assert!(parsed.error.is_none());
    }
}
