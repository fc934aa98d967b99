use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("connection refused by {url}")]
    ConnectionRefused { url: String },
    #[error("agent responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed agent response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Carries a JSON body to the Agent and returns its JSON answer.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn post(&self, url: &str, token: &str, body: &Value) -> AgentResult<Value>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTransport for HttpTransport {
    async fn post(&self, url: &str, token: &str, body: &Value) -> AgentResult<Value> {
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, token)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_connect() {
                    AgentError::ConnectionRefused {
                        url: url.to_string(),
                    }
                } else {
                    AgentError::Transport(err)
                }
            })?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(AgentError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        // Report endpoints may answer with plain text.
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
