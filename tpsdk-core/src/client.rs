use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::command::Command;
use crate::session::AgentSession;

#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("driver transport error: {0}")]
    Transport(String),
    #[error("driver session error: {0}")]
    Session(String),
    #[error("command not supported by driver: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Other(String),
}

/// The raw automation client the interceptor wraps.
///
/// `execute` returns the command's result value with any protocol envelope
/// removed. Protocol errors may come back either as `Err` or as an
/// `{"error": .., "message": ..}` value; the interceptor handles both.
#[async_trait]
pub trait AutomationClient: Send + Sync {
    /// Binds the client to the session the Agent created.
    async fn attach(&self, session: &AgentSession) -> Result<(), DriverError> {
        let _ = session;
        Ok(())
    }

    async fn execute(&self, command: &Command) -> Result<Value, DriverError>;

    /// Vendor commands outside the canonical set.
    async fn execute_raw(
        &self,
        name: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Value, DriverError> {
        let _ = parameters;
        Err(DriverError::Unsupported(name.to_string()))
    }
}

/// Protocol error carried inside a successful transport response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolFailure {
    pub error: String,
    pub message: String,
}

impl ProtocolFailure {
    pub const NO_SUCH_ELEMENT: &'static str = "no such element";

    /// Looks for `{error, message}` at the top level or under `value`.
    pub fn detect(value: &Value) -> Option<Self> {
        let payload = match value.get("error") {
            Some(_) => value,
            None => value.get("value").filter(|inner| inner.get("error").is_some())?,
        };
        let error = payload.get("error")?.as_str()?.to_string();
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Self { error, message })
    }

    pub fn is_no_such_element(&self) -> bool {
        self.error == Self::NO_SUCH_ELEMENT
    }
}
