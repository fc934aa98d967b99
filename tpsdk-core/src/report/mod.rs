mod session;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::command::{Command, CommandName};

pub use session::{SessionRequest, SessionResponse};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverCommandReport {
    pub command_name: CommandName,
    pub command_parameters: Map<String, Value>,
    pub result: Option<Value>,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl DriverCommandReport {
    /// Built from the (already redacted) copy of the command.
    pub fn new(command: Command, result: Option<Value>, passed: bool) -> Self {
        Self {
            command_name: command.name(),
            command_parameters: command.into_parameters(),
            result,
            passed,
            screenshot: None,
        }
    }

    pub fn with_screenshot(mut self, screenshot: Option<String>) -> Self {
        self.screenshot = screenshot;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub guid: Uuid,
    pub description: String,
    pub message: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl StepReport {
    pub fn new(description: impl Into<String>, message: impl Into<String>, passed: bool) -> Self {
        Self {
            guid: Uuid::new_v4(),
            description: description.into(),
            message: message.into(),
            passed,
            screenshot: None,
        }
    }

    pub fn with_screenshot(mut self, screenshot: Option<String>) -> Self {
        self.screenshot = screenshot;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTestReport {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CustomTestReport {
    pub fn new(name: impl Into<String>, passed: bool, message: Option<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            message,
        }
    }
}
