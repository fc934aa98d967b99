use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::info;

use crate::agent::AgentClient;
use crate::capabilities::{keys, Capabilities};
use crate::client::AutomationClient;
use crate::command::{Command, CommandName};
use crate::context::TestContext;
use crate::error::ConfigError;
use crate::interceptor::{CommandError, CommandResult, ReportingExecutor};
use crate::reporter::Reporter;
use crate::settings::StepSettings;

const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";
pub const MOBILE_IMPLICIT_TIMEOUT: Duration = Duration::from_secs(15);

/// A driver session whose every command is reported to the Agent.
pub struct ReportingDriver {
    executor: Arc<ReportingExecutor>,
    reporter: Reporter,
    session_id: String,
    capabilities: Capabilities,
}

impl ReportingDriver {
    /// Opens the Agent session and attaches `client` to it.
    pub async fn start(
        client: Arc<dyn AutomationClient>,
        agent: Arc<AgentClient>,
        context: Arc<dyn TestContext>,
    ) -> CommandResult<Self> {
        let desired = Value::Object(agent.capabilities().without_sdk_keys().as_map().clone());
        let executor = Arc::new(ReportingExecutor::new(client, agent, context));
        let opened = executor
            .execute(&Command::new(CommandName::NewSession).with_parameter("desiredCapabilities", desired))
            .await?;

        let session_id = opened
            .get("sessionId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let capabilities = opened
            .get("capabilities")
            .cloned()
            .and_then(|caps| serde_json::from_value(caps).ok())
            .unwrap_or_default();
        let reporter = Reporter::new(
            Arc::clone(executor.agent()),
            executor.switches(),
            executor.context(),
            executor.clone(),
        );
        Ok(Self {
            executor,
            reporter,
            session_id,
            capabilities,
        })
    }

    /// Like [`start`](Self::start) for an Android or iOS session. The
    /// [`AgentClient`] has already checked the device capabilities.
    pub async fn start_mobile(
        client: Arc<dyn AutomationClient>,
        agent: Arc<AgentClient>,
        context: Arc<dyn TestContext>,
    ) -> CommandResult<Self> {
        if !agent.capabilities().is_mobile() {
            return Err(ConfigError::InvalidValue {
                key: keys::PLATFORM_NAME,
                reason: "mobile sessions need an Android or iOS platformName".into(),
            }
            .into());
        }
        let driver = Self::start(client, agent, context).await?;
        driver
            .executor
            .set_implicit_timeout(MOBILE_IMPLICIT_TIMEOUT)
            .await?;
        info!(target: "interceptor", session_id = %driver.session_id, "mobile session ready");
        Ok(driver)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Capabilities the remote end reported for the session.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn report(&self) -> &Reporter {
        &self.reporter
    }

    pub fn executor(&self) -> &Arc<ReportingExecutor> {
        &self.executor
    }

    pub fn step_settings(&self) -> StepSettings {
        self.executor.step_settings()
    }

    pub fn set_step_settings(&self, settings: StepSettings) {
        self.executor.set_step_settings(settings);
    }

    pub async fn get(&self, url: &str) -> CommandResult<()> {
        self.run(Command::new(CommandName::Get).with_parameter("url", url))
            .await
            .map(drop)
    }

    pub async fn current_url(&self) -> CommandResult<String> {
        let value = self.run(Command::new(CommandName::GetCurrentUrl)).await?;
        expect_string(CommandName::GetCurrentUrl, value)
    }

    pub async fn title(&self) -> CommandResult<String> {
        let value = self.run(Command::new(CommandName::GetTitle)).await?;
        expect_string(CommandName::GetTitle, value)
    }

    pub async fn page_source(&self) -> CommandResult<String> {
        let value = self.run(Command::new(CommandName::GetPageSource)).await?;
        expect_string(CommandName::GetPageSource, value)
    }

    pub async fn back(&self) -> CommandResult<()> {
        self.run(Command::new(CommandName::GoBack)).await.map(drop)
    }

    pub async fn forward(&self) -> CommandResult<()> {
        self.run(Command::new(CommandName::GoForward)).await.map(drop)
    }

    pub async fn refresh(&self) -> CommandResult<()> {
        self.run(Command::new(CommandName::Refresh)).await.map(drop)
    }

    pub async fn find_element(&self, using: &str, value: &str) -> CommandResult<Element> {
        let found = self
            .run(
                Command::new(CommandName::FindElement)
                    .with_parameter("using", using)
                    .with_parameter("value", value),
            )
            .await?;
        Element::from_response(&self.executor, CommandName::FindElement, &found)
    }

    pub async fn find_elements(&self, using: &str, value: &str) -> CommandResult<Vec<Element>> {
        let found = self
            .run(
                Command::new(CommandName::FindElements)
                    .with_parameter("using", using)
                    .with_parameter("value", value),
            )
            .await?;
        Element::many_from_response(&self.executor, CommandName::FindElements, found)
    }

    pub async fn execute_script(&self, script: &str, args: Vec<Value>) -> CommandResult<Value> {
        self.run(
            Command::new(CommandName::ExecuteScript)
                .with_parameter("script", script)
                .with_parameter("args", args),
        )
        .await
    }

    /// Base64 PNG of the current viewport.
    pub async fn screenshot(&self) -> CommandResult<String> {
        let value = self.run(Command::new(CommandName::Screenshot)).await?;
        expect_string(CommandName::Screenshot, value)
    }

    /// Ends the driver session, flushing pending reports to the Agent first.
    pub async fn quit(self) -> CommandResult<()> {
        self.run(Command::new(CommandName::Quit)).await.map(drop)
    }

    async fn run(&self, command: Command) -> CommandResult<Value> {
        self.executor.execute(&command).await
    }
}

#[derive(Clone)]
pub struct Element {
    executor: Arc<ReportingExecutor>,
    id: String,
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element").field("id", &self.id).finish()
    }
}

impl Element {
    fn from_response(
        executor: &Arc<ReportingExecutor>,
        command: CommandName,
        value: &Value,
    ) -> CommandResult<Self> {
        let id = value
            .get(W3C_ELEMENT_KEY)
            .or_else(|| value.get(LEGACY_ELEMENT_KEY))
            .and_then(Value::as_str)
            .ok_or_else(|| CommandError::UnexpectedResponse {
                command,
                detail: format!("no element reference in {value}"),
            })?;
        Ok(Self {
            executor: Arc::clone(executor),
            id: id.to_string(),
        })
    }

    fn many_from_response(
        executor: &Arc<ReportingExecutor>,
        command: CommandName,
        value: Value,
    ) -> CommandResult<Vec<Self>> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| Self::from_response(executor, command, item))
                .collect(),
            other => Err(CommandError::UnexpectedResponse {
                command,
                detail: format!("expected an array, got {other}"),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn click(&self) -> CommandResult<()> {
        self.run(Command::new(CommandName::ClickElement)).await.map(drop)
    }

    pub async fn clear(&self) -> CommandResult<()> {
        self.run(Command::new(CommandName::ClearElement)).await.map(drop)
    }

    pub async fn submit(&self) -> CommandResult<()> {
        self.run(Command::new(CommandName::SubmitElement)).await.map(drop)
    }

    pub async fn send_keys(&self, text: &str) -> CommandResult<()> {
        let keys: Vec<Value> = text.chars().map(|c| json!(c.to_string())).collect();
        self.run(
            Command::new(CommandName::SendKeysToElement)
                .with_parameter("text", text)
                .with_parameter("value", keys),
        )
        .await
        .map(drop)
    }

    pub async fn text(&self) -> CommandResult<String> {
        let value = self.run(Command::new(CommandName::GetElementText)).await?;
        expect_string(CommandName::GetElementText, value)
    }

    pub async fn attribute(&self, name: &str) -> CommandResult<Option<String>> {
        let value = self
            .run(Command::new(CommandName::GetElementAttribute).with_parameter("name", name))
            .await?;
        Ok(match value {
            Value::Null => None,
            Value::String(text) => Some(text),
            other => Some(other.to_string()),
        })
    }

    pub async fn is_displayed(&self) -> CommandResult<bool> {
        let value = self.run(Command::new(CommandName::IsElementDisplayed)).await?;
        expect_bool(CommandName::IsElementDisplayed, value)
    }

    pub async fn is_enabled(&self) -> CommandResult<bool> {
        let value = self.run(Command::new(CommandName::IsElementEnabled)).await?;
        expect_bool(CommandName::IsElementEnabled, value)
    }

    pub async fn is_selected(&self) -> CommandResult<bool> {
        let value = self.run(Command::new(CommandName::IsElementSelected)).await?;
        expect_bool(CommandName::IsElementSelected, value)
    }

    pub async fn find_element(&self, using: &str, value: &str) -> CommandResult<Element> {
        let found = self
            .run(
                Command::new(CommandName::FindChildElement)
                    .with_parameter("using", using)
                    .with_parameter("value", value),
            )
            .await?;
        Element::from_response(&self.executor, CommandName::FindChildElement, &found)
    }

    async fn run(&self, command: Command) -> CommandResult<Value> {
        self.executor.execute_element(&self.id, command).await
    }
}

fn expect_string(command: CommandName, value: Value) -> CommandResult<String> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(CommandError::UnexpectedResponse {
            command,
            detail: format!("expected a string, got {other}"),
        }),
    }
}

fn expect_bool(command: CommandName, value: Value) -> CommandResult<bool> {
    value.as_bool().ok_or_else(|| CommandError::UnexpectedResponse {
        command,
        detail: format!("expected a boolean, got {value}"),
    })
}
