#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

use tpsdk_core::{
    AgentClient, AgentResult, AgentSession, AgentTransport, AutomationClient, Capabilities,
    Command, CommandName, DriverError, Endpoint, ManualTestContext, ReportingExecutor, SdkConfig,
};

pub const SCREENSHOT: &str = "iVBORw0KGgo=";
pub const TOKEN: &str = "dev-token";

/// Automation client double: records every command and answers from a script.
#[derive(Default)]
pub struct FakeDriver {
    scripted: Mutex<HashMap<CommandName, VecDeque<Result<Value, DriverError>>>>,
    attributes: Mutex<HashMap<(String, String), Value>>,
    texts: Mutex<HashMap<String, (Value, Duration)>>,
    executed: Mutex<Vec<Command>>,
    raw: Mutex<Vec<String>>,
    attached: Mutex<Option<AgentSession>>,
    screenshot_delay: Mutex<Duration>,
}

impl FakeDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, name: CommandName, result: Result<Value, DriverError>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(name)
            .or_default()
            .push_back(result);
    }

    pub fn set_attribute(&self, element: &str, name: &str, value: Value) {
        self.attributes
            .lock()
            .unwrap()
            .insert((element.to_string(), name.to_string()), value);
    }

    pub fn set_text(&self, element: &str, text: &str, delay: Duration) {
        self.texts
            .lock()
            .unwrap()
            .insert(element.to_string(), (json!(text), delay));
    }

    pub fn set_screenshot_delay(&self, delay: Duration) {
        *self.screenshot_delay.lock().unwrap() = delay;
    }

    pub fn executed(&self) -> Vec<Command> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_names(&self) -> Vec<CommandName> {
        self.executed().iter().map(Command::name).collect()
    }

    pub fn raw_calls(&self) -> Vec<String> {
        self.raw.lock().unwrap().clone()
    }

    pub fn attached(&self) -> Option<AgentSession> {
        self.attached.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomationClient for FakeDriver {
    async fn attach(&self, session: &AgentSession) -> Result<(), DriverError> {
        *self.attached.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    async fn execute(&self, command: &Command) -> Result<Value, DriverError> {
        self.executed.lock().unwrap().push(command.clone());
        let element = command.element_id().unwrap_or_default().to_string();

        if command.name() == CommandName::GetElementAttribute {
            let name = command
                .parameter("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let value = self.attributes.lock().unwrap().get(&(element, name)).cloned();
            return Ok(value.unwrap_or(Value::Null));
        }
        if command.name() == CommandName::GetElementText {
            let entry = self.texts.lock().unwrap().get(&element).cloned();
            if let Some((text, delay)) = entry {
                tokio::time::sleep(delay).await;
                return Ok(text);
            }
        }
        if command.name() == CommandName::Screenshot {
            let delay = *self.screenshot_delay.lock().unwrap();
            tokio::time::sleep(delay).await;
        }
        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&command.name())
            .and_then(VecDeque::pop_front);
        if let Some(result) = scripted {
            return result;
        }
        Ok(match command.name() {
            CommandName::Screenshot => json!(SCREENSHOT),
            CommandName::FindElement | CommandName::FindChildElement => {
                json!({"element-6066-11e4-a52e-4f735466cecf": "el-1"})
            }
            _ => Value::Null,
        })
    }

    async fn execute_raw(
        &self,
        name: &str,
        _parameters: &Map<String, Value>,
    ) -> Result<Value, DriverError> {
        self.raw.lock().unwrap().push(name.to_string());
        Ok(json!("raw"))
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub token: String,
    pub body: Value,
}

/// Agent double: answers the session handshake and records every POST.
pub struct RecordingTransport {
    socket_port: u16,
    dialect: String,
    calls: Mutex<Vec<Call>>,
}

impl RecordingTransport {
    pub fn new(socket_port: u16, dialect: &str) -> Arc<Self> {
        Arc::new(Self {
            socket_port,
            dialect: dialect.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn bodies(&self, endpoint: Endpoint) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|call| call.url.ends_with(endpoint.path()))
            .map(|call| call.body)
            .collect()
    }

    /// Report endpoints hit, in delivery order, as `(endpoint, body)`.
    pub fn reports(&self) -> Vec<(Endpoint, Value)> {
        self.calls()
            .into_iter()
            .filter_map(|call| {
                [Endpoint::ReportTest, Endpoint::ReportStep, Endpoint::ReportDriverCommand]
                    .into_iter()
                    .find(|endpoint| call.url.ends_with(endpoint.path()))
                    .map(|endpoint| (endpoint, call.body))
            })
            .collect()
    }
}

#[async_trait]
impl AgentTransport for RecordingTransport {
    async fn post(&self, url: &str, token: &str, body: &Value) -> AgentResult<Value> {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            token: token.to_string(),
            body: body.clone(),
        });
        if url.ends_with(Endpoint::DevelopmentSession.path()) {
            return Ok(json!({
                "devSocketPort": self.socket_port,
                "serverAddress": "http://127.0.0.1:4444/wd/hub",
                "sessionId": "session-42",
                "dialect": self.dialect,
                "capabilities": {"browserName": "chrome"},
                "agentVersion": "3.5.1"
            }));
        }
        Ok(Value::Null)
    }
}

pub fn config() -> SdkConfig {
    SdkConfig {
        developer_token: Some(TOKEN.into()),
        ..SdkConfig::default()
    }
}

pub fn browser_caps() -> Capabilities {
    Capabilities::new().with("browserName", "chrome")
}

/// Wires a fake driver and a recording Agent around a live development socket.
pub struct Harness {
    pub listener: TcpListener,
    pub transport: Arc<RecordingTransport>,
    pub driver: Arc<FakeDriver>,
    pub agent: Arc<AgentClient>,
    pub context: Arc<ManualTestContext>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(config(), browser_caps(), "W3C").await
    }

    pub async fn with(config: SdkConfig, capabilities: Capabilities, dialect: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let transport = RecordingTransport::new(port, dialect);
        let agent =
            Arc::new(AgentClient::with_transport(config, capabilities, transport.clone()).unwrap());
        Self {
            listener,
            transport,
            driver: FakeDriver::new(),
            agent,
            context: Arc::new(ManualTestContext::default()),
        }
    }

    pub fn executor(&self) -> ReportingExecutor {
        ReportingExecutor::new(
            self.driver.clone(),
            Arc::clone(&self.agent),
            self.context.clone(),
        )
    }

    /// Executor with the Agent session already opened.
    pub async fn started(&self) -> ReportingExecutor {
        let executor = self.executor();
        executor
            .execute(&Command::new(CommandName::NewSession))
            .await
            .unwrap();
        executor
    }

    pub async fn command_reports(&self) -> Vec<Value> {
        self.agent.drain().await;
        self.transport.bodies(Endpoint::ReportDriverCommand)
    }
}
