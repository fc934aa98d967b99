use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

use crate::agent::{AgentClient, SessionError};
use crate::client::{AutomationClient, DriverError, ProtocolFailure};
use crate::command::{
    classify, Command, CommandName, Reportability, ELEMENT_ID_PARAM, SESSION_ID_PARAM,
};
use crate::config::UNNAMED_TEST;
use crate::context::TestContext;
use crate::error::ConfigError;
use crate::redact::Redactor;
use crate::report::{CustomTestReport, DriverCommandReport};
use crate::reporter::{ReportSwitches, ScreenshotSource};
use crate::session::Dialect;
use crate::settings::StepSettings;
use crate::wait;

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("{error}: {message}")]
    Protocol { error: String, message: String },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unexpected response to {command}: {detail}")]
    UnexpectedResponse {
        command: CommandName,
        detail: String,
    },
}

impl CommandError {
    fn from_failure(failure: ProtocolFailure, command: &Command) -> Self {
        if failure.is_no_such_element() {
            CommandError::NoSuchElement(format!(
                "{}: {}",
                failure.message,
                Value::Object(command.parameters().clone())
            ))
        } else {
            CommandError::Protocol {
                error: failure.error,
                message: failure.message,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Execute without producing a command report.
    pub skip_report: bool,
    /// Treat the call as part of a polling loop even outside [`wait::scope`].
    pub wait_loop: bool,
}

impl CallOptions {
    pub fn unreported() -> Self {
        Self {
            skip_report: true,
            ..Self::default()
        }
    }

    pub fn wait_loop() -> Self {
        Self {
            wait_loop: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct InterceptorState {
    latest_test_name: Option<String>,
    stashed: Option<DriverCommandReport>,
}

/// Decorates an [`AutomationClient`], reporting every command it runs to
/// the Agent without changing what the caller observes.
pub struct ReportingExecutor {
    client: Arc<dyn AutomationClient>,
    agent: Arc<AgentClient>,
    switches: Arc<ReportSwitches>,
    context: Arc<dyn TestContext>,
    settings: Mutex<StepSettings>,
    state: Mutex<InterceptorState>,
    next_invocation: AtomicU64,
}

impl ReportingExecutor {
    pub fn new(
        client: Arc<dyn AutomationClient>,
        agent: Arc<AgentClient>,
        context: Arc<dyn TestContext>,
    ) -> Self {
        let switches = Arc::new(ReportSwitches::from_config(agent.config()));
        Self {
            client,
            agent,
            switches,
            context,
            settings: Mutex::new(StepSettings::default()),
            state: Mutex::new(InterceptorState::default()),
            next_invocation: AtomicU64::new(1),
        }
    }

    pub fn agent(&self) -> &Arc<AgentClient> {
        &self.agent
    }

    pub fn switches(&self) -> Arc<ReportSwitches> {
        Arc::clone(&self.switches)
    }

    pub fn context(&self) -> Arc<dyn TestContext> {
        Arc::clone(&self.context)
    }

    pub fn step_settings(&self) -> StepSettings {
        self.settings.lock().unwrap().clone()
    }

    pub fn set_step_settings(&self, settings: StepSettings) {
        *self.settings.lock().unwrap() = settings;
    }

    pub fn session_id(&self) -> Option<String> {
        self.agent.session().map(|session| session.session_id)
    }

    pub async fn execute(&self, command: &Command) -> CommandResult<Value> {
        self.execute_with(command, CallOptions::default()).await
    }

    pub async fn execute_with(
        &self,
        command: &Command,
        options: CallOptions,
    ) -> CommandResult<Value> {
        let client = Arc::clone(&self.client);
        self.intercept(command, options, move || async move {
            client.execute(command).await
        })
        .await
    }

    /// Runs an element-scoped command with the element id attached as `id`.
    pub async fn execute_element(
        &self,
        element_id: &str,
        mut command: Command,
    ) -> CommandResult<Value> {
        command.set_parameter(ELEMENT_ID_PARAM, element_id);
        self.execute(&command).await
    }

    /// Dispatches a command by its driver name. Names outside the canonical
    /// set go to [`AutomationClient::execute_raw`] and are never reported.
    pub async fn execute_named(
        &self,
        name: &str,
        parameters: Map<String, Value>,
    ) -> CommandResult<Value> {
        match classify(name) {
            Some(descriptor) => {
                let command = Command::new(descriptor.name).with_parameters(parameters);
                self.execute(&command).await
            }
            None => {
                debug!(target: "interceptor", command = name, "unknown command, passing through unreported");
                Ok(self.client.execute_raw(name, &parameters).await?)
            }
        }
    }

    /// Wraps `run`, the real execution of `command`, in the reporting pipeline.
    ///
    /// Session creation is served by the Agent handshake and never invokes
    /// `run`; teardown flushes and closes the Agent session before it.
    pub async fn intercept<F, Fut>(
        &self,
        command: &Command,
        options: CallOptions,
        run: F,
    ) -> CommandResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, DriverError>>,
    {
        let invocation = self.next_invocation.fetch_add(1, Ordering::Relaxed);
        let span = tracing::debug_span!(
            target: "interceptor",
            "command",
            invocation,
            name = %command.name()
        );
        self.dispatch(command, options, run).instrument(span).await
    }

    async fn dispatch<F, Fut>(
        &self,
        command: &Command,
        options: CallOptions,
        run: F,
    ) -> CommandResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, DriverError>>,
    {
        match command.descriptor().reportability {
            Reportability::SessionLifecycle if command.name() == CommandName::NewSession => {
                return self.open_session().await;
            }
            Reportability::SessionLifecycle => return self.close_session(run).await,
            Reportability::Setup => return Ok(run().await?),
            Reportability::Reported => {}
        }

        self.track_test_boundary();
        let settings = self.step_settings();
        let missing = command.missing_parameters();
        if !missing.is_empty() {
            debug!(target: "interceptor", ?missing, "command lacks expected parameters");
        }

        if let Some(timeout) = settings.timeout_override() {
            self.set_implicit_timeout(timeout).await?;
        }
        if let Some(delay) = settings.sleep_before() {
            tokio::time::sleep(delay).await;
        }
        let outcome = run().await;
        if let Some(delay) = settings.sleep_after() {
            tokio::time::sleep(delay).await;
        }

        let wait_loop = options.wait_loop || wait::in_wait_scope();
        let report = !options.skip_report;
        match outcome {
            Err(err) => {
                debug!(target: "interceptor", "command failed: {err}");
                if report {
                    let result = Some(Value::String(err.to_string()));
                    self.report_command(command, result, false, &settings, wait_loop)
                        .await;
                }
                Err(CommandError::Driver(err))
            }
            Ok(value) => match ProtocolFailure::detect(&value) {
                Some(failure) => {
                    let error = CommandError::from_failure(failure, command);
                    debug!(target: "interceptor", "command returned protocol error: {error}");
                    if report {
                        let result = Some(Value::String(error.to_string()));
                        self.report_command(command, result, false, &settings, wait_loop)
                            .await;
                    }
                    Err(error)
                }
                None => {
                    if report {
                        self.report_command(command, Some(value.clone()), true, &settings, wait_loop)
                            .await;
                    }
                    Ok(value)
                }
            },
        }
    }

    /// Issues the dialect's implicit-timeout command. Never reported.
    pub async fn set_implicit_timeout(&self, timeout: Duration) -> CommandResult<()> {
        let session = self.agent.session();
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let dialect = session
            .as_ref()
            .map(|session| session.dialect)
            .unwrap_or_default();
        let mut command = match dialect {
            Dialect::W3c => Command::new(CommandName::SetTimeout).with_parameter("implicit", millis),
            Dialect::Oss => Command::new(CommandName::ImplicitlyWait).with_parameter("ms", millis),
        };
        if let Some(session) = &session {
            command.set_parameter(SESSION_ID_PARAM, session.session_id.clone());
        }
        self.client.execute(&command).await?;
        Ok(())
    }

    async fn open_session(&self) -> CommandResult<Value> {
        let response = self.agent.start_session().await?;
        let Some(session) = self.agent.session() else {
            return Err(SessionError::NotCreated("agent session missing after handshake".into()).into());
        };
        if let Err(err) = self.client.attach(&session).await {
            self.agent.quit_session().await;
            return Err(SessionError::NotCreated(format!(
                "failed to attach driver to session {}: {err}",
                session.session_id
            ))
            .into());
        }
        info!(
            target: "interceptor",
            session_id = %session.session_id,
            dialect = %session.dialect,
            "driver attached to agent session"
        );
        Ok(json!({
            "sessionId": response.session_id,
            "capabilities": response.capabilities,
        }))
    }

    async fn close_session<F, Fut>(&self, run: F) -> CommandResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, DriverError>>,
    {
        self.flush_stashed();
        let latest = self.state.lock().unwrap().latest_test_name.take();
        if let Some(name) = latest {
            self.report_test(&name);
        }
        self.agent.quit_session().await;
        run().await?;
        Ok(Value::Null)
    }

    /// Emits the stashed wait-loop report, if any.
    pub fn flush_stashed(&self) {
        let stashed = self.state.lock().unwrap().stashed.take();
        if let Some(report) = stashed {
            self.agent.report_driver_command(&report);
        }
    }

    fn track_test_boundary(&self) {
        let current = self.context.current_test_name();
        let previous = {
            let mut state = self.state.lock().unwrap();
            if state.latest_test_name.as_deref() == Some(current.as_str()) {
                return;
            }
            state.latest_test_name.replace(current.clone())
        };
        let Some(previous) = previous else {
            return;
        };
        info!(target: "interceptor", previous = %previous, current = %current, "test changed");
        // Commands of the finished test go out before its closing report.
        self.flush_stashed();
        self.report_test(&previous);
    }

    fn report_test(&self, name: &str) {
        if name == UNNAMED_TEST {
            return;
        }
        if self.switches.auto_test_reports_disabled() {
            debug!(target: "interceptor", test = name, "automatic test reports disabled");
            return;
        }
        if self.agent.config().is_test_excluded(name) {
            debug!(target: "interceptor", test = name, "test excluded from reports");
            return;
        }
        self.agent
            .report_test(&CustomTestReport::new(name, true, None));
    }

    async fn report_command(
        &self,
        command: &Command,
        result: Option<Value>,
        passed: bool,
        settings: &StepSettings,
        wait_loop: bool,
    ) {
        if self.switches.command_reports_disabled() {
            return;
        }
        let mut reported = command.clone();
        if !self.agent.config().disable_redaction {
            let session_id = self.session_id();
            Redactor::new(
                self.client.as_ref(),
                self.agent.capabilities(),
                session_id.as_deref(),
            )
            .redact(&mut reported)
            .await;
        }
        let screenshot = if !wait_loop && settings.screenshot_condition.should_capture(passed) {
            self.capture_screenshot().await
        } else {
            None
        };
        let report = DriverCommandReport::new(reported, result, settings.reported_outcome(passed))
            .with_screenshot(screenshot);

        let flushed = {
            let mut state = self.state.lock().unwrap();
            if wait_loop {
                debug!(target: "interceptor", command = %command.name(), "stashing wait-loop report");
                state.stashed = Some(report);
                return;
            }
            state.stashed.take()
        };
        if let Some(stashed) = flushed {
            self.agent.report_driver_command(&stashed);
        }
        self.agent.report_driver_command(&report);
    }

    async fn capture_screenshot(&self) -> Option<String> {
        let mut command = Command::new(CommandName::Screenshot);
        if let Some(session_id) = self.session_id() {
            command.set_parameter(SESSION_ID_PARAM, session_id);
        }
        match self.client.execute(&command).await {
            Ok(Value::String(raw)) => normalize_screenshot(&raw),
            Ok(_) => {
                warn!(target: "interceptor", "screenshot returned a non-string value");
                None
            }
            Err(err) => {
                warn!(target: "interceptor", "screenshot capture failed: {err}");
                None
            }
        }
    }
}

#[async_trait]
impl ScreenshotSource for ReportingExecutor {
    async fn screenshot(&self) -> Result<String, CommandError> {
        let value = self
            .execute_with(&Command::new(CommandName::Screenshot), CallOptions::unreported())
            .await?;
        value
            .as_str()
            .and_then(normalize_screenshot)
            .ok_or_else(|| CommandError::UnexpectedResponse {
                command: CommandName::Screenshot,
                detail: "expected base64 image data".into(),
            })
    }
}

/// Strips a data-URL prefix and checks the payload decodes as base64.
pub fn normalize_screenshot(raw: &str) -> Option<String> {
    let encoded = raw
        .split_once("base64,")
        .map(|(_, data)| data)
        .unwrap_or(raw)
        .trim();
    match STANDARD.decode(encoded) {
        Ok(bytes) if !bytes.is_empty() => Some(encoded.to_string()),
        _ => {
            warn!(target: "interceptor", "discarding screenshot that is not base64 image data");
            None
        }
    }
}
