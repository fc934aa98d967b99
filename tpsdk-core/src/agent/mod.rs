mod queue;
mod socket;
mod transport;

use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::capabilities::Capabilities;
use crate::config::SdkConfig;
use crate::error::ConfigError;
use crate::report::{
    CustomTestReport, DriverCommandReport, SessionRequest, SessionResponse, StepReport,
};
use crate::session::AgentSession;

pub use queue::{Endpoint, QueueItem, ReportQueue};
pub use socket::SideChannel;
pub use transport::{AgentError, AgentResult, AgentTransport, HttpTransport};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("session not created: {0}")]
    NotCreated(String),
}

/// Talks to the Agent for one automation session: the handshake, the
/// development socket and the report queue all belong to this client.
pub struct AgentClient {
    config: SdkConfig,
    capabilities: Capabilities,
    token: String,
    transport: Arc<dyn AgentTransport>,
    queue: ReportQueue,
    socket: SideChannel,
    session: Mutex<Option<AgentSession>>,
    agent_version: Mutex<Option<String>>,
}

impl AgentClient {
    /// Resolves session overrides from `capabilities` and fails fast on a
    /// missing token. Mobile capabilities are checked and completed with
    /// [`Capabilities::prepare_mobile`]. Must be called inside a Tokio runtime.
    pub fn new(config: SdkConfig, capabilities: Capabilities) -> Result<Self, ConfigError> {
        Self::with_transport(config, capabilities, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(
        config: SdkConfig,
        capabilities: Capabilities,
        transport: Arc<dyn AgentTransport>,
    ) -> Result<Self, ConfigError> {
        let mut capabilities = capabilities;
        if capabilities.is_mobile() {
            capabilities.prepare_mobile()?;
        }
        let config = config.with_capabilities(&capabilities)?;
        let token = config.developer_token()?.to_string();
        config.validate()?;
        Ok(Self {
            config,
            capabilities,
            token,
            queue: ReportQueue::spawn(Arc::clone(&transport)),
            transport,
            socket: SideChannel::new(),
            session: Mutex::new(None),
            agent_version: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn session(&self) -> Option<AgentSession> {
        self.session.lock().unwrap().clone()
    }

    pub fn agent_version(&self) -> Option<String> {
        self.agent_version.lock().unwrap().clone()
    }

    pub fn socket(&self) -> &SideChannel {
        &self.socket
    }

    pub async fn start_session(&self) -> Result<SessionResponse, SessionError> {
        let token = self.config.developer_token()?;
        let host = self.config.agent_host()?;
        let request = SessionRequest::new(&self.config, &self.capabilities);
        let body = serde_json::to_value(&request)
            .map_err(|err| SessionError::NotCreated(format!("invalid session request: {err}")))?;
        let url = self.config.endpoint(Endpoint::DevelopmentSession.path());

        info!(
            target: "agent",
            agent = %self.config.agent_url,
            project = %request.project_name,
            job = %request.job_name,
            "starting development session"
        );
        let raw = match self.transport.post(&url, token, &body).await {
            Ok(raw) => raw,
            Err(AgentError::ConnectionRefused { .. }) => {
                let message = format!(
                    "Failed connecting to the Agent at {}. Please make sure that the Agent is running and try again.",
                    self.config.agent_url
                );
                error!(target: "agent", "{message}");
                return Err(SessionError::NotCreated(message));
            }
            Err(err) => {
                error!(target: "agent", "session request failed: {err}");
                return Err(SessionError::NotCreated(format!(
                    "failed to start a new session: {err}"
                )));
            }
        };
        let response: SessionResponse = serde_json::from_value(raw).map_err(|err| {
            SessionError::NotCreated(format!("malformed session response: {err}"))
        })?;

        self.socket
            .open(&host, response.dev_socket_port)
            .await
            .map_err(|err| {
                SessionError::NotCreated(format!(
                    "failed connecting to the Agent development socket {host}:{}: {err}",
                    response.dev_socket_port
                ))
            })?;
        if !self.socket.probe().await {
            return Err(SessionError::NotCreated(format!(
                "the Agent development socket {host}:{} closed right after connecting",
                response.dev_socket_port
            )));
        }

        *self.session.lock().unwrap() = Some(AgentSession {
            remote_address: response.server_address.clone(),
            session_id: response.session_id.clone(),
            dialect: response.dialect(),
            capabilities: response.capabilities.clone(),
        });
        *self.agent_version.lock().unwrap() = response.agent_version.clone();
        info!(
            target: "agent",
            session_id = %response.session_id,
            dialect = %response.dialect(),
            agent_version = response.agent_version.as_deref().unwrap_or("unknown"),
            "development session started"
        );
        Ok(response)
    }

    /// Waits for outstanding reports, then closes the development socket.
    pub async fn quit_session(&self) {
        self.queue.drain().await;
        if self.socket.is_open().await && !self.socket.probe().await {
            warn!(target: "agent", "development socket was already gone before quit");
        }
        if self.socket.close().await {
            info!(target: "agent", "development session closed");
        }
    }

    pub fn report_test(&self, report: &CustomTestReport) {
        self.enqueue(Endpoint::ReportTest, report);
    }

    pub fn report_step(&self, report: &StepReport) {
        self.enqueue(Endpoint::ReportStep, report);
    }

    pub fn report_driver_command(&self, report: &DriverCommandReport) {
        self.enqueue(Endpoint::ReportDriverCommand, report);
    }

    pub fn pending_reports(&self) -> usize {
        self.queue.pending()
    }

    pub async fn drain(&self) {
        self.queue.drain().await;
    }

    fn enqueue<T: Serialize>(&self, endpoint: Endpoint, report: &T) {
        let payload = match serde_json::to_value(report) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "agent", endpoint = %endpoint, "failed to serialize report: {err}");
                return;
            }
        };
        debug!(target: "agent", endpoint = %endpoint, "report queued");
        self.queue.push(QueueItem {
            payload,
            url: self.config.endpoint(endpoint.path()),
            token: self.token.clone(),
            endpoint,
        });
    }
}
