pub mod agent;
pub mod capabilities;
pub mod client;
pub mod command;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod interceptor;
pub mod redact;
pub mod report;
pub mod reporter;
pub mod session;
pub mod settings;
pub mod wait;

pub use agent::{
    AgentClient, AgentError, AgentResult, AgentTransport, Endpoint, HttpTransport, QueueItem,
    ReportQueue, SessionError, SideChannel,
};
pub use capabilities::Capabilities;
pub use client::{AutomationClient, DriverError, ProtocolFailure};
pub use command::{
    classify, describe, Command, CommandDescriptor, CommandName, Reportability, UnknownCommand,
};
pub use config::{
    load_sdk_config, normalize_agent_url, ReportSettings, ReportType, SdkConfig, SdkFileConfig,
    DEFAULT_AGENT_URL, UNNAMED_TEST,
};
pub use context::{infer_test_name, EnvTestContext, ManualTestContext, TestContext};
pub use driver::{Element, ReportingDriver};
pub use error::{ConfigError, ConfigResult};
pub use interceptor::{CallOptions, CommandError, CommandResult, ReportingExecutor};
pub use redact::Redactor;
pub use report::{
    CustomTestReport, DriverCommandReport, SessionRequest, SessionResponse, StepReport,
};
pub use reporter::{ReportSwitches, Reporter, ScreenshotSource};
pub use session::{AgentSession, Dialect};
pub use settings::{ScreenshotCondition, SleepTiming, StepSettings};
pub use wait::{poll_until, WaitError};
