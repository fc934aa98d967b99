use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tpsdk_core::{
    load_sdk_config, normalize_agent_url, AgentClient, Capabilities, ConfigError,
    CustomTestReport, SdkConfig, SdkFileConfig, SessionError,
};

pub type Result<T> = std::result::Result<T, AppError>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid capability {0:?}, expected key=value")]
    InvalidCapability(String),
    #[error("{0}")]
    HealthCheckFailed(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Agent reporting SDK control interface", long_about = None)]
pub struct Cli {
    /// TOML configuration layered under the TP_* environment
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Agent address, overrides TP_AGENT_URL
    #[arg(long)]
    pub agent_url: Option<String>,
    /// Developer token, overrides TP_DEV_TOKEN
    #[arg(long)]
    pub token: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Log at debug level
    #[arg(long, short)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the resolved configuration
    Config,
    /// Check token, Agent address and Agent reachability
    Doctor,
    /// Open and close a development session
    Probe(ProbeArgs),
    /// Report a single test result through a short-lived session
    ReportTest(ReportTestArgs),
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Session capability as key=value; repeatable
    #[arg(long = "capability", short = 'c')]
    pub capabilities: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ReportTestArgs {
    /// Test name
    #[arg(long)]
    pub name: String,
    /// Report the test as failed
    #[arg(long)]
    pub failed: bool,
    /// Optional message attached to the result
    #[arg(long)]
    pub message: Option<String>,
    /// Session capability as key=value; repeatable
    #[arg(long = "capability", short = 'c')]
    pub capabilities: Vec<String>,
}

pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli, |key| std::env::var(key).ok())?;
    debug!(agent = %config.agent_url, "configuration resolved");

    match &cli.command {
        Commands::Config => {
            render(&ConfigView::from(&config), cli.format)?;
        }
        Commands::Doctor => {
            let report = runtime()?.block_on(doctor(&config));
            render(&report, cli.format)?;
            let failed = report.failures();
            if failed > 0 {
                return Err(AppError::HealthCheckFailed(format!(
                    "{failed} health check(s) failed"
                )));
            }
        }
        Commands::Probe(args) => {
            let capabilities = parse_capabilities(&args.capabilities)?;
            let summary = runtime()?.block_on(probe(config, capabilities))?;
            render(&summary, cli.format)?;
        }
        Commands::ReportTest(args) => {
            let capabilities = parse_capabilities(&args.capabilities)?;
            let summary = runtime()?.block_on(report_test(config, capabilities, args))?;
            render(&summary, cli.format)?;
        }
    }

    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn resolve_config<F>(cli: &Cli, lookup: F) -> Result<SdkConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match &cli.config {
        Some(path) => load_sdk_config(path)?,
        None => SdkFileConfig::default(),
    };
    let mut config = SdkConfig::resolve(file, lookup)?;
    if let Some(url) = &cli.agent_url {
        config.agent_url = normalize_agent_url(url)?;
    }
    if let Some(token) = &cli.token {
        config.developer_token = Some(token.clone());
    }
    Ok(config)
}

/// Parses `key=value` pairs. Values that read as JSON keep their type.
fn parse_capabilities(raw: &[String]) -> Result<Capabilities> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .ok_or_else(|| AppError::InvalidCapability(pair.clone()))?;
            let value = serde_json::from_str::<Value>(value)
                .unwrap_or_else(|_| Value::String(value.to_string()));
            Ok((key.trim().to_string(), value))
        })
        .collect()
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + PlainText,
{
    let rendered = match format {
        OutputFormat::Text => value.plain_text(),
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
    };
    println!("{rendered}");
    Ok(())
}

/// Human-readable form used by `--format text`.
trait PlainText {
    fn plain_text(&self) -> String;
}

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub agent_url: String,
    pub developer_token: String,
    pub sdk_version: String,
    pub project_name: String,
    pub job_name: String,
    pub report_type: Option<String>,
    pub report_name: Option<String>,
    pub report_path: Option<String>,
    pub disable_reports: bool,
    pub disable_auto_reports: bool,
    pub disable_redaction: bool,
    pub excluded_tests: Vec<String>,
}

impl From<&SdkConfig> for ConfigView {
    fn from(config: &SdkConfig) -> Self {
        Self {
            agent_url: config.agent_url.clone(),
            developer_token: mask_token(config.developer_token.as_deref()),
            sdk_version: config.sdk_version.clone(),
            project_name: config.report.project_name.clone(),
            job_name: config.report.job_name.clone(),
            report_type: config.report.report_type.map(|kind| kind.to_string()),
            report_name: config.report.report_name.clone(),
            report_path: config.report.report_path.clone(),
            disable_reports: config.disable_reports,
            disable_auto_reports: config.disable_auto_reports,
            disable_redaction: config.disable_redaction,
            excluded_tests: config.excluded_tests.clone(),
        }
    }
}

impl PlainText for ConfigView {
    fn plain_text(&self) -> String {
        let mut lines = vec![
            format!("agent:            {}", self.agent_url),
            format!("token:            {}", self.developer_token),
            format!("sdk version:      {}", self.sdk_version),
            format!("project:          {}", self.project_name),
            format!("job:              {}", self.job_name),
        ];
        if let Some(kind) = &self.report_type {
            lines.push(format!("report type:      {kind}"));
        }
        if let Some(name) = &self.report_name {
            lines.push(format!("report name:      {name}"));
        }
        if let Some(path) = &self.report_path {
            lines.push(format!("report path:      {path}"));
        }
        lines.push(format!("reports disabled: {}", self.disable_reports));
        lines.push(format!("auto reports off: {}", self.disable_auto_reports));
        lines.push(format!("redaction off:    {}", self.disable_redaction));
        if !self.excluded_tests.is_empty() {
            lines.push(format!("excluded tests:   {}", self.excluded_tests.join(", ")));
        }
        lines.join("\n")
    }
}

fn mask_token(token: Option<&str>) -> String {
    match token.map(str::trim).filter(|token| !token.is_empty()) {
        None => "<unset>".to_string(),
        Some(token) if token.chars().count() > 8 => {
            let tail: String = token
                .chars()
                .skip(token.chars().count() - 4)
                .collect();
            format!("****{tail}")
        }
        Some(_) => "****".to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct ProbeSummary {
    pub session_id: String,
    pub server_address: String,
    pub dialect: String,
    pub dev_socket_port: u16,
    pub agent_version: Option<String>,
}

impl PlainText for ProbeSummary {
    fn plain_text(&self) -> String {
        format!(
            "session {id} at {address} (dialect {dialect}, socket port {port}, agent {version})",
            id = self.session_id,
            address = self.server_address,
            dialect = self.dialect,
            port = self.dev_socket_port,
            version = self.agent_version.as_deref().unwrap_or("unknown")
        )
    }
}

async fn probe(config: SdkConfig, capabilities: Capabilities) -> Result<ProbeSummary> {
    let client = AgentClient::new(config, capabilities)?;
    let response = client.start_session().await?;
    client.quit_session().await;
    Ok(ProbeSummary {
        dialect: response.dialect().to_string(),
        session_id: response.session_id,
        server_address: response.server_address,
        dev_socket_port: response.dev_socket_port,
        agent_version: response.agent_version,
    })
}

#[derive(Debug, Serialize)]
pub struct ReportTestSummary {
    pub session_id: String,
    pub name: String,
    pub passed: bool,
}

impl PlainText for ReportTestSummary {
    fn plain_text(&self) -> String {
        let outcome = if self.passed { "passed" } else { "failed" };
        format!(
            "reported {name} as {outcome} (session {id})",
            name = self.name,
            id = self.session_id
        )
    }
}

async fn report_test(
    config: SdkConfig,
    capabilities: Capabilities,
    args: &ReportTestArgs,
) -> Result<ReportTestSummary> {
    let client = AgentClient::new(config, capabilities)?;
    let response = client.start_session().await?;
    let passed = !args.failed;
    client.report_test(&CustomTestReport::new(
        args.name.clone(),
        passed,
        args.message.clone(),
    ));
    client.quit_session().await;
    Ok(ReportTestSummary {
        session_id: response.session_id,
        name: args.name.clone(),
        passed,
    })
}

async fn doctor(config: &SdkConfig) -> HealthReport {
    let mut report = HealthReport::default();

    match config.developer_token() {
        Ok(_) => report.push(
            "developer token",
            HealthStatus::Ok,
            mask_token(config.developer_token.as_deref()),
        ),
        Err(err) => report.push("developer token", HealthStatus::Error, err.to_string()),
    }

    match config.validate() {
        Ok(()) => report.push(
            "report names",
            HealthStatus::Ok,
            format!("{} / {}", config.report.project_name, config.report.job_name),
        ),
        Err(err) => report.push("report names", HealthStatus::Error, err.to_string()),
    }

    let (host, port) = match config.agent_socket_addr() {
        Ok(addr) => addr,
        Err(err) => {
            report.push("agent url", HealthStatus::Error, err.to_string());
            return report;
        }
    };
    report.push("agent url", HealthStatus::Ok, config.agent_url.clone());

    let connect = TcpStream::connect((host.as_str(), port));
    let (status, detail) = match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
        Ok(Ok(_)) => (HealthStatus::Ok, format!("listening at {host}:{port}")),
        Ok(Err(err)) => (HealthStatus::Error, format!("{host}:{port}: {err}")),
        Err(_) => (
            HealthStatus::Warn,
            format!("{host}:{port}: no answer within {CONNECT_TIMEOUT:?}"),
        ),
    };
    report.push("agent reachable", status, detail);

    report
}

#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct HealthReport(Vec<HealthEntry>);

impl HealthReport {
    fn push(&mut self, name: &'static str, status: HealthStatus, detail: impl Into<String>) {
        self.0.push(HealthEntry {
            name,
            status,
            detail: detail.into(),
        });
    }

    pub fn entries(&self) -> &[HealthEntry] {
        &self.0
    }

    pub fn failures(&self) -> usize {
        self.0
            .iter()
            .filter(|entry| entry.status == HealthStatus::Error)
            .count()
    }
}

impl PlainText for HealthReport {
    fn plain_text(&self) -> String {
        self.0
            .iter()
            .map(|entry| {
                format!(
                    "{:<5} {:<16} {}",
                    entry.status.label(),
                    entry.name,
                    entry.detail
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: &'static str,
    pub status: HealthStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Warn,
    Error,
}

impl HealthStatus {
    pub fn label(self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Warn => "warn",
            HealthStatus::Error => "FAIL",
        }
    }
}
