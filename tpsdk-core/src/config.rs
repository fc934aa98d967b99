use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::capabilities::{keys, Capabilities};
use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_AGENT_URL: &str = "http://127.0.0.1:8585";
pub const SDK_LANGUAGE: &str = "Rust";
pub const UNNAMED_TEST: &str = "Unnamed Test";
pub const UNNAMED_PROJECT: &str = "Unnamed Project";
pub const UNNAMED_JOB: &str = "Unnamed Job";

/// Environment variables read by [`SdkConfig::from_env`].
pub mod env {
    pub const AGENT_URL: &str = "TP_AGENT_URL";
    pub const DEV_TOKEN: &str = "TP_DEV_TOKEN";
    pub const SDK_VERSION: &str = "TP_SDK_VERSION";
    pub const TEST_NAME: &str = "TP_TEST_NAME";
    pub const PROJECT_NAME: &str = "TP_PROJECT_NAME";
    pub const JOB_NAME: &str = "TP_JOB_NAME";
    pub const DISABLE_AUTO_REPORTS: &str = "TP_DISABLE_AUTO_REPORTS";
    pub const REPORT_TYPE: &str = "TP_REPORT_TYPE";
    pub const REPORT_NAME: &str = "TP_REPORT_NAME";
    pub const REPORT_PATH: &str = "TP_REPORT_PATH";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    Cloud,
    Local,
    CloudAndLocal,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Cloud => "CLOUD",
            ReportType::Local => "LOCAL",
            ReportType::CloudAndLocal => "CLOUD_AND_LOCAL",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLOUD" => Ok(ReportType::Cloud),
            "LOCAL" => Ok(ReportType::Local),
            "CLOUD_AND_LOCAL" => Ok(ReportType::CloudAndLocal),
            other => Err(ConfigError::InvalidValue {
                key: "reportType",
                reason: format!("unknown report type {other}"),
            }),
        }
    }
}

/// On-disk form of the configuration. Every field is optional; environment
/// variables take precedence over the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SdkFileConfig {
    pub agent: AgentSection,
    pub report: ReportSection,
    pub reporting: ReportingSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    pub project_name: Option<String>,
    pub job_name: Option<String>,
    pub report_type: Option<ReportType>,
    pub report_name: Option<String>,
    pub report_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportingSection {
    pub disable_reports: bool,
    pub disable_auto_reports: bool,
    pub disable_redaction: bool,
    pub excluded_tests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSettings {
    pub project_name: String,
    pub job_name: String,
    pub report_type: Option<ReportType>,
    pub report_name: Option<String>,
    pub report_path: Option<String>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            project_name: UNNAMED_PROJECT.to_string(),
            job_name: UNNAMED_JOB.to_string(),
            report_type: None,
            report_name: None,
            report_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SdkConfig {
    pub agent_url: String,
    #[serde(skip_serializing)]
    pub developer_token: Option<String>,
    pub sdk_version: String,
    pub report: ReportSettings,
    pub disable_reports: bool,
    /// Disables both automatic test reports and command reports.
    pub disable_auto_reports: bool,
    pub disable_redaction: bool,
    pub excluded_tests: Vec<String>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            agent_url: DEFAULT_AGENT_URL.to_string(),
            developer_token: None,
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            report: ReportSettings::default(),
            disable_reports: false,
            disable_auto_reports: false,
            disable_redaction: false,
            excluded_tests: Vec::new(),
        }
    }
}

impl SdkConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::resolve(SdkFileConfig::default(), |key| std::env::var(key).ok())
    }

    pub fn from_file_and_env<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let file = load_sdk_config(path)?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Layers variables from `lookup` over `file`. Blank variables count as unset.
    pub fn resolve<F>(file: SdkFileConfig, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let agent_url = var(env::AGENT_URL)
            .or(file.agent.url)
            .unwrap_or_else(|| DEFAULT_AGENT_URL.to_string());
        let report_type = match var(env::REPORT_TYPE) {
            Some(raw) => Some(raw.parse()?),
            None => file.report.report_type,
        };

        Ok(Self {
            agent_url: normalize_agent_url(&agent_url)?,
            developer_token: var(env::DEV_TOKEN).or(file.agent.token),
            sdk_version: var(env::SDK_VERSION)
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            report: ReportSettings {
                project_name: var(env::PROJECT_NAME)
                    .or(file.report.project_name)
                    .unwrap_or_else(|| UNNAMED_PROJECT.to_string()),
                job_name: var(env::JOB_NAME)
                    .or(file.report.job_name)
                    .unwrap_or_else(|| UNNAMED_JOB.to_string()),
                report_type,
                report_name: var(env::REPORT_NAME).or(file.report.report_name),
                report_path: var(env::REPORT_PATH).or(file.report.report_path),
            },
            disable_reports: file.reporting.disable_reports,
            disable_auto_reports: var(env::DISABLE_AUTO_REPORTS)
                .map(|raw| parse_flag(&raw))
                .unwrap_or(file.reporting.disable_auto_reports),
            disable_redaction: file.reporting.disable_redaction,
            excluded_tests: file.reporting.excluded_tests,
        })
    }

    /// Applies the `_tp*` capability overrides for a single session.
    pub fn with_capabilities(&self, capabilities: &Capabilities) -> ConfigResult<Self> {
        let mut config = self.clone();
        if let Some(token) = capabilities.get_str(keys::DEV_TOKEN) {
            config.developer_token = Some(token.to_string());
        }
        if let Some(url) = capabilities.get_str(keys::AGENT_URL) {
            config.agent_url = normalize_agent_url(url)?;
        }
        if let Some(project) = capabilities.get_str(keys::PROJECT_NAME) {
            config.report.project_name = project.to_string();
        }
        if let Some(job) = capabilities.get_str(keys::JOB_NAME) {
            config.report.job_name = job.to_string();
        }
        if let Some(raw) = capabilities.get_str(keys::REPORT_TYPE) {
            config.report.report_type = Some(raw.parse()?);
        }
        if let Some(name) = capabilities.get_str(keys::REPORT_NAME) {
            config.report.report_name = Some(name.to_string());
        }
        if let Some(path) = capabilities.get_str(keys::REPORT_PATH) {
            config.report.report_path = Some(path.to_string());
        }
        if capabilities.get_flag(keys::DISABLE_REPORTS) {
            config.disable_reports = true;
        }
        Ok(config)
    }

    pub fn developer_token(&self) -> ConfigResult<&str> {
        match self.developer_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ConfigError::MissingToken),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.report.project_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "projectName",
                reason: "project name must not be empty".into(),
            });
        }
        if self.report.job_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "jobName",
                reason: "job name must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn agent_host(&self) -> ConfigResult<String> {
        let url = Url::parse(&self.agent_url).map_err(|source| ConfigError::InvalidAgentUrl {
            url: self.agent_url.clone(),
            source,
        })?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "agentUrl",
                reason: format!("{} has no host", self.agent_url),
            })
    }

    /// Host and port of the Agent's HTTP listener.
    pub fn agent_socket_addr(&self) -> ConfigResult<(String, u16)> {
        let url = Url::parse(&self.agent_url).map_err(|source| ConfigError::InvalidAgentUrl {
            url: self.agent_url.clone(),
            source,
        })?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "agentUrl",
                reason: format!("{} has no port", self.agent_url),
            })?;
        Ok((self.agent_host()?, port))
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.agent_url, path)
    }

    pub fn is_test_excluded(&self, name: &str) -> bool {
        self.excluded_tests.iter().any(|excluded| excluded == name)
    }
}

/// Rewrites `localhost` to the loopback address and trims trailing slashes.
pub fn normalize_agent_url(raw: &str) -> ConfigResult<String> {
    let candidate = raw
        .trim()
        .trim_end_matches('/')
        .replace("localhost", "127.0.0.1");
    let parsed = Url::parse(&candidate).map_err(|source| ConfigError::InvalidAgentUrl {
        url: raw.to_string(),
        source,
    })?;
    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidValue {
            key: "agentUrl",
            reason: format!("{raw} has no host"),
        });
    }
    Ok(candidate)
}

pub fn load_sdk_config<P: AsRef<Path>>(path: P) -> ConfigResult<SdkFileConfig> {
    load_toml(path)
}

fn parse_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

fn load_toml<T, P>(path: P) -> ConfigResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = SdkConfig::resolve(SdkFileConfig::default(), lookup(&[])).unwrap();
        assert_eq!(config.agent_url, DEFAULT_AGENT_URL);
        assert_eq!(config.report.project_name, UNNAMED_PROJECT);
        assert_eq!(config.report.job_name, UNNAMED_JOB);
        assert_eq!(config.sdk_version, env!("CARGO_PKG_VERSION"));
        assert!(matches!(
            config.developer_token(),
            Err(ConfigError::MissingToken)
        ));
    }

    #[test]
    fn normalizes_agent_url() {
        assert_eq!(
            normalize_agent_url("http://localhost:8585/").unwrap(),
            "http://127.0.0.1:8585"
        );
        assert!(matches!(
            normalize_agent_url("not a url"),
            Err(ConfigError::InvalidAgentUrl { .. })
        ));
    }

    #[test]
    fn environment_overrides_file() {
        let file: SdkFileConfig = toml::from_str(
            r#"
            [agent]
            url = "http://10.0.0.5:9000"
            token = "from-file"

            [report]
            project_name = "File Project"
            report_type = "LOCAL"

            [reporting]
            excluded_tests = ["smoke"]
            "#,
        )
        .unwrap();

        let config = SdkConfig::resolve(
            file,
            lookup(&[
                (env::DEV_TOKEN, "from-env"),
                (env::JOB_NAME, "nightly"),
                (env::PROJECT_NAME, "  "),
                (env::DISABLE_AUTO_REPORTS, "True"),
            ]),
        )
        .unwrap();

        assert_eq!(config.agent_url, "http://10.0.0.5:9000");
        assert_eq!(config.developer_token().unwrap(), "from-env");
        assert_eq!(config.report.project_name, "File Project");
        assert_eq!(config.report.job_name, "nightly");
        assert_eq!(config.report.report_type, Some(ReportType::Local));
        assert!(config.disable_auto_reports);
        assert!(config.is_test_excluded("smoke"));
    }

    #[test]
    fn rejects_unknown_report_type() {
        let err = SdkConfig::resolve(
            SdkFileConfig::default(),
            lookup(&[(env::REPORT_TYPE, "somewhere")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "reportType", .. }));
    }

    #[test]
    fn capabilities_override_session_settings() {
        let base = SdkConfig::default();
        let caps = Capabilities::new()
            .with(keys::DEV_TOKEN, "cap-token")
            .with(keys::AGENT_URL, "http://localhost:7000")
            .with(keys::PROJECT_NAME, "Checkout")
            .with(keys::REPORT_TYPE, "cloud_and_local")
            .with(keys::DISABLE_REPORTS, true);

        let config = base.with_capabilities(&caps).unwrap();
        assert_eq!(config.developer_token().unwrap(), "cap-token");
        assert_eq!(config.agent_url, "http://127.0.0.1:7000");
        assert_eq!(config.agent_socket_addr().unwrap(), ("127.0.0.1".to_string(), 7000));
        assert_eq!(config.report.project_name, "Checkout");
        assert_eq!(config.report.report_type, Some(ReportType::CloudAndLocal));
        assert!(config.disable_reports);
    }

    #[test]
    fn empty_names_fail_validation() {
        let caps = Capabilities::new().with(keys::JOB_NAME, " ");
        let config = SdkConfig::default().with_capabilities(&caps).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "jobName", .. }));
    }

    #[test]
    fn blank_token_is_missing() {
        let config = SdkConfig {
            developer_token: Some("   ".into()),
            ..SdkConfig::default()
        };
        assert!(matches!(
            config.developer_token(),
            Err(ConfigError::MissingToken)
        ));
    }

    #[test]
    fn loads_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[agent]\nurl = \"http://localhost:8585\"\n[reporting]\ndisable_redaction = true"
        )
        .unwrap();

        let parsed = load_sdk_config(file.path()).unwrap();
        assert_eq!(parsed.agent.url.as_deref(), Some("http://localhost:8585"));
        assert!(parsed.reporting.disable_redaction);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_sdk_config("/definitely/not/here.toml").unwrap_err();
        match err {
            ConfigError::Io { path, .. } => assert!(path.ends_with("here.toml")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
