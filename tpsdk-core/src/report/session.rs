use serde::{Deserialize, Serialize, Serializer};

use crate::capabilities::Capabilities;
use crate::config::{ReportType, SdkConfig, SDK_LANGUAGE};
use crate::session::Dialect;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub language: String,
    pub sdk_version: String,
    pub capabilities: Capabilities,
    pub project_name: String,
    pub job_name: String,
    #[serde(serialize_with = "empty_if_unset")]
    pub report_type: Option<ReportType>,
    #[serde(serialize_with = "empty_if_unset")]
    pub report_name: Option<String>,
    #[serde(serialize_with = "empty_if_unset")]
    pub report_path: Option<String>,
}

/// The Agent expects report fields on every request, blank when unset.
fn empty_if_unset<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(value) => value.serialize(serializer),
        None => serializer.serialize_str(""),
    }
}

impl SessionRequest {
    pub fn new(config: &SdkConfig, capabilities: &Capabilities) -> Self {
        Self {
            language: SDK_LANGUAGE.to_string(),
            sdk_version: config.sdk_version.clone(),
            capabilities: capabilities.without_sdk_keys(),
            project_name: config.report.project_name.clone(),
            job_name: config.report.job_name.clone(),
            report_type: config.report.report_type,
            report_name: config.report.report_name.clone(),
            report_path: config.report.report_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub dev_socket_port: u16,
    pub server_address: String,
    pub session_id: String,
    #[serde(default)]
    pub dialect: String,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub agent_version: Option<String>,
}

impl SessionResponse {
    pub fn dialect(&self) -> Dialect {
        Dialect::from_agent(&self.dialect)
    }
}
