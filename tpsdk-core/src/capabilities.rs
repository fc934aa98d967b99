use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

/// Capability keys the SDK consumes itself. They are stripped before the
/// capabilities are forwarded to the Agent.
pub mod keys {
    pub const SDK_PREFIX: &str = "_tp";
    pub const DEV_TOKEN: &str = "_tpDevToken";
    pub const AGENT_URL: &str = "_tpAgentUrl";
    pub const PROJECT_NAME: &str = "_tpProjectName";
    pub const JOB_NAME: &str = "_tpJobName";
    pub const REPORT_TYPE: &str = "_tpReportType";
    pub const REPORT_NAME: &str = "_tpReportName";
    pub const REPORT_PATH: &str = "_tpReportPath";
    pub const DISABLE_REPORTS: &str = "_tpDisableReports";

    pub const PLATFORM_NAME: &str = "platformName";
    pub const BROWSER_NAME: &str = "browserName";
    pub const UDID: &str = "udid";
}

const MOBILE_PLATFORMS: [&str; 2] = ["android", "ios"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(Map<String, Value>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Boolean capability, accepting both JSON booleans and `"true"` strings.
    pub fn get_flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Copy without the SDK's own `_tp*` keys.
    pub fn without_sdk_keys(&self) -> Capabilities {
        Capabilities(
            self.0
                .iter()
                .filter(|(key, _)| !key.starts_with(keys::SDK_PREFIX))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    pub fn platform_name(&self) -> Option<String> {
        self.get_str(keys::PLATFORM_NAME)
            .map(|name| name.to_ascii_lowercase())
    }

    pub fn browser_name(&self) -> Option<&str> {
        self.get_str(keys::BROWSER_NAME)
            .filter(|name| !name.is_empty())
    }

    pub fn is_mobile(&self) -> bool {
        self.platform_name()
            .map(|platform| MOBILE_PLATFORMS.contains(&platform.as_str()))
            .unwrap_or(false)
    }

    /// Android session driving a native app rather than a browser.
    pub fn is_android_native(&self) -> bool {
        self.platform_name().as_deref() == Some("android") && self.browser_name().is_none()
    }

    /// Mobile sessions must name a device; a missing browser defaults to empty.
    pub fn prepare_mobile(&mut self) -> ConfigResult<()> {
        let udid = self.get_str(keys::UDID).map(str::trim).unwrap_or_default();
        if udid.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: keys::UDID,
                reason: "mobile sessions require the device udid capability".into(),
            });
        }
        if !self.contains(keys::BROWSER_NAME) {
            self.set(keys::BROWSER_NAME, "");
        }
        Ok(())
    }
}

impl From<Map<String, Value>> for Capabilities {
    fn from(map: Map<String, Value>) -> Self {
        Capabilities(map)
    }
}

impl FromIterator<(String, Value)> for Capabilities {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Capabilities(iter.into_iter().collect())
    }
}
