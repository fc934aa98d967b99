use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::capabilities::Capabilities;
use crate::client::{AutomationClient, ProtocolFailure};
use crate::command::{Command, CommandName, SESSION_ID_PARAM};

pub const MASKED_TEXT: &str = "***";
const SECURE_INPUT_TYPES: [&str; 2] = ["password", "XCUIElementTypeSecureTextField"];

/// Masks keystrokes typed into secure fields before they are reported.
/// Attribute lookups go straight to the raw client and are never reported.
pub struct Redactor<'a> {
    client: &'a dyn AutomationClient,
    capabilities: &'a Capabilities,
    session_id: Option<&'a str>,
}

impl<'a> Redactor<'a> {
    pub fn new(
        client: &'a dyn AutomationClient,
        capabilities: &'a Capabilities,
        session_id: Option<&'a str>,
    ) -> Self {
        Self {
            client,
            capabilities,
            session_id,
        }
    }

    /// Returns whether `command` was masked.
    pub async fn redact(&self, command: &mut Command) -> bool {
        if !command.descriptor().redactable {
            return false;
        }
        let Some(element_id) = command.element_id().map(str::to_string) else {
            return false;
        };
        if !self.is_secure(&element_id).await {
            return false;
        }
        command.set_parameter("text", MASKED_TEXT);
        command.set_parameter("value", json!(["*", "*", "*"]));
        debug!(target: "redact", element = %element_id, "masked secure input");
        true
    }

    async fn is_secure(&self, element_id: &str) -> bool {
        if self.capabilities.is_android_native() {
            return self
                .attribute(element_id, "password")
                .await
                .map(|value| value.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
        }
        self.attribute(element_id, "type")
            .await
            .map(|value| SECURE_INPUT_TYPES.contains(&value.as_str()))
            .unwrap_or(false)
    }

    /// Lookup failures yield `None`, i.e. the field is treated as not secure.
    async fn attribute(&self, element_id: &str, name: &str) -> Option<String> {
        let mut query =
            Command::for_element(CommandName::GetElementAttribute, element_id).with_parameter("name", name);
        if let Some(session_id) = self.session_id {
            query.set_parameter(SESSION_ID_PARAM, session_id);
        }
        match self.client.execute(&query).await {
            Ok(value) if ProtocolFailure::detect(&value).is_some() => {
                warn!(target: "redact", element = %element_id, attribute = name, "attribute lookup returned an error payload");
                None
            }
            Ok(Value::String(text)) => Some(text),
            Ok(Value::Bool(flag)) => Some(flag.to_string()),
            Ok(_) => None,
            Err(err) => {
                warn!(target: "redact", element = %element_id, attribute = name, "attribute lookup failed: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DriverError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct AttributeDriver {
        attributes: HashMap<(String, String), Value>,
        fail: bool,
        queries: Mutex<Vec<Command>>,
    }

    impl AttributeDriver {
        fn with(mut self, element: &str, name: &str, value: Value) -> Self {
            self.attributes
                .insert((element.to_string(), name.to_string()), value);
            self
        }
    }

    #[async_trait]
    impl AutomationClient for AttributeDriver {
        async fn execute(&self, command: &Command) -> Result<Value, DriverError> {
            self.queries.lock().unwrap().push(command.clone());
            if self.fail {
                return Err(DriverError::Transport("socket hang up".into()));
            }
            let key = (
                command.element_id().unwrap_or_default().to_string(),
                command.parameter("name").and_then(Value::as_str).unwrap_or_default().to_string(),
            );
            Ok(self.attributes.get(&key).cloned().unwrap_or(Value::Null))
        }
    }

    fn keystrokes(element: &str) -> Command {
        Command::for_element(CommandName::SendKeysToElement, element)
            .with_parameter("text", "secret")
            .with_parameter("value", json!(["s", "e", "c", "r", "e", "t"]))
    }

    #[tokio::test]
    async fn masks_password_fields() {
        let driver = AttributeDriver::default().with("el-1", "type", json!("password"));
        let caps = Capabilities::new().with("browserName", "chrome");
        let redactor = Redactor::new(&driver, &caps, Some("s-1"));

        let mut command = keystrokes("el-1");
        assert!(redactor.redact(&mut command).await);
        assert_eq!(
            Value::Object(command.parameters().clone()),
            json!({"id": "el-1", "text": "***", "value": ["*", "*", "*"]})
        );

        let queries = driver.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].name(), CommandName::GetElementAttribute);
        assert_eq!(queries[0].parameter("sessionId"), Some(&json!("s-1")));
    }

    #[tokio::test]
    async fn masks_ios_secure_text_fields() {
        let driver = AttributeDriver::default().with(
            "el-2",
            "type",
            json!("XCUIElementTypeSecureTextField"),
        );
        let caps = Capabilities::new().with("platformName", "iOS").with("udid", "x");
        let mut command = keystrokes("el-2");
        assert!(Redactor::new(&driver, &caps, None).redact(&mut command).await);
    }

    #[tokio::test]
    async fn android_native_uses_password_attribute() {
        let driver = AttributeDriver::default()
            .with("el-3", "password", json!("true"))
            .with("el-3", "type", json!("text"));
        let caps = Capabilities::new().with("platformName", "Android");
        let mut command = keystrokes("el-3");
        assert!(Redactor::new(&driver, &caps, None).redact(&mut command).await);

        let queries = driver.queries.lock().unwrap();
        assert_eq!(queries[0].parameter("name"), Some(&json!("password")));
    }

    #[tokio::test]
    async fn leaves_plain_fields_untouched() {
        let driver = AttributeDriver::default().with("el-4", "type", json!("text"));
        let caps = Capabilities::new();
        let mut command = keystrokes("el-4");
        let before = command.clone();
        assert!(!Redactor::new(&driver, &caps, None).redact(&mut command).await);
        assert_eq!(command, before);
    }

    #[tokio::test]
    async fn lookup_failure_is_not_sensitive() {
        let driver = AttributeDriver {
            fail: true,
            ..AttributeDriver::default()
        };
        let caps = Capabilities::new();
        let mut command = keystrokes("el-5");
        assert!(!Redactor::new(&driver, &caps, None).redact(&mut command).await);
        assert_eq!(command.parameter("text"), Some(&json!("secret")));
    }

    #[tokio::test]
    async fn skips_commands_without_target_or_keystrokes() {
        let driver = AttributeDriver::default();
        let caps = Capabilities::new();
        let redactor = Redactor::new(&driver, &caps, None);

        let mut active = Command::new(CommandName::SendKeysToActiveElement)
            .with_parameter("value", json!(["a"]));
        assert!(!redactor.redact(&mut active).await);

        let mut click = Command::for_element(CommandName::ClickElement, "el-6");
        assert!(!redactor.redact(&mut click).await);
        assert!(driver.queries.lock().unwrap().is_empty());
    }
}
