mod classifier;
mod name;

use serde_json::{Map, Value};

pub use classifier::{classify, describe, CommandDescriptor, Reportability};
pub use name::{CommandName, UnknownCommand};

pub const ELEMENT_ID_PARAM: &str = "id";
pub const SESSION_ID_PARAM: &str = "sessionId";

/// A driver command as issued by the caller. The interceptor reports a
/// clone, so redaction never touches what the driver receives.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: CommandName,
    parameters: Map<String, Value>,
}

impl Command {
    pub fn new(name: CommandName) -> Self {
        Self {
            name,
            parameters: Map::new(),
        }
    }

    /// Command targeting an element; the id travels as parameter `id`.
    pub fn for_element(name: CommandName, element_id: impl Into<String>) -> Self {
        Self::new(name).with_parameter(ELEMENT_ID_PARAM, element_id.into())
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_parameter(key, value);
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(key.into(), value.into());
    }

    pub fn name(&self) -> CommandName {
        self.name
    }

    pub fn descriptor(&self) -> CommandDescriptor {
        describe(self.name)
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn element_id(&self) -> Option<&str> {
        self.parameters.get(ELEMENT_ID_PARAM).and_then(Value::as_str)
    }

    /// Expected parameters the command does not carry.
    pub fn missing_parameters(&self) -> Vec<&'static str> {
        self.descriptor()
            .parameters
            .iter()
            .copied()
            .filter(|key| !self.parameters.contains_key(*key))
            .collect()
    }

    pub fn into_parameters(self) -> Map<String, Value> {
        self.parameters
    }
}
