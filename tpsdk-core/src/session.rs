use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capabilities::Capabilities;

/// Wire dialect the remote end speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Dialect {
    #[default]
    W3c,
    Oss,
}

impl Dialect {
    /// Anything other than `W3C` is treated as the legacy dialect.
    pub fn from_agent(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("W3C") {
            Dialect::W3c
        } else {
            Dialect::Oss
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::W3c => "W3C",
            Dialect::Oss => "OSS",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentSession {
    pub remote_address: String,
    pub session_id: String,
    pub dialect: Dialect,
    pub capabilities: Capabilities,
}
