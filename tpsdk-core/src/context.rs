use std::sync::Mutex;

use crate::config::{env, UNNAMED_TEST};

/// Source of the name of the test currently driving the session.
pub trait TestContext: Send + Sync {
    fn current_test_name(&self) -> String;
}

/// Reads `TP_TEST_NAME` on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvTestContext;

impl TestContext for EnvTestContext {
    fn current_test_name(&self) -> String {
        infer_test_name(|key| std::env::var(key).ok())
    }
}

/// Test name set explicitly by the harness, e.g. from a before-each hook.
#[derive(Debug)]
pub struct ManualTestContext {
    name: Mutex<String>,
}

impl ManualTestContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Mutex::new(name.into()),
        }
    }

    pub fn set(&self, name: impl Into<String>) {
        *self.name.lock().unwrap() = name.into();
    }
}

impl Default for ManualTestContext {
    fn default() -> Self {
        Self::new(UNNAMED_TEST)
    }
}

impl TestContext for ManualTestContext {
    fn current_test_name(&self) -> String {
        self.name.lock().unwrap().clone()
    }
}

pub fn infer_test_name<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(env::TEST_NAME)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNNAMED_TEST.to_string())
}
