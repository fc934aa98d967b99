use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::agent::AgentClient;
use crate::config::SdkConfig;
use crate::context::TestContext;
use crate::interceptor::CommandError;
use crate::report::{CustomTestReport, StepReport};

/// Global reporting switches shared by the interceptor and the reporter.
#[derive(Debug, Default)]
pub struct ReportSwitches {
    reports: AtomicBool,
    command_reports: AtomicBool,
    auto_test_reports: AtomicBool,
}

impl ReportSwitches {
    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            reports: AtomicBool::new(config.disable_reports),
            command_reports: AtomicBool::new(config.disable_auto_reports),
            auto_test_reports: AtomicBool::new(config.disable_auto_reports),
        }
    }

    pub fn reports_disabled(&self) -> bool {
        self.reports.load(Ordering::SeqCst)
    }

    pub fn command_reports_disabled(&self) -> bool {
        self.reports_disabled() || self.command_reports.load(Ordering::SeqCst)
    }

    pub fn auto_test_reports_disabled(&self) -> bool {
        self.reports_disabled() || self.auto_test_reports.load(Ordering::SeqCst)
    }

    pub fn disable_reports(&self, disabled: bool) {
        self.reports.store(disabled, Ordering::SeqCst);
    }

    pub fn disable_command_reports(&self, disabled: bool) {
        self.command_reports.store(disabled, Ordering::SeqCst);
    }

    pub fn disable_auto_test_reports(&self, disabled: bool) {
        self.auto_test_reports.store(disabled, Ordering::SeqCst);
    }
}

/// Captures a screenshot for a step report without producing a command report.
#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    async fn screenshot(&self) -> Result<String, CommandError>;
}

/// Explicit test and step reporting for application code.
#[derive(Clone)]
pub struct Reporter {
    agent: Arc<AgentClient>,
    switches: Arc<ReportSwitches>,
    context: Arc<dyn TestContext>,
    screenshots: Arc<dyn ScreenshotSource>,
}

impl Reporter {
    pub fn new(
        agent: Arc<AgentClient>,
        switches: Arc<ReportSwitches>,
        context: Arc<dyn TestContext>,
        screenshots: Arc<dyn ScreenshotSource>,
    ) -> Self {
        Self {
            agent,
            switches,
            context,
            screenshots,
        }
    }

    pub fn switches(&self) -> &ReportSwitches {
        &self.switches
    }

    pub fn disable_reports(&self, disabled: bool) {
        self.switches.disable_reports(disabled);
    }

    pub fn disable_command_reports(&self, disabled: bool) {
        self.switches.disable_command_reports(disabled);
    }

    pub fn disable_auto_test_reports(&self, disabled: bool) {
        self.switches.disable_auto_test_reports(disabled);
    }

    /// Reports a test result. Without a name the current test is used.
    pub fn test(&self, name: Option<&str>, passed: bool, message: Option<&str>) {
        if self.switches.reports_disabled() {
            debug!(target: "agent", "reports disabled, skipping test report");
            return;
        }
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| self.context.current_test_name());
        self.agent.report_test(&CustomTestReport::new(
            name,
            passed,
            message.map(str::to_string),
        ));
    }

    pub async fn step(&self, description: &str, message: &str, passed: bool, screenshot: bool) {
        if self.switches.reports_disabled() {
            debug!(target: "agent", step = description, "reports disabled, skipping step report");
            return;
        }
        let screenshot = if screenshot {
            match self.screenshots.screenshot().await {
                Ok(image) => Some(image),
                Err(err) => {
                    warn!(target: "agent", step = description, "step screenshot failed: {err}");
                    None
                }
            }
        } else {
            None
        };
        self.agent.report_step(
            &StepReport::new(description, message, passed).with_screenshot(screenshot),
        );
    }
}
