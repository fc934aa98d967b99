use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepTiming {
    #[default]
    None,
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenshotCondition {
    #[default]
    Failure,
    Success,
    Always,
    Never,
}

impl ScreenshotCondition {
    /// Decided on the real outcome, before any inversion.
    pub fn should_capture(&self, passed: bool) -> bool {
        match self {
            ScreenshotCondition::Failure => !passed,
            ScreenshotCondition::Success => passed,
            ScreenshotCondition::Always => true,
            ScreenshotCondition::Never => false,
        }
    }
}

/// Per-command behaviour, consulted around every intercepted call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepSettings {
    pub sleep: Duration,
    pub sleep_timing: SleepTiming,
    pub timeout: Option<Duration>,
    pub invert_result: bool,
    pub screenshot_condition: ScreenshotCondition,
}

impl StepSettings {
    pub fn sleep_before(&self) -> Option<Duration> {
        (self.sleep_timing == SleepTiming::Before && !self.sleep.is_zero()).then_some(self.sleep)
    }

    pub fn sleep_after(&self) -> Option<Duration> {
        (self.sleep_timing == SleepTiming::After && !self.sleep.is_zero()).then_some(self.sleep)
    }

    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout.filter(|timeout| !timeout.is_zero())
    }

    pub fn reported_outcome(&self, passed: bool) -> bool {
        if self.invert_result {
            !passed
        } else {
            passed
        }
    }
}
