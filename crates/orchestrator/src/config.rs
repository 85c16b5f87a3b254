//! Orchestrator configuration
//!
//! Environment-driven settings are read once, when the config is built,
//! and carried explicitly from there on.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{OrchestratorError, OrchestratorResult};

/// Verbosity of the orchestrator's own log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Failures and the suite summary only
    Minimal,
    /// Adds per-test start, finish and skip lines
    #[default]
    Detailed,
    /// Adds dependency evaluation, step and persistence details
    Verbose,
}

impl LogLevel {
    /// Whether a line at `level` should be emitted under this setting.
    pub fn allows(self, level: LogLevel) -> bool {
        level <= self
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(LogLevel::Minimal),
            "detailed" => Ok(LogLevel::Detailed),
            "verbose" => Ok(LogLevel::Verbose),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Configuration for an orchestrator and every suite it creates
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Run every test of a suite against one long-lived browser session
    pub use_shared_page: bool,

    /// Run tests strictly in declaration order
    pub sequential: bool,

    /// Keep going after a failed test instead of halting the suite
    pub continue_on_failure: bool,

    /// Which orchestrator log lines are emitted
    pub log_level: LogLevel,

    /// Directory receiving result snapshots and failure screenshots
    pub results_dir: PathBuf,

    /// Module identifier used to key the snapshot file
    pub module: String,

    /// Budget for the full-page failure screenshot
    pub screenshot_timeout: Duration,

    /// Budget for the viewport-only fallback screenshot
    pub fallback_screenshot_timeout: Duration,

    /// Timeout applied to tests that do not declare their own
    pub default_test_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            use_shared_page: true,
            sequential: true,
            continue_on_failure: false,
            log_level: LogLevel::Detailed,
            results_dir: PathBuf::from("test-results"),
            module: "default".to_string(),
            screenshot_timeout: Duration::from_secs(3),
            fallback_screenshot_timeout: Duration::from_secs(2),
            default_test_timeout: None,
        }
    }
}

impl OrchestratorConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> OrchestratorResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> OrchestratorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("UIFLOW_SHARED_PAGE") {
            config.use_shared_page = parse_bool("UIFLOW_SHARED_PAGE", &v)?;
        }
        if let Some(v) = lookup("UIFLOW_SEQUENTIAL") {
            config.sequential = parse_bool("UIFLOW_SEQUENTIAL", &v)?;
        }
        if let Some(v) = lookup("UIFLOW_CONTINUE_ON_FAILURE") {
            config.continue_on_failure = parse_bool("UIFLOW_CONTINUE_ON_FAILURE", &v)?;
        }
        if let Some(v) = lookup("UIFLOW_LOG_LEVEL") {
            config.log_level = v.parse().map_err(|reason| OrchestratorError::Config {
                key: "UIFLOW_LOG_LEVEL".to_string(),
                value: v.clone(),
                reason,
            })?;
        }
        if let Some(v) = lookup("UIFLOW_RESULTS_DIR") {
            if !v.trim().is_empty() {
                config.results_dir = PathBuf::from(v);
            }
        }
        if let Some(v) = lookup("UIFLOW_MODULE") {
            if !v.trim().is_empty() {
                config.module = v.trim().to_string();
            }
        }
        if let Some(v) = lookup("UIFLOW_TEST_TIMEOUT_MS") {
            let ms: u64 = v.trim().parse().map_err(|_| OrchestratorError::Config {
                key: "UIFLOW_TEST_TIMEOUT_MS".to_string(),
                value: v.clone(),
                reason: "expected milliseconds".to_string(),
            })?;
            config.default_test_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        Ok(config)
    }

    /// Path of the JSON snapshot for this config's module.
    pub fn snapshot_path(&self) -> PathBuf {
        self.results_dir.join(format!("{}-results.json", self.module))
    }

    /// Directory receiving failure screenshots.
    pub fn screenshot_dir(&self) -> PathBuf {
        self.results_dir.join("screenshots")
    }

    /// Apply per-suite overrides, returning the effective config.
    pub fn merged(&self, options: &SuiteOptions) -> Self {
        let mut config = self.clone();
        if let Some(v) = options.use_shared_page {
            config.use_shared_page = v;
        }
        if let Some(v) = options.sequential {
            config.sequential = v;
        }
        if let Some(v) = options.continue_on_failure {
            config.continue_on_failure = v;
        }
        if let Some(v) = options.log_level {
            config.log_level = v;
        }
        if let Some(module) = &options.module {
            config.module = module.clone();
        }
        if let Some(timeout) = options.default_test_timeout {
            config.default_test_timeout = Some(timeout);
        }
        config
    }
}

/// Optional per-suite overrides of [`OrchestratorConfig`]
#[derive(Debug, Clone, Default)]
pub struct SuiteOptions {
    pub use_shared_page: Option<bool>,
    pub sequential: Option<bool>,
    pub continue_on_failure: Option<bool>,
    pub log_level: Option<LogLevel>,
    pub module: Option<String>,
    pub default_test_timeout: Option<Duration>,
}

impl SuiteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared_page(mut self, shared: bool) -> Self {
        self.use_shared_page = Some(shared);
        self
    }

    pub fn continue_on_failure(mut self, keep_going: bool) -> Self {
        self.continue_on_failure = Some(keep_going);
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn test_timeout(mut self, timeout: Duration) -> Self {
        self.default_test_timeout = Some(timeout);
        self
    }
}

fn parse_bool(key: &str, value: &str) -> OrchestratorResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OrchestratorError::Config {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
