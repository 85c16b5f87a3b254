//! Per-test execution results

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::steps::StepNode;
use crate::telemetry::{Annotation, Attachment};

/// Reason stored on the placeholder seeded for every declared test.
pub const DID_NOT_EXECUTE: &str = "did not execute";

/// `path:line:col`, as found in panic messages, backtraces and error chains.
static LOCATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^\s()<>:]+\.[A-Za-z]{1,4}):(\d+):(\d+)").expect("LOCATION_REGEX must compile")
});

/// Terminal state of a test in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporting priority. Used for aggregation only, never for ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Highest,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Highest, Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Highest => "highest",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn from_caller(location: &std::panic::Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Best-effort location from free-form stack text. The first match wins.
pub fn parse_location(stack: &str) -> Option<SourceLocation> {
    let caps = LOCATION_REGEX.captures(stack)?;
    Some(SourceLocation {
        file: caps[1].to_string(),
        line: caps[2].parse().ok()?,
        column: caps[3].parse().ok()?,
    })
}

/// Structured description of a failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl ErrorDetails {
    /// Details for `message`/`stack`, preferring an explicit location over
    /// one parsed out of the stack.
    pub fn new(message: impl Into<String>, stack: Option<String>, location: Option<SourceLocation>) -> Self {
        let location = location.or_else(|| stack.as_deref().and_then(parse_location));
        Self {
            message: message.into(),
            stack,
            location,
        }
    }
}

/// Everything recorded about one declared test in one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestExecutionResult {
    pub test_name: String,
    pub full_title: String,
    pub status: TestStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Wall time in milliseconds
    pub duration: u64,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Flattened dependency names, in declaration order
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_details: Vec<ErrorDetails>,

    #[serde(default)]
    pub steps: Vec<StepNode>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,

    #[serde(default)]
    pub annotations: Vec<Annotation>,

    #[serde(default)]
    pub retry: u32,

    #[serde(default)]
    pub stdout: Vec<String>,

    #[serde(default)]
    pub stderr: Vec<String>,
}

impl TestExecutionResult {
    /// A bare result for `test_name` in `status`, with no telemetry.
    pub fn new(test_name: impl Into<String>, full_title: impl Into<String>, status: TestStatus) -> Self {
        Self {
            test_name: test_name.into(),
            full_title: full_title.into(),
            status,
            reason: None,
            duration: 0,
            priority: Priority::default(),
            tags: Vec::new(),
            description: None,
            dependencies: Vec::new(),
            start_time: None,
            end_time: None,
            error: None,
            error_details: Vec::new(),
            steps: Vec::new(),
            attachments: Vec::new(),
            annotations: Vec::new(),
            retry: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// The placeholder every declared test starts from.
    pub fn did_not_execute(test_name: impl Into<String>, full_title: impl Into<String>) -> Self {
        Self::new(test_name, full_title, TestStatus::Skipped).with_reason(DID_NOT_EXECUTE)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.status == TestStatus::Skipped && self.reason.as_deref() == Some(DID_NOT_EXECUTE)
    }

    /// The innermost failure location recorded for this result, if any.
    pub fn failure_location(&self) -> Option<&SourceLocation> {
        self.error_details.iter().find_map(|d| d.location.as_ref())
    }
}
