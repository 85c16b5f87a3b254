//! Execution telemetry harvested after each test attempt
//!
//! The orchestrator only sees [`ExecutionTelemetry`]; each host integration
//! supplies its own adapter. [`RecordedTelemetry`] is the adapter for the
//! in-process runner: it reads the step recorder and the context's sink.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::steps::{filter_synthetic, StepFailure, StepNode, StepRecorder};

/// A file or inline payload attached to a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Attachment {
    pub fn file(name: impl Into<String>, content_type: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            path: Some(path.into()),
            body: None,
        }
    }

    pub fn text(name: impl Into<String>, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            path: None,
            body: Some(body.into()),
        }
    }
}

/// A typed note on a result (e.g. `issue`, `slow`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Everything harvested from one attempt
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    /// Step tree with synthetic steps removed
    pub steps: Vec<StepNode>,
    pub attachments: Vec<Attachment>,
    pub annotations: Vec<Annotation>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub step_failure: Option<StepFailure>,
}

/// Narrow view of a host runner's per-test execution info.
pub trait ExecutionTelemetry: Send + Sync {
    fn snapshot(&self) -> TelemetrySnapshot;
}

#[derive(Debug, Default)]
struct SinkState {
    attachments: Vec<Attachment>,
    annotations: Vec<Annotation>,
    stdout: Vec<String>,
    stderr: Vec<String>,
}

/// Shared collector for attachments, annotations and captured output.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySink {
    state: Arc<Mutex<SinkState>>,
}

impl TelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, attachment: Attachment) {
        self.state.lock().attachments.push(attachment);
    }

    pub fn annotate(&self, annotation: Annotation) {
        self.state.lock().annotations.push(annotation);
    }

    pub fn stdout(&self, line: impl Into<String>) {
        self.state.lock().stdout.push(line.into());
    }

    pub fn stderr(&self, line: impl Into<String>) {
        self.state.lock().stderr.push(line.into());
    }
}

/// Adapter over the in-process step recorder and sink
pub struct RecordedTelemetry {
    steps: StepRecorder,
    sink: TelemetrySink,
}

impl RecordedTelemetry {
    pub fn new(steps: StepRecorder, sink: TelemetrySink) -> Self {
        Self { steps, sink }
    }
}

impl ExecutionTelemetry for RecordedTelemetry {
    fn snapshot(&self) -> TelemetrySnapshot {
        let sink = self.sink.state.lock();
        TelemetrySnapshot {
            steps: filter_synthetic(self.steps.tree()),
            attachments: sink.attachments.clone(),
            annotations: sink.annotations.clone(),
            stdout: sink.stdout.clone(),
            stderr: sink.stderr.clone(),
            step_failure: self.steps.failure(),
        }
    }
}
