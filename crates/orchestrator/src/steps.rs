//! Structured step recording
//!
//! A test body opens named steps through a [`StepRecorder`]. Steps opened
//! while another step is open nest under it, so the recorder produces an
//! ordered tree rather than a flat list. Steps follow a stack discipline:
//! concurrent sibling steps inside one test body are not supported.

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::result::SourceLocation;

/// What produced a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepCategory {
    /// Opened by the test body
    #[serde(rename = "test.step")]
    TestStep,
    /// Framework-internal setup or teardown scaffolding
    #[serde(rename = "hook")]
    Hook,
    /// Framework-internal resource provisioning
    #[serde(rename = "fixture")]
    Fixture,
}

impl StepCategory {
    pub fn is_synthetic(self) -> bool {
        matches!(self, StepCategory::Hook | StepCategory::Fixture)
    }
}

/// One node of a recorded step tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepNode {
    pub title: String,

    /// Wall time in milliseconds
    pub duration: u64,

    pub category: StepCategory,

    pub start_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepNode>,
}

impl StepNode {
    pub fn is_synthetic(&self) -> bool {
        self.category.is_synthetic()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.steps.iter().map(StepNode::count).sum::<usize>()
    }
}

/// Drop framework-internal steps. Test steps nested inside a synthetic step
/// are kept and take the synthetic step's place.
pub fn filter_synthetic(nodes: Vec<StepNode>) -> Vec<StepNode> {
    nodes
        .into_iter()
        .flat_map(|mut node| {
            let children = filter_synthetic(std::mem::take(&mut node.steps));
            if node.is_synthetic() {
                children
            } else {
                node.steps = children;
                vec![node]
            }
        })
        .collect()
}

/// The innermost failed step of a test body
#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
    /// Titles from the root step down to the failing one
    pub path: Vec<String>,
    pub location: SourceLocation,
    pub message: String,
    pub category: StepCategory,
    /// Abandoned by a panic or a timeout instead of returning an error
    pub interrupted: bool,
}

impl StepFailure {
    pub fn title_path(&self) -> String {
        self.path.join(" > ")
    }

    /// Failed in framework scaffolding rather than in a test step.
    pub fn is_synthetic(&self) -> bool {
        self.category.is_synthetic()
    }
}

struct OpenStep {
    id: u64,
    node: StepNode,
    started: Instant,
}

#[derive(Default)]
struct RecorderState {
    next_id: u64,
    roots: Vec<StepNode>,
    stack: Vec<OpenStep>,
    failure: Option<StepFailure>,
    /// Ids of the failed step and its ancestors
    failure_ids: Vec<u64>,
}

/// Per-execution step log. Cheap to clone; clones share one tree.
#[derive(Clone, Default)]
pub struct StepRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl StepRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the current tree and start from an empty root.
    pub fn reset(&self) {
        *self.state.lock() = RecorderState::default();
    }

    /// Run `body` as a step titled `title`, nested under any open step.
    ///
    /// The body's error is recorded on the step and returned unchanged.
    #[track_caller]
    pub fn step<T, F, Fut>(&self, title: impl Into<String>, body: F) -> impl Future<Output = anyhow::Result<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let location = SourceLocation::from_caller(Location::caller());
        self.run(title.into(), StepCategory::TestStep, location, body)
    }

    /// Like [`step`](Self::step), recorded as framework scaffolding.
    #[track_caller]
    pub fn hook<T, F, Fut>(&self, title: impl Into<String>, body: F) -> impl Future<Output = anyhow::Result<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let location = SourceLocation::from_caller(Location::caller());
        self.run(title.into(), StepCategory::Hook, location, body)
    }

    fn run<T, F, Fut>(
        &self,
        title: String,
        category: StepCategory,
        location: SourceLocation,
        body: F,
    ) -> impl Future<Output = anyhow::Result<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let recorder = self.clone();
        async move {
            let guard = recorder.open(title, category, location);
            let outcome = body().await;
            match &outcome {
                Ok(_) => guard.close(None),
                Err(e) => guard.close(Some(format!("{:#}", e))),
            }
            outcome
        }
    }

    fn open(&self, title: String, category: StepCategory, location: SourceLocation) -> StepGuard {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.stack.push(OpenStep {
            id,
            node: StepNode {
                title,
                duration: 0,
                category,
                start_time: Utc::now(),
                error: None,
                location: Some(location),
                steps: Vec::new(),
            },
            started: Instant::now(),
        });
        StepGuard {
            recorder: self.clone(),
            id,
            closed: false,
        }
    }

    fn close(&self, id: u64, error: Option<String>, interrupted: bool) {
        let mut state = self.state.lock();
        let Some(pos) = state.stack.iter().position(|s| s.id == id) else {
            // reset() ran while this step was open
            return;
        };

        // Titles above the root, for the failure path
        let mut path: Vec<String> = state.stack[..pos].iter().map(|s| s.node.title.clone()).collect();
        let mut ids: Vec<u64> = state.stack[..pos].iter().map(|s| s.id).collect();

        let open = state.stack.remove(pos);
        let mut node = open.node;
        node.duration = open.started.elapsed().as_millis() as u64;

        if let Some(message) = error {
            // innermost failure wins; an unrelated earlier one was recovered from
            if !state.failure_ids.contains(&id) {
                path.push(node.title.clone());
                ids.push(id);
                state.failure_ids = ids;
                state.failure = Some(StepFailure {
                    path,
                    location: node.location.clone().unwrap_or_else(|| SourceLocation {
                        file: "<unknown>".to_string(),
                        line: 0,
                        column: 0,
                    }),
                    message: message.clone(),
                    category: node.category,
                    interrupted,
                });
            }
            node.error = Some(message);
        }

        match pos.checked_sub(1).and_then(|parent| state.stack.get_mut(parent)) {
            Some(parent) => parent.node.steps.push(node),
            None => state.roots.push(node),
        }
    }

    /// Completed steps, as recorded (synthetic steps included).
    pub fn tree(&self) -> Vec<StepNode> {
        self.state.lock().roots.clone()
    }

    /// Innermost failed step, if any step failed.
    pub fn failure(&self) -> Option<StepFailure> {
        self.state.lock().failure.clone()
    }

    /// Number of steps still open.
    pub fn open_count(&self) -> usize {
        self.state.lock().stack.len()
    }
}

/// Closes its step when dropped, so a step abandoned by a panic or a
/// cancelled future is still recorded.
struct StepGuard {
    recorder: StepRecorder,
    id: u64,
    closed: bool,
}

impl StepGuard {
    fn close(mut self, error: Option<String>) {
        self.closed = true;
        self.recorder.close(self.id, error, false);
    }
}

impl Drop for StepGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let message = if std::thread::panicking() {
            "step panicked"
        } else {
            "step interrupted before completion"
        };
        self.recorder.close(self.id, Some(message.to_string()), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn test_steps_nest_under_open_step() {
        let recorder = StepRecorder::new();
        let inner = recorder.clone();

        recorder
            .step("Step 2: configure form", || async move {
                inner.step("Step 2a: fill title", || async { Ok(()) }).await?;
                inner.step("Step 2b: fill description", || async { Ok(()) }).await?;
                Ok(())
            })
            .await
            .unwrap();
        recorder.step("Step 3: submit", || async { Ok(()) }).await.unwrap();

        let tree = recorder.tree();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].title, "Step 2: configure form");
        let children: Vec<_> = tree[0].steps.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(children, vec!["Step 2a: fill title", "Step 2b: fill description"]);
        assert!(tree[1].steps.is_empty());
        assert_eq!(recorder.open_count(), 0);
    }

    #[tokio::test]
    async fn test_step_returns_body_value() {
        let recorder = StepRecorder::new();
        let value = recorder.step("compute", || async { Ok(41 + 1) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_nested_failure_propagates_to_root() {
        let recorder = StepRecorder::new();
        let inner = recorder.clone();

        let err = recorder
            .step("outer", || async move {
                inner
                    .step("inner", || async { Err::<(), _>(anyhow!("element not found")) })
                    .await
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "element not found");

        let tree = recorder.tree();
        assert_eq!(tree[0].error.as_deref(), Some("element not found"));
        assert_eq!(tree[0].steps[0].error.as_deref(), Some("element not found"));

        let failure = recorder.failure().unwrap();
        assert_eq!(failure.title_path(), "outer > inner");
        assert!(failure.location.file.ends_with("steps.rs"));
        // the innermost step's call site, not the outer one
        assert_eq!(Some(&failure.location), tree[0].steps[0].location.as_ref());
        assert_ne!(tree[0].location, tree[0].steps[0].location);
    }

    #[tokio::test]
    async fn test_recovered_failure_is_replaced_by_later_one() {
        let recorder = StepRecorder::new();

        let _ = recorder
            .step("dismiss banner", || async { Err::<(), _>(anyhow!("no banner")) })
            .await;
        recorder
            .step("submit form", || async { Err::<(), _>(anyhow!("submit disabled")) })
            .await
            .unwrap_err();

        let tree = recorder.tree();
        let failure = recorder.failure().unwrap();
        assert_eq!(failure.title_path(), "submit form");
        assert_eq!(failure.message, "submit disabled");
        assert_eq!(Some(&failure.location), tree[1].location.as_ref());
        assert!(!failure.is_synthetic());
        assert!(!failure.interrupted);
    }

    #[tokio::test]
    async fn test_enclosing_step_keeps_inner_failure() {
        let recorder = StepRecorder::new();
        let inner = recorder.clone();

        recorder
            .step("checkout", || async move {
                let _ = inner.step("close popup", || async { Err::<(), _>(anyhow!("no popup")) }).await;
                inner
                    .step("pay", || async { Err::<(), _>(anyhow!("card declined")) })
                    .await
            })
            .await
            .unwrap_err();

        let tree = recorder.tree();
        let failure = recorder.failure().unwrap();
        assert_eq!(failure.title_path(), "checkout > pay");
        assert_eq!(Some(&failure.location), tree[0].steps[1].location.as_ref());
    }

    #[tokio::test]
    async fn test_hook_failure_is_synthetic() {
        let recorder = StepRecorder::new();
        recorder
            .hook("Before Hooks", || async { Err::<(), _>(anyhow!("browser crashed")) })
            .await
            .unwrap_err();
        assert!(recorder.failure().unwrap().is_synthetic());
    }

    #[tokio::test]
    async fn test_reset_discards_tree() {
        let recorder = StepRecorder::new();
        recorder.step("one", || async { Ok(()) }).await.unwrap();
        recorder.reset();
        assert!(recorder.tree().is_empty());
        assert!(recorder.failure().is_none());
    }

    #[tokio::test]
    async fn test_dropped_step_is_recorded_as_interrupted() {
        let recorder = StepRecorder::new();
        let fut = recorder.step("slow", || async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(())
        });
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), fut).await;
        assert!(timed_out.is_err());

        let tree = recorder.tree();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].error.as_deref(), Some("step interrupted before completion"));
        assert!(recorder.failure().unwrap().interrupted);
    }

    #[tokio::test]
    async fn test_filter_synthetic_hoists_user_steps() {
        let recorder = StepRecorder::new();
        let inner = recorder.clone();
        recorder
            .hook("Before Hooks", || async move {
                inner.step("seed data", || async { Ok(()) }).await
            })
            .await
            .unwrap();
        recorder.step("body", || async { Ok(()) }).await.unwrap();

        let raw = recorder.tree();
        assert_eq!(raw.len(), 2);
        assert!(raw[0].is_synthetic());

        let filtered = filter_synthetic(raw);
        let titles: Vec<_> = filtered.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["seed data", "body"]);
    }

    #[test]
    fn test_step_node_serializes_category() {
        let node = StepNode {
            title: "open chat".into(),
            duration: 12,
            category: StepCategory::TestStep,
            start_time: Utc::now(),
            error: None,
            location: None,
            steps: vec![],
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["category"], "test.step");
        assert!(json.get("steps").is_none());
        assert!(json.get("startTime").is_some());
    }
}
