//! What a test body receives

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::session::BrowserSession;
use crate::steps::StepRecorder;
use crate::telemetry::{Annotation, Attachment, TelemetrySink};

/// Raised from a test body to end it as skipped rather than failed.
///
/// Return it through `anyhow` (`return Err(ctx.skip("...").into())` or
/// `Err(SkipSignal::new("...").into())`); the orchestrator recognises it by
/// downcasting and never counts it as a failure or retries it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("skipped: {reason}")]
pub struct SkipSignal {
    pub reason: String,
}

impl SkipSignal {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// The browser page a test runs against
#[derive(Clone)]
pub enum Page {
    /// The suite's long-lived session
    Shared(Arc<dyn BrowserSession>),
    /// A session launched for this attempt only
    Fresh(Arc<dyn BrowserSession>),
}

impl Page {
    pub fn session(&self) -> &Arc<dyn BrowserSession> {
        match self {
            Page::Shared(session) | Page::Fresh(session) => session,
        }
    }
}

/// Static facts about the running attempt
#[derive(Debug, Clone)]
pub struct TestInfo {
    pub suite: String,
    pub title: String,
    pub full_title: String,
    /// Zero-based attempt index
    pub retry: u32,
    pub timeout: Option<Duration>,
}

/// Handed to every test body, once per attempt
#[derive(Clone)]
pub struct ExecutionContext {
    page: Page,
    steps: StepRecorder,
    sink: TelemetrySink,
    info: TestInfo,
}

impl ExecutionContext {
    pub fn new(page: Page, steps: StepRecorder, sink: TelemetrySink, info: TestInfo) -> Self {
        Self {
            page,
            steps,
            sink,
            info,
        }
    }

    /// The page for this attempt, shared or fresh.
    pub fn page(&self) -> &Arc<dyn BrowserSession> {
        self.page.session()
    }

    /// The suite's shared page, when the suite runs in shared mode.
    pub fn shared_page(&self) -> Option<&Arc<dyn BrowserSession>> {
        match &self.page {
            Page::Shared(session) => Some(session),
            Page::Fresh(_) => None,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.page, Page::Shared(_))
    }

    pub fn info(&self) -> &TestInfo {
        &self.info
    }

    pub fn steps(&self) -> &StepRecorder {
        &self.steps
    }

    /// Run `body` as a named step; see [`StepRecorder::step`].
    #[track_caller]
    pub fn step<T, F, Fut>(&self, title: impl Into<String>, body: F) -> impl Future<Output = anyhow::Result<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.steps.step(title, body)
    }

    pub fn attach(&self, attachment: Attachment) {
        self.sink.attach(attachment);
    }

    pub fn attach_file(&self, name: impl Into<String>, content_type: impl Into<String>, path: impl Into<PathBuf>) {
        self.sink.attach(Attachment::file(name, content_type, path));
    }

    pub fn attach_text(&self, name: impl Into<String>, content_type: impl Into<String>, body: impl Into<String>) {
        self.sink.attach(Attachment::text(name, content_type, body));
    }

    pub fn annotate(&self, kind: impl Into<String>, description: Option<String>) {
        self.sink.annotate(Annotation {
            kind: kind.into(),
            description,
        });
    }

    /// Capture a line of test output.
    pub fn stdout(&self, line: impl Into<String>) {
        self.sink.stdout(line);
    }

    pub fn stderr(&self, line: impl Into<String>) {
        self.sink.stderr(line);
    }

    /// Build a skip signal for this test.
    pub fn skip(&self, reason: impl Into<String>) -> SkipSignal {
        SkipSignal::new(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSession;

    fn context(page: Page) -> ExecutionContext {
        ExecutionContext::new(
            page,
            StepRecorder::new(),
            TelemetrySink::new(),
            TestInfo {
                suite: "Chat".into(),
                title: "Send".into(),
                full_title: "Chat > Send".into(),
                retry: 0,
                timeout: None,
            },
        )
    }

    #[test]
    fn test_shared_page_exposed_only_in_shared_mode() {
        let session: Arc<dyn BrowserSession> = Arc::new(MockSession::new("page-1"));

        let shared = context(Page::Shared(session.clone()));
        assert!(shared.is_shared());
        assert_eq!(shared.shared_page().unwrap().id(), "page-1");

        let fresh = context(Page::Fresh(session));
        assert!(fresh.shared_page().is_none());
        assert_eq!(fresh.page().id(), "page-1");
    }

    #[test]
    fn test_skip_signal_survives_anyhow() {
        let ctx = context(Page::Fresh(Arc::new(MockSession::new("p"))));
        let err: anyhow::Error = ctx.skip("feature flag off").into();
        let signal = err.downcast_ref::<SkipSignal>().unwrap();
        assert_eq!(signal.reason, "feature flag off");
    }

    #[tokio::test]
    async fn test_context_step_records_caller_location() {
        let ctx = context(Page::Fresh(Arc::new(MockSession::new("p"))));
        ctx.step("open history", || async { Ok(()) }).await.unwrap();
        let tree = ctx.steps().tree();
        assert!(tree[0].location.as_ref().unwrap().file.ends_with("context.rs"));
    }
}
