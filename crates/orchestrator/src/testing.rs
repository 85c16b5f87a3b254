//! Scripted browser doubles for deterministic suite tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::session::{BrowserSession, ScreenshotMode, SessionFactory};

/// Minimal valid PNG header, enough for attachment plumbing.
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// How a mock page responds to screenshot requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScreenshotBehavior {
    #[default]
    Succeed,
    /// Full-page capture never returns; viewport capture succeeds
    HangFullPage,
    /// No capture ever returns
    Hang,
    /// Every capture errors immediately
    Fail,
}

/// In-memory page that records what was asked of it
#[derive(Debug)]
pub struct MockSession {
    id: String,
    screenshot: ScreenshotBehavior,
    calls: Mutex<Vec<ScreenshotMode>>,
    closed: AtomicBool,
}

impl MockSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            screenshot: ScreenshotBehavior::Succeed,
            calls: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_screenshot(mut self, behavior: ScreenshotBehavior) -> Self {
        self.screenshot = behavior;
        self
    }

    pub fn screenshot_calls(&self) -> Vec<ScreenshotMode> {
        self.calls.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn screenshot(&self, mode: ScreenshotMode) -> OrchestratorResult<Vec<u8>> {
        self.calls.lock().push(mode);
        let hang = match self.screenshot {
            ScreenshotBehavior::Succeed => false,
            ScreenshotBehavior::HangFullPage => mode == ScreenshotMode::FullPage,
            ScreenshotBehavior::Hang => true,
            ScreenshotBehavior::Fail => {
                return Err(OrchestratorError::Screenshot("page crashed".to_string()));
            }
        };
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(PNG_BYTES.to_vec())
    }

    async fn close(&self) -> OrchestratorResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out [`MockSession`]s and remembering them
#[derive(Debug, Clone, Default)]
pub struct MockSessionFactory {
    screenshot: ScreenshotBehavior,
    fail_launch: Arc<AtomicBool>,
    launched: Arc<Mutex<Vec<Arc<MockSession>>>>,
    counter: Arc<AtomicUsize>,
}

impl MockSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_screenshot(mut self, behavior: ScreenshotBehavior) -> Self {
        self.screenshot = behavior;
        self
    }

    /// Make subsequent launches fail (or succeed again).
    pub fn fail_launches(&self, fail: bool) {
        self.fail_launch.store(fail, Ordering::SeqCst);
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().len()
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.launched.lock().clone()
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn launch(&self) -> OrchestratorResult<Arc<dyn BrowserSession>> {
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(OrchestratorError::SessionLaunch("browser binary not found".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(MockSession::new(format!("page-{}", n + 1)).with_screenshot(self.screenshot));
        self.launched.lock().push(session.clone());
        Ok(session as Arc<dyn BrowserSession>)
    }
}
