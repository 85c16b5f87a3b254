//! Browser session seam
//!
//! Driving a browser is out of scope here; test files plug in an adapter
//! for their automation backend through these traits.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::telemetry::Attachment;

/// What a screenshot should cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotMode {
    FullPage,
    Viewport,
}

/// A live browser page
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Identifier used in logs
    fn id(&self) -> &str;

    /// PNG bytes of the current page
    async fn screenshot(&self, mode: ScreenshotMode) -> OrchestratorResult<Vec<u8>>;

    async fn close(&self) -> OrchestratorResult<()>;
}

/// Launches fresh browser sessions
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn launch(&self) -> OrchestratorResult<Arc<dyn BrowserSession>>;
}

/// Budgets for a failure screenshot
#[derive(Debug, Clone, Copy)]
pub struct ScreenshotBudget {
    pub full_page: Duration,
    pub fallback: Duration,
}

/// Capture a screenshot of a failed test without letting an unresponsive
/// page stall the suite.
///
/// Tries a full-page capture within `budget.full_page`, then a viewport
/// capture within `budget.fallback`. Every failure is logged and swallowed.
pub async fn capture_failure_screenshot(
    session: &dyn BrowserSession,
    dir: &Path,
    file_stem: &str,
    budget: ScreenshotBudget,
) -> Option<Attachment> {
    let bytes = match bounded_screenshot(session, ScreenshotMode::FullPage, budget.full_page).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Full-page screenshot failed on {}: {} - trying viewport", session.id(), e);
            match bounded_screenshot(session, ScreenshotMode::Viewport, budget.fallback).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Fallback screenshot failed on {}: {}", session.id(), e);
                    return None;
                }
            }
        }
    };

    match write_screenshot(dir, file_stem, &bytes) {
        Ok(attachment) => Some(attachment),
        Err(e) => {
            warn!("Could not save failure screenshot: {}", e);
            None
        }
    }
}

async fn bounded_screenshot(
    session: &dyn BrowserSession,
    mode: ScreenshotMode,
    budget: Duration,
) -> OrchestratorResult<Vec<u8>> {
    match tokio::time::timeout(budget, session.screenshot(mode)).await {
        Ok(result) => result,
        Err(_) => Err(OrchestratorError::Timeout(format!(
            "{:?} screenshot after {} ms",
            mode,
            budget.as_millis()
        ))),
    }
}

fn write_screenshot(dir: &Path, file_stem: &str, bytes: &[u8]) -> OrchestratorResult<Attachment> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.png", file_stem));
    std::fs::write(&path, bytes)?;
    debug!("Failure screenshot saved to {}", path.display());
    Ok(Attachment::file("screenshot", "image/png", path))
}

/// Make `name` safe to use as a file stem.
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "test".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSession, ScreenshotBehavior};

    fn budget() -> ScreenshotBudget {
        ScreenshotBudget {
            full_page: Duration::from_millis(50),
            fallback: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("Chat > Send message #2"), "Chat---Send-message--2");
        assert_eq!(sanitize_file_stem("///"), "test");
    }

    #[tokio::test]
    async fn test_screenshot_written_and_attached() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new("page-1");

        let attachment = capture_failure_screenshot(&session, dir.path(), "login", budget())
            .await
            .unwrap();
        assert_eq!(attachment.content_type, "image/png");
        assert!(attachment.path.unwrap().exists());
        assert_eq!(session.screenshot_calls(), vec![ScreenshotMode::FullPage]);
    }

    #[tokio::test]
    async fn test_hanging_page_falls_back_to_viewport() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new("page-1").with_screenshot(ScreenshotBehavior::HangFullPage);

        let attachment = capture_failure_screenshot(&session, dir.path(), "nav", budget()).await;
        assert!(attachment.is_some());
        assert_eq!(
            session.screenshot_calls(),
            vec![ScreenshotMode::FullPage, ScreenshotMode::Viewport]
        );
    }

    #[tokio::test]
    async fn test_unresponsive_page_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let session = MockSession::new("page-1").with_screenshot(ScreenshotBehavior::Hang);

        let started = std::time::Instant::now();
        let attachment = capture_failure_screenshot(&session, dir.path(), "nav", budget()).await;
        assert!(attachment.is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
