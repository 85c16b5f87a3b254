//! Suite registration and the sequential run loop
//!
//! For every declared test, in order: decide run/skip against the results
//! recorded so far, execute the body inside a tracked context, classify the
//! outcome, harvest telemetry, record the result and persist the snapshot.
//! A failure then either halts the suite or is contained, depending on
//! `continue_on_failure`.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::case::TestCase;
use crate::config::{LogLevel, OrchestratorConfig, SuiteOptions};
use crate::context::{ExecutionContext, Page, SkipSignal, TestInfo};
use crate::dependency::{DependencyTracker, RunDecision};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::result::{parse_location, ErrorDetails, SourceLocation, TestExecutionResult, TestStatus};
use crate::session::{capture_failure_screenshot, sanitize_file_stem, BrowserSession, ScreenshotBudget, SessionFactory};
use crate::snapshot::ResultSnapshot;
use crate::steps::StepRecorder;
use crate::telemetry::{ExecutionTelemetry, RecordedTelemetry, TelemetrySink};

/// Why a test attempt failed
#[derive(Debug, Clone, PartialEq)]
pub struct TestFailure {
    pub message: String,
    pub stack: Option<String>,
    pub location: Option<SourceLocation>,
}

impl TestFailure {
    pub fn from_error(err: &anyhow::Error) -> Self {
        let stack = format!("{:?}", err);
        Self {
            message: format!("{:#}", err),
            location: parse_location(&stack),
            stack: Some(stack),
        }
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "test body panicked".to_string()
        };
        Self {
            location: parse_location(&message),
            message: format!("panicked: {}", message),
            stack: None,
        }
    }

    pub fn timeout(limit: Duration) -> Self {
        Self {
            message: format!("Test timeout of {}ms exceeded", limit.as_millis()),
            stack: None,
            location: None,
        }
    }
}

/// How one attempt ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ran,
    Skipped(String),
    Failed(TestFailure),
}

impl Outcome {
    fn status(&self) -> TestStatus {
        match self {
            Outcome::Ran => TestStatus::Passed,
            Outcome::Skipped(_) => TestStatus::Skipped,
            Outcome::Failed(_) => TestStatus::Failed,
        }
    }

    /// Map a body's (possibly panicked) return value onto an outcome.
    pub fn classify(raw: Result<anyhow::Result<()>, Box<dyn Any + Send>>) -> Self {
        match raw {
            Ok(Ok(())) => Outcome::Ran,
            Ok(Err(err)) => match err.downcast_ref::<SkipSignal>() {
                Some(signal) => Outcome::Skipped(signal.reason.clone()),
                None => Outcome::Failed(TestFailure::from_error(&err)),
            },
            Err(payload) => Outcome::Failed(TestFailure::from_panic(payload)),
        }
    }
}

/// Aggregate numbers logged and returned at the end of a suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub suite: String,
    pub module: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Percentage of declared tests that passed
    pub pass_rate: f64,
    pub duration_ms: u64,
    /// Test whose failure stopped the suite, in fail-fast mode
    pub halted_by: Option<String>,
}

/// Snapshot contents per results file. Suites of the same module write to
/// one file, so each of them upserts into the shared entry.
type SnapshotFiles = Arc<Mutex<HashMap<PathBuf, ResultSnapshot>>>;

/// Creates suites that share one configuration, session factory,
/// dependency tracker and set of results files.
pub struct Orchestrator {
    config: OrchestratorConfig,
    sessions: Arc<dyn SessionFactory>,
    tracker: Arc<Mutex<DependencyTracker>>,
    files: SnapshotFiles,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            config,
            sessions,
            tracker: Arc::new(Mutex::new(DependencyTracker::new())),
            files: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Orchestrator configured from the process environment.
    pub fn from_env(sessions: Arc<dyn SessionFactory>) -> OrchestratorResult<Self> {
        Ok(Self::new(OrchestratorConfig::from_env()?, sessions))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Copy of every result recorded through this orchestrator.
    pub fn execution_results(&self) -> HashMap<String, TestExecutionResult> {
        self.tracker.lock().execution_results().clone()
    }

    /// Register `cases` as a suite.
    ///
    /// Every test gets a `did not execute` placeholder, written to disk
    /// immediately, so an interrupted run still leaves a complete report.
    pub fn create_suite(
        &self,
        name: impl Into<String>,
        cases: Vec<TestCase>,
        options: SuiteOptions,
    ) -> OrchestratorResult<Suite> {
        let name = name.into();
        let config = self.config.merged(&options);
        validate_cases(&name, &cases)?;

        let snapshot_path = config.snapshot_path();
        let mut ctx = SuiteRunContext::new(name.clone(), config, snapshot_path, self.files.clone());
        {
            let mut tracker = self.tracker.lock();
            for case in &cases {
                tracker.register_test(&case.name, case.metadata.clone());
                let mut placeholder = TestExecutionResult::did_not_execute(&case.name, full_title(&name, &case.name));
                apply_declaration(&mut placeholder, case);
                ctx.record(placeholder);
            }
        }

        let declared: HashSet<&str> = cases.iter().map(|c| c.name.as_str()).collect();
        for case in &cases {
            for dep in &case.dependencies {
                if !declared.contains(dep.name()) && ctx.logs(LogLevel::Verbose) {
                    debug!("{}: dependency '{}' is not declared in suite '{}'", case.name, dep.name(), name);
                }
            }
        }

        ctx.persist()?;

        if ctx.logs(LogLevel::Detailed) {
            info!("Registered suite '{}' with {} test(s)", name, cases.len());
        }

        Ok(Suite {
            cases,
            ctx,
            sessions: self.sessions.clone(),
            tracker: self.tracker.clone(),
            shared: None,
            finished: false,
        })
    }
}

fn validate_cases(suite: &str, cases: &[TestCase]) -> OrchestratorResult<()> {
    let mut seen = HashSet::new();
    for case in cases {
        if case.name.trim().is_empty() {
            return Err(OrchestratorError::InvalidSuite(format!("suite '{}' has a test with an empty name", suite)));
        }
        if case.name == SUMMARY_TEST {
            return Err(OrchestratorError::InvalidSuite(format!("'{}' is reserved", SUMMARY_TEST)));
        }
        if !seen.insert(case.name.as_str()) {
            return Err(OrchestratorError::InvalidSuite(format!(
                "test '{}' is declared twice in suite '{}'",
                case.name, suite
            )));
        }
        if case.dependencies.iter().any(|d| d.name() == case.name) {
            return Err(OrchestratorError::InvalidSuite(format!("test '{}' depends on itself", case.name)));
        }
    }
    Ok(())
}

/// Name of the synthetic closing step of every suite.
pub const SUMMARY_TEST: &str = "Summary";

fn full_title(suite: &str, test: &str) -> String {
    format!("{} > {}", suite, test)
}

fn apply_declaration(result: &mut TestExecutionResult, case: &TestCase) {
    result.priority = case.metadata.priority;
    result.tags = case.metadata.tags.clone();
    result.description = case.metadata.description.clone();
    result.dependencies = case.dependency_names();
}

/// Per-suite state threaded through the run: effective config, the suite's
/// own results and the file they are persisted to.
pub struct SuiteRunContext {
    pub suite: String,
    pub config: OrchestratorConfig,
    snapshot: ResultSnapshot,
    snapshot_path: PathBuf,
    files: SnapshotFiles,
}

impl SuiteRunContext {
    fn new(suite: String, config: OrchestratorConfig, snapshot_path: PathBuf, files: SnapshotFiles) -> Self {
        Self {
            suite,
            config,
            snapshot: ResultSnapshot::new(),
            snapshot_path,
            files,
        }
    }

    pub fn results(&self) -> &ResultSnapshot {
        &self.snapshot
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    fn record(&mut self, result: TestExecutionResult) {
        self.files
            .lock()
            .entry(self.snapshot_path.clone())
            .or_default()
            .upsert(result.clone());
        self.snapshot.upsert(result);
    }

    /// Write the whole file, including results of other suites sharing it.
    fn persist(&self) -> OrchestratorResult<()> {
        let files = self.files.lock();
        match files.get(&self.snapshot_path) {
            Some(shared) => shared.write_atomic(&self.snapshot_path),
            None => self.snapshot.write_atomic(&self.snapshot_path),
        }
    }

    /// Persist, logging instead of failing; used between tests.
    fn persist_or_log(&self) {
        if let Err(e) = self.persist() {
            error!("Failed to write snapshot {}: {}", self.snapshot_path.display(), e);
        }
    }

    fn logs(&self, level: LogLevel) -> bool {
        self.config.log_level.allows(level)
    }
}

/// A registered suite, ready to run once
pub struct Suite {
    cases: Vec<TestCase>,
    ctx: SuiteRunContext,
    sessions: Arc<dyn SessionFactory>,
    tracker: Arc<Mutex<DependencyTracker>>,
    shared: Option<Arc<dyn BrowserSession>>,
    finished: bool,
}

impl Suite {
    pub fn name(&self) -> &str {
        &self.ctx.suite
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.ctx.config
    }

    /// Current results, placeholders included. Valid after a halt too.
    pub fn results(&self) -> &ResultSnapshot {
        self.ctx.results()
    }

    pub fn snapshot_path(&self) -> &Path {
        self.ctx.snapshot_path()
    }

    /// Run every declared test in order, then the summary.
    ///
    /// Returns [`OrchestratorError::SuiteHalted`] when a failure stopped the
    /// suite; the final snapshot is written before returning either way.
    pub async fn run(&mut self) -> OrchestratorResult<SuiteSummary> {
        if self.finished {
            return Err(OrchestratorError::InvalidSuite(format!("suite '{}' has already run", self.ctx.suite)));
        }
        self.finished = true;

        if !self.ctx.config.sequential {
            warn!(
                "Suite '{}': parallel execution is not supported within a suite; running sequentially",
                self.ctx.suite
            );
        }

        let started = Instant::now();
        let mut halted: Option<(String, String)> = None;

        for idx in 0..self.cases.len() {
            let case = self.cases[idx].clone();

            let decision = self.tracker.lock().should_run(&case);
            if self.ctx.logs(LogLevel::Verbose) {
                debug!("{}: dependencies {:?} -> {:?}", case.name, case.dependency_names(), decision);
            }

            let result = match decision {
                RunDecision::Skip(reason) => {
                    if self.ctx.logs(LogLevel::Detailed) {
                        info!("- {} skipped: {}", case.name, reason);
                    }
                    self.skipped_result(&case, reason)
                }
                RunDecision::Run => {
                    if self.ctx.logs(LogLevel::Detailed) {
                        info!("> {} starting", case.name);
                    }
                    self.execute(&case).await
                }
            };

            let status = result.status;
            let message = result.error.clone();
            self.tracker.lock().record_test_result(result.clone());
            self.ctx.record(result);
            self.ctx.persist_or_log();

            if status == TestStatus::Failed {
                let message = message.unwrap_or_default();
                if self.ctx.config.continue_on_failure {
                    if self.ctx.logs(LogLevel::Detailed) {
                        info!("Continuing after failure of '{}'", case.name);
                    }
                } else {
                    error!("Suite '{}' halted by '{}': {}", self.ctx.suite, case.name, message);
                    halted = Some((case.name.clone(), message));
                    self.close_shared().await;
                    break;
                }
            }
        }

        let summary = self.summarize(started.elapsed(), halted.as_ref().map(|(name, _)| name.clone()));
        let persisted = self.ctx.persist();
        self.close_shared().await;
        persisted?;

        match halted {
            Some((test, message)) => Err(OrchestratorError::SuiteHalted {
                suite: self.ctx.suite.clone(),
                test,
                message,
            }),
            None => Ok(summary),
        }
    }

    fn skipped_result(&self, case: &TestCase, reason: String) -> TestExecutionResult {
        let now = Utc::now();
        let mut result = TestExecutionResult::new(&case.name, full_title(&self.ctx.suite, &case.name), TestStatus::Skipped)
            .with_reason(reason);
        apply_declaration(&mut result, case);
        result.start_time = Some(now);
        result.end_time = Some(now);
        result
    }

    /// Run `case` with retries; the last attempt's result is kept.
    async fn execute(&mut self, case: &TestCase) -> TestExecutionResult {
        let timeout = case.effective_timeout(self.ctx.config.default_test_timeout);
        let mut attempt = 0;
        loop {
            let (outcome, result) = self.run_attempt(case, attempt, timeout).await;
            match outcome {
                Outcome::Failed(_) if attempt < case.retries => {
                    warn!(
                        "{} failed on attempt {} of {}: {}",
                        case.name,
                        attempt + 1,
                        case.retries + 1,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                    attempt += 1;
                }
                _ => return result,
            }
        }
    }

    async fn run_attempt(
        &mut self,
        case: &TestCase,
        attempt: u32,
        timeout: Option<Duration>,
    ) -> (Outcome, TestExecutionResult) {
        let steps = StepRecorder::new();
        steps.reset();
        let sink = TelemetrySink::new();
        let start_time = Utc::now();
        let started = Instant::now();

        let (outcome, session) = match self.acquire_page(&steps).await {
            Err(e) => (Outcome::Failed(TestFailure::from_error(&e)), None),
            Ok(page) => {
                let session = page.session().clone();
                let info = TestInfo {
                    suite: self.ctx.suite.clone(),
                    title: case.name.clone(),
                    full_title: full_title(&self.ctx.suite, &case.name),
                    retry: attempt,
                    timeout,
                };
                let context = ExecutionContext::new(page, steps.clone(), sink.clone(), info);
                let body = AssertUnwindSafe(case.invoke(context)).catch_unwind();

                let outcome = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, body).await {
                        Ok(raw) => Outcome::classify(raw),
                        Err(_) => Outcome::Failed(TestFailure::timeout(limit)),
                    },
                    None => Outcome::classify(body.await),
                };
                (outcome, Some(session))
            }
        };

        let telemetry = RecordedTelemetry::new(steps, sink).snapshot();

        let mut result = TestExecutionResult::new(&case.name, full_title(&self.ctx.suite, &case.name), outcome.status());
        apply_declaration(&mut result, case);
        result.retry = attempt;
        result.start_time = Some(start_time);
        result.steps = telemetry.steps;
        result.attachments = telemetry.attachments;
        result.annotations = telemetry.annotations;
        result.stdout = telemetry.stdout;
        result.stderr = telemetry.stderr;

        match &outcome {
            Outcome::Ran => {
                if self.ctx.logs(LogLevel::Detailed) {
                    info!("✓ {} ({} ms)", case.name, started.elapsed().as_millis());
                }
            }
            Outcome::Skipped(reason) => {
                if self.ctx.logs(LogLevel::Detailed) {
                    info!("- {} skipped from inside the test: {}", case.name, reason);
                }
                result.reason = Some(reason.clone());
            }
            Outcome::Failed(failure) => {
                error!("✗ {} - {}", case.name, failure.message);
                result.error = Some(failure.message.clone());

                // the failed test step's call site when the step raised this error
                // or was cut short by it, then whatever the error itself carried
                let location = telemetry
                    .step_failure
                    .as_ref()
                    .filter(|step| {
                        !step.is_synthetic() && (step.interrupted || failure.message.ends_with(&step.message))
                    })
                    .map(|step| step.location.clone())
                    .or_else(|| failure.location.clone());
                result
                    .error_details
                    .push(ErrorDetails::new(&failure.message, failure.stack.clone(), location));
                if let Some(step) = &telemetry.step_failure {
                    if self.ctx.logs(LogLevel::Verbose) {
                        debug!("{} failed in step '{}' at {}", case.name, step.title_path(), step.location);
                    }
                }

                if let Some(session) = &session {
                    let stem = sanitize_file_stem(&format!("{}-{}-retry{}", self.ctx.suite, case.name, attempt));
                    let budget = ScreenshotBudget {
                        full_page: self.ctx.config.screenshot_timeout,
                        fallback: self.ctx.config.fallback_screenshot_timeout,
                    };
                    if let Some(attachment) =
                        capture_failure_screenshot(session.as_ref(), &self.ctx.config.screenshot_dir(), &stem, budget).await
                    {
                        result.attachments.push(attachment);
                    }
                }
            }
        }

        if !self.ctx.config.use_shared_page {
            if let Some(session) = &session {
                if let Err(e) = session.close().await {
                    warn!("Failed to close session {}: {}", session.id(), e);
                }
            }
        }

        result.end_time = Some(Utc::now());
        result.duration = started.elapsed().as_millis() as u64;
        (outcome, result)
    }

    /// The page for the next attempt, launching one if needed. Launching is
    /// recorded as a hook step.
    async fn acquire_page(&mut self, steps: &StepRecorder) -> anyhow::Result<Page> {
        if self.ctx.config.use_shared_page {
            if let Some(session) = &self.shared {
                return Ok(Page::Shared(session.clone()));
            }
        }

        let factory = self.sessions.clone();
        let session = steps
            .hook("Before Hooks", || async move { Ok(factory.launch().await?) })
            .await?;

        if self.ctx.config.use_shared_page {
            if self.ctx.logs(LogLevel::Verbose) {
                debug!("Suite '{}' shares session {}", self.ctx.suite, session.id());
            }
            self.shared = Some(session.clone());
            Ok(Page::Shared(session))
        } else {
            Ok(Page::Fresh(session))
        }
    }

    async fn close_shared(&mut self) {
        if let Some(session) = self.shared.take() {
            if let Err(e) = session.close().await {
                warn!("Failed to close shared session {}: {}", session.id(), e);
            }
        }
    }

    /// The closing summary step: aggregate counts, logged at every level.
    fn summarize(&self, elapsed: Duration, halted_by: Option<String>) -> SuiteSummary {
        let results = self.ctx.results();
        let total = results.len();
        let passed = results.count(TestStatus::Passed);
        let failed = results.count(TestStatus::Failed);
        let skipped = results.count(TestStatus::Skipped);
        let pass_rate = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64 * 100.0
        };

        info!(
            "{} '{}': {} passed, {} failed, {} skipped of {} ({:.1}% pass rate, {} ms)",
            SUMMARY_TEST,
            self.ctx.suite,
            passed,
            failed,
            skipped,
            total,
            pass_rate,
            elapsed.as_millis()
        );

        SuiteSummary {
            suite: self.ctx.suite.clone(),
            module: self.ctx.config.module.clone(),
            total,
            passed,
            failed,
            skipped,
            pass_rate,
            duration_ms: elapsed.as_millis() as u64,
            halted_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSessionFactory;
    use anyhow::anyhow;

    fn orchestrator(dir: &Path) -> Orchestrator {
        let config = OrchestratorConfig {
            results_dir: dir.to_path_buf(),
            module: "unit".into(),
            ..Default::default()
        };
        Orchestrator::new(config, Arc::new(MockSessionFactory::new()))
    }

    fn noop(name: &str) -> TestCase {
        TestCase::new(name, |_ctx| async { Ok(()) })
    }

    #[test]
    fn test_classify_outcomes() {
        assert_eq!(Outcome::classify(Ok(Ok(()))), Outcome::Ran);
        assert_eq!(
            Outcome::classify(Ok(Err(SkipSignal::new("no data").into()))),
            Outcome::Skipped("no data".into())
        );
        match Outcome::classify(Ok(Err(anyhow!("button missing")))) {
            Outcome::Failed(f) => assert_eq!(f.message, "button missing"),
            other => panic!("unexpected {:?}", other),
        }
        match Outcome::classify(Err(Box::new("assertion failed: ok"))) {
            Outcome::Failed(f) => assert_eq!(f.message, "panicked: assertion failed: ok"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_skip_signal_wrapped_in_context_is_still_a_skip() {
        let err = anyhow::Error::from(SkipSignal::new("flag off")).context("while opening chat");
        assert_eq!(Outcome::classify(Ok(Err(err))), Outcome::Skipped("flag off".into()));
    }

    #[test]
    fn test_create_suite_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let err = orchestrator(dir.path())
            .create_suite("Chat", vec![noop("A"), noop("A")], SuiteOptions::new())
            .err()
            .unwrap();
        assert!(matches!(err, OrchestratorError::InvalidSuite(_)));
    }

    #[test]
    fn test_create_suite_rejects_self_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let result = orchestrator(dir.path()).create_suite("Chat", vec![noop("A").depends_on("A")], SuiteOptions::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_create_suite_seeds_and_persists_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let suite = orchestrator(dir.path())
            .create_suite("Chat", vec![noop("A"), noop("B").depends_on("A")], SuiteOptions::new())
            .unwrap();

        assert_eq!(suite.results().len(), 2);
        assert!(suite.results().iter().all(|r| r.is_placeholder()));
        assert_eq!(suite.results().get("B").unwrap().dependencies, vec!["A"]);

        let on_disk = ResultSnapshot::read(suite.snapshot_path()).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert_eq!(suite.snapshot_path(), dir.path().join("unit-results.json"));
    }

    #[tokio::test]
    async fn test_suite_runs_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut suite = orchestrator(dir.path())
            .create_suite("Chat", vec![noop("A")], SuiteOptions::new())
            .unwrap();
        suite.run().await.unwrap();
        assert!(matches!(suite.run().await, Err(OrchestratorError::InvalidSuite(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let slow = TestCase::new("Slow", |_ctx| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .timeout(Duration::from_millis(20));

        let mut suite = orchestrator(dir.path())
            .create_suite("Chat", vec![slow], SuiteOptions::new().continue_on_failure(true))
            .unwrap();
        let summary = suite.run().await.unwrap();

        assert_eq!(summary.failed, 1);
        let result = suite.results().get("Slow").unwrap();
        assert_eq!(result.error.as_deref(), Some("Test timeout of 20ms exceeded"));
    }

    #[tokio::test]
    async fn test_retries_rerun_failed_body() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(Mutex::new(0u32));
        let counter = calls.clone();
        let flaky = TestCase::new("Flaky", move |_ctx| {
            let counter = counter.clone();
            async move {
                let mut n = counter.lock();
                *n += 1;
                if *n < 3 {
                    Err(anyhow!("attempt {} failed", *n))
                } else {
                    Ok(())
                }
            }
        })
        .retries(2);

        let mut suite = orchestrator(dir.path())
            .create_suite("Chat", vec![flaky], SuiteOptions::new())
            .unwrap();
        suite.run().await.unwrap();

        let result = suite.results().get("Flaky").unwrap();
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.retry, 2);
        assert_eq!(*calls.lock(), 3);
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let dir = tempfile::tempdir().unwrap();
        let failing = TestCase::new("B", |_ctx| async { Err(anyhow!("nope")) });
        let mut suite = orchestrator(dir.path())
            .create_suite(
                "Chat",
                vec![noop("A"), failing, noop("C").depends_on("B"), noop("D")],
                SuiteOptions::new().continue_on_failure(true),
            )
            .unwrap();
        let summary = suite.run().await.unwrap();

        assert_eq!((summary.passed, summary.failed, summary.skipped), (2, 1, 1));
        assert_eq!(summary.total, 4);
        assert!((summary.pass_rate - 50.0).abs() < f64::EPSILON);
        assert!(summary.halted_by.is_none());
    }
}
