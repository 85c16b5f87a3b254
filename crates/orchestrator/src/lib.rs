//! UIFlow Test Orchestrator
//!
//! Runs ordered suites of browser UI tests where tests may depend on each
//! other:
//! - Skips a test when a required dependency did not pass, with a reason
//!   naming the unmet dependencies
//! - Stops the suite on the first failure, or keeps going when asked to
//! - Shares one browser page across a suite, or gives each test its own
//! - Records nested steps, attachments and failure screenshots per test
//! - Persists a JSON snapshot of every result after each test
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                         │
//! │    ├── config: OrchestratorConfig (env + SuiteOptions)      │
//! │    ├── sessions: dyn SessionFactory                         │
//! │    └── create_suite(name, [TestCase]) -> Suite              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Suite::run()                                               │
//! │    for each TestCase, in declaration order:                 │
//! │    ├── DependencyTracker::should_run -> Run | Skip(reason)  │
//! │    ├── body(ExecutionContext) under timeout + catch_unwind  │
//! │    │     └── StepRecorder / TelemetrySink                   │
//! │    ├── Outcome -> TestExecutionResult (+ screenshot)        │
//! │    └── ResultSnapshot::write_atomic(<module>-results.json)  │
//! │    then Summary -> SuiteSummary                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  report: load_run(dir) -> [ModuleReport]                    │
//! │    ├── RunComparison::between(current, previous)            │
//! │    └── render_console / render_html                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use uiflow_orchestrator::{Orchestrator, OrchestratorConfig, SuiteOptions, TestCase};
//! use uiflow_orchestrator::testing::MockSessionFactory;
//!
//! # async fn demo() -> uiflow_orchestrator::OrchestratorResult<()> {
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default(), Arc::new(MockSessionFactory::new()));
//! let mut suite = orchestrator.create_suite(
//!     "Checkout",
//!     vec![
//!         TestCase::new("Login", |ctx| async move {
//!             ctx.step("fill credentials", || async { Ok(()) }).await
//!         }),
//!         TestCase::new("Pay", |_ctx| async { Ok(()) }).depends_on("Login"),
//!     ],
//!     SuiteOptions::new(),
//! )?;
//! let summary = suite.run().await?;
//! println!("{} passed", summary.passed);
//! # Ok(())
//! # }
//! ```

pub mod case;
pub mod config;
pub mod context;
pub mod dependency;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod result;
pub mod session;
pub mod snapshot;
pub mod steps;
pub mod telemetry;
pub mod testing;

pub use case::{TestCase, TestMetadata};
pub use config::{LogLevel, OrchestratorConfig, SuiteOptions};
pub use context::{ExecutionContext, SkipSignal, TestInfo};
pub use dependency::{evaluate_dependencies, Dependency, DependencyTracker, RunDecision};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{Orchestrator, Outcome, Suite, SuiteSummary, TestFailure};
pub use result::{Priority, TestExecutionResult, TestStatus};
pub use session::{BrowserSession, ScreenshotMode, SessionFactory};
pub use snapshot::ResultSnapshot;
