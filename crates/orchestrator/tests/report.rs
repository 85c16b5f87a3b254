//! Reports built from snapshots produced by real suite runs

use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;

use uiflow_orchestrator::report::{self, ModuleStatus, RunComparison, Transition, Trend};
use uiflow_orchestrator::testing::MockSessionFactory;
use uiflow_orchestrator::{Orchestrator, OrchestratorConfig, Priority, SuiteOptions, TestCase};

async fn run_checkout(dir: &Path, pay_fails: bool) {
    let config = OrchestratorConfig {
        results_dir: dir.to_path_buf(),
        continue_on_failure: true,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(config, Arc::new(MockSessionFactory::new()));

    let pay = TestCase::new("Pay", move |_ctx| async move {
        if pay_fails {
            Err(anyhow!("card declined"))
        } else {
            Ok(())
        }
    })
    .depends_on("Login")
    .priority(Priority::Highest);

    let mut checkout = orchestrator
        .create_suite(
            "Checkout",
            vec![
                TestCase::new("Login", |_ctx| async { Ok(()) }).priority(Priority::High),
                pay,
                TestCase::new("Receipt", |_ctx| async { Ok(()) }).depends_on("Pay"),
            ],
            SuiteOptions::new().module("checkout"),
        )
        .unwrap();
    checkout.run().await.unwrap();

    let mut search = orchestrator
        .create_suite(
            "Search",
            vec![TestCase::new("Query", |_ctx| async { Ok(()) })],
            SuiteOptions::new().module("search"),
        )
        .unwrap();
    search.run().await.unwrap();
}

#[tokio::test]
async fn test_load_run_summarises_each_module() {
    let dir = tempfile::tempdir().unwrap();
    run_checkout(dir.path(), true).await;

    let reports = report::load_run(dir.path()).unwrap();
    assert_eq!(reports.len(), 2);

    let checkout = &reports[0];
    assert_eq!(checkout.module, "checkout");
    assert_eq!((checkout.passed, checkout.failed, checkout.skipped), (1, 1, 1));
    assert_eq!(checkout.failed_with_priority(Priority::Highest), 1);
    assert_eq!(checkout.status, ModuleStatus::Failed);

    let search = &reports[1];
    assert_eq!(search.status, ModuleStatus::Passed);
    assert!(report::has_failures(&reports));
}

#[tokio::test]
async fn test_comparison_against_previous_run() {
    let previous_dir = tempfile::tempdir().unwrap();
    let current_dir = tempfile::tempdir().unwrap();
    run_checkout(previous_dir.path(), true).await;
    run_checkout(current_dir.path(), false).await;

    let previous = report::load_run(previous_dir.path()).unwrap();
    let current = report::load_run(current_dir.path()).unwrap();
    let comparison = RunComparison::between(&current, &previous);

    let checkout = comparison.module("checkout").unwrap();
    assert_eq!(checkout.passed.trend, Trend::Better);
    assert_eq!(checkout.failed.trend, Trend::Better);
    assert_eq!(checkout.failed.diff(), -1);

    assert_eq!(comparison.test("checkout", "Pay").unwrap().transition, Transition::Fixed);
    assert_eq!(comparison.fixed().count(), 1);
    assert_eq!(comparison.newly_failing().count(), 0);

    let text = report::render_console(&current, Some(&comparison));
    assert!(text.contains("FIXED          checkout > Pay"));

    let html = report::render_html("Nightly", &current, Some(&comparison));
    assert!(html.contains("ALL TESTS PASSED"));
    assert!(html.contains("comparison-change better"));
}
