//! Dependency tracking and the run/skip decision
//!
//! There is no materialized graph: a dependency is resolved lazily by name
//! against the results recorded so far. A dependency is satisfied iff a
//! result for that name exists with status `passed`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::case::{TestCase, TestMetadata};
use crate::result::{TestExecutionResult, TestStatus};

/// A declared prerequisite of a test
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawDependency", into = "RawDependency")]
pub enum Dependency {
    /// Must have passed for the dependent test to run
    Required(String),
    /// Consulted for logging only; never blocks the dependent test
    Optional(String),
}

impl Dependency {
    pub fn required(name: impl Into<String>) -> Self {
        Dependency::Required(name.into())
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Dependency::Optional(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Dependency::Required(name) | Dependency::Optional(name) => name,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Dependency::Required(_))
    }
}

impl From<&str> for Dependency {
    fn from(name: &str) -> Self {
        Dependency::Required(name.to_string())
    }
}

impl From<String> for Dependency {
    fn from(name: String) -> Self {
        Dependency::Required(name)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Required(name) => f.write_str(name),
            Dependency::Optional(name) => write!(f, "{} (optional)", name),
        }
    }
}

/// Wire form: a bare name, or `{ name, required }` with `required` defaulting to true.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Name(String),
    Spec {
        name: String,
        #[serde(default = "default_required")]
        required: bool,
    },
}

fn default_required() -> bool {
    true
}

impl From<RawDependency> for Dependency {
    fn from(raw: RawDependency) -> Self {
        match raw {
            RawDependency::Name(name) => Dependency::Required(name),
            RawDependency::Spec { name, required: true } => Dependency::Required(name),
            RawDependency::Spec { name, required: false } => Dependency::Optional(name),
        }
    }
}

impl From<Dependency> for RawDependency {
    fn from(dep: Dependency) -> Self {
        match dep {
            Dependency::Required(name) => RawDependency::Name(name),
            Dependency::Optional(name) => RawDependency::Spec { name, required: false },
        }
    }
}

/// Collapse a declared list into one entry per name, keeping first-seen
/// order. A name declared both ways is required.
pub fn normalize_dependencies(deps: Vec<Dependency>) -> Vec<Dependency> {
    let mut out: Vec<Dependency> = Vec::with_capacity(deps.len());
    for dep in deps {
        match out.iter_mut().find(|d| d.name() == dep.name()) {
            Some(existing) => {
                if dep.is_required() && !existing.is_required() {
                    *existing = Dependency::Required(dep.name().to_string());
                }
            }
            None => out.push(dep),
        }
    }
    out
}

/// Verdict for one test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunDecision {
    Run,
    Skip(String),
}

impl RunDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, RunDecision::Run)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RunDecision::Run => None,
            RunDecision::Skip(reason) => Some(reason),
        }
    }
}

/// Check declared dependencies against recorded results.
///
/// Optional dependencies never block. Every unmet required dependency is
/// named in the skip reason together with its recorded state.
pub fn evaluate_dependencies(
    deps: &[Dependency],
    results: &HashMap<String, TestExecutionResult>,
) -> RunDecision {
    let unmet: Vec<String> = deps
        .iter()
        .filter(|dep| dep.is_required())
        .filter_map(|dep| match results.get(dep.name()).map(|r| r.status) {
            Some(TestStatus::Passed) => None,
            Some(status) => Some(format!("{} ({})", dep.name(), status)),
            None => Some(format!("{} (not run)", dep.name())),
        })
        .collect();

    if unmet.is_empty() {
        RunDecision::Run
    } else {
        RunDecision::Skip(format!("Unmet dependencies: {}", unmet.join(", ")))
    }
}

/// Source of truth for which tests completed, and how, during a run.
///
/// Single-threaded by contract: callers record results strictly in
/// declaration order.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    registered: HashMap<String, TestMetadata>,
    results: HashMap<String, TestExecutionResult>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a test's declared metadata. Has no scheduling effect.
    pub fn register_test(&mut self, name: &str, metadata: TestMetadata) {
        self.registered.insert(name.to_string(), metadata);
    }

    pub fn metadata(&self, name: &str) -> Option<&TestMetadata> {
        self.registered.get(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered.contains_key(name)
    }

    /// Store or overwrite the result for `result.test_name`.
    pub fn record_test_result(&mut self, result: TestExecutionResult) {
        self.results.insert(result.test_name.clone(), result);
    }

    /// Most recent result per test name.
    pub fn execution_results(&self) -> &HashMap<String, TestExecutionResult> {
        &self.results
    }

    /// Decide whether `case` may run given everything recorded so far.
    ///
    /// `run_regardless` bypasses every check; otherwise the custom
    /// condition is consulted first, then declared dependencies. A test with
    /// neither always runs.
    pub fn should_run(&self, case: &TestCase) -> RunDecision {
        if case.run_regardless {
            debug!("{}: run_regardless set, bypassing dependency checks", case.name);
            return RunDecision::Run;
        }

        if let Some(condition) = &case.custom_condition {
            if let RunDecision::Skip(reason) = condition(&self.results) {
                return RunDecision::Skip(reason);
            }
        }

        evaluate_dependencies(&case.dependencies, &self.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn result(name: &str, status: TestStatus) -> TestExecutionResult {
        TestExecutionResult::new(name, name, status)
    }

    fn results(entries: &[(&str, TestStatus)]) -> HashMap<String, TestExecutionResult> {
        entries
            .iter()
            .map(|(name, status)| (name.to_string(), result(name, *status)))
            .collect()
    }

    #[test]
    fn test_dependency_parses_both_wire_forms() {
        let deps: Vec<Dependency> = serde_json::from_str(
            r#"["Login", {"name": "Nav"}, {"name": "Seed", "required": false}]"#,
        )
        .unwrap();
        assert_eq!(
            deps,
            vec![
                Dependency::required("Login"),
                Dependency::required("Nav"),
                Dependency::optional("Seed"),
            ]
        );
    }

    #[test]
    fn test_normalize_promotes_to_required() {
        let deps = normalize_dependencies(vec![
            Dependency::optional("A"),
            Dependency::required("B"),
            Dependency::required("A"),
            Dependency::optional("B"),
        ]);
        assert_eq!(deps, vec![Dependency::required("A"), Dependency::required("B")]);
    }

    #[test]
    fn test_no_dependencies_always_runs() {
        assert_eq!(evaluate_dependencies(&[], &HashMap::new()), RunDecision::Run);
    }

    #[test_case(Some(TestStatus::Passed), true ; "passed dependency")]
    #[test_case(Some(TestStatus::Failed), false ; "failed dependency")]
    #[test_case(Some(TestStatus::Skipped), false ; "skipped dependency")]
    #[test_case(None, false ; "missing dependency")]
    fn test_required_dependency(status: Option<TestStatus>, runs: bool) {
        let map = match status {
            Some(s) => results(&[("A", s)]),
            None => HashMap::new(),
        };
        let decision = evaluate_dependencies(&[Dependency::required("A")], &map);
        assert_eq!(decision.should_run(), runs);
        if !runs {
            assert!(decision.reason().unwrap().contains("A"));
        }
    }

    #[test_case(Some(TestStatus::Failed) ; "failed optional")]
    #[test_case(Some(TestStatus::Skipped) ; "skipped optional")]
    #[test_case(None ; "missing optional")]
    fn test_optional_dependency_never_blocks(status: Option<TestStatus>) {
        let map = match status {
            Some(s) => results(&[("A", s)]),
            None => HashMap::new(),
        };
        assert!(evaluate_dependencies(&[Dependency::optional("A")], &map).should_run());
    }

    #[test]
    fn test_skip_reason_names_every_unmet_dependency() {
        let map = results(&[("Login", TestStatus::Passed), ("Upload", TestStatus::Failed)]);
        let deps = vec![
            Dependency::required("Login"),
            Dependency::required("Upload"),
            Dependency::required("Share"),
            Dependency::optional("Theme"),
        ];
        let decision = evaluate_dependencies(&deps, &map);
        assert_eq!(
            decision,
            RunDecision::Skip("Unmet dependencies: Upload (failed), Share (not run)".to_string())
        );
    }

    #[test]
    fn test_tracker_record_overwrites() {
        let mut tracker = DependencyTracker::new();
        tracker.record_test_result(result("A", TestStatus::Failed));
        tracker.record_test_result(result("A", TestStatus::Passed));
        assert_eq!(tracker.execution_results().len(), 1);
        assert_eq!(tracker.execution_results()["A"].status, TestStatus::Passed);
    }

    #[test_case(RunDecision::Run, "Unmet dependencies: A (failed), B (not run)" ; "condition passes")]
    #[test_case(RunDecision::Skip("feature flag off".into()), "feature flag off" ; "condition skips")]
    fn test_should_run_is_idempotent(condition: RunDecision, reason: &str) {
        let mut tracker = DependencyTracker::new();
        tracker.record_test_result(result("A", TestStatus::Failed));

        let case = TestCase::new("C", |_ctx| async { Ok(()) })
            .depends_on("A")
            .depends_on("B")
            .condition(move |_| condition.clone());

        let first = tracker.should_run(&case);
        let second = tracker.should_run(&case);
        assert_eq!(first, second);
        assert_eq!(first.reason(), Some(reason));
        assert_eq!(tracker.execution_results().len(), 1);
    }

    #[test]
    fn test_register_is_idempotent_upsert() {
        let mut tracker = DependencyTracker::new();
        tracker.register_test("A", TestMetadata::default());
        tracker.register_test(
            "A",
            TestMetadata {
                tags: vec!["smoke".into()],
                ..Default::default()
            },
        );
        assert!(tracker.is_registered("A"));
        assert_eq!(tracker.metadata("A").unwrap().tags, vec!["smoke".to_string()]);
        assert!(tracker.execution_results().is_empty());
    }
}
