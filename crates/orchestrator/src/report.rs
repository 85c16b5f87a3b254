//! Reports over persisted snapshots
//!
//! A results directory holds one `<module>-results.json` per module. This
//! module folds those into per-module summaries, compares a run against a
//! previous one and renders the outcome for a terminal or as a standalone
//! HTML page.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::result::{Priority, TestExecutionResult, TestStatus};
use crate::snapshot::ResultSnapshot;

const SNAPSHOT_SUFFIX: &str = "-results.json";

/// Overall state of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Nothing failed and every declared test passed
    Passed,
    Failed,
    /// Nothing failed but some tests were skipped or never ran
    Partial,
}

impl ModuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Passed => "passed",
            ModuleStatus::Failed => "failed",
            ModuleStatus::Partial => "partial",
        }
    }
}

/// Counts for one module's snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub module: String,
    pub total: usize,
    /// Tests that actually executed (passed or failed)
    pub run: usize,
    pub passed: usize,
    pub failed: usize,
    /// Skipped tests, placeholders included
    pub skipped: usize,
    pub not_executed: usize,
    pub failed_by_priority: BTreeMap<Priority, usize>,
    pub pass_rate: f64,
    pub duration_ms: u64,
    pub status: ModuleStatus,
    pub tests: Vec<TestExecutionResult>,
}

impl ModuleReport {
    pub fn from_snapshot(module: impl Into<String>, snapshot: &ResultSnapshot) -> Self {
        let total = snapshot.len();
        let passed = snapshot.count(TestStatus::Passed);
        let failed = snapshot.count(TestStatus::Failed);
        let skipped = snapshot.count(TestStatus::Skipped);
        let not_executed = snapshot.iter().filter(|r| r.is_placeholder()).count();

        let mut failed_by_priority: BTreeMap<Priority, usize> = Priority::ALL.iter().map(|p| (*p, 0)).collect();
        for result in snapshot.iter().filter(|r| r.status == TestStatus::Failed) {
            *failed_by_priority.entry(result.priority).or_default() += 1;
        }

        let status = if failed > 0 {
            ModuleStatus::Failed
        } else if passed == total {
            ModuleStatus::Passed
        } else {
            ModuleStatus::Partial
        };

        Self {
            module: module.into(),
            total,
            run: passed + failed,
            passed,
            failed,
            skipped,
            not_executed,
            failed_by_priority,
            pass_rate: percentage(passed, total),
            duration_ms: snapshot.iter().map(|r| r.duration).sum(),
            status,
            tests: snapshot.iter().cloned().collect(),
        }
    }

    pub fn failed_with_priority(&self, priority: Priority) -> usize {
        self.failed_by_priority.get(&priority).copied().unwrap_or(0)
    }

    pub fn test(&self, name: &str) -> Option<&TestExecutionResult> {
        self.tests.iter().find(|t| t.test_name == name)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Read one snapshot file.
pub fn load_snapshot(path: &Path) -> OrchestratorResult<ResultSnapshot> {
    ResultSnapshot::read(path).map_err(|e| OrchestratorError::Snapshot(format!("{}: {}", path.display(), e)))
}

/// Load every `<module>-results.json` under `dir`, sorted by module name.
///
/// Files for the same module in different subdirectories are merged into
/// one report; on a test name clash the file visited later wins.
pub fn load_run(dir: &Path) -> OrchestratorResult<Vec<ModuleReport>> {
    if !dir.is_dir() {
        return Err(OrchestratorError::Snapshot(format!(
            "results directory {} does not exist",
            dir.display()
        )));
    }

    let mut modules: BTreeMap<String, ResultSnapshot> = BTreeMap::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let Some(module) = file_name.strip_suffix(SNAPSHOT_SUFFIX) else {
            continue;
        };
        if module.is_empty() {
            continue;
        }

        let snapshot = load_snapshot(entry.path())?;
        debug!("Loaded {} result(s) for module '{}'", snapshot.len(), module);
        match modules.get_mut(module) {
            Some(merged) => {
                warn!(
                    "Module '{}' has more than one results file, merging {}",
                    module,
                    entry.path().display()
                );
                for result in snapshot.iter() {
                    merged.upsert(result.clone());
                }
            }
            None => {
                modules.insert(module.to_string(), snapshot);
            }
        }
    }

    Ok(modules
        .iter()
        .map(|(module, snapshot)| ModuleReport::from_snapshot(module, snapshot))
        .collect())
}

/// Direction of a change between two runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Better,
    Worse,
    Same,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Better => "better",
            Trend::Worse => "worse",
            Trend::Same => "same",
        }
    }

    fn of(diff: i64, higher_is_better: bool) -> Self {
        match (diff.signum(), higher_is_better) {
            (0, _) => Trend::Same,
            (1, true) | (-1, false) => Trend::Better,
            _ => Trend::Worse,
        }
    }
}

/// A count in the previous and current run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountChange {
    pub previous: usize,
    pub current: usize,
    pub trend: Trend,
}

impl CountChange {
    fn new(previous: usize, current: usize, higher_is_better: bool) -> Self {
        let diff = current as i64 - previous as i64;
        Self {
            previous,
            current,
            trend: Trend::of(diff, higher_is_better),
        }
    }

    pub fn diff(&self) -> i64 {
        self.current as i64 - self.previous as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleComparison {
    pub module: String,
    pub passed: CountChange,
    pub failed: CountChange,
    pub skipped: CountChange,
}

/// Duration of one test in both runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingDiff {
    pub previous_ms: u64,
    pub current_ms: u64,
    pub diff_ms: i64,
    pub percent: f64,
    pub trend: Trend,
}

impl TimingDiff {
    /// `None` unless both runs recorded a duration.
    fn between(previous_ms: u64, current_ms: u64) -> Option<Self> {
        if previous_ms == 0 || current_ms == 0 {
            return None;
        }
        let diff_ms = current_ms as i64 - previous_ms as i64;
        Some(Self {
            previous_ms,
            current_ms,
            diff_ms,
            percent: diff_ms as f64 / previous_ms as f64 * 100.0,
            trend: Trend::of(diff_ms, false),
        })
    }
}

/// How a test's status moved between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Not present in the previous run
    New,
    NewlyFailing,
    Fixed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestComparison {
    pub module: String,
    pub test_name: String,
    pub previous_status: Option<TestStatus>,
    pub current_status: TestStatus,
    pub timing: Option<TimingDiff>,
    pub transition: Transition,
}

/// A run compared against the one before it
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunComparison {
    pub modules: Vec<ModuleComparison>,
    pub tests: Vec<TestComparison>,
}

impl RunComparison {
    pub fn between(current: &[ModuleReport], previous: &[ModuleReport]) -> Self {
        let previous: HashMap<&str, &ModuleReport> = previous.iter().map(|m| (m.module.as_str(), m)).collect();
        let mut comparison = RunComparison::default();

        for module in current {
            let Some(prev) = previous.get(module.module.as_str()) else {
                continue;
            };
            comparison.modules.push(ModuleComparison {
                module: module.module.clone(),
                passed: CountChange::new(prev.passed, module.passed, true),
                failed: CountChange::new(prev.failed, module.failed, false),
                skipped: CountChange::new(prev.skipped, module.skipped, false),
            });

            for test in &module.tests {
                let before = prev.test(&test.test_name);
                let transition = match before.map(|b| b.status) {
                    None => Transition::New,
                    Some(TestStatus::Failed) if test.status == TestStatus::Passed => Transition::Fixed,
                    Some(s) if s != TestStatus::Failed && test.status == TestStatus::Failed => Transition::NewlyFailing,
                    Some(_) => Transition::Unchanged,
                };
                comparison.tests.push(TestComparison {
                    module: module.module.clone(),
                    test_name: test.test_name.clone(),
                    previous_status: before.map(|b| b.status),
                    current_status: test.status,
                    timing: before.and_then(|b| TimingDiff::between(b.duration, test.duration)),
                    transition,
                });
            }
        }

        comparison
    }

    pub fn module(&self, name: &str) -> Option<&ModuleComparison> {
        self.modules.iter().find(|m| m.module == name)
    }

    pub fn test(&self, module: &str, name: &str) -> Option<&TestComparison> {
        self.tests.iter().find(|t| t.module == module && t.test_name == name)
    }

    pub fn newly_failing(&self) -> impl Iterator<Item = &TestComparison> {
        self.tests.iter().filter(|t| t.transition == Transition::NewlyFailing)
    }

    pub fn fixed(&self) -> impl Iterator<Item = &TestComparison> {
        self.tests.iter().filter(|t| t.transition == Transition::Fixed)
    }
}

/// True when any module has a failed test.
pub fn has_failures(reports: &[ModuleReport]) -> bool {
    reports.iter().any(|r| r.failed > 0)
}

fn format_seconds(ms: u64) -> String {
    if ms == 0 {
        "N/A".to_string()
    } else {
        format!("{:.2}s", ms as f64 / 1000.0)
    }
}

fn format_timing(timing: &TimingDiff) -> String {
    let magnitude = format_seconds(timing.diff_ms.unsigned_abs());
    match timing.trend {
        Trend::Worse => format!("+{} ({:.1}%)", magnitude, timing.percent),
        Trend::Better => format!("-{} ({:.1}%)", magnitude, timing.percent.abs()),
        Trend::Same => "0s (0%)".to_string(),
    }
}

fn status_marker(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "\u{2713} PASS",
        TestStatus::Failed => "\u{2717} FAIL",
        TestStatus::Skipped => "- SKIP",
    }
}

/// Plain-text report.
///
/// ```text
/// === Module: chat (failed) ===
/// ✓ PASS  Login [high] 1.20s
/// ✗ FAIL  Send message [highest] 3.02s
///     [ERROR] button not found
///
/// === Results: 1 passed, 1 failed, 0 skipped (2 total) ===
/// ```
pub fn render_console(reports: &[ModuleReport], comparison: Option<&RunComparison>) -> String {
    let mut out = String::new();

    for report in reports {
        let _ = writeln!(out, "=== Module: {} ({}) ===", report.module, report.status.as_str());
        if let Some(change) = comparison.and_then(|c| c.module(&report.module)) {
            let _ = writeln!(
                out,
                "    vs previous: passed {} -> {} ({:+}), failed {} -> {} ({:+}), skipped {} -> {} ({:+})",
                change.passed.previous,
                change.passed.current,
                change.passed.diff(),
                change.failed.previous,
                change.failed.current,
                change.failed.diff(),
                change.skipped.previous,
                change.skipped.current,
                change.skipped.diff()
            );
        }

        for test in &report.tests {
            let _ = write!(
                out,
                "{}  {} [{}] {}",
                status_marker(test.status),
                test.test_name,
                test.priority.as_str(),
                format_seconds(test.duration)
            );
            if let Some(timing) = comparison
                .and_then(|c| c.test(&report.module, &test.test_name))
                .and_then(|t| t.timing.as_ref())
            {
                let _ = write!(out, " ({})", format_timing(timing));
            }
            out.push('\n');

            if let Some(error) = &test.error {
                let _ = writeln!(out, "    [ERROR] {}", error);
            } else if let Some(reason) = &test.reason {
                let _ = writeln!(out, "    [SKIP] {}", reason);
            }
        }
        out.push('\n');
    }

    if let Some(comparison) = comparison {
        for test in comparison.newly_failing() {
            let _ = writeln!(out, "NEWLY FAILING  {} > {}", test.module, test.test_name);
        }
        for test in comparison.fixed() {
            let _ = writeln!(out, "FIXED          {} > {}", test.module, test.test_name);
        }
    }

    let passed: usize = reports.iter().map(|r| r.passed).sum();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    let skipped: usize = reports.iter().map(|r| r.skipped).sum();
    let total: usize = reports.iter().map(|r| r.total).sum();
    let duration: u64 = reports.iter().map(|r| r.duration_ms).sum();
    let _ = writeln!(
        out,
        "=== Results: {} passed, {} failed, {} skipped ({} total) in {:.1}s ===",
        passed,
        failed,
        skipped,
        total,
        duration as f64 / 1000.0
    );

    out
}

/// Self-contained HTML report with inline CSS.
pub fn render_html(title: &str, reports: &[ModuleReport], comparison: Option<&RunComparison>) -> String {
    let failed_any = has_failures(reports);
    let header_color = if failed_any { "#dc3545" } else { "#28a745" };
    let status_text = if failed_any {
        "SOME TESTS FAILED"
    } else {
        "ALL TESTS PASSED"
    };

    let passed: usize = reports.iter().map(|r| r.passed).sum();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    let skipped: usize = reports.iter().map(|r| r.skipped).sum();
    let total: usize = reports.iter().map(|r| r.total).sum();

    let mut modules = String::new();
    for report in reports {
        let _ = write!(
            modules,
            r#"<div class="module {status}">
<h2><span class="status-icon {status}"></span>{name}</h2>
<p>Run: {run} | Passed: {passed} | Failed: {failed} | Skipped: {skipped} | Pass rate: {rate:.1}%</p>
<p class="priorities">"#,
            status = report.status.as_str(),
            name = escape_html(&report.module),
            run = report.run,
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            rate = report.pass_rate,
        );
        for priority in Priority::ALL {
            let _ = write!(
                modules,
                r#"<span class="badge priority-{p}">{p}: {n} failed</span> "#,
                p = priority.as_str(),
                n = report.failed_with_priority(priority)
            );
        }
        modules.push_str("</p>\n");

        if let Some(change) = comparison.and_then(|c| c.module(&report.module)) {
            modules.push_str("<div class=\"comparison\">\n");
            for (label, count) in [
                ("Passed", &change.passed),
                ("Failed", &change.failed),
                ("Skipped", &change.skipped),
            ] {
                let _ = writeln!(
                    modules,
                    r#"<span>{}: <span class="comparison-change {}">{} &rarr; {} ({:+})</span></span>"#,
                    label,
                    count.trend.as_str(),
                    count.previous,
                    count.current,
                    count.diff()
                );
            }
            modules.push_str("</div>\n");
        }

        modules.push_str(&render_test_table(report, comparison));
        modules.push_str("</div>\n");
    }

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title} - Test Report</title>
<style>
body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; margin: 0; background: #f5f5f5; }}
.header {{ background: {header_color}; color: white; padding: 20px 30px; }}
.header h1 {{ margin: 0 0 8px 0; font-size: 24px; }}
.content {{ max-width: 1100px; margin: 20px auto; padding: 0 20px; }}
.module {{ background: white; border-radius: 6px; padding: 16px 20px; margin-bottom: 16px; border-left: 4px solid #ccc; }}
.module.passed {{ border-left-color: #28a745; }}
.module.failed {{ border-left-color: #dc3545; }}
.module.partial {{ border-left-color: #ffc107; }}
.status-icon {{ display: inline-block; width: 12px; height: 12px; border-radius: 50%; margin-right: 8px; }}
.status-icon.passed {{ background: #28a745; }}
.status-icon.failed {{ background: #dc3545; }}
.status-icon.partial {{ background: #ffc107; }}
.badge {{ padding: 2px 8px; border-radius: 10px; font-size: 12px; background: #eee; }}
.comparison-change.better, .time-diff-better {{ color: #28a745; }}
.comparison-change.worse, .time-diff-worse {{ color: #dc3545; }}
.comparison-change.same, .time-diff-same, .time-diff-na {{ color: #6c757d; }}
.test-table {{ width: 100%; border-collapse: collapse; margin-top: 12px; font-size: 14px; }}
.test-table th, .test-table td {{ text-align: left; padding: 6px 8px; border-bottom: 1px solid #eee; }}
.status-passed {{ background: #d4edda; }}
.status-failed {{ background: #f8d7da; }}
.status-skipped {{ background: #fff3cd; }}
.error {{ color: #c62828; font-size: 13px; }}
</style>
</head>
<body>
<div class="header">
<h1>{status_text}</h1>
<p>{title}: {passed} passed, {failed} failed, {skipped} skipped ({total} total)</p>
</div>
<div class="content">
{modules}</div>
</body>
</html>
"##,
        title = escape_html(title),
        header_color = header_color,
        status_text = status_text,
        passed = passed,
        failed = failed,
        skipped = skipped,
        total = total,
        modules = modules,
    )
}

fn render_test_table(report: &ModuleReport, comparison: Option<&RunComparison>) -> String {
    if report.tests.is_empty() {
        return "<p class=\"empty\">No test data available</p>\n".to_string();
    }

    let mut html = String::from(
        "<table class=\"test-table\">\n<thead><tr><th>Test Case</th><th>Status</th><th>Priority</th>\
         <th>Current Time</th><th>Previous Time</th><th>Time Diff</th></tr></thead>\n<tbody>\n",
    );

    for test in &report.tests {
        let compared = comparison.and_then(|c| c.test(&report.module, &test.test_name));
        let (previous, diff) = match compared.and_then(|c| c.timing.as_ref()) {
            Some(timing) => (
                format_seconds(timing.previous_ms),
                format!(
                    r#"<span class="time-diff-{}">{}</span>"#,
                    timing.trend.as_str(),
                    format_timing(timing)
                ),
            ),
            None => ("N/A".to_string(), r#"<span class="time-diff-na">N/A</span>"#.to_string()),
        };

        let _ = writeln!(
            html,
            r#"<tr class="test-row {status}"><td>{name}</td><td><span class="badge status-{status}">{status}</span></td><td><span class="badge priority-{priority}">{priority}</span></td><td>{current}</td><td>{previous}</td><td>{diff}</td></tr>"#,
            status = test.status.as_str(),
            name = escape_html(&test.test_name),
            priority = test.priority.as_str(),
            current = format_seconds(test.duration),
            previous = previous,
            diff = diff,
        );
        if let Some(error) = &test.error {
            let _ = writeln!(
                html,
                r#"<tr><td colspan="6" class="error">{}</td></tr>"#,
                escape_html(error)
            );
        }
    }

    html.push_str("</tbody>\n</table>\n");
    html
}

/// Escape HTML special characters.
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
