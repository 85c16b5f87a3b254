//! Test case declarations

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::dependency::{normalize_dependencies, Dependency, RunDecision};
use crate::result::{Priority, TestExecutionResult};

/// Boxed future returned by a test body.
pub type TestFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A test body. Called once per attempt.
pub type TestFn = Arc<dyn Fn(ExecutionContext) -> TestFuture + Send + Sync>;

/// Predicate over every result recorded so far.
pub type CustomCondition =
    Arc<dyn Fn(&HashMap<String, TestExecutionResult>) -> RunDecision + Send + Sync>;

/// Reporting metadata for a test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestMetadata {
    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default, with = "duration_ms")]
    pub timeout: Option<Duration>,
}

/// One declared test. Immutable once handed to a suite.
#[derive(Clone)]
pub struct TestCase {
    /// Unique within a suite; the key for dependency lookups
    pub name: String,

    /// Normalized prerequisites
    pub dependencies: Vec<Dependency>,

    /// Bypass dependency and custom-condition checks
    pub run_regardless: bool,

    pub custom_condition: Option<CustomCondition>,

    pub metadata: TestMetadata,

    /// Overrides `metadata.timeout` and the suite default
    pub timeout: Option<Duration>,

    /// Extra attempts after a failure
    pub retries: u32,

    body: TestFn,
}

impl TestCase {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            run_regardless: false,
            custom_condition: None,
            metadata: TestMetadata::default(),
            timeout: None,
            retries: 0,
            body: Arc::new(move |ctx| Box::pin(body(ctx))),
        }
    }

    /// Declare a dependency. Bare names are required.
    pub fn depends_on(mut self, dep: impl Into<Dependency>) -> Self {
        self.dependencies.push(dep.into());
        self.dependencies = normalize_dependencies(std::mem::take(&mut self.dependencies));
        self
    }

    pub fn optional_dependency(self, name: impl Into<String>) -> Self {
        self.depends_on(Dependency::Optional(name.into()))
    }

    pub fn run_regardless(mut self) -> Self {
        self.run_regardless = true;
        self
    }

    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&HashMap<String, TestExecutionResult>) -> RunDecision + Send + Sync + 'static,
    {
        self.custom_condition = Some(Arc::new(condition));
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.metadata.priority = priority;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    pub fn metadata(mut self, metadata: TestMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Dependency names in declaration order.
    pub fn dependency_names(&self) -> Vec<String> {
        self.dependencies.iter().map(|d| d.name().to_string()).collect()
    }

    /// Timeout to enforce, given the suite default.
    pub fn effective_timeout(&self, default: Option<Duration>) -> Option<Duration> {
        self.timeout.or(self.metadata.timeout).or(default)
    }

    pub(crate) fn invoke(&self, ctx: ExecutionContext) -> TestFuture {
        (self.body)(ctx)
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("run_regardless", &self.run_regardless)
            .field("custom_condition", &self.custom_condition.is_some())
            .field("metadata", &self.metadata)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
