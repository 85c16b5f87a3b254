//! Ordered result map and its on-disk JSON form
//!
//! The snapshot is a JSON object keyed by test name, in declaration order.
//! It is rewritten after every test so the file on disk is always a
//! complete, valid document.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::OrchestratorResult;
use crate::result::{TestExecutionResult, TestStatus};

/// One result per test name, in insertion order
#[derive(Debug, Clone, Default)]
pub struct ResultSnapshot {
    entries: Vec<TestExecutionResult>,
    index: HashMap<String, usize>,
}

impl ResultSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, or replace in place keeping the original position.
    pub fn upsert(&mut self, result: TestExecutionResult) {
        match self.index.get(&result.test_name) {
            Some(&i) => self.entries[i] = result,
            None => {
                self.index.insert(result.test_name.clone(), self.entries.len());
                self.entries.push(result);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TestExecutionResult> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestExecutionResult> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: TestStatus) -> usize {
        self.entries.iter().filter(|r| r.status == status).count()
    }

    /// Write the snapshot to `path` atomically: a temp file in the same
    /// directory is renamed over the target.
    pub fn write_atomic(&self, path: &Path) -> OrchestratorResult<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, self)?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;
        tmp.persist(path)?;

        debug!("Snapshot with {} result(s) written to {}", self.len(), path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> OrchestratorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl FromIterator<TestExecutionResult> for ResultSnapshot {
    fn from_iter<I: IntoIterator<Item = TestExecutionResult>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for result in iter {
            snapshot.upsert(result);
        }
        snapshot
    }
}

impl Serialize for ResultSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for result in &self.entries {
            map.serialize_entry(&result.test_name, result)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResultSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> Visitor<'de> for SnapshotVisitor {
            type Value = ResultSnapshot;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of test name to result")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut snapshot = ResultSnapshot::new();
                while let Some((name, mut result)) = access.next_entry::<String, TestExecutionResult>()? {
                    // the key is authoritative
                    result.test_name = name;
                    snapshot.upsert(result);
                }
                Ok(snapshot)
            }
        }

        deserializer.deserialize_map(SnapshotVisitor)
    }
}
