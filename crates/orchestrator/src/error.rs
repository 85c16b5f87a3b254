//! Error types for suite orchestration

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Browser session failed to launch: {0}")]
    SessionLaunch(String),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Suite '{suite}' halted after '{test}' failed: {message}")]
    SuiteHalted {
        suite: String,
        test: String,
        message: String,
    },

    #[error("Invalid suite declaration: {0}")]
    InvalidSuite(String),

    #[error("Invalid configuration: {key} = {value:?} ({reason})")]
    Config {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Persist error: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
