//! Error types for the packaging harness

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("{tool} exited with status {status} in {dir}")]
    ToolFailed {
        tool: &'static str,
        status: i32,
        dir: PathBuf,
    },

    #[error("{tool} was killed by a signal in {dir}")]
    ToolKilled { tool: &'static str, dir: PathBuf },

    #[error("dev server died before the page check settled")]
    ServerDied,

    #[error("server for {0} never became reachable")]
    ServerUnreachable(String),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("browser check failed: {0}")]
    Browser(String),

    #[error("page loaded but the marker element did not read \"hello webpack\"")]
    WrongPageText,

    #[error("module output mismatch, got {0:?}")]
    WrongModuleOutput(String),

    #[error("npm pack produced no parseable filename: {0}")]
    PackOutput(String),

    #[error("no test case or scenario named '{0}'")]
    UnknownFilter(String),

    #[error("consumer template not found: {0}")]
    TemplateMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
