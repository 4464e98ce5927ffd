use std::path::PathBuf;

use thiserror::Error;

use crate::queue::QueueError;

/// Umbrella error for one job's processing stages. Every variant is
/// job-terminal; the worker loop itself never sees these, the processor
/// converts them into a failed [`RenderReport`](crate::processor::RenderReport).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Automation error: {0}")]
    Automation(#[from] AutomationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failures while unpacking a project archive or locating the project
/// file inside it. Ambiguous project selection is never guessed.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Corrupt archive: {0}")]
    Zip(String),

    #[error("No project file found under {}", .0.display())]
    NoProjectFile(PathBuf),

    #[error("Expected exactly one project file, found {count}")]
    AmbiguousProject { count: usize },
}

/// Failures of the renderer automation state machine. All of these are
/// terminal for the current job and are not retried within it.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Renderer executable not found")]
    ExecutableNotFound,

    #[error("Failed to launch renderer: {0}")]
    Spawn(std::io::Error),

    #[error("Renderer window not found after {attempts} attempts")]
    WindowNotFound { attempts: u32 },

    #[error("UI driver failure: {0}")]
    Driver(String),

    #[error("Export did not stabilize within {waited_secs}s")]
    DetectionTimeout { waited_secs: u64 },
}
