//! Worker configuration loaded from `stemrender.toml`.
//!
//! Every field has a sensible default, so the worker runs with no config
//! file at all. The environment variables `API_URL`, `WORKER_API_KEY`
//! and `POLL_INTERVAL` take precedence over the file, matching the
//! deployment contract of the render queue.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::automation::AutomationConfig;
use crate::detect::DetectorConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Base URL of the render-queue API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Worker bearer token.
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Seconds between queue polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Root of the per-job scratch workspaces.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Prefix of reported stem locators (`{base}/{job_id}/{filename}`).
    #[serde(default = "default_stem_base_path")]
    pub stem_base_path: String,

    #[serde(default)]
    pub render: RenderSection,

    #[serde(default)]
    pub detector: DetectorSection,
}

/// Renderer discovery and automation timing.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderSection {
    /// Explicit renderer executable; overrides the search.
    #[serde(default)]
    pub executable: Option<PathBuf>,

    #[serde(default = "default_search_paths")]
    pub search_paths: Vec<PathBuf>,

    #[serde(default = "default_app_name")]
    pub executable_hint: String,

    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default = "default_project_extension")]
    pub project_extension: String,

    #[serde(default = "default_stem_extension")]
    pub stem_extension: String,

    #[serde(default = "default_launch_settle")]
    pub launch_settle_secs: u64,

    #[serde(default = "default_window_attempts")]
    pub window_attempts: u32,

    #[serde(default = "default_window_retry")]
    pub window_retry_secs: u64,

    #[serde(default = "default_load_delay")]
    pub load_delay_secs: u64,

    #[serde(default = "default_dialog_delay")]
    pub dialog_delay_ms: u64,

    #[serde(default = "default_input_delay")]
    pub input_delay_ms: u64,

    #[serde(default = "default_teardown_wait")]
    pub teardown_wait_secs: u64,
}

/// Completion-detector timing.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorSection {
    #[serde(default = "default_grace")]
    pub grace_secs: u64,

    #[serde(default = "default_settle")]
    pub settle_secs: u64,

    #[serde(default = "default_detector_poll")]
    pub poll_secs: u64,

    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_api_key() -> String {
    "dev-worker-key".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("worker_temp")
}

fn default_stem_base_path() -> String {
    "/generated-stems".to_string()
}

fn default_search_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from(r"C:\ProgramData\Ableton"),
        PathBuf::from(r"C:\Program Files\Ableton"),
    ]
}

fn default_app_name() -> String {
    "Ableton Live".to_string()
}

fn default_project_extension() -> String {
    "als".to_string()
}

fn default_stem_extension() -> String {
    "wav".to_string()
}

fn default_launch_settle() -> u64 {
    5
}

fn default_window_attempts() -> u32 {
    25
}

fn default_window_retry() -> u64 {
    1
}

fn default_load_delay() -> u64 {
    2
}

fn default_dialog_delay() -> u64 {
    2000
}

fn default_input_delay() -> u64 {
    200
}

fn default_teardown_wait() -> u64 {
    10
}

fn default_grace() -> u64 {
    5
}

fn default_settle() -> u64 {
    3
}

fn default_detector_poll() -> u64 {
    2
}

fn default_max_wait() -> u64 {
    300
}

impl Default for WorkerConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config must deserialize")
    }
}

impl Default for RenderSection {
    fn default() -> Self {
        toml::from_str("").expect("empty render section must deserialize")
    }
}

impl Default for DetectorSection {
    fn default() -> Self {
        toml::from_str("").expect("empty detector section must deserialize")
    }
}

impl WorkerConfig {
    /// Load configuration from the given path (default `stemrender.toml`
    /// in the working directory), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new("stemrender.toml"));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<WorkerConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        // Environment takes precedence over the file.
        if let Ok(url) = std::env::var("API_URL")
            && !url.is_empty()
        {
            config.api_url = url;
        }
        if let Ok(key) = std::env::var("WORKER_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }
        if let Ok(interval) = std::env::var("POLL_INTERVAL")
            && !interval.is_empty()
        {
            config.poll_interval_secs = interval
                .parse()
                .context("POLL_INTERVAL must be a number of seconds")?;
        }

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Assemble the automation controller's config from the render and
    /// detector sections.
    pub fn automation(&self) -> AutomationConfig {
        AutomationConfig {
            executable: self.render.executable.clone(),
            search_paths: self.render.search_paths.clone(),
            executable_hint: self.render.executable_hint.clone(),
            app_name: self.render.app_name.clone(),
            stem_extension: self.render.stem_extension.clone(),
            launch_settle: Duration::from_secs(self.render.launch_settle_secs),
            window_attempts: self.render.window_attempts,
            window_retry: Duration::from_secs(self.render.window_retry_secs),
            load_delay: Duration::from_secs(self.render.load_delay_secs),
            dialog_delay: Duration::from_millis(self.render.dialog_delay_ms),
            input_delay: Duration::from_millis(self.render.input_delay_ms),
            teardown_wait: Duration::from_secs(self.render.teardown_wait_secs),
            detector: DetectorConfig {
                grace: Duration::from_secs(self.detector.grace_secs),
                settle: Duration::from_secs(self.detector.settle_secs),
                poll: Duration::from_secs(self.detector.poll_secs),
                max_wait: Duration::from_secs(self.detector.max_wait_secs),
            },
        }
    }
}
