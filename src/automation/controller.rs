//! The renderer automation state machine.
//!
//! One export runs through: IDLE → LAUNCHING → LOCATING_WINDOW →
//! TRIGGERING_EXPORT → AWAITING_COMPLETION → TEARING_DOWN → DONE|FAILED.
//! The renderer offers no completion callback, so "done" is inferred from
//! window presence and file-set stability. Teardown always runs, and a
//! teardown problem never turns a finished render into a failure.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::driver::{Key, UiDriver, WindowRef};
use super::process::RenderProcess;
use crate::detect::{self, DetectorConfig};
use crate::error::AutomationError;

/// States of the automation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Launching,
    LocatingWindow,
    TriggeringExport,
    AwaitingCompletion,
    TearingDown,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "IDLE",
            Phase::Launching => "LAUNCHING",
            Phase::LocatingWindow => "LOCATING_WINDOW",
            Phase::TriggeringExport => "TRIGGERING_EXPORT",
            Phase::AwaitingCompletion => "AWAITING_COMPLETION",
            Phase::TearingDown => "TEARING_DOWN",
            Phase::Done => "DONE",
            Phase::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Transient record of one automation run. Exists only for the duration
/// of a job; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub phases: Vec<Phase>,
    pub window_title: Option<String>,
    pub process_id: Option<u32>,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phases: vec![Phase::Idle],
            window_title: None,
            process_id: None,
            started_at: Utc::now(),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phases.last().unwrap_or(&Phase::Idle)
    }

    fn enter(&mut self, phase: Phase) {
        debug!(session = %self.id, %phase, "automation phase");
        self.phases.push(phase);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing and discovery knobs for the automation controller.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    /// Explicit renderer executable; when unset, `search_paths` are
    /// scanned for a file name containing `executable_hint`.
    pub executable: Option<PathBuf>,
    pub search_paths: Vec<PathBuf>,
    pub executable_hint: String,
    /// Substring every renderer window title carries.
    pub app_name: String,
    /// Extension of the exported audio files.
    pub stem_extension: String,
    pub launch_settle: Duration,
    pub window_attempts: u32,
    pub window_retry: Duration,
    /// Wait after focusing, while the project finishes loading.
    pub load_delay: Duration,
    /// Wait after the export shortcut, while the dialog opens.
    pub dialog_delay: Duration,
    /// Wait after each scripted input, for UI redraw.
    pub input_delay: Duration,
    pub teardown_wait: Duration,
    pub detector: DetectorConfig,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            executable: None,
            search_paths: vec![
                PathBuf::from(r"C:\ProgramData\Ableton"),
                PathBuf::from(r"C:\Program Files\Ableton"),
            ],
            executable_hint: "Ableton Live".to_string(),
            app_name: "Ableton Live".to_string(),
            stem_extension: "wav".to_string(),
            launch_settle: Duration::from_secs(5),
            window_attempts: 25,
            window_retry: Duration::from_secs(1),
            load_delay: Duration::from_secs(2),
            dialog_delay: Duration::from_secs(2),
            input_delay: Duration::from_millis(200),
            teardown_wait: Duration::from_secs(10),
            detector: DetectorConfig::default(),
        }
    }
}

/// Drives one renderer export end to end. A worker process holds exactly
/// one controller, behind a lock, so at most one session is ever active.
pub struct Controller<D: UiDriver> {
    driver: D,
    cfg: AutomationConfig,
}

impl<D: UiDriver> Controller<D> {
    pub fn new(driver: D, cfg: AutomationConfig) -> Self {
        Self { driver, cfg }
    }

    /// Run the full automation sequence for one project, returning the
    /// stable set of exported files.
    pub async fn export_stems(
        &self,
        project: &Path,
        output_dir: &Path,
        session: &mut Session,
    ) -> Result<Vec<PathBuf>, AutomationError> {
        session.enter(Phase::Launching);
        let executable = self.locate_executable()?;
        info!(executable = %executable.display(), "launching renderer");
        let mut process = RenderProcess::spawn(&executable, project)?;
        session.process_id = Some(process.id());
        sleep(self.cfg.launch_settle).await;

        session.enter(Phase::LocatingWindow);
        let window = match self.locate_window(project).await {
            Ok(window) => window,
            Err(err) => {
                // The spawned process must not outlive a failed session.
                self.teardown(session, &mut process);
                session.enter(Phase::Failed);
                return Err(err);
            }
        };
        info!(title = %window.title, "found renderer window");
        session.window_title = Some(window.title.clone());

        session.enter(Phase::TriggeringExport);
        if let Err(err) = self.trigger_export(&window, output_dir).await {
            self.teardown(session, &mut process);
            session.enter(Phase::Failed);
            return Err(err);
        }

        session.enter(Phase::AwaitingCompletion);
        let result =
            detect::await_stable(output_dir, &self.cfg.stem_extension, &self.cfg.detector).await;

        self.teardown(session, &mut process);
        match result {
            Ok(files) => {
                info!(stems = files.len(), "export complete");
                session.enter(Phase::Done);
                Ok(files)
            }
            Err(err) => {
                session.enter(Phase::Failed);
                Err(err)
            }
        }
    }

    fn locate_executable(&self) -> Result<PathBuf, AutomationError> {
        if let Some(executable) = &self.cfg.executable {
            return Ok(executable.clone());
        }

        let mut candidates = Vec::new();
        for base in &self.cfg.search_paths {
            collect_executables(base, &self.cfg.executable_hint, &mut candidates);
        }
        candidates.sort();
        candidates
            .into_iter()
            .next()
            .ok_or(AutomationError::ExecutableNotFound)
    }

    async fn locate_window(&self, project: &Path) -> Result<WindowRef, AutomationError> {
        let project_stem = project
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        for attempt in 1..=self.cfg.window_attempts {
            match self.driver.list_windows() {
                Ok(windows) => {
                    // First enumeration match wins; multiple candidates are
                    // not distinguished.
                    if let Some(window) = windows
                        .into_iter()
                        .find(|w| title_matches(&w.title, &self.cfg.app_name, project_stem))
                    {
                        return Ok(window);
                    }
                }
                Err(err) => {
                    debug!(attempt, %err, "window enumeration failed");
                }
            }
            if attempt < self.cfg.window_attempts {
                sleep(self.cfg.window_retry).await;
            }
        }

        Err(AutomationError::WindowNotFound {
            attempts: self.cfg.window_attempts,
        })
    }

    /// The scripted export sequence. Tab-stop counts are tied to the
    /// renderer's dialog layout and are the deliberate brittleness of the
    /// black-box approach; everything else in the pipeline is isolated
    /// from them.
    async fn trigger_export(
        &self,
        window: &WindowRef,
        output_dir: &Path,
    ) -> Result<(), AutomationError> {
        // A focus failure degrades to sending keys at the window anyway.
        if let Err(err) = self.driver.focus(window) {
            warn!(%err, "could not focus renderer window");
        }
        sleep(self.cfg.load_delay).await;

        debug!("opening export dialog");
        self.driver.send_key(window, Key::ExportDialog)?;
        sleep(self.cfg.dialog_delay).await;

        // Reach the "all individual tracks" option.
        for _ in 0..3 {
            self.driver.send_key(window, Key::Tab)?;
            sleep(self.cfg.input_delay).await;
        }
        self.driver.send_key(window, Key::Down)?;
        sleep(self.cfg.input_delay).await;

        // Reach the destination-path field and overwrite it.
        for _ in 0..5 {
            self.driver.send_key(window, Key::Tab)?;
            sleep(self.cfg.input_delay).await;
        }
        self.driver.send_key(window, Key::SelectAll)?;
        sleep(self.cfg.input_delay).await;
        self.driver
            .type_text(window, &output_dir.display().to_string())?;
        sleep(self.cfg.input_delay).await;

        // Reach and press the confirm action.
        for _ in 0..8 {
            self.driver.send_key(window, Key::Tab)?;
            sleep(self.cfg.input_delay).await;
        }
        self.driver.send_key(window, Key::Enter)?;
        Ok(())
    }

    /// Always-run teardown. Never escalates: a renderer that will not die
    /// cleanly is logged and force-killed, and the session outcome stands.
    fn teardown(&self, session: &mut Session, process: &mut RenderProcess) {
        session.enter(Phase::TearingDown);
        if let Err(err) = process.terminate(self.cfg.teardown_wait) {
            warn!(%err, "renderer teardown failed");
        }
    }
}

/// Window-title heuristic: the app name must appear, together with either
/// the default "Untitled" document marker or the project's base name.
fn title_matches(title: &str, app_name: &str, project_stem: &str) -> bool {
    title.contains(app_name)
        && (title.contains("Untitled")
            || (!project_stem.is_empty() && title.contains(project_stem)))
}

fn collect_executables(dir: &Path, hint: &str, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_executables(&path, hint, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains(hint))
        {
            out.push(path);
        }
    }
}
