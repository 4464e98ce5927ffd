//! UI input capability seam.
//!
//! The renderer exposes no API, so exports are triggered by injecting
//! keystrokes into its window. [`UiDriver`] abstracts the injection
//! mechanism; [`XdotoolDriver`] implements it by shelling out to
//! `xdotool`, and tests substitute a scripted mock. Swapping this trait's
//! implementation for a first-class renderer API would leave the rest of
//! the pipeline untouched.

use std::process::Command;

use crate::error::AutomationError;

/// A located top-level window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRef {
    pub id: String,
    pub title: String,
}

/// The named inputs the export sequence is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Shortcut opening the export dialog (Ctrl+Shift+R).
    ExportDialog,
    Tab,
    Down,
    Enter,
    /// Select-all inside the focused text field (Ctrl+A).
    SelectAll,
}

/// Minimal window/input operations the automation controller needs.
pub trait UiDriver {
    /// Enumerate visible top-level windows with their titles.
    fn list_windows(&self) -> Result<Vec<WindowRef>, AutomationError>;

    /// Bring a window to the foreground.
    fn focus(&self, window: &WindowRef) -> Result<(), AutomationError>;

    /// Send one named key chord to a window.
    fn send_key(&self, window: &WindowRef, key: Key) -> Result<(), AutomationError>;

    /// Type literal text into the focused field of a window.
    fn type_text(&self, window: &WindowRef, text: &str) -> Result<(), AutomationError>;
}

/// Production driver that shells out to `xdotool`.
#[derive(Debug, Default)]
pub struct XdotoolDriver;

impl XdotoolDriver {
    fn run(args: &[&str]) -> Result<String, AutomationError> {
        let output = Command::new("xdotool")
            .args(args)
            .output()
            .map_err(|err| AutomationError::Driver(format!("xdotool: {err}")))?;
        if !output.status.success() {
            return Err(AutomationError::Driver(format!(
                "xdotool {} exited with {}",
                args.first().unwrap_or(&""),
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn chord(key: Key) -> &'static str {
        match key {
            Key::ExportDialog => "ctrl+shift+r",
            Key::Tab => "Tab",
            Key::Down => "Down",
            Key::Enter => "Return",
            Key::SelectAll => "ctrl+a",
        }
    }
}

impl UiDriver for XdotoolDriver {
    fn list_windows(&self) -> Result<Vec<WindowRef>, AutomationError> {
        // `search` exits non-zero when nothing matches; that is an empty
        // desktop, not a driver failure.
        let ids = match Self::run(&["search", "--onlyvisible", "--name", "."]) {
            Ok(out) => out,
            Err(_) => return Ok(Vec::new()),
        };
        let mut windows = Vec::new();
        for id in ids.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Ok(title) = Self::run(&["getwindowname", id]) {
                windows.push(WindowRef {
                    id: id.to_string(),
                    title: title.trim_end().to_string(),
                });
            }
        }
        Ok(windows)
    }

    fn focus(&self, window: &WindowRef) -> Result<(), AutomationError> {
        Self::run(&["windowactivate", "--sync", &window.id]).map(|_| ())
    }

    fn send_key(&self, window: &WindowRef, key: Key) -> Result<(), AutomationError> {
        Self::run(&["key", "--window", &window.id, Self::chord(key)]).map(|_| ())
    }

    fn type_text(&self, window: &WindowRef, text: &str) -> Result<(), AutomationError> {
        Self::run(&["type", "--window", &window.id, text]).map(|_| ())
    }
}
