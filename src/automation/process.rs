//! Ownership of the spawned renderer process.
//!
//! The process is an exclusive resource of one automation session. On
//! every exit path it must end up terminated: [`RenderProcess::terminate`]
//! tries a graceful stop with a bounded wait before force-killing, and
//! `Drop` force-kills anything still running.

use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::AutomationError;

#[derive(Debug)]
pub struct RenderProcess {
    child: Child,
}

impl RenderProcess {
    /// Launch the renderer with the project file as its argument.
    pub fn spawn(executable: &Path, project: &Path) -> Result<Self, AutomationError> {
        let child = Command::new(executable)
            .arg(project)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(AutomationError::Spawn)?;
        Ok(Self { child })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Whether the process has not yet been reaped.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Stop the process: graceful signal first, then a bounded wait, then
    /// a hard kill. Returns once the process is reaped.
    pub fn terminate(&mut self, grace: Duration) -> io::Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            // SIGTERM lets the renderer flush and close cleanly.
            let _ = Command::new("kill")
                .args(["-TERM", &self.child.id().to_string()])
                .status();

            let deadline = Instant::now() + grace;
            while Instant::now() < deadline {
                if self.child.try_wait()?.is_some() {
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }

        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for RenderProcess {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(pid = self.child.id(), "render process still alive on drop, killing");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
