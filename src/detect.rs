//! File-set stability detection.
//!
//! The renderer gives no programmatic signal when an export finishes, so
//! completion is inferred from what is externally observable: matching
//! files exist and their sizes stop changing. Two `{path → size}`
//! snapshots taken at least a settle interval apart must be identical —
//! map equality, so a file that disappears between the snapshots (a
//! rename-in-progress) invalidates the pair instead of being accepted
//! early.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::error::AutomationError;

/// Timing knobs for [`await_stable`].
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Wait once after files first appear, before the first snapshot.
    pub grace: Duration,
    /// Minimum separation between the two snapshots of a pair.
    pub settle: Duration,
    /// Delay between polls while no stable pair has been seen.
    pub poll: Duration,
    /// Overall deadline; elapsing it is a hard failure.
    pub max_wait: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            settle: Duration::from_secs(3),
            poll: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Block until the set of `*.{extension}` files under `dir` is non-empty
/// and stable, returning the stable paths in sorted order.
///
/// Returns [`AutomationError::DetectionTimeout`] if `max_wait` elapses
/// first; a partial or still-changing set is never returned.
pub async fn await_stable(
    dir: &Path,
    extension: &str,
    cfg: &DetectorConfig,
) -> Result<Vec<PathBuf>, AutomationError> {
    let started = Instant::now();
    let deadline = started + cfg.max_wait;
    let mut grace_served = false;

    loop {
        if !snapshot(dir, extension).is_empty() {
            if !grace_served {
                sleep(cfg.grace).await;
                grace_served = true;
            }
            let first = snapshot(dir, extension);
            sleep(cfg.settle).await;
            let second = snapshot(dir, extension);

            if !first.is_empty() && first == second {
                debug!(files = second.len(), "export output stable");
                return Ok(second.into_keys().collect());
            }
            debug!("export output still changing");
        }

        if Instant::now() >= deadline {
            return Err(AutomationError::DetectionTimeout {
                waited_secs: started.elapsed().as_secs(),
            });
        }
        sleep(cfg.poll).await;
    }
}

/// One `{path → size}` snapshot of the matching files. Files that vanish
/// mid-listing are simply absent from the map.
fn snapshot(dir: &Path, extension: &str) -> BTreeMap<PathBuf, u64> {
    let mut sizes = BTreeMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return sizes,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !matches {
            continue;
        }
        if let Ok(meta) = entry.metadata()
            && meta.is_file()
        {
            sizes.insert(path, meta.len());
        }
    }
    sizes
}
