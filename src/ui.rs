//! Terminal presentation — spinner and colored per-job output.
//!
//! Uses `indicatif` for the spinner and `console` for styling. One
//! [`JobProgress`] visually tracks one job through the worker loop.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::processor::{JobStatus, RenderReport};

/// Visual progress indicator for one render job.
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl JobProgress {
    /// Start the spinner with the job's display title.
    pub fn start(title: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("RENDER: {title}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    /// Finish the spinner and print the job outcome line.
    pub fn complete(&self, report: &RenderReport) {
        self.pb.finish_and_clear();
        match report.status {
            JobStatus::Completed => {
                println!(
                    "  {} {} — {} stem(s) uploaded",
                    self.green.apply_to("✓"),
                    report.title,
                    report.stems_uploaded
                );
            }
            JobStatus::Failed => {
                println!(
                    "  {} {} — {}",
                    self.red.apply_to("✗"),
                    report.title,
                    report.error.as_deref().unwrap_or("unknown failure")
                );
            }
        }
    }

    /// Dump the full render report as pretty JSON (verbose mode).
    pub fn print_report(&self, report: &RenderReport) {
        let status_style = match report.status {
            JobStatus::Completed => &self.green,
            JobStatus::Failed => &self.red,
        };
        println!();
        println!("{}", status_style.apply_to("─── Render Report ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
    }
}
