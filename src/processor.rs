//! One job, end to end.
//!
//! The processor owns the full stage sequence for a single queued render:
//! download → extract → automate → classify → report → cleanup. The
//! failure policy is uniform: the first hard failure aborts the remaining
//! stages, the workspace is released regardless, and the outcome is
//! folded into a [`RenderReport`] — stage errors never escape to the
//! worker loop.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::automation::{Controller, Phase, Session, UiDriver};
use crate::classify::{self, StemType};
use crate::error::WorkerError;
use crate::queue::{CompleteRequest, PendingRender, QueueClient, StemUpload};
use crate::workspace::JobWorkspace;

/// Processor knobs not owned by the automation controller.
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub work_dir: PathBuf,
    pub project_extension: String,
    /// Prefix of the external placement convention
    /// `{base}/{job_id}/{filename}` used for reported stem locators.
    pub stem_base_path: String,
}

/// Lifecycle outcome of one processed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Completed,
    Failed,
}

/// Structured record of one job run, produced whether it succeeded or
/// failed.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub run_id: Uuid,
    pub job_id: String,
    pub title: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stems_uploaded: usize,
    pub phases: Vec<Phase>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Executes queued jobs one at a time. The automation controller sits
/// behind a lock: the renderer UI is a singleton resource, and holding
/// the guard for the automation stage is what enforces the one-session
/// invariant.
pub struct JobProcessor<D: UiDriver> {
    queue: Arc<QueueClient>,
    controller: Mutex<Controller<D>>,
    opts: ProcessorOptions,
}

impl<D: UiDriver> JobProcessor<D> {
    pub fn new(queue: Arc<QueueClient>, controller: Controller<D>, opts: ProcessorOptions) -> Self {
        Self {
            queue,
            controller: Mutex::new(controller),
            opts,
        }
    }

    /// Run one job to completion. Never fails: every stage error becomes
    /// a failed report and the worker moves on.
    pub async fn process(&self, job: &PendingRender) -> RenderReport {
        let started_at = Utc::now();
        let mut session = Session::new();
        info!(job = %job.id, title = %job.title, "processing render job");

        let result = self.run_stages(job, &mut session).await;

        let completed_at = Utc::now();
        let (status, error, stems_uploaded) = match result {
            Ok(count) => {
                info!(job = %job.id, stems = count, "render job completed");
                (JobStatus::Completed, None, count)
            }
            Err(err) => {
                warn!(job = %job.id, %err, "render job failed");
                (JobStatus::Failed, Some(err.to_string()), 0)
            }
        };

        RenderReport {
            run_id: session.id,
            job_id: job.id.clone(),
            title: job.title.clone(),
            status,
            error,
            stems_uploaded,
            phases: session.phases.clone(),
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds(),
        }
    }

    async fn run_stages(
        &self,
        job: &PendingRender,
        session: &mut Session,
    ) -> Result<usize, WorkerError> {
        let workspace = JobWorkspace::create(&self.opts.work_dir, &job.id)?;
        let outcome = self.run_in_workspace(job, &workspace, session).await;
        // Unconditional release; Drop covers the panic path.
        workspace.cleanup();
        outcome
    }

    async fn run_in_workspace(
        &self,
        job: &PendingRender,
        workspace: &JobWorkspace,
        session: &mut Session,
    ) -> Result<usize, WorkerError> {
        let bytes = self.queue.download(&job.project_archive_url).await?;
        info!(job = %job.id, bytes = bytes.len(), "downloaded project archive");
        workspace.write_archive(&bytes)?;

        let project = workspace.extract(&self.opts.project_extension)?;
        info!(job = %job.id, project = %project.display(), "located project file");

        let files = {
            // Scoped acquisition of the single automation slot.
            let controller = self.controller.lock().await;
            controller
                .export_stems(&project, workspace.output_dir(), session)
                .await?
        };

        let (stems, master_url) = self.classify_outputs(&job.id, &files);
        let count = stems.len();
        let request = CompleteRequest { stems, master_url };
        self.queue.complete_render(&job.id, &request).await?;
        Ok(count)
    }

    /// Map rendered files to classified stem records, in the stable
    /// listing order the detector returned, and designate the master
    /// output when one is recognizable.
    fn classify_outputs(
        &self,
        job_id: &str,
        files: &[PathBuf],
    ) -> (Vec<StemUpload>, Option<String>) {
        let mut stems = Vec::with_capacity(files.len());
        let mut master_url = None;

        for (order, path) in files.iter().enumerate() {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let stem_type = classify::classify(filename);
            let stem_url = format!("{}/{}/{}", self.opts.stem_base_path, job_id, filename);

            // A master is indicated by classification or by the filename
            // alone (an earlier keyword may have won the classification).
            if master_url.is_none()
                && (stem_type == StemType::Master || filename.to_lowercase().contains("master"))
            {
                master_url = Some(stem_url.clone());
            }

            stems.push(StemUpload {
                stem_url,
                stem_type,
                label: classify::label_for(filename),
                order: order as u32,
            });
        }

        (stems, master_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::driver::mock::MockDriver;
    use crate::automation::AutomationConfig;
    use crate::detect::DetectorConfig;
    use std::fs;
    use std::io::Write as _;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            for (name, data) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    fn fake_renderer(dir: &Path) -> PathBuf {
        let path = dir.join("fake-renderer.sh");
        fs::write(&path, "#!/bin/sh\nsleep 30\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn fast_automation(executable: PathBuf, max_wait: Duration) -> AutomationConfig {
        AutomationConfig {
            executable: Some(executable),
            launch_settle: Duration::from_millis(10),
            window_attempts: 2,
            window_retry: Duration::from_millis(10),
            load_delay: Duration::from_millis(5),
            dialog_delay: Duration::from_millis(5),
            input_delay: Duration::from_millis(1),
            teardown_wait: Duration::from_millis(200),
            detector: DetectorConfig {
                grace: Duration::from_millis(10),
                settle: Duration::from_millis(40),
                poll: Duration::from_millis(20),
                max_wait,
            },
            ..AutomationConfig::default()
        }
    }

    fn processor_for(
        server: &MockServer,
        work_dir: &Path,
        driver: MockDriver,
        automation: AutomationConfig,
    ) -> JobProcessor<MockDriver> {
        let queue = Arc::new(QueueClient::new(server.uri(), "test-key".into()));
        JobProcessor::new(
            queue,
            Controller::new(driver, automation),
            ProcessorOptions {
                work_dir: work_dir.to_path_buf(),
                project_extension: "als".into(),
                stem_base_path: "/generated-stems".into(),
            },
        )
    }

    fn job() -> PendingRender {
        PendingRender {
            id: "trk_1".into(),
            title: "Night Drive".into(),
            project_archive_url: "/uploads/trk_1.zip".into(),
        }
    }

    /// Wait for the job's output dir to appear, then drop stem files into
    /// it — playing the part of the renderer.
    fn spawn_fake_export(work_dir: &Path, names: &'static [&'static str]) {
        let output = work_dir.join("trk_1").join("output");
        tokio::spawn(async move {
            for _ in 0..200 {
                if output.exists() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            // Give the trigger sequence a moment to finish first.
            tokio::time::sleep(Duration::from_millis(60)).await;
            for name in names {
                fs::write(output.join(name), name.as_bytes()).unwrap();
            }
        });
    }

    #[tokio::test]
    async fn end_to_end_success_reports_classified_stems() {
        let server = MockServer::start().await;
        let tmp = tempfile::tempdir().unwrap();
        let work_dir = tmp.path().join("work");

        Mock::given(method("GET"))
            .and(path("/uploads/trk_1.zip"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(zip_bytes(&[("Night Drive/Night Drive.als", b"proj")])),
            )
            .mount(&server)
            .await;

        // Exact payload: four stems in listing order, no masterUrl key.
        Mock::given(method("POST"))
            .and(path("/api/worker/tracks/trk_1/complete"))
            .and(body_json(serde_json::json!({
                "stems": [
                    {"stemUrl": "/generated-stems/trk_1/00-Kick.wav",
                     "stemType": "OTHER", "label": "00-Kick", "order": 0},
                    {"stemUrl": "/generated-stems/trk_1/01-Bass.wav",
                     "stemType": "BASS", "label": "01-Bass", "order": 1},
                    {"stemUrl": "/generated-stems/trk_1/02-Lead.wav",
                     "stemType": "MELODY", "label": "02-Lead", "order": 2},
                    {"stemUrl": "/generated-stems/trk_1/03-Vocals.wav",
                     "stemType": "VOCALS", "label": "03-Vocals", "order": 3}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (driver, _log) = MockDriver::with_window("Night Drive - Ableton Live 12");
        let automation = fast_automation(fake_renderer(tmp.path()), Duration::from_secs(5));
        let processor = processor_for(&server, &work_dir, driver, automation);

        spawn_fake_export(
            &work_dir,
            &["00-Kick.wav", "01-Bass.wav", "02-Lead.wav", "03-Vocals.wav"],
        );

        let report = processor.process(&job()).await;
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.stems_uploaded, 4);
        assert!(report.error.is_none());
        assert_eq!(*report.phases.last().unwrap(), Phase::Done);

        // Workspace released on success.
        assert!(!work_dir.join("trk_1").exists());
    }

    #[tokio::test]
    async fn export_timeout_fails_without_completion_post() {
        let server = MockServer::start().await;
        let tmp = tempfile::tempdir().unwrap();
        let work_dir = tmp.path().join("work");

        Mock::given(method("GET"))
            .and(path("/uploads/trk_1.zip"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[("song.als", b"proj")])),
            )
            .mount(&server)
            .await;
        // No completion report may be sent for a timed-out render.
        Mock::given(method("POST"))
            .and(path("/api/worker/tracks/trk_1/complete"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (driver, _log) = MockDriver::with_window("Ableton Live 12 - Untitled");
        let automation = fast_automation(fake_renderer(tmp.path()), Duration::from_millis(100));
        let processor = processor_for(&server, &work_dir, driver, automation);

        let report = processor.process(&job()).await;
        assert_eq!(report.status, JobStatus::Failed);
        assert!(report.error.as_deref().unwrap().contains("stabilize"));
        assert_eq!(report.stems_uploaded, 0);
        assert!(!work_dir.join("trk_1").exists());
    }

    #[tokio::test]
    async fn zero_project_files_is_invalid_project() {
        let server = MockServer::start().await;
        let tmp = tempfile::tempdir().unwrap();
        let work_dir = tmp.path().join("work");

        Mock::given(method("GET"))
            .and(path("/uploads/trk_1.zip"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(zip_bytes(&[("readme.txt", b"nothing")])),
            )
            .mount(&server)
            .await;

        let automation = fast_automation(fake_renderer(tmp.path()), Duration::from_secs(1));
        let processor = processor_for(&server, &work_dir, MockDriver::windowless(), automation);

        let report = processor.process(&job()).await;
        assert_eq!(report.status, JobStatus::Failed);
        assert!(report.error.as_deref().unwrap().contains("No project file"));
        assert!(!work_dir.join("trk_1").exists());
    }

    #[tokio::test]
    async fn ambiguous_project_files_are_invalid() {
        let server = MockServer::start().await;
        let tmp = tempfile::tempdir().unwrap();
        let work_dir = tmp.path().join("work");

        Mock::given(method("GET"))
            .and(path("/uploads/trk_1.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[
                ("a.als", b"one"),
                ("b.als", b"two"),
            ])))
            .mount(&server)
            .await;

        let automation = fast_automation(fake_renderer(tmp.path()), Duration::from_secs(1));
        let processor = processor_for(&server, &work_dir, MockDriver::windowless(), automation);

        let report = processor.process(&job()).await;
        assert_eq!(report.status, JobStatus::Failed);
        assert!(report.error.as_deref().unwrap().contains("exactly one"));
        assert!(!work_dir.join("trk_1").exists());
    }

    #[tokio::test]
    async fn download_failure_fails_the_job_only() {
        let server = MockServer::start().await;
        let tmp = tempfile::tempdir().unwrap();
        let work_dir = tmp.path().join("work");

        Mock::given(method("GET"))
            .and(path("/uploads/trk_1.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let automation = fast_automation(fake_renderer(tmp.path()), Duration::from_secs(1));
        let processor = processor_for(&server, &work_dir, MockDriver::windowless(), automation);

        let report = processor.process(&job()).await;
        assert_eq!(report.status, JobStatus::Failed);
        assert!(!work_dir.join("trk_1").exists());
    }

    #[tokio::test]
    async fn master_stem_sets_master_url() {
        let server = MockServer::start().await;
        let tmp = tempfile::tempdir().unwrap();
        let work_dir = tmp.path().join("work");

        Mock::given(method("GET"))
            .and(path("/uploads/trk_1.zip"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[("song.als", b"proj")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/worker/tracks/trk_1/complete"))
            .and(body_json(serde_json::json!({
                "stems": [
                    {"stemUrl": "/generated-stems/trk_1/Master.wav",
                     "stemType": "MASTER", "label": "Master", "order": 0},
                    {"stemUrl": "/generated-stems/trk_1/drums.wav",
                     "stemType": "DRUMS", "label": "drums", "order": 1}
                ],
                "masterUrl": "/generated-stems/trk_1/Master.wav"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (driver, _log) = MockDriver::with_window("Ableton Live 12 - Untitled");
        let automation = fast_automation(fake_renderer(tmp.path()), Duration::from_secs(5));
        let processor = processor_for(&server, &work_dir, driver, automation);

        spawn_fake_export(&work_dir, &["Master.wav", "drums.wav"]);

        let report = processor.process(&job()).await;
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.stems_uploaded, 2);
    }
}
