//! Per-job scratch space on disk.
//!
//! A [`JobWorkspace`] owns everything one job writes locally: the
//! downloaded archive, the extraction tree and the renderer's output
//! directory. It is created fresh for every delivery of a job (leftovers
//! from a crashed run are removed first, so duplicate delivery is safe)
//! and removed again on every exit path.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::ArchiveError;

/// Scratch directories for one job, rooted at `{work_dir}/{job_id}`.
pub struct JobWorkspace {
    root: PathBuf,
    archive_path: PathBuf,
    extract_dir: PathBuf,
    output_dir: PathBuf,
    released: bool,
}

impl JobWorkspace {
    /// Create a fresh workspace, discarding any leftover tree from a
    /// previous delivery of the same job.
    pub fn create(work_dir: &Path, job_id: &str) -> io::Result<Self> {
        let root = work_dir.join(job_id);
        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        let extract_dir = root.join("project");
        let output_dir = root.join("output");
        fs::create_dir_all(&extract_dir)?;
        fs::create_dir_all(&output_dir)?;

        Ok(Self {
            archive_path: root.join("project.zip"),
            root,
            extract_dir,
            output_dir,
            released: false,
        })
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Persist the downloaded archive bytes.
    pub fn write_archive(&self, bytes: &[u8]) -> io::Result<()> {
        fs::write(&self.archive_path, bytes)
    }

    /// Unpack the archive and locate the single project file inside it.
    ///
    /// Exactly one `*.{project_extension}` file must exist at any depth;
    /// zero or multiple is a hard failure — the worker never guesses
    /// which project to open.
    pub fn extract(&self, project_extension: &str) -> Result<PathBuf, ArchiveError> {
        unzip_to_dir(&self.archive_path, &self.extract_dir)?;

        let mut projects = Vec::new();
        collect_by_extension(&self.extract_dir, project_extension, &mut projects)
            .map_err(|err| ArchiveError::Zip(err.to_string()))?;
        projects.sort();

        match projects.len() {
            0 => Err(ArchiveError::NoProjectFile(self.extract_dir.clone())),
            1 => Ok(projects.remove(0)),
            count => Err(ArchiveError::AmbiguousProject { count }),
        }
    }

    /// Remove the whole workspace tree. Failures are logged, never fatal.
    pub fn cleanup(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = fs::remove_dir_all(&self.root) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.root.display(), %err, "failed to remove workspace");
            }
        }
    }
}

impl Drop for JobWorkspace {
    // Release is guaranteed even when a stage error unwinds past cleanup().
    fn drop(&mut self) {
        self.release();
    }
}

fn unzip_to_dir(zip_path: &Path, dest_dir: &Path) -> Result<(), ArchiveError> {
    let file = File::open(zip_path).map_err(|err| ArchiveError::Zip(err.to_string()))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|err| ArchiveError::Zip(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| ArchiveError::Zip(err.to_string()))?;
        // enclosed_name rejects entries that would escape dest_dir.
        let outpath = match entry.enclosed_name() {
            Some(path) => dest_dir.join(path),
            None => continue,
        };
        if entry.name().ends_with('/') {
            fs::create_dir_all(&outpath).map_err(|err| ArchiveError::Zip(err.to_string()))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(|err| ArchiveError::Zip(err.to_string()))?;
        }
        let mut outfile =
            File::create(&outpath).map_err(|err| ArchiveError::Zip(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| ArchiveError::Zip(err.to_string()))?;
    }
    Ok(())
}

fn collect_by_extension(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_by_extension(&path, extension, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Build an in-memory zip with the given entry names.
    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = io::Cursor::new(Vec::new());
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

    #[test]
    fn extracts_single_project_at_depth() {
        let work = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(work.path(), "trk_1").unwrap();
        ws.write_archive(&zip_bytes(&[
            ("My Song Project/My Song.als", b"project data"),
            ("My Song Project/Samples/kick.wav", b"wav"),
        ]))
        .unwrap();

        let project = ws.extract("als").unwrap();
        assert!(project.ends_with("My Song Project/My Song.als"));
        assert_eq!(fs::read(&project).unwrap(), b"project data");
    }

    #[test]
    fn zero_project_files_is_hard_failure() {
        let work = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(work.path(), "trk_1").unwrap();
        ws.write_archive(&zip_bytes(&[("readme.txt", b"no project here")]))
            .unwrap();

        let err = ws.extract("als").unwrap_err();
        assert!(matches!(err, ArchiveError::NoProjectFile(_)));
    }

    #[test]
    fn multiple_project_files_are_never_guessed() {
        let work = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(work.path(), "trk_1").unwrap();
        ws.write_archive(&zip_bytes(&[
            ("a.als", b"one"),
            ("backup/a Copy.als", b"two"),
        ]))
        .unwrap();

        let err = ws.extract("als").unwrap_err();
        assert!(matches!(err, ArchiveError::AmbiguousProject { count: 2 }));
    }

    #[test]
    fn corrupt_archive_is_reported() {
        let work = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(work.path(), "trk_1").unwrap();
        ws.write_archive(b"definitely not a zip").unwrap();

        let err = ws.extract("als").unwrap_err();
        assert!(matches!(err, ArchiveError::Zip(_)));
    }

    #[test]
    fn cleanup_removes_tree() {
        let work = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(work.path(), "trk_1").unwrap();
        let root = work.path().join("trk_1");
        assert!(root.exists());

        ws.cleanup();
        assert!(!root.exists());
    }

    #[test]
    fn drop_releases_workspace() {
        let work = tempfile::tempdir().unwrap();
        let root = work.path().join("trk_1");
        {
            let _ws = JobWorkspace::create(work.path(), "trk_1").unwrap();
            assert!(root.exists());
        }
        assert!(!root.exists());
    }

    #[test]
    fn create_discards_previous_delivery() {
        let work = tempfile::tempdir().unwrap();
        let stale = work.path().join("trk_1").join("output").join("old.wav");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"stale").unwrap();

        let ws = JobWorkspace::create(work.path(), "trk_1").unwrap();
        assert!(!stale.exists());
        ws.cleanup();
    }
}
