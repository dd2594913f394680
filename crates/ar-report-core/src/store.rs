//! Artifact persistence.
//!
//! Bytes are staged in a hidden temporary file inside the output directory and
//! renamed onto the final name once fully written and synced. Staging and the
//! target share a filesystem, so the rename is atomic and the final path never
//! holds a partial file. A staged file that is never persisted is removed when
//! it goes out of scope.

use ar_report_browser::Download;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, StorageError};

const STAGING_PREFIX: &str = ".ar-staging-";
const STAGING_SUFFIX: &str = ".part";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Creates the output directory. Run before the browser is launched.
    pub fn prepare(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| ConfigError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })
    }

    /// Writes `download` as `final_name`, replacing any existing artifact.
    pub fn store(&self, download: &Download, final_name: &str) -> Result<PathBuf, StorageError> {
        validate_name(final_name)?;

        let stage_err = |source| StorageError::Stage {
            dir: self.output_dir.clone(),
            source,
        };
        std::fs::create_dir_all(&self.output_dir).map_err(stage_err)?;

        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(&self.output_dir)
            .map_err(stage_err)?;
        staged.write_all(&download.content).map_err(stage_err)?;
        staged.as_file().sync_all().map_err(stage_err)?;
        tracing::debug!(
            staged = %staged.path().display(),
            bytes = download.content.len(),
            "artifact staged"
        );

        let target = self.output_dir.join(final_name);
        // On failure the error owns the staged file and deletes it on drop.
        staged
            .persist(&target)
            .map_err(|err| StorageError::Persist {
                path: target.clone(),
                source: err.error,
            })?;

        tracing::info!(path = %target.display(), "artifact stored");
        Ok(target)
    }
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn download(content: &[u8]) -> Download {
        Download {
            suggested_filename: "Report March 2024 15.csv".to_string(),
            content: content.to_vec(),
        }
    }

    fn staging_leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with(STAGING_PREFIX))
            .collect()
    }

    #[test]
    fn stores_full_content_under_final_name() {
        let temp = tempdir().unwrap();
        let out = temp.path().join("artifacts");
        let store = ArtifactStore::new(&out);

        let content = b"date,route,seats\n2024-03-14,A,40\n".repeat(1_000);
        let path = store
            .store(&download(&content), "AR Report March 2024 14.csv")
            .unwrap();

        assert_eq!(path, out.join("AR Report March 2024 14.csv"));
        assert_eq!(std::fs::read(&path).unwrap(), content);
        assert!(staging_leftovers(&out).is_empty());
    }

    #[test]
    fn replaces_existing_artifact() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::new(temp.path());
        std::fs::write(temp.path().join("AR same.csv"), b"old and longer content").unwrap();

        let path = store.store(&download(b"new"), "AR same.csv").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"new");
    }

    #[test]
    fn failed_move_removes_staged_file() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::new(temp.path());
        // A non-empty directory squatting on the final name makes the rename fail.
        let blocker = temp.path().join("AR blocked.csv");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        let err = store.store(&download(b"data"), "AR blocked.csv").unwrap_err();
        assert!(matches!(err, StorageError::Persist { .. }));
        assert!(staging_leftovers(temp.path()).is_empty());
        assert!(blocker.is_dir());
    }

    #[test]
    fn rejects_names_that_escape_the_output_dir() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::new(temp.path());

        for name in ["", ".", "..", "../evil.csv", "sub/dir.csv"] {
            let err = store.store(&download(b"x"), name).unwrap_err();
            assert!(matches!(err, StorageError::InvalidName(_)), "{name:?}");
        }
        assert!(staging_leftovers(temp.path()).is_empty());
    }

    #[test]
    fn prepare_reports_unusable_output_dir() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, b"").unwrap();

        let err = ArtifactStore::new(file.join("artifacts"))
            .prepare()
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutputDir { .. }));
    }
}
