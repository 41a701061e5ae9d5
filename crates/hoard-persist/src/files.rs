//! Bounded file operations shared by loads and writers.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PersistError, PersistResult};

/// Run an I/O future under the configured timeout.
pub(crate) async fn bounded<T, F>(timeout: Duration, operation: &str, fut: F) -> PersistResult<T>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(PersistError::Timeout {
            operation: operation.to_string(),
            after_ms: timeout.as_millis() as u64,
        }),
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{}.tmp", Uuid::new_v4().simple()))
}

pub(crate) fn quarantine_path(path: &Path) -> PathBuf {
    path.with_file_name(format!("{}.corrupt-{}.json", file_stem(path), timestamp()))
}

/// Read and parse a document.
///
/// Returns `Ok(None)` when the file does not exist. A file that cannot be
/// parsed is moved aside to a `.corrupt-<ts>.json` sibling and also yields
/// `Ok(None)`, so callers start from a default document.
pub(crate) async fn read_document<D>(path: &Path, timeout: Duration) -> PersistResult<Option<D>>
where
    D: DeserializeOwned,
{
    let bytes = match bounded(timeout, "read", fs::read(path)).await {
        Ok(bytes) => bytes,
        Err(PersistError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    match serde_json::from_slice(&bytes) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            let quarantined = quarantine_path(path);
            warn!(
                path = %path.display(),
                quarantined = %quarantined.display(),
                error = %e,
                "corrupt document moved aside, starting from default"
            );
            bounded(timeout, "quarantine", fs::rename(path, &quarantined)).await?;
            Ok(None)
        }
    }
}

/// Serialize `doc` and atomically replace `path` with it.
///
/// The bytes go to a uniquely named temporary file in the same directory,
/// which is fsynced and renamed over the target. The temporary file is
/// removed if any step fails.
pub(crate) async fn write_document<D>(path: &Path, doc: &D, timeout: Duration) -> PersistResult<()>
where
    D: Serialize,
{
    let bytes = serde_json::to_vec_pretty(doc).map_err(|e| PersistError::Serialization {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let tmp = temp_path(path);

    let result = bounded(timeout, "write", write_and_rename(path, &tmp, &bytes)).await;
    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    result
}

async fn write_and_rename(path: &Path, tmp: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, path).await?;

    // Make the rename itself durable.
    if let Some(dir) = path.parent() {
        if let Ok(dir) = fs::File::open(dir).await {
            let _ = dir.sync_all().await;
        }
    }
    Ok(())
}

/// Copy the current file into `backup_dir` as `<stem>-<ts>.json`.
///
/// Returns `Ok(None)` when there is nothing on disk to back up.
pub(crate) async fn backup_file(
    path: &Path,
    backup_dir: &Path,
    timeout: Duration,
) -> PersistResult<Option<PathBuf>> {
    if !bounded(timeout, "stat", fs::try_exists(path)).await? {
        return Ok(None);
    }
    bounded(timeout, "create backup dir", fs::create_dir_all(backup_dir)).await?;

    let target = backup_dir.join(format!("{}-{}.json", file_stem(path), timestamp()));
    match bounded(timeout, "backup", fs::copy(path, &target)).await {
        Ok(_) => {
            debug!(from = %path.display(), to = %target.display(), "backed up document");
            Ok(Some(target))
        }
        Err(PersistError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove a file. Missing files are not an error.
pub(crate) async fn remove_file(path: &Path, timeout: Duration) -> PersistResult<bool> {
    match bounded(timeout, "remove", fs::remove_file(path)).await {
        Ok(()) => Ok(true),
        Err(PersistError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn temp_and_quarantine_names_stay_beside_target() {
        let path = Path::new("/data/group-abc.json");
        let tmp = temp_path(path);
        assert_eq!(tmp.parent(), path.parent());
        assert!(tmp.to_string_lossy().ends_with(".tmp"));
        assert!(tmp.file_name().unwrap().to_string_lossy().starts_with("group-abc.json."));

        let q = quarantine_path(path);
        let name = q.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("group-abc.corrupt-"));
        assert!(name.ends_with(".json"));
    }

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let doc: Option<serde_json::Value> =
            read_document(&dir.path().join("absent.json"), TIMEOUT).await.unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_document(&path, &serde_json::json!({"a": 1}), TIMEOUT).await.unwrap();
        write_document(&path, &serde_json::json!({"a": 2}), TIMEOUT).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["doc.json".to_string()]);

        let doc: serde_json::Value = read_document(&path, TIMEOUT).await.unwrap().unwrap();
        assert_eq!(doc["a"], 2);
    }

    #[tokio::test]
    async fn backup_of_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let backup = backup_file(&dir.path().join("absent.json"), &dir.path().join("backups"), TIMEOUT)
            .await
            .unwrap();
        assert!(backup.is_none());
    }

    #[tokio::test]
    async fn remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!remove_file(&dir.path().join("absent.json"), TIMEOUT).await.unwrap());
    }
}
