//! Shared filesystem helpers for the record stores.
//!
//! Every write goes through [`write_json_atomic`]: serialize to a temp file
//! in the same directory, then rename over the target. Readers never see a
//! partial file, and a crash between the two steps leaves the previous
//! version intact.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use uuid::Uuid;

use crate::error::StoreError;

/// Serialize `value` as JSON and write it to `path` atomically.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(value).map_err(StoreError::Json)?;
    write_atomic(path, &json).await
}

/// Write raw bytes through the temp-then-rename path.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    // Unique temp name beside the target so the rename stays on one filesystem.
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Read and parse a JSON record. Returns `Ok(None)` if the file does not
/// exist; a present-but-malformed file is a [`StoreError::Parse`].
pub async fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Create `dir` (and parents) if it does not exist yet.
pub async fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir).await?;
    Ok(())
}
