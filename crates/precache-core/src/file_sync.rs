//! Copying files into and removing them from the cache pool

use crate::error::{FileSyncError, FileSyncResult};
use crate::paths::PathMapper;
use crate::types::CacheRecord;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Single-file operations between the source media tree and the cache pool
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSync;

impl FileSync {
    pub fn new() -> Self {
        Self
    }

    /// Copy `src` to `dst`, creating missing directories and syncing to disk
    /// before returning. Returns the number of bytes copied.
    pub async fn copy(&self, src: &Path, dst: &Path) -> FileSyncResult<u64> {
        let mut input = fs::File::open(src)
            .await
            .map_err(|e| FileSyncError::io(src, e))?;

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FileSyncError::io(parent, e))?;
        }

        let mut output = fs::File::create(dst)
            .await
            .map_err(|e| FileSyncError::io(dst, e))?;

        let bytes = tokio::io::copy(&mut input, &mut output)
            .await
            .map_err(|e| FileSyncError::io(dst, e))?;
        output.flush().await.map_err(|e| FileSyncError::io(dst, e))?;
        output
            .sync_all()
            .await
            .map_err(|e| FileSyncError::io(dst, e))?;

        debug!(src = ?src, dst = ?dst, bytes, "Copied file");
        Ok(bytes)
    }

    /// Delete a file. Missing paths are fine; directories are refused.
    pub async fn remove(&self, path: &Path) -> FileSyncResult<()> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(FileSyncError::io(path, e)),
        };

        if metadata.is_dir() {
            return Err(FileSyncError::IsDirectory(path.to_path_buf()));
        }

        fs::remove_file(path)
            .await
            .map_err(|e| FileSyncError::io(path, e))?;
        debug!(path = ?path, "Removed file");
        Ok(())
    }

    /// Copy every file of one ledger record, episode before its subtitles.
    ///
    /// Stops at the first failure; files copied up to that point stay in the
    /// cache pool. Returns the number of files copied.
    pub async fn copy_record(&self, record: &CacheRecord, mapper: &PathMapper) -> FileSyncResult<usize> {
        let mut copied = 0;
        for cached in record.files() {
            let source = mapper.source_for_cached(cached).ok_or_else(|| {
                FileSyncError::io(
                    cached,
                    std::io::Error::new(ErrorKind::InvalidInput, "not inside the cache pool"),
                )
            })?;

            info!(
                episode = %record.rating_key,
                from = %source,
                to = %cached,
                "Copying into cache pool"
            );
            self.copy(Path::new(&source), Path::new(cached)).await?;
            copied += 1;
        }
        Ok(copied)
    }
}
