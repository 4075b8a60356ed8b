//! Hash-gated replacement of a single binary

use crate::core::{RmuError, RmuResult};
use crate::di::traits::ArtifactDownloader;
use crate::package::checksum::{file_md5, md5_hex};
use crate::updater::UpdateOutcome;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const TEMP_SUFFIX: &str = ".rmu-tmp";

/// Downloads a candidate build and swaps it in only when its content differs
#[derive(Clone)]
pub struct ArtifactInstaller {
    downloader: Arc<dyn ArtifactDownloader>,
}

impl ArtifactInstaller {
    pub fn new(downloader: Arc<dyn ArtifactDownloader>) -> Self {
        Self { downloader }
    }

    /// Replace `path` with the bytes behind `url` if their MD5 differs
    ///
    /// Dry runs report `Updated` without writing. Errors never escape: they
    /// become `Failed`, or `Cancelled` when the token fired. A missing local
    /// file is a read failure and is never created.
    pub async fn install_if_changed(
        &self,
        path: &Path,
        url: &str,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> UpdateOutcome {
        match self.try_install(path, url, dry_run, cancel).await {
            Ok(outcome) => outcome,
            Err(RmuError::Cancelled) => UpdateOutcome::Cancelled,
            Err(e) => UpdateOutcome::Failed(e.to_string()),
        }
    }

    async fn try_install(
        &self,
        path: &Path,
        url: &str,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> RmuResult<UpdateOutcome> {
        let local = file_md5(path).await?;
        let data = self.downloader.download(url, cancel).await?;
        let remote = md5_hex(&data);
        debug!("{}: local {} remote {}", path.display(), local, remote);

        if local == remote {
            return Ok(UpdateOutcome::Unchanged);
        }

        if dry_run {
            info!("{}: would update (dry run)", path.display());
            return Ok(UpdateOutcome::Updated);
        }

        if cancel.is_cancelled() {
            return Err(RmuError::Cancelled);
        }
        replace_file(path, &data).await?;
        info!("{}: updated", path.display());
        Ok(UpdateOutcome::Updated)
    }
}

/// Write to a sibling temp file, then rename it over `path`
async fn replace_file(path: &Path, data: &[u8]) -> RmuResult<()> {
    let temp = temp_path(path)?;
    if let Err(e) = tokio::fs::write(&temp, data).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> RmuResult<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| RmuError::Path(format!("{} has no file name", path.display())))?;
    let mut temp_name = OsString::from(name);
    temp_name.push(TEMP_SUFFIX);
    Ok(path.with_file_name(temp_name))
}
