//! Per-file update orchestration
//!
//! Every target found in the mods directory goes through extract, resolve
//! and install on a bounded pool of tasks. One file's failure never stops the
//! batch, and every target ends with exactly one [`UpdateOutcome`].

pub mod scan;

pub use scan::{find_targets, BinaryTarget};

use crate::core::{RmuError, RmuResult};
use crate::di::{ArtifactDownloader, ConfigProvider, MetadataLoader, ReleaseResolver, ServiceContainer};
use crate::extractor::{ReferenceExtractor, RepositoryRef};
use crate::package::ArtifactInstaller;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Terminal state of one target for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Updated,
    Unchanged,
    Failed(String),
    /// The run was cancelled or hit its deadline before this target finished
    Cancelled,
}

impl UpdateOutcome {
    /// Numeric status reported to callers
    pub fn status_code(&self) -> i32 {
        match self {
            UpdateOutcome::Updated => 0,
            UpdateOutcome::Unchanged => 1,
            UpdateOutcome::Failed(_) => -1,
            UpdateOutcome::Cancelled => -2,
        }
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Updated => write!(f, "updated"),
            UpdateOutcome::Unchanged => write!(f, "unchanged"),
            UpdateOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            UpdateOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl UpdateSummary {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a UpdateOutcome>) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                UpdateOutcome::Updated => summary.updated += 1,
                UpdateOutcome::Unchanged => summary.unchanged += 1,
                UpdateOutcome::Failed(_) => summary.failed += 1,
                UpdateOutcome::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.updated + self.unchanged + self.failed + self.cancelled
    }
}

impl fmt::Display for UpdateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} unchanged, {} failed",
            self.updated, self.unchanged, self.failed
        )?;
        if self.cancelled > 0 {
            write!(f, ", {} cancelled", self.cancelled)?;
        }
        Ok(())
    }
}

/// Drives extract, resolve and install for every target in a directory
#[derive(Clone)]
pub struct UpdateOrchestrator {
    config: Arc<dyn ConfigProvider>,
    extractor: ReferenceExtractor,
    resolver: Arc<dyn ReleaseResolver>,
    installer: ArtifactInstaller,
}

impl UpdateOrchestrator {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        loader: Arc<dyn MetadataLoader>,
        resolver: Arc<dyn ReleaseResolver>,
        downloader: Arc<dyn ArtifactDownloader>,
    ) -> Self {
        Self {
            extractor: ReferenceExtractor::from_config(loader, config.as_ref()),
            installer: ArtifactInstaller::new(downloader),
            config,
            resolver,
        }
    }

    pub fn from_container(container: &ServiceContainer) -> Self {
        Self::new(
            container.config.clone(),
            container.loader.clone(),
            container.resolver.clone(),
            container.downloader.clone(),
        )
    }

    /// Update every target in `dir`
    ///
    /// Only failing to enumerate `dir` is an error; everything else lands in
    /// the returned map.
    pub async fn run(
        &self,
        dir: &Path,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> RmuResult<BTreeMap<PathBuf, UpdateOutcome>> {
        self.run_with_progress(dir, dry_run, cancel, |_, _| {}).await
    }

    /// Like [`run`](Self::run), calling `on_done` as each target finishes
    pub async fn run_with_progress<F>(
        &self,
        dir: &Path,
        dry_run: bool,
        cancel: &CancellationToken,
        on_done: F,
    ) -> RmuResult<BTreeMap<PathBuf, UpdateOutcome>>
    where
        F: FnMut(&Path, &UpdateOutcome),
    {
        let targets = find_targets(dir, self.config.extension(), self.config.skip_prefix())?;
        info!("Found {} candidate files in {}", targets.len(), dir.display());
        Ok(self.run_targets(targets, dry_run, cancel, on_done).await)
    }

    /// Process an explicit list of targets
    pub async fn run_targets<F>(
        &self,
        targets: Vec<BinaryTarget>,
        dry_run: bool,
        cancel: &CancellationToken,
        mut on_done: F,
    ) -> BTreeMap<PathBuf, UpdateOutcome>
    where
        F: FnMut(&Path, &UpdateOutcome),
    {
        let run_token = cancel.child_token();
        let deadline = self.config.deadline().map(|limit| {
            let token = run_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                warn!("Deadline of {:?} reached, cancelling", limit);
                token.cancel();
            })
        });

        // Anything that never reports back stays cancelled.
        let mut outcomes: BTreeMap<PathBuf, UpdateOutcome> = targets
            .iter()
            .map(|t| (t.path.clone(), UpdateOutcome::Cancelled))
            .collect();

        let max_concurrent = self.config.max_concurrent().max(1);
        let mut join_set = JoinSet::new();

        for target in targets {
            if join_set.len() >= max_concurrent {
                if let Some(result) = join_set.join_next().await {
                    record(result, &mut outcomes, &mut on_done);
                }
            }
            if run_token.is_cancelled() {
                debug!("Run cancelled, not starting {}", target.file_name);
                break;
            }

            let worker = self.clone();
            let token = run_token.clone();
            join_set.spawn(async move {
                let mut target = target;
                let outcome = worker.process(&mut target, dry_run, &token).await;
                (target.path, outcome)
            });
        }

        while let Some(result) = join_set.join_next().await {
            record(result, &mut outcomes, &mut on_done);
        }

        if let Some(deadline) = deadline {
            deadline.abort();
        }
        outcomes
    }

    /// Extract, resolve and install a single target
    ///
    /// The extracted reference is recorded on `target`.
    pub async fn process(
        &self,
        target: &mut BinaryTarget,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> UpdateOutcome {
        if cancel.is_cancelled() {
            return UpdateOutcome::Cancelled;
        }

        let extractor = self.extractor.clone();
        let path = target.path.clone();
        let url = match tokio::task::spawn_blocking(move || extractor.extract(&path)).await {
            Ok(Ok(Some(url))) => url,
            Ok(Ok(None)) => {
                info!("{}: {}", target.file_name, RmuError::MarkerNotFound);
                return UpdateOutcome::Failed(RmuError::MarkerNotFound.to_string());
            }
            Ok(Err(e)) => {
                warn!("{}: {}", target.file_name, e);
                return UpdateOutcome::Failed(e.to_string());
            }
            Err(e) => {
                warn!("{}: metadata reader task failed: {}", target.file_name, e);
                return UpdateOutcome::Failed(format!("metadata reader task failed: {}", e));
            }
        };
        debug!("{}: reference {}", target.file_name, url);
        let url = target.record_reference(&url).to_string();

        let repo = match RepositoryRef::from_url(&url) {
            Ok(repo) => repo,
            Err(e) => return UpdateOutcome::Failed(e.to_string()),
        };

        let download_url = match self.resolver.resolve(&repo, &target.file_name, cancel).await {
            Ok(download_url) => download_url,
            Err(RmuError::Cancelled) => return UpdateOutcome::Cancelled,
            Err(e) => {
                warn!("{}: {}", target.file_name, e);
                return UpdateOutcome::Failed(e.to_string());
            }
        };
        debug!("{}: candidate {}", target.file_name, download_url);

        self.installer
            .install_if_changed(&target.path, &download_url, dry_run, cancel)
            .await
    }
}

fn record<F>(
    result: Result<(PathBuf, UpdateOutcome), tokio::task::JoinError>,
    outcomes: &mut BTreeMap<PathBuf, UpdateOutcome>,
    on_done: &mut F,
) where
    F: FnMut(&Path, &UpdateOutcome),
{
    match result {
        Ok((path, outcome)) => {
            on_done(&path, &outcome);
            outcomes.insert(path, outcome);
        }
        Err(e) => warn!("Update task failed: {}", e),
    }
}
