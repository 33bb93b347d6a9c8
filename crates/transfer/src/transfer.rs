//! Pre-ingest transfer orchestration
//!
//! For every item directory in a collection:
//!
//! - **never ingested**: if the readiness gates pass, copy the whole directory
//!   into the ingest area and record the ingest date;
//! - **already ingested**: copy every file modified after the watermark into
//!   the update areas, then record an update date, even when nothing changed.
//!
//! Change detection is by modification time only. A file counts as changed
//! when its modification time (of the link target, for links) is strictly
//! after the watermark.

use crate::collection::{collection_roots, item_directories, item_id};
use crate::copy::{copy_dir_resolved, copy_file_resolved};
use crate::error::{TransferError, TransferResult};
use crate::readiness::{ready_for_ingest, NotReadyReason, Readiness, ReadinessCriteria};
use crate::registry::{TransferRegistry, LOCK_FILE_NAME, REGISTRY_FILE_NAME};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use shelfmark_config::TransferConfig;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Bookkeeping files that never leave the item directory
const BOOKKEEPING_FILES: &[&str] = &[REGISTRY_FILE_NAME, LOCK_FILE_NAME];

/// What happened to one item during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ItemStatus {
    /// First ingest performed
    Ingested { files: usize },
    /// Update pass performed; both counts may be zero
    Updated {
        content_files: usize,
        metadata_files: usize,
    },
    /// Not yet eligible for ingest
    NotReady(NotReadyReason),
    /// Processing failed; the item is retried on the next run
    Failed(String),
}

/// Outcome for one item directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub item_id: String,
    pub path: PathBuf,
    pub status: ItemStatus,
}

impl ItemOutcome {
    /// Outcome for the directory at `path`, identified by its name
    pub fn new(path: &Path, status: ItemStatus) -> Self {
        let item_id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            item_id,
            path: path.to_path_buf(),
            status,
        }
    }
}

/// Files copied by one update pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub content_files: Vec<PathBuf>,
    pub metadata_files: Vec<PathBuf>,
}

/// Aggregated outcomes of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl TransferReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: ItemOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn extend(&mut self, other: TransferReport) {
        self.outcomes.extend(other.outcomes);
    }

    pub fn ingested(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Ingested { .. }))
    }

    pub fn updated(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Updated { .. }))
    }

    pub fn not_ready(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::NotReady(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Failed(_)))
    }

    /// Total number of files copied across all items
    pub fn files_copied(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                ItemStatus::Ingested { files } => files,
                ItemStatus::Updated {
                    content_files,
                    metadata_files,
                } => content_files + metadata_files,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, predicate: impl Fn(&ItemStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

/// Moves packaged items into the preservation pre-ingest area
pub struct PreIngestTransfer {
    config: TransferConfig,
    criteria: ReadinessCriteria,
}

impl PreIngestTransfer {
    pub fn new(config: TransferConfig) -> Self {
        let criteria = ReadinessCriteria::from_config(&config);
        Self { config, criteria }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Evaluates the readiness gates for one item directory
    pub fn ready_for_ingest(&self, item_dir: &Path, now: DateTime<Utc>) -> TransferResult<Readiness> {
        ready_for_ingest(item_dir, &self.criteria, now)
    }

    /// Transfers every collection once, skipping duplicate and missing bases
    ///
    /// A base that cannot be listed is reported as a failed outcome of its
    /// own and the remaining collections still run.
    pub fn run(&self, collections: &[PathBuf]) -> TransferReport {
        let mut report = TransferReport::new();

        for root in collection_roots(collections) {
            match self.run_collection(&root) {
                Ok(collection) => report.extend(collection),
                Err(e) => {
                    warn!("Skipping collection {}: {}", root.display(), e);
                    report.push(ItemOutcome::new(&root, ItemStatus::Failed(e.to_string())));
                }
            }
        }

        info!(
            "Transfer finished: {} ingested, {} updated, {} not ready, {} failed",
            report.ingested(),
            report.updated(),
            report.not_ready(),
            report.failed()
        );

        report
    }

    /// Processes every item directory below `base`, one at a time
    ///
    /// Only an unreadable base directory is an error; failing items are
    /// reported in the returned report and the batch carries on.
    pub fn run_collection(&self, base: &Path) -> TransferResult<TransferReport> {
        info!("Transferring collection {}", base.display());

        let mut report = TransferReport::new();
        for item_dir in item_directories(base)? {
            report.push(self.process_item(&item_dir));
        }

        Ok(report)
    }

    /// Processes one item directory using the current time
    pub fn process_item(&self, item_dir: &Path) -> ItemOutcome {
        self.process_item_at(item_dir, Utc::now())
    }

    /// Processes one item directory as of `now`
    ///
    /// Never fails: errors are logged and reported as [`ItemStatus::Failed`].
    pub fn process_item_at(&self, item_dir: &Path, now: DateTime<Utc>) -> ItemOutcome {
        let status = match self.try_process(item_dir, now) {
            Ok(status) => status,
            Err(e) => {
                warn!("Skipping {}: {}", item_dir.display(), e);
                ItemStatus::Failed(e.to_string())
            }
        };

        ItemOutcome::new(item_dir, status)
    }

    fn try_process(&self, item_dir: &Path, now: DateTime<Utc>) -> TransferResult<ItemStatus> {
        let registry = TransferRegistry::new(item_dir);

        // Readiness only reads, so items that are not ready are never locked
        if !registry.has_been_ingested() {
            if let Readiness::NotReady(reason) = self.ready_for_ingest(item_dir, now)? {
                info!("{} is not ready for ingest: {}", item_dir.display(), reason);
                return Ok(ItemStatus::NotReady(reason));
            }
        }

        let _lock = registry.lock()?;

        // Another run may have ingested the item since the check above
        if !registry.has_been_ingested() {
            let files = self.ingest_book(&registry, now)?;
            Ok(ItemStatus::Ingested { files: files.len() })
        } else {
            let summary = self.update_book(&registry, now)?;
            Ok(ItemStatus::Updated {
                content_files: summary.content_files.len(),
                metadata_files: summary.metadata_files.len(),
            })
        }
    }

    /// Copies the whole item directory into the ingest area and records the ingest
    ///
    /// Returns the destination paths of the copied files.
    pub fn ingest_book(
        &self,
        registry: &TransferRegistry,
        now: DateTime<Utc>,
    ) -> TransferResult<Vec<PathBuf>> {
        let item_dir = registry.item_dir();
        let id = item_id(item_dir)?;
        let dest = self.config.ingest_dir.join(&id);

        info!("Ingesting {} into {}", id, dest.display());
        let files = copy_dir_resolved(item_dir, &dest, BOOKKEEPING_FILES)?;
        registry.set_ingest_date(now)?;

        info!("Ingested {} ({} files)", id, files.len());
        Ok(files)
    }

    /// Copies files changed since the watermark and records the update
    ///
    /// The update date is recorded even when nothing changed so the next run
    /// starts from a later watermark.
    pub fn update_book(
        &self,
        registry: &TransferRegistry,
        now: DateTime<Utc>,
    ) -> TransferResult<UpdateSummary> {
        let item_dir = registry.item_dir();
        let id = item_id(item_dir)?;

        let watermark = registry.latest_update_date()?.ok_or_else(|| {
            error!(
                "{} is marked as ingested but its registry has no usable date",
                id
            );
            TransferError::Registry(format!(
                "no ingest or update date in {}",
                registry.log_path().display()
            ))
        })?;

        let mut summary = UpdateSummary::default();
        for (src, relative) in self.files_modified_after(item_dir, watermark)? {
            if self.is_content_file(&relative) {
                let dest = self.config.update_content_dir.join(&id).join(&relative);
                copy_file_resolved(&src, &dest)?;
                summary.content_files.push(dest);
            } else {
                let dest = self.config.update_metadata_dir.join(&id).join(&relative);
                copy_file_resolved(&src, &dest)?;
                summary.metadata_files.push(dest);
            }
        }

        // Never move the watermark backwards, even if the clock did
        registry.set_update_date(now.max(watermark))?;

        info!(
            "Updated {}: {} content and {} metadata files since {}",
            id,
            summary.content_files.len(),
            summary.metadata_files.len(),
            watermark
        );
        Ok(summary)
    }

    /// Files below `item_dir` modified strictly after `watermark`
    ///
    /// Returns `(source, path relative to item_dir)` pairs, sorted by path.
    fn files_modified_after(
        &self,
        item_dir: &Path,
        watermark: DateTime<Utc>,
    ) -> TransferResult<Vec<(PathBuf, PathBuf)>> {
        let mut changed = Vec::new();

        let walker = WalkDir::new(item_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !BOOKKEEPING_FILES
                        .iter()
                        .any(|name| entry.file_name() == std::ffi::OsStr::new(name))
            });

        for entry in walker {
            let entry = entry.map_err(|e| TransferError::Walk {
                path: item_dir.to_path_buf(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| TransferError::Walk {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
            let modified: DateTime<Utc> = metadata
                .modified()
                .map_err(|e| TransferError::io(entry.path(), e))?
                .into();

            if modified > watermark {
                let relative = entry
                    .path()
                    .strip_prefix(item_dir)
                    .map_err(|_| TransferError::InvalidItem(entry.path().display().to_string()))?
                    .to_path_buf();
                debug!("{} changed at {}", relative.display(), modified);
                changed.push((entry.path().to_path_buf(), relative));
            }
        }

        Ok(changed)
    }

    /// Content files carry a content format or characterisation suffix
    fn is_content_file(&self, relative: &Path) -> bool {
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        self.config
            .content_formats()
            .any(|format| name.ends_with(&format!(".{}", format)))
            || self
                .config
                .characterisation_suffixes
                .iter()
                .any(|suffix| name.ends_with(suffix.as_str()))
    }
}
