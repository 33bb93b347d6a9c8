//! Ingest readiness gates
//!
//! An item is ready for its first ingest when it passes, in order:
//!
//! 1. the required-format gate (every required suffix is present),
//! 2. the content-age gate (content files are older than the retention windows),
//! 3. the publication-date gate (the publication date is old enough).
//!
//! Evaluation stops at the first failing gate.

use crate::collection::item_id;
use crate::error::{TransferError, TransferResult};
use crate::publication;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::debug;
use serde::Serialize;
use shelfmark_config::TransferConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Criteria an item must meet before its first ingest
#[derive(Debug, Clone)]
pub struct ReadinessCriteria {
    /// Suffixes of which at least one file must exist
    pub required_formats: Vec<String>,
    /// Formats probed as `<item-id>.<format>` by the age gate
    pub content_formats: Vec<String>,
    /// `None` disables the creation-time check
    pub retain_create_date: Option<Duration>,
    /// `None` disables the modification-time check
    pub retain_modify_date: Option<Duration>,
    /// `None` disables the publication-date gate
    pub retain_publication_date: Option<Duration>,
    pub publication_date_element: String,
    pub publication_date_format: String,
}

impl ReadinessCriteria {
    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            required_formats: config.required_formats.clone(),
            content_formats: config.content_formats().map(str::to_string).collect(),
            retain_create_date: retention_window(config.retain_create_date_ms),
            retain_modify_date: retention_window(config.retain_modify_date_ms),
            retain_publication_date: retention_window(config.retain_publication_date_ms),
            publication_date_element: config.publication_date_element.clone(),
            publication_date_format: config.publication_date_format.clone(),
        }
    }
}

/// Converts a millisecond window to a duration; zero or less disables it
fn retention_window(millis: i64) -> Option<Duration> {
    (millis > 0).then(|| Duration::milliseconds(millis))
}

/// The instant `window` before `now`, saturating at the earliest representable time
fn cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Which file timestamp failed the age gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTimestamp {
    Created,
    Modified,
}

/// Why an item is not yet ready for ingest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotReadyReason {
    /// No file ends with this required suffix
    MissingFormat(String),
    /// A content file is younger than its retention window
    ContentTooNew {
        path: PathBuf,
        timestamp: FileTimestamp,
    },
    /// The publication date could not be read
    PublicationDateUnavailable(String),
    /// The publication date falls inside the retention window
    PublicationTooRecent {
        published: NaiveDate,
        earliest: DateTime<Utc>,
    },
}

impl std::fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotReadyReason::MissingFormat(suffix) => {
                write!(f, "no file ending with '{}'", suffix)
            }
            NotReadyReason::ContentTooNew { path, timestamp } => {
                let which = match timestamp {
                    FileTimestamp::Created => "creation",
                    FileTimestamp::Modified => "modification",
                };
                write!(
                    f,
                    "{} time of {} is inside the retention window",
                    which,
                    path.display()
                )
            }
            NotReadyReason::PublicationDateUnavailable(detail) => {
                write!(f, "publication date unavailable: {}", detail)
            }
            NotReadyReason::PublicationTooRecent { published, earliest } => write!(
                f,
                "published {} which is after {}",
                published,
                earliest.date_naive()
            ),
        }
    }
}

/// Outcome of evaluating the readiness gates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady(NotReadyReason),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// Evaluates the readiness gates for `item_dir` at time `now`
///
/// Unreadable directories and broken content links are errors. A missing or
/// malformed publication date is not an error but a `NotReady` verdict.
pub fn ready_for_ingest(
    item_dir: &Path,
    criteria: &ReadinessCriteria,
    now: DateTime<Utc>,
) -> TransferResult<Readiness> {
    let id = item_id(item_dir)?;

    if let Some(missing) = missing_required_format(item_dir, &criteria.required_formats)? {
        debug!("{}: missing required format '{}'", id, missing);
        return Ok(Readiness::NotReady(NotReadyReason::MissingFormat(missing)));
    }

    if let Some(reason) = content_too_new(item_dir, &id, criteria, now)? {
        debug!("{}: {}", id, reason);
        return Ok(Readiness::NotReady(reason));
    }

    if let Some(window) = criteria.retain_publication_date {
        if let Some(reason) = publication_too_recent(item_dir, &id, criteria, window, now) {
            debug!("{}: {}", id, reason);
            return Ok(Readiness::NotReady(reason));
        }
    }

    Ok(Readiness::Ready)
}

/// First required suffix that no file name in the directory ends with
fn missing_required_format(
    item_dir: &Path,
    required: &[String],
) -> TransferResult<Option<String>> {
    if required.is_empty() {
        return Ok(None);
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(item_dir).map_err(|e| TransferError::io(item_dir, e))? {
        let entry = entry.map_err(|e| TransferError::io(item_dir, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }

    Ok(required
        .iter()
        .find(|suffix| !names.iter().any(|name| name.ends_with(suffix.as_str())))
        .cloned())
}

fn content_too_new(
    item_dir: &Path,
    id: &str,
    criteria: &ReadinessCriteria,
    now: DateTime<Utc>,
) -> TransferResult<Option<NotReadyReason>> {
    if criteria.retain_create_date.is_none() && criteria.retain_modify_date.is_none() {
        return Ok(None);
    }

    for format in &criteria.content_formats {
        let path = item_dir.join(format!("{}.{}", id, format));
        let Some(resolved) = resolve_content_file(&path)? else {
            continue;
        };

        let metadata = fs::metadata(&resolved).map_err(|e| TransferError::io(&resolved, e))?;
        let modified: DateTime<Utc> = metadata
            .modified()
            .map_err(|e| TransferError::io(&resolved, e))?
            .into();

        if let Some(window) = criteria.retain_create_date {
            // Not every filesystem records a birth time
            let created: DateTime<Utc> = metadata
                .created()
                .map(DateTime::from)
                .unwrap_or(modified);
            if created >= cutoff(now, window) {
                return Ok(Some(NotReadyReason::ContentTooNew {
                    path: resolved,
                    timestamp: FileTimestamp::Created,
                }));
            }
        }

        if let Some(window) = criteria.retain_modify_date {
            if modified >= cutoff(now, window) {
                return Ok(Some(NotReadyReason::ContentTooNew {
                    path: resolved,
                    timestamp: FileTimestamp::Modified,
                }));
            }
        }
    }

    Ok(None)
}

/// Resolves a content file to the file holding its bytes
///
/// Returns `None` if nothing exists at `path`. A symbolic link resolves to
/// its final target; a dangling link is an error.
pub fn resolve_content_file(path: &Path) -> TransferResult<Option<PathBuf>> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(TransferError::io(path, e)),
    };

    if metadata.file_type().is_symlink() {
        let target = fs::canonicalize(path).map_err(|e| TransferError::io(path, e))?;
        debug!("{} links to {}", path.display(), target.display());
        Ok(Some(target))
    } else {
        Ok(Some(path.to_path_buf()))
    }
}

fn publication_too_recent(
    item_dir: &Path,
    id: &str,
    criteria: &ReadinessCriteria,
    window: Duration,
    now: DateTime<Utc>,
) -> Option<NotReadyReason> {
    let metadata_path = item_dir.join(format!("{}.xml", id));
    let published = match publication::publication_date(
        &metadata_path,
        &criteria.publication_date_element,
        &criteria.publication_date_format,
    ) {
        Ok(date) => date,
        Err(e) => return Some(NotReadyReason::PublicationDateUnavailable(e.to_string())),
    };

    let earliest = cutoff(now, window);
    let published_at = published.and_time(chrono::NaiveTime::MIN).and_utc();
    if published_at > earliest {
        Some(NotReadyReason::PublicationTooRecent { published, earliest })
    } else {
        None
    }
}
