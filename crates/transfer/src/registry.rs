//! Per-item transfer registry
//!
//! Every item directory carries a `transfers.log` recording when the item was
//! ingested and when each later update pass ran. One event per line:
//!
//! ```text
//! ingest date: 1700000000000
//! update date: 1700086400000
//! ```
//!
//! Timestamps are epoch milliseconds. The log is created lazily by the first
//! write and only ever grows.

use crate::error::{TransferError, TransferResult};
use crate::event_log::EventLog;
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::Serialize;
use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};

/// File name of the registry log inside an item directory
pub const REGISTRY_FILE_NAME: &str = "transfers.log";

/// File name of the per-item lock guarding the registry
pub const LOCK_FILE_NAME: &str = "transfers.log.lock";

const INGEST_PREFIX: &str = "ingest date: ";
const UPDATE_PREFIX: &str = "update date: ";

/// Kind of a recorded transfer event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Ingest,
    Update,
}

impl EventKind {
    fn prefix(self) -> &'static str {
        match self {
            EventKind::Ingest => INGEST_PREFIX,
            EventKind::Update => UPDATE_PREFIX,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Ingest => write!(f, "ingest"),
            EventKind::Update => write!(f, "update"),
        }
    }
}

/// One line of the registry log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferEvent {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl TransferEvent {
    pub fn ingest(timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::Ingest,
            timestamp,
        }
    }

    pub fn update(timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::Update,
            timestamp,
        }
    }

    /// Encodes the event as a log line, without terminator
    pub fn to_line(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.timestamp.timestamp_millis())
    }

    /// Decodes a log line; `None` for anything that isn't a well-formed event
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches('\r');

        let (kind, millis) = if let Some(rest) = line.strip_prefix(INGEST_PREFIX) {
            (EventKind::Ingest, rest)
        } else if let Some(rest) = line.strip_prefix(UPDATE_PREFIX) {
            (EventKind::Update, rest)
        } else {
            return None;
        };

        let millis: i64 = millis.trim().parse().ok()?;
        let timestamp = DateTime::from_timestamp_millis(millis)?;
        Some(Self { kind, timestamp })
    }

    fn parse_kind(line: &str, kind: EventKind) -> Option<DateTime<Utc>> {
        Self::parse(line)
            .filter(|event| event.kind == kind)
            .map(|event| event.timestamp)
    }
}

/// Transfer state derived from the registry log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransferState {
    /// No registry log exists
    NeverIngested,
    /// Ingested, no update pass recorded yet
    Ingested { ingest_date: DateTime<Utc> },
    /// Ingested and at least one update pass recorded
    IngestedAndUpdated {
        ingest_date: DateTime<Utc>,
        latest_update: DateTime<Utc>,
    },
    /// The log exists but holds no parsable ingest record
    Inconsistent,
}

impl TransferState {
    /// Whether the item counts as ingested for branching purposes
    pub fn is_ingested(&self) -> bool {
        !matches!(self, TransferState::NeverIngested)
    }
}

/// Durable record of transfer events for exactly one item directory
#[derive(Debug, Clone)]
pub struct TransferRegistry {
    item_dir: PathBuf,
    log: EventLog,
}

impl TransferRegistry {
    /// Creates a registry handle for `item_dir`; nothing is written yet
    pub fn new(item_dir: impl Into<PathBuf>) -> Self {
        let item_dir = item_dir.into();
        let log = EventLog::new(item_dir.join(REGISTRY_FILE_NAME));
        Self { item_dir, log }
    }

    pub fn item_dir(&self) -> &Path {
        &self.item_dir
    }

    /// Location of the registry log
    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// True iff the registry log exists on disk
    pub fn has_been_ingested(&self) -> bool {
        self.log.exists()
    }

    /// Appends an ingest record
    pub fn set_ingest_date(&self, date: DateTime<Utc>) -> TransferResult<()> {
        self.append(TransferEvent::ingest(date))
    }

    /// Appends an update record
    pub fn set_update_date(&self, date: DateTime<Utc>) -> TransferResult<()> {
        self.append(TransferEvent::update(date))
    }

    /// The most recently recorded ingest date
    ///
    /// `None` when the log is absent, or present without a parsable ingest
    /// record.
    pub fn ingest_date(&self) -> TransferResult<Option<DateTime<Utc>>> {
        let date = self
            .log
            .most_recent(|line| TransferEvent::parse_kind(line, EventKind::Ingest))?;

        if date.is_none() && self.log.exists() {
            warn!(
                "Registry {} exists but holds no ingest record",
                self.log_path().display()
            );
        }

        Ok(date)
    }

    /// The update watermark: the newest update record, else the ingest date
    pub fn latest_update_date(&self) -> TransferResult<Option<DateTime<Utc>>> {
        let Some(lines) = self.log.lines()? else {
            return Ok(None);
        };

        let newest = |kind| {
            lines
                .iter()
                .rev()
                .find_map(|line| TransferEvent::parse_kind(line, kind))
        };

        match newest(EventKind::Update) {
            Some(date) => Ok(Some(date)),
            None => {
                debug!(
                    "No update recorded in {}, falling back to ingest date",
                    self.log_path().display()
                );
                let ingest = newest(EventKind::Ingest);
                if ingest.is_none() {
                    warn!(
                        "Registry {} exists but holds no ingest record",
                        self.log_path().display()
                    );
                }
                Ok(ingest)
            }
        }
    }

    /// Every parsable event in the order it was recorded
    pub fn events(&self) -> TransferResult<Vec<TransferEvent>> {
        Ok(self
            .log
            .lines()?
            .unwrap_or_default()
            .iter()
            .filter_map(|line| TransferEvent::parse(line))
            .collect())
    }

    /// Derives the item's transfer state from the log
    pub fn state(&self) -> TransferResult<TransferState> {
        if !self.has_been_ingested() {
            return Ok(TransferState::NeverIngested);
        }

        let events = self.events()?;
        let newest = |kind| {
            events
                .iter()
                .rev()
                .find(|event| event.kind == kind)
                .map(|event| event.timestamp)
        };

        Ok(match (newest(EventKind::Ingest), newest(EventKind::Update)) {
            (None, _) => {
                error!(
                    "Registry {} exists without an ingest record",
                    self.log_path().display()
                );
                TransferState::Inconsistent
            }
            (Some(ingest_date), None) => TransferState::Ingested { ingest_date },
            (Some(ingest_date), Some(latest_update)) => TransferState::IngestedAndUpdated {
                ingest_date,
                latest_update,
            },
        })
    }

    /// Takes the exclusive per-item lock without blocking
    ///
    /// Fails with [`TransferError::Locked`] if another run holds it. The lock
    /// is released when the returned guard is dropped.
    pub fn lock(&self) -> TransferResult<RegistryLock> {
        let path = self.item_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| TransferError::io(&path, e))?;

        match file.try_lock() {
            Ok(()) => Ok(RegistryLock { _file: file, path }),
            Err(TryLockError::WouldBlock) => Err(TransferError::Locked { path }),
            Err(TryLockError::Error(e)) => Err(TransferError::io(&path, e)),
        }
    }

    fn append(&self, event: TransferEvent) -> TransferResult<()> {
        debug!(
            "Recording {} event {} for {}",
            event.kind,
            event.timestamp,
            self.item_dir.display()
        );
        self.log.append(&event.to_line())
    }
}

/// Guard holding an item's exclusive registry lock
#[derive(Debug)]
pub struct RegistryLock {
    _file: File,
    path: PathBuf,
}

impl RegistryLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}
