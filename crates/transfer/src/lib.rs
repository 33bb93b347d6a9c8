//! Shelfmark Pre-Ingest Transfer
//!
//! Moves packaged ebook and audiobook items into a preservation repository's
//! pre-ingest area. Each item directory keeps its own append-only transfer
//! registry, so repeated runs never re-transfer unchanged files and never
//! lose track of what has already moved.
//!
//! # Example
//!
//! ```rust,no_run
//! use shelfmark_config::TransferConfig;
//! use shelfmark_transfer::PreIngestTransfer;
//! use std::path::PathBuf;
//!
//! let transfer = PreIngestTransfer::new(TransferConfig::default());
//! let report = transfer.run(&[PathBuf::from("/srv/ebooks"), PathBuf::from("/srv/audio")]);
//! println!("{} ingested, {} failed", report.ingested(), report.failed());
//! ```

pub mod collection;
pub mod copy;
pub mod error;
pub mod event_log;
pub mod publication;
pub mod readiness;
pub mod registry;
pub mod transfer;

pub use collection::{collection_roots, item_directories, item_id};
pub use error::{TransferError, TransferResult};
pub use event_log::EventLog;
pub use readiness::{ready_for_ingest, NotReadyReason, Readiness, ReadinessCriteria};
pub use registry::{
    EventKind, RegistryLock, TransferEvent, TransferRegistry, TransferState, LOCK_FILE_NAME,
    REGISTRY_FILE_NAME,
};
pub use transfer::{ItemOutcome, ItemStatus, PreIngestTransfer, TransferReport, UpdateSummary};
