//! Collection traversal
//!
//! A collection base directory holds one subdirectory per item, named by the
//! item identifier.

use crate::error::{TransferError, TransferResult};
use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Identifier of the item stored in `item_dir` (its directory name)
pub fn item_id(item_dir: &Path) -> TransferResult<String> {
    item_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            TransferError::InvalidItem(format!("{} has no directory name", item_dir.display()))
        })
}

/// Item directories directly below `base`, sorted by name
///
/// Plain files in the base directory are ignored. Links to directories count
/// as item directories.
pub fn item_directories(base: &Path) -> TransferResult<Vec<PathBuf>> {
    let mut items = Vec::new();

    for entry in fs::read_dir(base).map_err(|e| TransferError::io(base, e))? {
        let entry = entry.map_err(|e| TransferError::io(base, e))?;
        let path = entry.path();
        if path.is_dir() {
            items.push(path);
        } else {
            debug!("Skipping non-directory {}", path.display());
        }
    }

    items.sort();
    Ok(items)
}

/// De-duplicates collection base directories
///
/// Bases resolving to the same canonical path are traversed once; the first
/// occurrence wins. Bases that do not exist are skipped with a warning.
pub fn collection_roots(bases: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut roots = Vec::new();

    for base in bases {
        if !base.exists() {
            warn!("Collection directory does not exist: {}", base.display());
            continue;
        }

        let canonical = base.canonicalize().unwrap_or_else(|_| base.clone());
        if !seen.insert(canonical) {
            debug!("Skipping already traversed collection {}", base.display());
            continue;
        }

        roots.push(base.clone());
    }

    roots
}
