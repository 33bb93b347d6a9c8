//! Link-resolving copies
//!
//! Destinations always receive the bytes a symbolic link points at, never
//! the link itself.

use crate::error::{TransferError, TransferResult};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Copies one file to `dest`, creating parent directories
///
/// A symbolic link at `src` is followed. Returns the number of bytes copied.
pub fn copy_file_resolved(src: &Path, dest: &Path) -> TransferResult<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| TransferError::io(parent, e))?;
    }

    // Replace rather than write into: a link would be written through and a
    // read-only copy from an earlier pass would refuse the write
    if fs::symlink_metadata(dest).is_ok_and(|m| !m.is_dir()) {
        fs::remove_file(dest).map_err(|e| TransferError::io(dest, e))?;
    }

    let bytes = fs::copy(src, dest).map_err(|e| TransferError::io(src, e))?;
    debug!("Copied {} -> {} ({} bytes)", src.display(), dest.display(), bytes);
    Ok(bytes)
}

/// Recursively copies `src` into `dest`, following symbolic links
///
/// Entries whose file name is listed in `skip` are left out, along with
/// everything below them. Returns the destination paths of copied files.
pub fn copy_dir_resolved(src: &Path, dest: &Path, skip: &[&str]) -> TransferResult<Vec<PathBuf>> {
    let mut copied = Vec::new();

    let walker = WalkDir::new(src)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !skip
                    .iter()
                    .any(|name| entry.file_name() == std::ffi::OsStr::new(name))
        });

    for entry in walker {
        let entry = entry.map_err(|e| TransferError::Walk {
            path: src.to_path_buf(),
            source: e,
        })?;

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| TransferError::InvalidItem(entry.path().display().to_string()))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| TransferError::io(&target, e))?;
        } else {
            copy_file_resolved(entry.path(), &target)?;
            copied.push(target);
        }
    }

    Ok(copied)
}
