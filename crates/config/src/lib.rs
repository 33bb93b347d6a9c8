//! Shelfmark Configuration System
//!
//! Typed, validated configuration for the pre-ingest transfer tooling.
//! Each area of the system owns a section implementing the `ConfigSection` trait.
//!
//! # Architecture
//!
//! - **Trait-based**: Each section validates itself via `ConfigSection`
//! - **Graceful degradation**: Missing sections fall back to defaults
//! - **Atomic writes**: Config files are never left in a corrupted state
//! - **File-relative paths**: Relative directories resolve against the config file's directory
//! - **Read-only at runtime**: A loaded `Config` is never mutated by a transfer run
//!
//! # Example
//!
//! ```rust,no_run
//! use shelfmark_config::ConfigManager;
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load().expect("Failed to load config");
//!
//! println!("Ingest directory: {}", config.transfer.ingest_dir.display());
//! ```

mod error;
mod file;
mod manager;
mod validation;

// Config sections
pub mod app_config;
mod collections_config;
mod transfer_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::ConfigManager;
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use collections_config::CollectionsConfig;
pub use transfer_config::TransferConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Application-level settings
    pub app: AppConfig,

    /// Collection base directories, one per content class
    pub collections: CollectionsConfig,

    /// Pre-ingest transfer destinations and readiness criteria
    pub transfer: TransferConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.app.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.collections.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.transfer.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Checks that every configured directory exists on disk
    ///
    /// This is the precondition check run before a transfer batch; the
    /// transfer core itself assumes these directories are in place.
    pub fn check_directories(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = Vec::new();

        if let Some(ref dir) = self.collections.ebook_dir {
            results.push(Validator::is_directory(dir, "collections.ebook_dir"));
        }
        if let Some(ref dir) = self.collections.audio_dir {
            results.push(Validator::is_directory(dir, "collections.audio_dir"));
        }

        results.push(Validator::is_directory(
            &self.transfer.ingest_dir,
            "transfer.ingest_dir",
        ));
        results.push(Validator::is_directory(
            &self.transfer.update_content_dir,
            "transfer.update_content_dir",
        ));
        results.push(Validator::is_directory(
            &self.transfer.update_metadata_dir,
            "transfer.update_metadata_dir",
        ));

        Validator::collect_errors(results)
    }

    /// Anchors every relative directory at `base`
    pub fn resolve_relative_to(&mut self, base: &Path) {
        self.collections.resolve_relative_to(base);
        self.transfer.resolve_relative_to(base);
    }
}

/// Joins a relative, non-empty `path` onto `base`
pub(crate) fn anchor(path: &mut PathBuf, base: &Path) {
    if !path.as_os_str().is_empty() && path.is_relative() {
        *path = base.join(&*path);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            collections: CollectionsConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}
