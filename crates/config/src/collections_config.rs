//! Collection base directories

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where packaged item directories live, one base directory per content class
///
/// Both may point at the same directory; the transfer run traverses it once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CollectionsConfig {
    /// Base directory holding one subdirectory per ebook title
    pub ebook_dir: Option<PathBuf>,

    /// Base directory holding one subdirectory per audiobook title
    pub audio_dir: Option<PathBuf>,
}

impl CollectionsConfig {
    /// Configured base directories in traversal order (ebooks first)
    pub fn roots(&self) -> Vec<PathBuf> {
        self.ebook_dir
            .iter()
            .chain(self.audio_dir.iter())
            .cloned()
            .collect()
    }

    pub(crate) fn resolve_relative_to(&mut self, base: &Path) {
        for dir in [&mut self.ebook_dir, &mut self.audio_dir].into_iter().flatten() {
            crate::anchor(dir, base);
        }
    }
}

impl ConfigSection for CollectionsConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = Vec::new();

        if let Some(ref dir) = self.ebook_dir {
            results.push(Validator::path_not_empty(dir, "collections.ebook_dir"));
        }
        if let Some(ref dir) = self.audio_dir {
            results.push(Validator::path_not_empty(dir, "collections.audio_dir"));
        }

        Validator::collect_errors(results)
    }

    fn section_name(&self) -> &'static str {
        "collections"
    }
}
