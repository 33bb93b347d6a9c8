//! Pre-ingest transfer configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Destinations and readiness criteria for the pre-ingest transfer
///
/// Retention windows are durations in milliseconds. A window of zero or
/// less disables the corresponding readiness check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    /// Receives a full copy of each item directory on first ingest
    pub ingest_dir: PathBuf,

    /// Receives `<item-id>/` directories with changed content files
    pub update_content_dir: PathBuf,

    /// Receives `<item-id>/` directories with changed metadata files
    pub update_metadata_dir: PathBuf,

    /// Minimum age of a content file's creation time before ingest
    pub retain_create_date_ms: i64,

    /// Minimum age of a content file's modification time before ingest
    pub retain_modify_date_ms: i64,

    /// Minimum age of the publication date before ingest
    pub retain_publication_date_ms: i64,

    /// Suffixes of which at least one file must exist in the item directory
    pub required_formats: Vec<String>,

    /// Ebook content formats, without the leading dot
    pub ebook_formats: Vec<String>,

    /// Audiobook content formats, without the leading dot
    pub audio_formats: Vec<String>,

    /// Characterisation output suffixes that count as content during updates
    pub characterisation_suffixes: Vec<String>,

    /// Element in the publisher metadata carrying the publication date
    pub publication_date_element: String,

    /// chrono format string of the publication date
    pub publication_date_format: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            ingest_dir: PathBuf::from("preingest/ingest"),
            update_content_dir: PathBuf::from("preingest/update-content"),
            update_metadata_dir: PathBuf::from("preingest/update-metadata"),
            retain_create_date_ms: 0,
            retain_modify_date_ms: 0,
            retain_publication_date_ms: 0,
            required_formats: Vec::new(),
            ebook_formats: vec!["epub".to_string(), "pdf".to_string()],
            audio_formats: vec!["mp3".to_string()],
            characterisation_suffixes: Vec::new(),
            publication_date_element: "PublicationDate".to_string(),
            publication_date_format: "%d-%m-%Y".to_string(),
        }
    }
}

impl TransferConfig {
    /// Ebook and audio formats together, ebooks first
    pub fn content_formats(&self) -> impl Iterator<Item = &str> {
        self.ebook_formats
            .iter()
            .chain(self.audio_formats.iter())
            .map(String::as_str)
    }

    pub(crate) fn resolve_relative_to(&mut self, base: &Path) {
        crate::anchor(&mut self.ingest_dir, base);
        crate::anchor(&mut self.update_content_dir, base);
        crate::anchor(&mut self.update_metadata_dir, base);
    }
}

impl ConfigSection for TransferConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::path_not_empty(&self.ingest_dir, "transfer.ingest_dir"),
            Validator::path_not_empty(&self.update_content_dir, "transfer.update_content_dir"),
            Validator::path_not_empty(&self.update_metadata_dir, "transfer.update_metadata_dir"),
            Validator::not_empty(
                &self.publication_date_element,
                "transfer.publication_date_element",
            ),
            Validator::not_empty(
                &self.publication_date_format,
                "transfer.publication_date_format",
            ),
        ];

        results.extend(Validator::entries_not_empty(
            &self.required_formats,
            "transfer.required_formats",
        ));
        results.extend(Validator::entries_not_empty(
            &self.ebook_formats,
            "transfer.ebook_formats",
        ));
        results.extend(Validator::entries_not_empty(
            &self.audio_formats,
            "transfer.audio_formats",
        ));
        results.extend(Validator::entries_not_empty(
            &self.characterisation_suffixes,
            "transfer.characterisation_suffixes",
        ));

        for (i, format) in self.content_formats().enumerate() {
            if format.starts_with('.') {
                results.push(Err(ValidationError::with_value(
                    format!("transfer.content_formats[{}]", i),
                    "must not start with a dot",
                    format,
                )));
            }
        }

        Validator::collect_errors(results)
    }

    fn section_name(&self) -> &'static str {
        "transfer"
    }
}
