//! The TOML config file on disk
//!
//! Relative directories in the file are resolved against the directory the
//! file lives in, so a config next to a pre-ingest tree can say
//! `ingest_dir = "preingest/ingest"` and mean the same thing from any working
//! directory. Writes replace the file atomically through a temporary file in
//! the same directory.

use crate::{Config, ConfigError, ConfigResult};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const HEADER: &str = "\
# Shelfmark pre-ingest transfer configuration
# Relative directories are resolved against the directory of this file.

";

pub(crate) struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Parses the file, or `None` if there is no file yet
    pub fn read(&self) -> ConfigResult<Option<Config>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if text.trim().is_empty() {
            return Err(ConfigError::Empty {
                path: self.path.clone(),
            });
        }

        let mut config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;

        if let Some(dir) = self.dir() {
            config.resolve_relative_to(dir);
        }

        Ok(Some(config))
    }

    /// Replaces the file with `config`, creating its directory if needed
    pub fn write(&self, config: &Config) -> ConfigResult<()> {
        let body = toml::to_string_pretty(config)?;
        let dir = self.dir().unwrap_or(Path::new("."));
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(write_err)?;

        let mut staged = NamedTempFile::new_in(dir).map_err(write_err)?;
        staged
            .write_all(HEADER.as_bytes())
            .and_then(|_| staged.write_all(body.as_bytes()))
            .and_then(|_| staged.as_file().sync_all())
            .map_err(write_err)?;
        staged.persist(&self.path).map_err(|e| write_err(e.error))?;

        log::info!("Wrote config file {}", self.path.display());
        Ok(())
    }

    fn dir(&self) -> Option<&Path> {
        self.path.parent().filter(|dir| !dir.as_os_str().is_empty())
    }
}
