//! CSV training manifest.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::classify::{Terrain, Weather};
use crate::error::{LabelError, Result};

pub const MANIFEST_HEADER: [&str; 3] = ["filepath", "weather", "terrain"];

/// One labeled training sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledSample {
    /// Path of the reflectance tile
    pub filepath: PathBuf,
    pub weather: Weather,
    pub terrain: Terrain,
}

/// Writes samples as `filepath,weather,terrain` rows.
///
/// The header is written on construction so an empty run still yields a
/// valid manifest.
pub struct ManifestWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl ManifestWriter<File> {
    /// Create (or truncate) the manifest file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LabelError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| LabelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_writer(file)
    }
}

impl<W: Write> ManifestWriter<W> {
    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(MANIFEST_HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    /// Serialize one sample as a row. Paths must be valid UTF-8.
    pub fn append(&mut self, sample: &LabeledSample) -> Result<()> {
        self.writer.serialize(sample)?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far (header excluded).
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| LabelError::Manifest(e.into()))
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| LabelError::Manifest(e.into_error().into()))
    }
}
