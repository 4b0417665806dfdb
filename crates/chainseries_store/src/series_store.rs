//! File-backed series store: one CSV file per source, replaced atomically on save

use crate::csv_codec::{read_series, write_series};
use chainseries_core::{is_valid_source_name, Series, SeriesStore, StoreError};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Series files under a data directory
#[derive(Debug, Clone)]
pub struct CsvSeriesStore {
    data_dir: PathBuf,
}

impl CsvSeriesStore {
    /// Open (creating if needed) the data directory
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File holding a source's series
    pub fn path_for(&self, source_name: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_source_name(source_name) {
            return Err(StoreError::StorageError(format!(
                "Invalid source name: {:?}",
                source_name
            )));
        }
        Ok(self.data_dir.join(format!("{}.csv", source_name)))
    }

    /// Names of all persisted series, sorted
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_source_name(stem) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

impl SeriesStore for CsvSeriesStore {
    fn load(&self, source_name: &str) -> Result<Series, StoreError> {
        let path = self.path_for(source_name)?;
        if !path.exists() {
            debug!("No persisted series for {} at {}", source_name, path.display());
            return Ok(Series::new());
        }
        let file = File::open(&path)?;
        read_series(BufReader::new(file), &path.display().to_string())
    }

    fn save(&self, source_name: &str, series: &Series) -> Result<(), StoreError> {
        let path = self.path_for(source_name)?;

        // Temp file in the same directory so the rename stays on one filesystem
        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            write_series(&mut writer, series)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(
            "Saved {} rows for {} to {}",
            series.len(),
            source_name,
            path.display()
        );
        Ok(())
    }
}
