//! Loader for the delimited transactions file

use std::io::Read;
use std::path::Path;

use crate::config::DataConfig;
use crate::error::{Error, Result};
use crate::types::{TransactionRecord, FIELD_COUNT};

/// Reads transaction rows from a delimited text source
#[derive(Debug, Clone)]
pub struct RecordLoader {
    delimiter: u8,
    has_headers: bool,
}

impl Default for RecordLoader {
    fn default() -> Self {
        Self {
            delimiter: b'\t',
            has_headers: false,
        }
    }
}

impl RecordLoader {
    /// Create a loader for the given delimiter
    pub fn new(delimiter: u8, has_headers: bool) -> Self {
        Self {
            delimiter,
            has_headers,
        }
    }

    /// Create a loader from data configuration
    pub fn from_config(config: &DataConfig) -> Result<Self> {
        let delimiter = u8::try_from(config.delimiter).map_err(|_| {
            Error::Config(format!(
                "delimiter {:?} is not a single-byte character",
                config.delimiter
            ))
        })?;
        Ok(Self::new(delimiter, config.has_headers))
    }

    /// Load all records from a file
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<Vec<TransactionRecord>> {
        let path = path.as_ref();
        tracing::info!("Loading transactions from {}", path.display());

        let file = std::fs::File::open(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;

        self.load_reader(file)
    }

    /// Load all records from a reader. Any row with a missing or extra
    /// column aborts the load with a schema error.
    pub fn load_reader<R: Read>(&self, reader: R) -> Result<Vec<TransactionRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_headers)
            .flexible(true)
            .quoting(self.delimiter != b'\t')
            .from_reader(reader);

        if self.has_headers {
            let headers = reader
                .headers()
                .map_err(|e| Error::schema(format!("unreadable header row: {}", e)))?;
            if headers.len() != FIELD_COUNT {
                return Err(Error::schema(format!(
                    "header row has {} columns, expected {}",
                    headers.len(),
                    FIELD_COUNT
                )));
            }
        }

        let mut records = Vec::new();

        for (row, result) in reader.records().enumerate() {
            let line = result
                .as_ref()
                .ok()
                .and_then(|r| r.position())
                .map(|p| p.line())
                .unwrap_or(row as u64 + 1);

            let raw = result.map_err(|e| Error::schema(format!("row {}: {}", row + 1, e)))?;
            let fields: Vec<&str> = raw.iter().collect();

            let record = TransactionRecord::from_fields(&fields)
                .map_err(|e| Error::schema(format!("line {}: {}", line, e)))?;
            records.push(record);
        }

        if records.is_empty() {
            tracing::warn!("Data source contained no transaction rows");
        } else {
            tracing::info!("Loaded {} transaction records", records.len());
        }

        Ok(records)
    }
}
