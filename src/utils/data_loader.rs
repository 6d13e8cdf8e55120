//! Data loading utilities
//!
//! Raw transaction tables are read with every column as a string so that
//! placeholder tokens survive until the schema normalizer sees them.

use crate::error::{Result, SalvageError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Loader for raw transaction tables
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Read every column as a string instead of inferring a schema
    raw_strings: bool,
    /// Field separator for delimited text
    delimiter: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a loader that keeps raw values as strings
    pub fn new() -> Self {
        Self {
            raw_strings: true,
            delimiter: b',',
        }
    }

    /// Let polars infer column types instead of reading raw strings
    pub fn with_schema_inference(mut self) -> Self {
        self.raw_strings = false;
        self
    }

    /// Set the field separator
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load a delimited text file
    pub fn load_csv(&self, path: &str) -> Result<DataFrame> {
        let file = File::open(path)?;

        let infer_length = if self.raw_strings { Some(0) } else { Some(100) };
        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(infer_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        tracing::debug!(path, rows = df.height(), cols = df.width(), "Loaded CSV");
        Ok(df)
    }

    /// Load a newline-delimited JSON file
    pub fn load_json_lines(&self, path: &str) -> Result<DataFrame> {
        let file = File::open(path)?;

        let df = JsonReader::new(file)
            .with_json_format(JsonFormat::JsonLines)
            .finish()?;

        tracing::debug!(path, rows = df.height(), cols = df.width(), "Loaded JSON lines");
        Ok(df)
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: &str) -> Result<DataFrame> {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "tsv" => self.clone().with_delimiter(b'\t').load_csv(path),
            "json" | "jsonl" | "ndjson" => self.load_json_lines(path),
            _ => self.load_csv(path),
        }
    }
}

/// Fail with the first column of `required` that `df` lacks
pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for name in required {
        if df.column(name).is_err() {
            return Err(SalvageError::ColumnNotFound((*name).to_string()));
        }
    }
    Ok(())
}

/// Save DataFrames to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV with a header row
    pub fn save_csv(df: &mut DataFrame, path: &str) -> Result<()> {
        let mut file = File::create(path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)?;
        Ok(())
    }

    /// Save to newline-delimited JSON
    pub fn save_json_lines(df: &mut DataFrame, path: &str) -> Result<()> {
        let mut file = File::create(path)?;

        JsonWriter::new(&mut file)
            .with_json_format(JsonFormat::JsonLines)
            .finish(df)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "item,quantity,total").unwrap();
        writeln!(file, "Coffee,2,4.0").unwrap();
        writeln!(file, "Tea,ERROR,3.0").unwrap();
        writeln!(file, "UNKNOWN,1,").unwrap();
        file
    }

    #[test]
    fn test_load_csv_keeps_raw_strings() {
        let file = create_test_csv();
        let loader = DataLoader::new();

        let df = loader.load_csv(file.path().to_str().unwrap()).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("quantity").unwrap().dtype(), &DataType::String);
        let quantity = df.column("quantity").unwrap().str().unwrap().clone();
        assert_eq!(quantity.get(1), Some("ERROR"));
    }

    #[test]
    fn test_require_columns() {
        let file = create_test_csv();
        let df = DataLoader::new()
            .load_csv(file.path().to_str().unwrap())
            .unwrap();

        assert!(require_columns(&df, &["item", "total"]).is_ok());
        let err = require_columns(&df, &["item", "unit_price"]).unwrap_err();
        assert!(matches!(err, SalvageError::ColumnNotFound(name) if name == "unit_price"));
    }

    #[test]
    fn test_save_csv_round_trip() {
        let mut df = DataFrame::new(vec![
            Column::new("a".into(), &[1, 2, 3]),
            Column::new("b".into(), &[4, 5, 6]),
        ])
        .unwrap();

        let file = NamedTempFile::new().unwrap();
        DataSaver::save_csv(&mut df, file.path().to_str().unwrap()).unwrap();

        let loaded = DataLoader::new()
            .load_csv(file.path().to_str().unwrap())
            .unwrap();

        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.width(), 2);
    }
}
