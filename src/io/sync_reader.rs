//! Synchronous CSV reader over card registration files
//!
//! Provides a streaming iterator over the `name,email,card_number,card_type`
//! rows `ingest --cards` registers before any payment is published.
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual row errors are yielded as Err variants in the iterator
//! - Line numbers are included in error messages for debugging

use crate::io::csv_format::CardCsvRecord;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Synchronous CSV reader
///
/// Reads rows one at a time; memory usage does not grow with the file.
#[derive(Debug)]
pub struct CardFileReader {
    reader: csv::Reader<File>,
    line_num: usize,
}

impl CardFileReader {
    /// Create a new CardFileReader from a file path
    ///
    /// The CSV reader trims whitespace from all fields and uses an 8KB
    /// buffer.
    ///
    /// # Returns
    ///
    /// * `Ok(CardFileReader)` if file opened successfully
    /// * `Err(String)` if file could not be opened
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 0,
        })
    }
}

impl Iterator for CardFileReader {
    type Item = Result<CardCsvRecord, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CardCsvRecord>();
        let result = deserializer.next()?;
        self.line_num += 1;

        // +1 for the header row
        Some(result.map_err(|e| format!("Line {}: CSV parse error: {}", self.line_num + 1, e)))
    }
}
