//! I/O module
//!
//! Handles the CSV files of the `ingest` command.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, summary serialization)
//! - `async_reader` - Asynchronous CSV reader over payments, batch interface
//! - `sync_reader` - Synchronous CSV reader over card registrations, iterator interface

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    convert_csv_record, write_summaries_csv, CardCsvRecord, PaymentCsvRecord,
};
pub use sync_reader::CardFileReader;
