//! Asynchronous streaming reader for bank statements
//!
//! Provides a line-by-line interface over statement records. Each call to
//! [`StatementReader::next_line`] decodes exactly one record, so memory use
//! stays constant no matter how large the statement is.
//!
//! # Error Classes
//!
//! - A record that is well-formed CSV but not a valid statement line is
//!   returned as [`DecodedLine::Rejected`]; the caller counts it and moves on.
//! - A failure of the container itself (invalid UTF-8, I/O) is returned as
//!   `Err`; the caller must stop reading.
//!
//! # Architecture
//!
//! ```text
//! AsyncRead → csv-async reader → StatementReader → DecodedLine
//!                                       ↓
//!                               csv_format module
//!                               (parse_record)
//! ```

use crate::io::csv_format::parse_record;
use crate::types::{StatementError, Transaction};
use csv_async::{AsyncReaderBuilder, StringRecord};
use futures::io::AsyncRead;

/// Outcome of decoding one statement record
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedLine {
    Parsed(Transaction),
    Rejected(StatementError),
}

/// Asynchronous statement reader
///
/// Statements carry no header row. Fields are trimmed and records may have
/// any number of fields at the CSV level; the field count is validated per
/// line by [`parse_record`].
pub struct StatementReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncReader<R>,
    record: StringRecord,
    line: u64,
}

impl<R: AsyncRead + Unpin + Send> StatementReader<R> {
    /// Create a new StatementReader from an async reader
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_reader(reader);

        Self {
            csv_reader,
            record: StringRecord::new(),
            line: 0,
        }
    }

    /// Number of records consumed so far, including rejected ones
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Decode the next statement record
    ///
    /// # Returns
    ///
    /// * `Ok(Some(DecodedLine))` - One record was consumed
    /// * `Ok(None)` - The statement is exhausted
    /// * `Err(StatementError::DecodeError)` - The container is unreadable; the
    ///   failing record has been counted by [`line`](Self::line)
    pub async fn next_line(&mut self) -> Result<Option<DecodedLine>, StatementError> {
        match self.csv_reader.read_record(&mut self.record).await {
            Ok(true) => {
                self.line += 1;
                Ok(Some(match parse_record(&self.record, self.line) {
                    Ok(tx) => DecodedLine::Parsed(tx),
                    Err(e) => DecodedLine::Rejected(e),
                }))
            }
            Ok(false) => Ok(None),
            Err(e) => {
                self.line += 1;
                Err(StatementError::DecodeError {
                    line: Some(self.line),
                    message: e.to_string(),
                })
            }
        }
    }
}
