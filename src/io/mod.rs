//! I/O module
//!
//! Handles statement decoding and report output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, report serialization)
//! - `statement_reader` - Asynchronous line-by-line statement reader

pub mod csv_format;
pub mod statement_reader;

pub use csv_format::{
    parse_record, write_issues_csv, write_summary_csv, IssueRow, SummaryRow, STATEMENT_FIELDS,
};
pub use statement_reader::{DecodedLine, StatementReader};
