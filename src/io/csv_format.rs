//! CSV format handling for statement lines and reports
//!
//! This module centralizes all CSV format concerns, providing:
//! - Conversion from a raw statement record to a [`Transaction`]
//! - Summary and issues report serialization
//!
//! All functions are pure (no I/O beyond the supplied writer) for easy testing.

use crate::types::{StatementError, Transaction, TxStatus, TxType, UploadStatus};
use csv_async::StringRecord;
use serde::Serialize;
use std::io::Write;

/// Number of columns in a statement line:
/// timestamp, counterparty, type, amount, status, description
pub const STATEMENT_FIELDS: usize = 6;

/// Convert one raw statement record into a Transaction
///
/// Fields are trimmed before validation. Type and status are matched
/// case-insensitively; the amount must be a non-negative integer.
///
/// # Arguments
///
/// * `record` - The raw record as read from the statement
/// * `line` - 1-based record number, used for error context
///
/// # Returns
///
/// Result containing either:
/// - Ok(Transaction) - Successfully converted record
/// - Err(StatementError::ParseError) - Description of the conversion failure
pub fn parse_record(record: &StringRecord, line: u64) -> Result<Transaction, StatementError> {
    if record.len() != STATEMENT_FIELDS {
        return Err(StatementError::parse_error(
            line,
            format!("expected {} fields, got {}", STATEMENT_FIELDS, record.len()),
        ));
    }

    let field = |index: usize| record.get(index).unwrap_or_default().trim();

    let timestamp = field(0).parse::<i64>().map_err(|e| {
        StatementError::parse_error(line, format!("invalid timestamp '{}': {}", field(0), e))
    })?;

    let tx_type = TxType::parse(field(2)).ok_or_else(|| {
        StatementError::parse_error(line, format!("invalid tx type: {}", field(2)))
    })?;

    let amount = match field(3).parse::<i64>() {
        Ok(amount) if amount >= 0 => amount,
        Ok(_) => {
            return Err(StatementError::parse_error(
                line,
                format!("negative amount: {}", field(3)),
            ))
        }
        Err(e) => {
            return Err(StatementError::parse_error(
                line,
                format!("invalid amount '{}': {}", field(3), e),
            ))
        }
    };

    let status = TxStatus::parse(field(4)).ok_or_else(|| {
        StatementError::parse_error(line, format!("invalid tx status: {}", field(4)))
    })?;

    Ok(Transaction {
        timestamp,
        counterparty: field(1).to_string(),
        tx_type,
        amount,
        status,
        description: field(5).to_string(),
    })
}

/// One row of the summary report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub file: String,
    pub status: UploadStatus,
    pub balance: i64,
    pub total_lines: u64,
    pub parsed_ok: u64,
    pub parse_errors: u64,
    pub issues: usize,
}

/// One row of the issues report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueRow {
    pub file: String,
    pub timestamp: i64,
    pub counterparty: String,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub amount: i64,
    pub status: TxStatus,
    pub description: String,
}

impl IssueRow {
    pub fn new(file: &str, tx: &Transaction) -> Self {
        Self {
            file: file.to_string(),
            timestamp: tx.timestamp,
            counterparty: tx.counterparty.clone(),
            tx_type: tx.tx_type,
            amount: tx.amount,
            status: tx.status,
            description: tx.description.clone(),
        }
    }
}

/// Write the per-upload summary report
///
/// Rows are written in the order given, with header
/// `file,status,balance,total_lines,parsed_ok,parse_errors,issues`.
pub fn write_summary_csv(rows: &[SummaryRow], output: &mut dyn Write) -> Result<(), StatementError> {
    write_rows(
        rows,
        &["file", "status", "balance", "total_lines", "parsed_ok", "parse_errors", "issues"],
        output,
    )
}

/// Write the issues report
///
/// Rows are written in the order given, with header
/// `file,timestamp,counterparty,type,amount,status,description`.
pub fn write_issues_csv(rows: &[IssueRow], output: &mut dyn Write) -> Result<(), StatementError> {
    write_rows(
        rows,
        &["file", "timestamp", "counterparty", "type", "amount", "status", "description"],
        output,
    )
}

fn write_rows<T: Serialize>(
    rows: &[T],
    header: &[&str],
    output: &mut dyn Write,
) -> Result<(), StatementError> {
    // Header is written explicitly so that empty reports still carry one
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);

    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
