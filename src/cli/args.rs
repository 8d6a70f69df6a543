use crate::config::EngineConfig;
use crate::pipeline::ReportKind;
use crate::types::{IssueFilter, StatementError};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Reconcile bank statements and report balances and issues
#[derive(Parser, Debug)]
#[command(name = "statement-reconciler")]
#[command(about = "Reconcile bank statements and report balances and issues", long_about = None)]
pub struct CliArgs {
    /// Statement CSV files to process
    #[arg(value_name = "INPUT", required = true, help = "Paths to statement CSV files")]
    pub inputs: Vec<PathBuf>,

    /// Optional TOML configuration file
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Maximum number of statements decoded concurrently
    #[arg(long = "runner-capacity", value_name = "COUNT")]
    pub runner_capacity: Option<usize>,

    /// Failed-transaction events buffered before uploads wait
    #[arg(long = "bus-capacity", value_name = "COUNT")]
    pub bus_capacity: Option<usize>,

    /// Number of reconciliation workers
    #[arg(long = "workers", value_name = "COUNT")]
    pub workers: Option<usize>,

    /// Reconciliation retries after the first attempt
    #[arg(long = "max-retries", value_name = "COUNT")]
    pub max_retries: Option<u32>,

    /// Delay before the first reconciliation retry, in milliseconds
    #[arg(long = "base-backoff-ms", value_name = "MILLIS")]
    pub base_backoff_ms: Option<u64>,

    /// Report written to stdout
    #[arg(
        long = "report",
        value_name = "REPORT",
        default_value = "summary",
        help = "Report to write: 'summary' (one row per file) or 'issues' (failed/pending transactions)"
    )]
    pub report: ReportType,

    /// Issue statuses to include in the issues report
    #[arg(long = "status", value_name = "LIST", help = "Comma-separated statuses: FAILED,PENDING")]
    pub status: Option<String>,

    /// Issue types to include in the issues report
    #[arg(long = "type", value_name = "LIST", help = "Comma-separated types: CREDIT,DEBIT")]
    pub tx_type: Option<String>,
}

/// Available reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportType {
    Summary,
    Issues,
}

impl CliArgs {
    /// Build the engine configuration
    ///
    /// Starts from the `--config` file when given (defaults otherwise) and
    /// applies every flag that was set on top of it.
    pub fn to_engine_config(&self) -> Result<EngineConfig, StatementError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };

        if let Some(capacity) = self.runner_capacity {
            config.runner_capacity = capacity;
        }
        if let Some(capacity) = self.bus_capacity {
            config.bus_capacity = capacity;
        }
        if let Some(workers) = self.workers {
            config.consumer.workers = workers;
        }
        if let Some(retries) = self.max_retries {
            config.consumer.max_retries = i64::from(retries);
        }
        if let Some(backoff) = self.base_backoff_ms {
            config.consumer.base_backoff_ms = backoff;
        }

        Ok(config)
    }

    /// Build the requested report, validating the issue filter
    pub fn to_report(&self) -> Result<ReportKind, StatementError> {
        match self.report {
            ReportType::Summary => Ok(ReportKind::Summary),
            ReportType::Issues => Ok(ReportKind::Issues(IssueFilter::parse(
                self.status.as_deref(),
                self.tx_type.as_deref(),
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TxStatus, TxType};
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[rstest]
    #[case::default_report(&["program", "a.csv"], ReportType::Summary)]
    #[case::explicit_summary(&["program", "--report", "summary", "a.csv"], ReportType::Summary)]
    #[case::explicit_issues(&["program", "--report", "issues", "a.csv"], ReportType::Issues)]
    fn test_report_parsing(#[case] args: &[&str], #[case] expected: ReportType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.report, expected);
    }

    #[test]
    fn test_multiple_inputs_keep_order() {
        let parsed = CliArgs::try_parse_from(["program", "b.csv", "a.csv"]).unwrap();
        assert_eq!(parsed.inputs, vec![PathBuf::from("b.csv"), PathBuf::from("a.csv")]);
    }

    #[rstest]
    #[case::no_flags(&["program", "a.csv"], 10, 512, 4, 3, 200)]
    #[case::runner_capacity(&["program", "--runner-capacity", "2", "a.csv"], 2, 512, 4, 3, 200)]
    #[case::all_flags(
        &["program", "--runner-capacity", "2", "--bus-capacity", "8", "--workers", "1",
          "--max-retries", "0", "--base-backoff-ms", "5", "a.csv"],
        2, 8, 1, 0, 5
    )]
    fn test_engine_config_from_flags(
        #[case] args: &[&str],
        #[case] runner_capacity: usize,
        #[case] bus_capacity: usize,
        #[case] workers: usize,
        #[case] max_retries: i64,
        #[case] base_backoff_ms: u64,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_engine_config().unwrap();

        assert_eq!(config.runner_capacity, runner_capacity);
        assert_eq!(config.bus_capacity, bus_capacity);
        assert_eq!(config.consumer.workers, workers);
        assert_eq!(config.consumer.max_retries, max_retries);
        assert_eq!(config.consumer.base_backoff_ms, base_backoff_ms);
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "runner_capacity = 3\nbus_capacity = 64\n").unwrap();
        file.flush().unwrap();
        let path = file.path().to_str().unwrap();

        let config = CliArgs::try_parse_from(["program", "--config", path, "--bus-capacity", "16", "a.csv"])
            .unwrap()
            .to_engine_config()
            .unwrap();

        assert_eq!(config.runner_capacity, 3);
        assert_eq!(config.bus_capacity, 16);
    }

    #[test]
    fn test_issue_filter_from_flags() {
        let parsed = CliArgs::try_parse_from([
            "program", "--report", "issues", "--status", "failed", "--type", "debit", "a.csv",
        ])
        .unwrap();

        assert_eq!(
            parsed.to_report().unwrap(),
            ReportKind::Issues(IssueFilter {
                statuses: vec![TxStatus::Failed],
                types: vec![TxType::Debit],
            })
        );
    }

    #[test]
    fn test_invalid_issue_filter() {
        let parsed =
            CliArgs::try_parse_from(["program", "--report", "issues", "--status", "success", "a.csv"])
                .unwrap();

        assert!(matches!(parsed.to_report(), Err(StatementError::InvalidInput { .. })));
    }

    // Error handling tests
    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::invalid_report(&["program", "--report", "ledger", "a.csv"])]
    #[case::negative_retries(&["program", "--max-retries", "-1", "a.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        let result = CliArgs::try_parse_from(args);
        assert!(result.is_err());
    }
}
