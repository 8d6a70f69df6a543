//! End-to-end integration tests
//!
//! These tests validate the complete reconciliation pipeline using
//! predefined CSV test fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Processes it through the pipeline
//! 3. Generates the report CSV
//! 4. Compares actual output with expected.csv (summary) or
//!    expected_issues.csv (issues)
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Happy path scenario
//! - Malformed lines mixed with valid ones
//! - Statements made only of issues
//! - Empty statements
//! - Case-insensitive type and status values
//! - Unreadable (invalid UTF-8) statements

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use statement_reconciler::types::IssueFilter;
    use statement_reconciler::{EngineConfig, Pipeline, ReportKind, StatementError};
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::NamedTempFile;

    fn pipeline() -> Pipeline {
        let mut config = EngineConfig::default();
        config.runner_capacity = 2;
        config.worker_threads = 2;
        config.consumer.base_backoff_ms = 1;
        Pipeline::new(config)
    }

    /// Run the pipeline over `inputs` and return the report text
    fn run_report(inputs: &[PathBuf], report: &ReportKind) -> Result<String, StatementError> {
        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        pipeline().process(inputs, report, &mut temp_output)?;
        temp_output.flush().expect("Failed to flush temp file");

        Ok(fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e)))
    }

    /// Run a test fixture by processing input.csv and comparing with `expected_file`
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - Input or expected files cannot be read
    /// - Output doesn't match expected
    fn run_test_fixture(fixture_name: &str, report: ReportKind, expected_file: &str) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/{}", fixture_dir, expected_file);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );

        let actual_output = run_report(&[PathBuf::from(&input_path)], &report)
            .unwrap_or_else(|e| panic!("Failed to process statement: {}", e));

        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} ({})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, expected_file, actual_output, expected_output
        );
    }

    /// End-to-end test for all fixtures with both reports
    #[rstest]
    #[case("happy_path")]
    #[case("malformed_lines")]
    #[case("only_issues")]
    #[case("empty_statement")]
    #[case("mixed_case")]
    #[case("invalid_utf8")]
    fn test_fixtures(#[case] fixture: &str, #[values("summary", "issues")] report: &str) {
        match report {
            "summary" => run_test_fixture(fixture, ReportKind::Summary, "expected.csv"),
            _ => run_test_fixture(
                fixture,
                ReportKind::Issues(IssueFilter::default()),
                "expected_issues.csv",
            ),
        }
    }

    #[test]
    fn test_summary_rows_follow_input_order() {
        let inputs = [
            PathBuf::from("tests/fixtures/mixed_case/input.csv"),
            PathBuf::from("tests/fixtures/happy_path/input.csv"),
            PathBuf::from("tests/fixtures/invalid_utf8/input.csv"),
        ];

        let output = run_report(&inputs, &ReportKind::Summary).unwrap();

        assert_eq!(
            output,
            "file,status,balance,total_lines,parsed_ok,parse_errors,issues\n\
             input.csv,DONE,750,3,3,0,1\n\
             input.csv,DONE,50,4,4,0,2\n\
             input.csv,FAILED,100,2,1,1,0\n"
        );
    }

    #[rstest]
    #[case::pending_only(Some("pending"), None, &["1700000001", "1700000003"])]
    #[case::failed_only(Some("FAILED"), None, &["1700000002"])]
    #[case::debit_only(None, Some("debit"), &["1700000002", "1700000003"])]
    #[case::pending_credit(Some("pending"), Some("credit"), &["1700000001"])]
    fn test_filtered_issues_report(
        #[case] statuses: Option<&str>,
        #[case] types: Option<&str>,
        #[case] expected_timestamps: &[&str],
    ) {
        let filter = IssueFilter::parse(statuses, types).unwrap();
        let output = run_report(
            &[PathBuf::from("tests/fixtures/only_issues/input.csv")],
            &ReportKind::Issues(filter),
        )
        .unwrap();

        let timestamps: Vec<&str> = output
            .lines()
            .skip(1)
            .map(|line| line.split(',').nth(1).unwrap())
            .collect();
        assert_eq!(timestamps, expected_timestamps);
    }

    #[test]
    fn test_many_statements_with_small_runner() {
        let inputs: Vec<PathBuf> = (0..12)
            .map(|_| PathBuf::from("tests/fixtures/happy_path/input.csv"))
            .collect();

        let output = run_report(&inputs, &ReportKind::Summary).unwrap();

        let rows: Vec<&str> = output.lines().skip(1).collect();
        assert_eq!(rows.len(), 12);
        assert!(rows.iter().all(|row| *row == "input.csv,DONE,50,4,4,0,2"));
    }

    #[test]
    fn test_missing_input_fails_the_run() {
        let result = run_report(
            &[
                PathBuf::from("tests/fixtures/happy_path/input.csv"),
                PathBuf::from("tests/fixtures/nope/input.csv"),
            ],
            &ReportKind::Summary,
        );

        assert!(matches!(result, Err(StatementError::IoError { .. })));
    }
}
