//! Benchmark suite for statement decoding and end-to-end processing
//!
//! Uses the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//! ```
//!
//! Statements are generated in memory with a mix of successful, failed and
//! pending credits and debits plus an occasional malformed line.

use futures::io::Cursor;
use statement_reconciler::io::{DecodedLine, StatementReader};
use statement_reconciler::{EngineConfig, Pipeline, ReportKind};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn main() {
    divan::main();
}

fn statement(lines: usize) -> String {
    (0..lines)
        .map(|n| match n % 10 {
            0 => format!("{}, ACME, DEBIT, {}, FAILED, declined\n", 1_700_000_000 + n, n),
            1 => format!("{}, ACME, CREDIT, {}, PENDING, incoming\n", 1_700_000_000 + n, n),
            2 => "malformed line\n".to_string(),
            k if k % 2 == 0 => format!("{}, ACME, CREDIT, {}, SUCCESS, invoice\n", 1_700_000_000 + n, n),
            _ => format!("{}, ACME, DEBIT, {}, SUCCESS, expense\n", 1_700_000_000 + n, n),
        })
        .collect()
}

/// Decode a statement line by line without touching the store
#[divan::bench(args = [100, 1_000, 100_000])]
fn decode_statement(bencher: divan::Bencher, lines: usize) {
    let content = statement(lines);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("Failed to build runtime");

    bencher.bench_local(|| {
        runtime.block_on(async {
            let mut reader = StatementReader::new(Cursor::new(content.as_bytes()));
            let mut parsed = 0usize;
            while let Some(line) = reader.next_line().await.expect("Decoding failed") {
                if matches!(line, DecodedLine::Parsed(_)) {
                    parsed += 1;
                }
            }
            divan::black_box(parsed)
        })
    });
}

/// Run the full pipeline over one statement and write the summary
#[divan::bench(args = [1_000, 100_000])]
fn pipeline_summary(bencher: divan::Bencher, lines: usize) {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(statement(lines).as_bytes())
        .expect("Failed to write statement");
    file.flush().expect("Failed to flush statement");
    let inputs = [PathBuf::from(file.path())];

    let mut config = EngineConfig::default();
    config.consumer.base_backoff_ms = 1;
    let pipeline = Pipeline::new(config);

    bencher.bench_local(|| {
        let mut output = Vec::new();
        pipeline
            .process(&inputs, &ReportKind::Summary, &mut output)
            .expect("Processing failed");
        divan::black_box(output)
    });
}
