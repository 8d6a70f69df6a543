//! Statement Reconciler CLI
//!
//! Command-line interface for reconciling bank statements from CSV files.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- statement.csv > summary.csv
//! cargo run -- --report issues --status failed jan.csv feb.csv > issues.csv
//! cargo run -- --config reconciler.toml --workers 8 statements/*.csv
//! ```
//!
//! Every input is processed in the background, failed transactions are
//! reconciled, and the requested report is written to stdout. Logs go to
//! stderr; set `STATEMENT_LOG` (e.g. `debug`) to change verbosity.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (bad configuration, file not found, file not readable, etc.)

use statement_reconciler::{cli, logging, Pipeline};
use std::process;
use tracing::error;

fn main() {
    logging::init_tracing();

    // Parse command-line arguments using clap
    let args = cli::parse_args();

    let result = args.to_engine_config().and_then(|config| {
        let report = args.to_report()?;
        let mut output = std::io::stdout();
        Pipeline::new(config).process(&args.inputs, &report, &mut output)
    });

    if let Err(e) = result {
        error!(error = %e, code = %e.code(), "statement reconciliation failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
