//! Tracing setup for the binary

use std::any::Any;
use std::backtrace::Backtrace;

use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter directives
pub const LOG_ENV: &str = "STATEMENT_LOG";

/// Initialize tracing with the `STATEMENT_LOG` environment variable.
///
/// Defaults to "info" if `STATEMENT_LOG` is not set. Logs go to stderr so
/// that stdout carries only the report. Panics are routed through
/// [`install_panic_hook`].
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    install_panic_hook();
}

/// Log every panic with its location and a captured stack trace
///
/// Replaces the default hook, which would print the same panic a second
/// time to stderr.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        error!(
            panic = %panic_message(info.payload()),
            location = %location,
            backtrace = %Backtrace::force_capture(),
            "panic captured"
        );
    }));
}

/// Human-readable text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
