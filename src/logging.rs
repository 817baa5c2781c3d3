//! Diagnostic logging setup.
//!
//! Logs go to stderr so `--json` output on stdout stays machine readable.
//! `BAKEOFF_LOG` takes an `EnvFilter` directive and wins over `-v`.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "BAKEOFF_LOG";

/// Default filter directive for a verbosity count (`-v`, `-vv`).
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn build_filter(env_value: Option<&str>, verbose: u8) -> EnvFilter {
    let fallback = default_directive(verbose);
    env_value
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(verbose: u8) {
    let env_value = std::env::var(LOG_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(env_value.as_deref(), verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
