//! Tracing subscriber setup for the CLI.
//!
//! Diagnostics (per-route progress, failures, copies) go to stderr through
//! `tracing`; the summaries in [`crate::output`] go to stdout, so piping the
//! report elsewhere keeps the log readable.

use std::io::{self, IsTerminal};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directive for a verbosity level.
///
/// `quiet` wins over `verbose`: 0 = info, 1 = debug, 2+ = trace.
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "route_snapshot=error";
    }
    match verbose {
        0 => "route_snapshot=info",
        1 => "route_snapshot=debug",
        _ => "route_snapshot=trace",
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the directive picked from the flags. Terminals get
/// colored output; pipes and redirects get compact plain lines.
pub fn init_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_ansi(io::stderr().is_terminal())
        .compact()
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global subscriber can only be installed once per process, so only
    // the directive selection is tested here.

    #[test]
    fn verbosity_levels() {
        assert_eq!(default_directive(0, false), "route_snapshot=info");
        assert_eq!(default_directive(1, false), "route_snapshot=debug");
        assert_eq!(default_directive(2, false), "route_snapshot=trace");
        assert_eq!(default_directive(7, false), "route_snapshot=trace");
    }

    #[test]
    fn quiet_overrides_verbose() {
        assert_eq!(default_directive(2, true), "route_snapshot=error");
    }

    #[test]
    fn directives_parse() {
        for verbose in 0..3 {
            assert!(EnvFilter::try_new(default_directive(verbose, false)).is_ok());
        }
        assert!(EnvFilter::try_new(default_directive(0, true)).is_ok());
    }
}
