//! Process-wide log setup
//!
//! Logs go to stderr so that stdout stays clean for `--porcelain`.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// How chatty the process should be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Silent,
    /// Number of `-v` flags given
    Level(u8),
}

impl Verbosity {
    pub fn from_flags(verbose: u8, quiet: bool, porcelain: bool) -> Self {
        if quiet || porcelain {
            Verbosity::Silent
        } else {
            Verbosity::Level(verbose)
        }
    }

    /// Default filter directive for this verbosity
    pub fn directive(&self) -> &'static str {
        match self {
            Verbosity::Silent => "off",
            Verbosity::Level(0) => "error",
            Verbosity::Level(1) => "warn",
            Verbosity::Level(2) => "info",
            Verbosity::Level(3) => "debug",
            Verbosity::Level(_) => "trace",
        }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence unless output is silenced.
pub fn init(verbosity: Verbosity) {
    let filter = match verbosity {
        Verbosity::Silent => EnvFilter::new("off"),
        level => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive())),
    };

    // A second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();
}
