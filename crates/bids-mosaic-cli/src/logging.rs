//! Log verbosity and subscriber setup.

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Verbosity level for log output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    /// Progress and summary (default)
    #[default]
    Normal,
    /// Per-file details
    Verbose,
}

impl Verbosity {
    /// Create from CLI flags
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::Quiet => Level::WARN,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Install the global subscriber on stderr. `RUST_LOG`, when set, replaces
/// the level picked from the flags.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init(verbosity: Verbosity) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.level().as_str()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
