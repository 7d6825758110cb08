//! Command-line support for `bidsmosaic`: config file discovery and logging.

pub mod config;
pub mod logging;

pub use config::{CliConfig, ConfigError, CONFIG_FILE_NAME};
pub use logging::Verbosity;
