//! Configuration system for the relight viewer.
//!
//! Settings persist to disk as a RON file and can be overridden from the
//! command line. Unknown fields are ignored and missing ones fall back to
//! defaults, so old config files keep loading after upgrades.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, FetchConfig, SourceConfig, ViewConfig, ViewerConfig};
pub use error::ConfigError;
