//! Configuration for the parley client.
//!
//! Settings persist to disk as RON, tolerate missing and unknown fields, and
//! can be overridden from the command line via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    ClientConfig, Config, ConnectionConfig, DebugConfig, DedupSettings, EventsConfig,
    ReconnectPolicyConfig,
};
pub use error::ConfigError;

/// Directory name under the platform config dir.
pub const APP_DIR: &str = "parley";

/// Default config directory: `<platform config dir>/parley`, if the platform
/// has one.
pub fn default_config_dir() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}
