//! Command-line arguments for the parley client.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Parley chat client.
///
/// Flags override values loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "parley", about = "Realtime chat client")]
pub struct CliArgs {
    /// Server URL, e.g. ws://chat.example:7777.
    #[arg(long)]
    pub url: Option<String>,

    /// Connection path, e.g. /ws.
    #[arg(long)]
    pub path: Option<String>,

    /// Display name for outgoing messages.
    #[arg(long)]
    pub name: Option<String>,

    /// Reconnection attempts before giving up.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Log filter (error, warn, info, debug, trace or a full directive).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Config directory (overrides the platform default).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref url) = args.url {
            self.connection.base_url = url.clone();
        }
        if let Some(ref path) = args.path {
            self.connection.path = path.clone();
        }
        if let Some(ref name) = args.name {
            self.client.display_name = name.clone();
        }
        if let Some(attempts) = args.max_attempts {
            self.reconnect_policy.max_attempts = attempts;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
