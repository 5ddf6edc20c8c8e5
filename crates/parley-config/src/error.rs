//! Errors raised while loading, saving or validating `config.ron`.

use parley_net::NetError;

/// Everything that can go wrong between the config file and a usable
/// [`SyncConfig`](parley_net::SyncConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `config.ron` exists but could not be read.
    #[error("failed to read config: {0}")]
    ReadError(#[source] std::io::Error),

    /// The config directory or file could not be written.
    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    /// The file is not valid RON for [`Config`](crate::Config).
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// The config could not be rendered as RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),

    /// A connection URL in the config does not parse.
    #[error("invalid endpoint in config: {0}")]
    Endpoint(#[from] NetError),

    /// A numeric setting is out of range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
