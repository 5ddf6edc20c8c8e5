//! Error taxonomy for the sync layer.
//!
//! Handshake and close failures are recovered by the reconnection scheduler and
//! only surface as `"error"` events. [`NetError::SendWhileDisconnected`] is
//! returned synchronously to the caller, and [`NetError::ReconnectExhausted`]
//! is the single terminal condition.

use serde::Serialize;

/// Errors produced by the connection manager, transport and codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetError {
    /// The handshake did not complete within the per-attempt timeout.
    #[error("handshake with {endpoint} timed out after {timeout_ms} ms")]
    HandshakeTimeout {
        /// Target that was being contacted.
        endpoint: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The peer refused or failed the handshake.
    #[error("handshake with {endpoint} refused: {reason}")]
    HandshakeRefused {
        /// Target that was being contacted.
        endpoint: String,
        /// Transport-level reason.
        reason: String,
    },

    /// The connection closed abnormally.
    #[error("connection closed uncleanly (code {code}): {reason}")]
    UncleanClose {
        /// Close code reported by the transport.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },

    /// An inbound frame could not be decoded.
    #[error("failed to decode frame: {reason}")]
    ProtocolDecode {
        /// Decoder message.
        reason: String,
    },

    /// An outbound frame could not be encoded.
    #[error("failed to encode frame: {reason}")]
    Encode {
        /// Encoder message.
        reason: String,
    },

    /// `send` was called while the link was not connected.
    #[error("cannot send '{event}': not connected")]
    SendWhileDisconnected {
        /// Event type the caller attempted to send.
        event: String,
    },

    /// Automatic reconnection gave up.
    #[error("reconnection abandoned after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of attempts that were made.
        attempts: u32,
    },

    /// Endpoint probing found no candidate accepting connections.
    #[error("no reachable endpoint among {tried} candidates")]
    NoReachableEndpoint {
        /// Number of candidates probed.
        tried: usize,
    },

    /// A candidate address could not be parsed.
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint {
        /// Offending input.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// An established transport failed.
    #[error("transport error: {reason}")]
    Transport {
        /// Transport message.
        reason: String,
    },

    /// A manual `disconnect()` superseded the pending `connect()`.
    #[error("connect cancelled by disconnect")]
    Cancelled,

    /// The client driver has shut down.
    #[error("sync client has shut down")]
    Shutdown,
}

impl NetError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            NetError::HandshakeTimeout { .. } => "handshake_timeout",
            NetError::HandshakeRefused { .. } => "handshake_refused",
            NetError::UncleanClose { .. } => "unclean_close",
            NetError::ProtocolDecode { .. } => "protocol_decode",
            NetError::Encode { .. } => "encode",
            NetError::SendWhileDisconnected { .. } => "send_while_disconnected",
            NetError::ReconnectExhausted { .. } => "reconnect_exhausted",
            NetError::NoReachableEndpoint { .. } => "no_reachable_endpoint",
            NetError::InvalidEndpoint { .. } => "invalid_endpoint",
            NetError::Transport { .. } => "transport",
            NetError::Cancelled => "cancelled",
            NetError::Shutdown => "shutdown",
        }
    }

    /// Normalized `{message, code}` form carried by `"error"` events.
    pub fn info(&self) -> ErrorInfo {
        ErrorInfo {
            message: self.to_string(),
            code: self.code().to_string(),
        }
    }
}

/// Payload of the `"error"` lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    /// Human-readable description.
    pub message: String,
    /// Stable code, see [`NetError::code`].
    pub code: String,
}
