//! User-facing notices about connection health.

use serde::Serialize;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Routine progress.
    Info,
    /// Degraded but recovering.
    Warning,
    /// Needs attention.
    Error,
}

/// Something the user may want to be told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// A connection was established.
    Connected {
        /// URL of the endpoint in use.
        endpoint: String,
    },
    /// The connection ended and no reconnection is pending.
    Disconnected {
        /// `"manual"` or `"server"`.
        reason: String,
    },
    /// A reconnection attempt has been scheduled.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay until the attempt, milliseconds.
        delay_ms: u64,
    },
    /// A connection-level error occurred.
    Error {
        /// Human-readable message.
        message: String,
        /// Stable error code.
        code: String,
    },
    /// Automatic reconnection gave up.
    ReconnectExhausted {
        /// Attempts made.
        attempts: u32,
    },
}

impl Notice {
    /// Severity for display.
    pub fn level(&self) -> NoticeLevel {
        match self {
            Notice::Connected { .. } | Notice::Disconnected { .. } => NoticeLevel::Info,
            Notice::Reconnecting { .. } => NoticeLevel::Warning,
            Notice::Error { .. } | Notice::ReconnectExhausted { .. } => NoticeLevel::Error,
        }
    }

    /// One-line text for display.
    pub fn message(&self) -> String {
        match self {
            Notice::Connected { endpoint } => format!("Connected to {endpoint}"),
            Notice::Disconnected { reason } => format!("Disconnected ({reason})"),
            Notice::Reconnecting { attempt, delay_ms } => {
                format!("Reconnecting in {delay_ms} ms (attempt {attempt})")
            }
            Notice::Error { message, .. } => message.clone(),
            Notice::ReconnectExhausted { attempts } => {
                format!("Gave up reconnecting after {attempts} attempts")
            }
        }
    }
}

/// Receives [`Notice`]s from the connection manager.
pub trait Notifier: Send + Sync {
    /// Deliver one notice. Must not block.
    fn notify(&self, notice: &Notice);
}

/// Blanket implementation for closures.
impl<F> Notifier for F
where
    F: Fn(&Notice) + Send + Sync,
{
    fn notify(&self, notice: &Notice) {
        self(notice);
    }
}

/// Writes notices to the `tracing` log at their level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        let text = notice.message();
        match notice.level() {
            NoticeLevel::Info => tracing::info!(target: "parley::notice", "{text}"),
            NoticeLevel::Warning => tracing::warn!(target: "parley::notice", "{text}"),
            NoticeLevel::Error => tracing::error!(target: "parley::notice", "{text}"),
        }
    }
}
