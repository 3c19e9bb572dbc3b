//! Front-end sink for received messages.

use stormcast_proto::Priority;

/// Display severity of an appended line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Connection status, welcome text, generic messages.
    Info,
    /// Low-priority alert.
    Low,
    /// Medium-priority alert.
    Medium,
    /// High-priority alert.
    High,
    /// Connection loss and protocol failures.
    Error,
}

impl From<Priority> for Severity {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Low => Self::Low,
            Priority::Medium => Self::Medium,
            Priority::High => Self::High,
        }
    }
}

/// Where the receive loop puts text for the user.
///
/// A graphical front end implements this over its text widget; the default
/// [`TracingConsole`] just logs.
pub trait Console: Send + Sync {
    /// Append one line of output.
    fn append(&self, text: &str, severity: Severity);
}

/// Console that forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

impl Console for TracingConsole {
    fn append(&self, text: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Low => tracing::info!("{text}"),
            Severity::Medium | Severity::High => tracing::warn!("{text}"),
            Severity::Error => tracing::error!("{text}"),
        }
    }
}
