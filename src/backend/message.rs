// Message callback - the user-visible channel for warnings and errors
//
// The core never prints anything by itself; it hands messages to a callback
// supplied at device construction. LogMessageCallback forwards them to the
// `log` facade, which is what the probe binary uses.

/// Severity of a message sent to a [`MessageCallback`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageSeverity {
    Info,
    Warning,
    Error,
}

/// Receives diagnostics from the device.
pub trait MessageCallback: Send + Sync {
    fn message(&self, severity: MessageSeverity, text: &str);
}

/// Forwards device messages to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessageCallback;

impl MessageCallback for LogMessageCallback {
    fn message(&self, severity: MessageSeverity, text: &str) {
        match severity {
            MessageSeverity::Error => log::error!("[RHI] {}", text),
            MessageSeverity::Warning => log::warn!("[RHI] {}", text),
            MessageSeverity::Info => log::info!("[RHI] {}", text),
        }
    }
}
