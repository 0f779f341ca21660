use std::sync::Mutex;
use tracing::{info, warn};

/// Surfaces the outcome of a user action (the storefront's toast).
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Writes toasts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        info!(toast = "success", "{}", message);
    }

    fn error(&self, message: &str) {
        warn!(toast = "error", "{}", message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toast {
    Success(String),
    Error(String),
}

/// Keeps every toast in order; used by the CLI summary and by tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn successes(&self) -> Vec<String> {
        self.toasts()
            .into_iter()
            .filter_map(|t| match t {
                Toast::Success(m) => Some(m),
                Toast::Error(_) => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.toasts()
            .into_iter()
            .filter_map(|t| match t {
                Toast::Error(m) => Some(m),
                Toast::Success(_) => None,
            })
            .collect()
    }

    fn push(&self, toast: Toast) {
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.push(toast);
        }
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.push(Toast::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(Toast::Error(message.to_string()));
    }
}
