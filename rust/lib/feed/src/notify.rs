//! User-facing notices (toasts in the web view, stderr lines in the CLI).

use std::fmt;

use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoticeKind::Success => "success",
            NoticeKind::Error => "error",
            NoticeKind::Info => "info",
        })
    }
}

/// Notification collaborator. Called on every rollback and every terminal
/// failure, and on confirmed user-visible effects such as a deletion.
///
/// Implementations must not call back into the feed store.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, message: &str, kind: NoticeKind);
}

/// Forwards notices to `tracing`.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        match kind {
            NoticeKind::Error => error!(kind = %kind, "{}", message),
            NoticeKind::Success | NoticeKind::Info => info!(kind = %kind, "{}", message),
        }
    }
}

impl<F> Notifier for F
where
    F: Fn(&str, NoticeKind) + Send + Sync + 'static,
{
    fn notify(&self, message: &str, kind: NoticeKind) {
        self(message, kind)
    }
}
