//! Terminal rendering of engine callbacks

use std::io::Write;
use std::sync::{Mutex, PoisonError};
use toolwire_core::{ChatMessage, EngineObserver, MessageStatus, NoticeKind, Notifier};

/// Prints notices on stderr so they don't interleave with replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NoticeKind, message: &str, _permanent: bool) {
        let tag = match kind {
            NoticeKind::Info => "info",
            NoticeKind::Success => "ok",
            NoticeKind::Warning => "attention",
            NoticeKind::Error => "erreur",
        };
        eprintln!("[{tag}] {message}");
    }
}

/// Streams assistant content to stdout as it grows.
#[derive(Debug, Default)]
pub struct ConsoleObserver {
    /// Bytes of the trailing assistant message already printed.
    printed: Mutex<usize>,
}

impl EngineObserver for ConsoleObserver {
    fn on_progress(&self, _tool_id: &str, value: f64, status: Option<&str>) {
        let percent = if value <= 1.0 { value * 100.0 } else { value };
        match status {
            Some(status) => eprintln!("[{percent:>5.1}%] {status}"),
            None => eprintln!("[{percent:>5.1}%]"),
        }
    }

    fn on_status(&self, _tool_id: &str, status: &str) {
        eprintln!("[statut] {status}");
    }

    fn on_message(&self, _tool_id: &str, message: &ChatMessage) {
        if !message.is_assistant() {
            return;
        }
        let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh = message.content.get(*printed..).unwrap_or_default();
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{fresh}");
        match message.status {
            MessageStatus::Pending => *printed = message.content.len(),
            MessageStatus::Sent | MessageStatus::Failed => {
                let _ = writeln!(stdout);
                *printed = 0;
            }
        }
        let _ = stdout.flush();
    }
}
