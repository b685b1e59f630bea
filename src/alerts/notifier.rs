use crate::error::AlertError;
use log::info;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Boxed future returned by [`Notifier::notify`]
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + 'a>>;

/// Trait for notification delivery clients
pub trait Notifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Post `message` to `channel`
    fn notify<'a>(&'a self, channel: &'a str, message: &'a str) -> NotifyFuture<'a>;
}

/// Notifier that only writes messages to the log
///
/// Used for dry runs, where nothing should leave the process.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify<'a>(&'a self, channel: &'a str, message: &'a str) -> NotifyFuture<'a> {
        Box::pin(async move {
            info!("[{}] {}", channel, message);
            Ok(())
        })
    }
}

/// Notifier that records every delivery, for tests
///
/// Clones share the same record. Delivery can be made to fail with
/// [`RecordingNotifier::failing`].
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails
    pub fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    /// `(channel, message)` pairs delivered so far
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn notify<'a>(&'a self, channel: &'a str, message: &'a str) -> NotifyFuture<'a> {
        Box::pin(async move {
            if self.fail {
                return Err(AlertError::NotificationFailed(
                    "recording notifier configured to fail".to_string(),
                ));
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push((channel.to_string(), message.to_string()));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        assert!(notifier.notify("#alerts", "hello").await.is_ok());
        assert_eq!(notifier.name(), "log");
    }

    #[tokio::test]
    async fn test_recording_notifier_records_and_fails() {
        let notifier = RecordingNotifier::new();
        let handle = notifier.clone();
        notifier.notify("#a", "one").await.unwrap();
        notifier.notify("#b", "two").await.unwrap();
        assert_eq!(
            handle.sent(),
            vec![
                ("#a".to_string(), "one".to_string()),
                ("#b".to_string(), "two".to_string())
            ]
        );

        let failing = RecordingNotifier::failing();
        assert!(matches!(
            failing.notify("#a", "x").await,
            Err(AlertError::NotificationFailed(_))
        ));
        assert!(failing.sent().is_empty());
    }
}
