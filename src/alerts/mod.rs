/// Alert values and notification delivery
pub mod alert;
pub mod notifier;
pub mod slack;

pub use alert::{Alert, AlertKind, AlertType};
pub use notifier::{LogNotifier, Notifier, NotifyFuture, RecordingNotifier};
pub use slack::SlackNotifier;
