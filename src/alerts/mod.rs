/// Alert threshold state machine, message rendering and delivery
pub mod engine;
pub mod message;
pub mod notifier;
pub mod thresholds;

pub use engine::{Alert, AlertEngine, AlertKind, AlertPhase};
pub use message::MessageFormatter;
pub use notifier::{LogSink, NotificationSink, WebhookNotifier};
pub use thresholds::{BossThreshold, SwordThreshold, Threshold};
