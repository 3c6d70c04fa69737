//! Notification delivery channels.
//!
//! Delivery fans out to every registered sink. Each sink is best-effort and
//! fails independently: a dead audio device or a revoked OS permission must
//! never block the in-app list, which is the one channel the engine expects
//! to succeed.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::SinkError;
use crate::events::Notification;

/// A delivery channel for notifications.
pub trait NotificationSink: Send + Sync {
    /// Short channel name used in logs.
    fn name(&self) -> &'static str;

    fn deliver(&self, notification: &Notification) -> Result<(), SinkError>;
}

/// In-app notification list, backed by an unbounded channel. The UI (or the
/// CLI) drains the receiver.
pub struct InAppSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl InAppSink {
    /// Create the sink together with the receiving end of its channel.
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl NotificationSink for InAppSink {
    fn name(&self) -> &'static str {
        "in-app"
    }

    fn deliver(&self, notification: &Notification) -> Result<(), SinkError> {
        self.tx
            .send(notification.clone())
            .map_err(|_| SinkError::Closed)
    }
}

/// Push a notification through every sink, logging failures instead of
/// propagating them.
pub(crate) fn deliver_all(sinks: &[Arc<dyn NotificationSink>], notification: &Notification) {
    for sink in sinks {
        if let Err(e) = sink.deliver(notification) {
            warn!(
                sink = sink.name(),
                task_id = %notification.task_id,
                error = %e,
                "notification channel failed"
            );
        }
    }
}
