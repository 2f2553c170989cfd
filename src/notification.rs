use tokio::sync::broadcast;

pub const TRANSACTION_COMPLETE: &str = "Transaction Complete!";

const NOTIFICATION_BUFFER: usize = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotificationKind {
    Info,
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub message: String,
}

impl NotificationEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

/// One-way sink for user-facing events. Implementations must not block and
/// have no way to report failure back to the caller.
pub trait NotificationPort: Send + 'static {
    fn notify(&self, event: NotificationEvent);
}

/// Fans notifications out to every current subscriber. Events sent while
/// nobody listens are dropped.
#[derive(Clone, Debug)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<NotificationEvent>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationPort for BroadcastNotifier {
    fn notify(&self, event: NotificationEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("no notification subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn notify__without_subscribers__does_not_fail() {
        let notifier = BroadcastNotifier::new();

        notifier.notify(NotificationEvent::info(TRANSACTION_COMPLETE));
    }

    #[tokio::test]
    async fn notify__reaches_every_subscriber() {
        // given
        let notifier = BroadcastNotifier::new();
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        // when
        notifier.notify(NotificationEvent::error("Transaction failed: reverted"));

        // then
        let expected = NotificationEvent::error("Transaction failed: reverted");
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }
}
