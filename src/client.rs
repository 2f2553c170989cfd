use crate::{
    bindings::ContractBinding,
    error::SyncError,
    notification::{
        BroadcastNotifier,
        NotificationEvent,
    },
    orchestrator::{
        Command,
        SyncOrchestrator,
        SyncView,
    },
    submitter::PendingTransaction,
    transport::{
        ConfirmationWatcher,
        ContractTransport,
    },
    types::{
        Amount,
        LotterySnapshot,
        NetworkSignal,
    },
};
use std::sync::Arc;
use tokio::{
    sync::{
        broadcast,
        mpsc,
        oneshot,
        watch,
    },
    task::JoinHandle,
};
use tracing::warn;

/// Cheap, cloneable handle to a running sync engine. The engine stops when
/// `shutdown` is called or every handle has been dropped.
#[derive(Clone, Debug)]
pub struct LotteryClient {
    commands: mpsc::UnboundedSender<Command>,
    views: watch::Receiver<SyncView>,
    notifier: BroadcastNotifier,
}

impl LotteryClient {
    pub fn spawn<T, W>(
        binding: ContractBinding,
        transport: Arc<T>,
        watcher: Arc<W>,
    ) -> (Self, JoinHandle<()>)
    where
        T: ContractTransport,
        W: ConfirmationWatcher,
    {
        let notifier = BroadcastNotifier::new();
        let orchestrator =
            SyncOrchestrator::new(binding, transport, watcher, notifier.clone());
        let views = orchestrator.subscribe();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let engine = tokio::spawn(orchestrator.run(command_rx));
        let client = Self {
            commands,
            views,
            notifier,
        };
        (client, engine)
    }

    fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::SessionClosed)
    }

    pub fn network_changed(&self, signal: NetworkSignal) -> Result<(), SyncError> {
        self.send(Command::Network(signal))
    }

    /// Manual refresh. Ignored by the engine while no contract is resolved.
    pub fn refresh(&self) -> Result<(), SyncError> {
        self.send(Command::Refresh)
    }

    pub async fn submit_entry(&self, amount: Amount) -> Result<PendingTransaction, SyncError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::SubmitEntry { amount, reply })?;
        let pending = response.await.map_err(|_| SyncError::SessionClosed)??;
        Ok(pending)
    }

    /// Enters with exactly the entrance fee of the current snapshot.
    pub async fn enter(&self) -> Result<PendingTransaction, SyncError> {
        let fee = self.current_snapshot().entrance_fee;
        self.submit_entry(fee).await
    }

    pub fn current_snapshot(&self) -> LotterySnapshot {
        self.views.borrow().snapshot.clone()
    }

    pub fn view(&self) -> SyncView {
        self.views.borrow().clone()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<SyncView> {
        self.views.clone()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<NotificationEvent> {
        self.notifier.subscribe()
    }

    /// Resolves with the first published view matching `predicate`, which may
    /// be the current one.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SyncView) -> bool,
    ) -> Result<SyncView, SyncError> {
        let mut views = self.views.clone();
        let view = views
            .wait_for(|view| predicate(view))
            .await
            .map_err(|_| SyncError::SessionClosed)?;
        Ok(view.clone())
    }

    /// Calls `callback` with every view published after this call.
    pub fn on_snapshot_changed<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(&SyncView) + Send + 'static,
    {
        let mut views = self.views.clone();
        views.mark_unchanged();
        let task = tokio::spawn(async move {
            while views.changed().await.is_ok() {
                let view = views.borrow_and_update().clone();
                callback(&view);
            }
        });
        Subscription { task }
    }

    pub fn on_notification<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(NotificationEvent) + Send + 'static,
    {
        let mut events = self.notifier.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => callback(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "notification listener fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription { task }
    }

    /// Stops the engine; in-flight reads and confirmation waits are dropped.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// Keeps a callback registered. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
