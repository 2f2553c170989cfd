//! The sync engine: owns the authoritative snapshot and decides which async
//! results are allowed to touch it.

use crate::{
    bindings::ContractBinding,
    error::{
        InvalidSubmission,
        ReadFailure,
    },
    notification::{
        NotificationEvent,
        NotificationPort,
        TRANSACTION_COMPLETE,
    },
    reader::ContractStateReader,
    resolver::{
        ChainResolver,
        Resolution,
    },
    submitter::{
        PendingTransaction,
        TransactionReport,
        TransactionSubmitter,
    },
    transport::{
        ConfirmationWatcher,
        ContractTransport,
        TransactionOutcome,
    },
    types::{
        Amount,
        LotterySnapshot,
        NetworkId,
        NetworkSignal,
    },
};
use futures::{
    FutureExt,
    StreamExt,
    future::BoxFuture,
    stream::FuturesUnordered,
};
use std::sync::Arc;
use tokio::sync::{
    mpsc,
    oneshot,
    watch,
};
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncState {
    /// No usable network, or no contract on it.
    Unresolved,
    Syncing,
    Synced,
    /// The last read failed; the snapshot is whatever the last good read gave.
    SyncFailed,
}

/// Everything a UI needs to render, published as one value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyncView {
    pub state: SyncState,
    pub network: Option<NetworkId>,
    pub contract: Resolution,
    pub snapshot: LotterySnapshot,
    pub last_read_error: Option<ReadFailure>,
    pub pending_entries: usize,
}

impl SyncView {
    fn initial() -> Self {
        Self {
            state: SyncState::Unresolved,
            network: None,
            contract: Resolution::Unsupported,
            snapshot: LotterySnapshot::empty(),
            last_read_error: None,
            pending_entries: 0,
        }
    }

    /// Connected, but to a network without a lottery contract.
    pub fn needs_network_switch(&self) -> bool {
        self.state == SyncState::Unresolved && self.network.is_some()
    }

    /// Whether an entry is still in flight; mirrors a disabled "Enter" button.
    pub fn is_busy(&self) -> bool {
        self.pending_entries > 0
    }
}

pub(crate) enum Completion {
    SnapshotRead {
        epoch: u64,
        result: Result<LotterySnapshot, ReadFailure>,
    },
    Transaction {
        session: u64,
        report: TransactionReport,
    },
}

pub(crate) enum Command {
    Network(NetworkSignal),
    Refresh,
    SubmitEntry {
        amount: Amount,
        reply: oneshot::Sender<Result<PendingTransaction, InvalidSubmission>>,
    },
    Shutdown,
}

pub struct SyncOrchestrator<T, W, N> {
    resolver: ChainResolver,
    reader: ContractStateReader<T>,
    submitter: TransactionSubmitter<T, W>,
    notifier: N,
    view: SyncView,
    published: watch::Sender<SyncView>,
    // bumped on every refresh trigger and on every transition to Unresolved;
    // a read result is applied only if it carries the current value
    refresh_epoch: u64,
    // bumped whenever the bound contract changes or the wallet disconnects
    session_epoch: u64,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
}

impl<T, W, N> SyncOrchestrator<T, W, N>
where
    T: ContractTransport,
    W: ConfirmationWatcher,
    N: NotificationPort,
{
    pub fn new(
        binding: ContractBinding,
        transport: Arc<T>,
        watcher: Arc<W>,
        notifier: N,
    ) -> Self {
        let (published, _) = watch::channel(SyncView::initial());
        Self {
            resolver: ChainResolver::new(binding),
            reader: ContractStateReader::new(Arc::clone(&transport)),
            submitter: TransactionSubmitter::new(transport, watcher),
            notifier,
            view: SyncView::initial(),
            published,
            refresh_epoch: 0,
            session_epoch: 0,
            in_flight: FuturesUnordered::new(),
        }
    }

    pub fn view(&self) -> &SyncView {
        &self.view
    }

    pub fn current_snapshot(&self) -> LotterySnapshot {
        self.view.snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncView> {
        self.published.subscribe()
    }

    pub fn handle_network_signal(&mut self, signal: NetworkSignal) {
        let Some(network) = signal.active_network() else {
            info!("wallet disconnected; dropping lottery state");
            self.enter_unresolved(None);
            return;
        };
        match self.resolver.resolve(network) {
            Resolution::Unsupported => {
                info!(%network, "no lottery contract on this network");
                self.enter_unresolved(Some(network));
            }
            resolved @ Resolution::Resolved(address) => {
                if self.view.contract != resolved || self.view.network != Some(network) {
                    info!(%network, %address, "lottery contract resolved");
                    self.session_epoch += 1;
                    self.view.network = Some(network);
                    self.view.contract = resolved;
                    // never show data from the previous contract
                    self.view.snapshot = LotterySnapshot::empty();
                    self.view.last_read_error = None;
                }
                self.request_refresh();
            }
        }
    }

    /// Starts a new read cycle, superseding any cycle still in flight.
    pub fn request_refresh(&mut self) {
        let Resolution::Resolved(contract) = self.view.contract else {
            debug!("refresh requested without a resolved contract; ignoring");
            return;
        };
        self.refresh_epoch += 1;
        let epoch = self.refresh_epoch;
        self.view.state = SyncState::Syncing;
        self.publish();

        let reader = self.reader.clone();
        self.in_flight.push(
            async move {
                let result = reader.read_snapshot(contract).await;
                Completion::SnapshotRead { epoch, result }
            }
            .boxed(),
        );
    }

    pub fn submit_entry(
        &mut self,
        amount: Amount,
    ) -> Result<PendingTransaction, InvalidSubmission> {
        let (pending, lifecycle) = self.submitter.submit_entry(
            &self.view.contract,
            amount,
            self.view.snapshot.entrance_fee,
        )?;
        info!(id = %pending.id(), %amount, "submitting lottery entry");
        let session = self.session_epoch;
        self.in_flight.push(
            async move {
                let report = lifecycle.await;
                Completion::Transaction { session, report }
            }
            .boxed(),
        );
        self.view.pending_entries += 1;
        self.publish();
        Ok(pending)
    }

    /// Waits for the next in-flight operation and applies it. Returns `false`
    /// when nothing is in flight.
    pub async fn step(&mut self) -> bool {
        match self.in_flight.next().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    pub(crate) fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::SnapshotRead { epoch, result } => {
                self.on_snapshot_read(epoch, result)
            }
            Completion::Transaction { session, report } => {
                self.on_transaction_resolved(session, report)
            }
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!("sync engine started");
        loop {
            tokio::select! {
                biased;
                Some(completion) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.apply(completion);
                }
                command = commands.recv() => {
                    match command {
                        Some(Command::Network(signal)) => self.handle_network_signal(signal),
                        Some(Command::Refresh) => self.request_refresh(),
                        Some(Command::SubmitEntry { amount, reply }) => {
                            let result = self.submit_entry(amount);
                            if let Err(err) = &result {
                                warn!(%err, "entry rejected before submission");
                            }
                            let _ = reply.send(result);
                        }
                        Some(Command::Shutdown) | None => break,
                    }
                }
            }
        }
        info!(
            abandoned = self.in_flight.len(),
            "sync engine stopped"
        );
    }

    fn enter_unresolved(&mut self, network: Option<NetworkId>) {
        self.refresh_epoch += 1;
        self.session_epoch += 1;
        self.view.state = SyncState::Unresolved;
        self.view.network = network;
        self.view.contract = Resolution::Unsupported;
        self.view.snapshot = LotterySnapshot::empty();
        self.view.last_read_error = None;
        self.publish();
    }

    fn on_snapshot_read(&mut self, epoch: u64, result: Result<LotterySnapshot, ReadFailure>) {
        if epoch != self.refresh_epoch {
            debug!(epoch, current = self.refresh_epoch, "discarding superseded snapshot read");
            return;
        }
        match result {
            Ok(snapshot) => {
                debug!(?snapshot, "snapshot refreshed");
                self.view.snapshot = snapshot;
                self.view.state = SyncState::Synced;
                self.view.last_read_error = None;
            }
            Err(failure) => {
                warn!(%failure, "snapshot read failed; keeping the previous snapshot");
                self.view.state = SyncState::SyncFailed;
                self.view.last_read_error = Some(failure);
            }
        }
        self.publish();
    }

    fn on_transaction_resolved(&mut self, session: u64, report: TransactionReport) {
        let id = report.id();
        let outcome = report.resolve();
        self.view.pending_entries = self.view.pending_entries.saturating_sub(1);
        if session != self.session_epoch {
            debug!(%id, ?outcome, "transaction resolved after a network change; ignoring");
            self.publish();
            return;
        }
        match outcome {
            TransactionOutcome::Confirmed => {
                info!(%id, "entry confirmed");
                self.notifier
                    .notify(NotificationEvent::info(TRANSACTION_COMPLETE));
                self.request_refresh();
            }
            TransactionOutcome::Failed(reason) => {
                warn!(%id, %reason, "entry failed");
                self.notifier.notify(NotificationEvent::error(format!(
                    "Transaction failed: {reason}"
                )));
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let next = self.view.clone();
        self.published.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
