use crate::{
    error::{
        InvalidSubmission,
        SyncError,
    },
    resolver::Resolution,
    transport::{
        CONFIRMATIONS_REQUIRED,
        ConfirmationWatcher,
        ContractTransport,
        FailureReason,
        TransactionOutcome,
        WriteCall,
    },
    types::Amount,
};
use futures::{
    FutureExt,
    future::BoxFuture,
};
use std::{
    fmt,
    sync::Arc,
};
use tokio::sync::watch;
use tracing::{
    info,
    warn,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TransactionId(u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionStatus {
    Submitted,
    Confirmed,
    Failed(FailureReason),
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Submitted)
    }
}

impl From<TransactionOutcome> for TransactionStatus {
    fn from(outcome: TransactionOutcome) -> Self {
        match outcome {
            TransactionOutcome::Confirmed => TransactionStatus::Confirmed,
            TransactionOutcome::Failed(reason) => TransactionStatus::Failed(reason),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PendingTransaction {
    id: TransactionId,
    submitted_amount: Amount,
    confirmations_required: u64,
    status: watch::Receiver<TransactionStatus>,
}

impl PendingTransaction {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn submitted_amount(&self) -> Amount {
        self.submitted_amount
    }

    pub fn confirmations_required(&self) -> u64 {
        self.confirmations_required
    }

    pub fn status(&self) -> TransactionStatus {
        *self.status.borrow()
    }

    pub async fn outcome(&mut self) -> Result<TransactionStatus, SyncError> {
        self.status
            .wait_for(TransactionStatus::is_terminal)
            .await
            .map(|status| *status)
            .map_err(|_| SyncError::SessionClosed)
    }
}

#[derive(Debug)]
pub struct TransactionReport {
    id: TransactionId,
    outcome: TransactionOutcome,
    status: watch::Sender<TransactionStatus>,
}

impl TransactionReport {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn outcome(&self) -> TransactionOutcome {
        self.outcome
    }

    // Consumes the report so a handle moves out of Submitted at most once.
    pub fn resolve(self) -> TransactionOutcome {
        self.status.send_replace(self.outcome.into());
        self.outcome
    }
}

pub struct TransactionSubmitter<T, W> {
    transport: Arc<T>,
    watcher: Arc<W>,
    next_id: u64,
}

impl<T, W> TransactionSubmitter<T, W>
where
    T: ContractTransport,
    W: ConfirmationWatcher,
{
    pub fn new(transport: Arc<T>, watcher: Arc<W>) -> Self {
        Self {
            transport,
            watcher,
            next_id: 0,
        }
    }

    /// Returns the caller's handle and the future that sends the entry and
    /// waits for its confirmation. Nothing touches the network until that
    /// future is polled, or at all when validation fails.
    pub fn submit_entry(
        &mut self,
        contract: &Resolution,
        amount: Amount,
        entrance_fee: Amount,
    ) -> Result<(PendingTransaction, BoxFuture<'static, TransactionReport>), InvalidSubmission>
    {
        if amount.is_zero() {
            return Err(InvalidSubmission::ZeroAmount);
        }
        let Resolution::Resolved(contract) = *contract else {
            return Err(InvalidSubmission::NoContract);
        };
        if amount != entrance_fee {
            return Err(InvalidSubmission::FeeMismatch {
                expected: entrance_fee,
                offered: amount,
            });
        }

        self.next_id += 1;
        let id = TransactionId(self.next_id);
        let (status_tx, status_rx) = watch::channel(TransactionStatus::Submitted);
        let pending = PendingTransaction {
            id,
            submitted_amount: amount,
            confirmations_required: CONFIRMATIONS_REQUIRED,
            status: status_rx,
        };

        let transport = Arc::clone(&self.transport);
        let watcher = Arc::clone(&self.watcher);
        let lifecycle = async move {
            let call = WriteCall::EnterLottery;
            let outcome = match transport.write(contract, call, amount).await {
                Ok(handle) => {
                    info!(%id, %handle, %amount, "entry transaction sent; awaiting confirmation");
                    watcher
                        .await_confirmations(handle, CONFIRMATIONS_REQUIRED)
                        .await
                }
                Err(err) => {
                    warn!(%id, %err, "{call} was not accepted");
                    TransactionOutcome::Failed(FailureReason::from(&err))
                }
            };
            TransactionReport {
                id,
                outcome,
                status: status_tx,
            }
        }
        .boxed();

        Ok((pending, lifecycle))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        error::TransportError,
        test_helpers::{
            ConfirmationScript,
            FakeChain,
            FakeLottery,
            lottery_address,
        },
        types::U256,
    };

    fn submitter_on(chain: &FakeChain) -> TransactionSubmitter<FakeChain, FakeChain> {
        let chain = Arc::new(chain.clone());
        TransactionSubmitter::new(Arc::clone(&chain), chain)
    }

    #[test]
    fn submit_entry__zero_amount__is_invalid_without_network_call() {
        // given
        let chain = FakeChain::new();
        let mut submitter = submitter_on(&chain);
        let contract = Resolution::Resolved(lottery_address());

        // when
        let result = submitter.submit_entry(&contract, U256::ZERO, U256::ZERO);

        // then
        assert!(matches!(result, Err(InvalidSubmission::ZeroAmount)));
        assert_eq!(chain.write_count(), 0);
    }

    #[test]
    fn submit_entry__unsupported_network__is_invalid_without_network_call() {
        let chain = FakeChain::new();
        let mut submitter = submitter_on(&chain);

        let result =
            submitter.submit_entry(&Resolution::Unsupported, U256::from(100), U256::from(100));

        assert!(matches!(result, Err(InvalidSubmission::NoContract)));
        assert_eq!(chain.write_count(), 0);
    }

    #[test]
    fn submit_entry__stale_fee__is_invalid() {
        let chain = FakeChain::new();
        let mut submitter = submitter_on(&chain);
        let contract = Resolution::Resolved(lottery_address());

        let result = submitter.submit_entry(&contract, U256::from(50), U256::from(100));

        assert!(matches!(
            result,
            Err(InvalidSubmission::FeeMismatch { expected, offered })
                if expected == U256::from(100) && offered == U256::from(50)
        ));
        assert_eq!(chain.write_count(), 0);
    }

    #[tokio::test]
    async fn submit_entry__confirmed__resolves_handle_once() {
        // given
        let chain = FakeChain::new();
        chain.deploy(lottery_address(), FakeLottery::new(U256::from(100)));
        let mut submitter = submitter_on(&chain);
        let contract = Resolution::Resolved(lottery_address());

        // when
        let (mut pending, lifecycle) = submitter
            .submit_entry(&contract, U256::from(100), U256::from(100))
            .unwrap();
        assert_eq!(pending.status(), TransactionStatus::Submitted);
        let report = lifecycle.await;

        // then
        assert_eq!(report.outcome(), TransactionOutcome::Confirmed);
        assert_eq!(pending.status(), TransactionStatus::Submitted);
        report.resolve();
        assert_eq!(pending.outcome().await.unwrap(), TransactionStatus::Confirmed);
        assert_eq!(pending.submitted_amount(), U256::from(100));
        assert_eq!(pending.confirmations_required(), 1);
        assert_eq!(chain.write_count(), 1);
    }

    #[tokio::test]
    async fn submit_entry__rejected_in_wallet__fails_without_confirmation_wait() {
        // given
        let chain = FakeChain::new();
        chain.deploy(lottery_address(), FakeLottery::new(U256::from(100)));
        chain.fail_writes(TransportError::UserRejected);
        let mut submitter = submitter_on(&chain);
        let contract = Resolution::Resolved(lottery_address());

        // when
        let (mut pending, lifecycle) = submitter
            .submit_entry(&contract, U256::from(100), U256::from(100))
            .unwrap();
        lifecycle.await.resolve();

        // then
        assert_eq!(
            pending.outcome().await.unwrap(),
            TransactionStatus::Failed(FailureReason::UserRejected)
        );
        assert_eq!(chain.confirmation_waits(), 0);
    }

    #[tokio::test]
    async fn submit_entry__reverted_on_chain__reports_reverted() {
        let chain = FakeChain::new();
        chain.deploy(lottery_address(), FakeLottery::new(U256::from(100)));
        chain.script_confirmations(ConfirmationScript::Fail(FailureReason::Reverted));
        let mut submitter = submitter_on(&chain);
        let contract = Resolution::Resolved(lottery_address());

        let (_pending, lifecycle) = submitter
            .submit_entry(&contract, U256::from(100), U256::from(100))
            .unwrap();

        assert_eq!(
            lifecycle.await.outcome(),
            TransactionOutcome::Failed(FailureReason::Reverted)
        );
    }

    #[tokio::test]
    async fn outcome__session_dropped_before_resolution__is_session_closed() {
        let chain = FakeChain::new();
        let mut submitter = submitter_on(&chain);
        let contract = Resolution::Resolved(lottery_address());

        let (mut pending, lifecycle) = submitter
            .submit_entry(&contract, U256::from(1), U256::from(1))
            .unwrap();
        drop(lifecycle);

        assert!(matches!(pending.outcome().await, Err(SyncError::SessionClosed)));
    }

    #[test]
    fn submit_entry__assigns_increasing_ids() {
        let chain = FakeChain::new();
        let mut submitter = submitter_on(&chain);
        let contract = Resolution::Resolved(lottery_address());

        let (first, _) = submitter
            .submit_entry(&contract, U256::from(1), U256::from(1))
            .unwrap();
        let (second, _) = submitter
            .submit_entry(&contract, U256::from(1), U256::from(1))
            .unwrap();

        assert!(first.id() < second.id());
    }
}
