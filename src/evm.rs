//! `ContractTransport` and `ConfirmationWatcher` over an alloy provider.

use crate::{
    error::TransportError,
    transport::{
        CallValue,
        ConfirmationWatcher,
        ContractTransport,
        FailureReason,
        ReadCall,
        TransactionHandle,
        TransactionOutcome,
        WriteCall,
    },
    types::{
        Amount,
        ContractAddress,
    },
};
use alloy::{
    contract::Error as ContractError,
    network::ReceiptResponse,
    providers::{
        PendingTransactionBuilder,
        PendingTransactionError,
        Provider,
    },
    sol,
    transports::{
        RpcError,
        TransportErrorKind,
    },
};
use tracing::{
    debug,
    warn,
};

sol! {
    #[sol(rpc)]
    contract Lottery {
        function getEntranceFee() external view returns (uint256);
        function getNumberOfPlayers() external view returns (uint256);
        function getRecentWinner() external view returns (address);
        function enterLotto() external payable;
    }
}

// EIP-1193 "user rejected request"
const USER_REJECTED_CODE: i64 = 4001;
// geth's code for `execution reverted`
const EXECUTION_REVERTED_CODE: i64 = 3;

#[derive(Clone, Debug)]
pub struct EvmTransport<P> {
    provider: P,
}

impl<P> EvmTransport<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P> ContractTransport for EvmTransport<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    async fn read(
        &self,
        contract: ContractAddress,
        call: ReadCall,
    ) -> Result<CallValue, TransportError> {
        let lottery: Lottery::LotteryInstance<P> =
            Lottery::new(contract, self.provider.clone());
        let value = match call {
            ReadCall::EntranceFee => {
                lottery.getEntranceFee().call().await.map(CallValue::Uint)
            }
            ReadCall::NumberOfPlayers => {
                lottery.getNumberOfPlayers().call().await.map(CallValue::Uint)
            }
            ReadCall::RecentWinner => {
                lottery.getRecentWinner().call().await.map(CallValue::Address)
            }
        };
        value.map_err(|err| {
            debug!(%call, %contract, %err, "contract read failed");
            classify_contract_error(err)
        })
    }

    async fn write(
        &self,
        contract: ContractAddress,
        call: WriteCall,
        value: Amount,
    ) -> Result<TransactionHandle, TransportError> {
        let lottery: Lottery::LotteryInstance<P> =
            Lottery::new(contract, self.provider.clone());
        let pending = match call {
            WriteCall::EnterLottery => lottery.enterLotto().value(value).send().await,
        }
        .map_err(classify_contract_error)?;
        Ok(TransactionHandle::new(*pending.tx_hash()))
    }
}

impl<P> ConfirmationWatcher for EvmTransport<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    async fn await_confirmations(
        &self,
        handle: TransactionHandle,
        confirmations: u64,
    ) -> TransactionOutcome {
        let receipt =
            PendingTransactionBuilder::new(self.provider.root().clone(), handle.hash())
                .with_required_confirmations(confirmations)
                .get_receipt()
                .await;
        match receipt {
            Ok(receipt) if receipt.status() => TransactionOutcome::Confirmed,
            Ok(_) => TransactionOutcome::Failed(FailureReason::Reverted),
            Err(err) => {
                warn!(%handle, %err, "waiting for confirmation failed");
                TransactionOutcome::Failed(classify_pending_error(err))
            }
        }
    }
}

fn classify_rpc_error(err: &RpcError<TransportErrorKind>) -> TransportError {
    match err.as_error_resp() {
        Some(payload) if payload.code == USER_REJECTED_CODE => TransportError::UserRejected,
        Some(payload)
            if payload.code == EXECUTION_REVERTED_CODE
                || payload.message.to_lowercase().contains("revert") =>
        {
            TransportError::Reverted(payload.message.to_string())
        }
        _ => TransportError::Network(err.to_string()),
    }
}

fn classify_contract_error(err: ContractError) -> TransportError {
    match err {
        ContractError::TransportError(rpc) => classify_rpc_error(&rpc),
        // empty return data: nothing is deployed at the address
        err @ ContractError::ZeroData(..) => TransportError::Reverted(err.to_string()),
        other => TransportError::Network(other.to_string()),
    }
}

fn classify_pending_error(err: PendingTransactionError) -> FailureReason {
    match err {
        PendingTransactionError::TransportError(rpc) => {
            FailureReason::from(&classify_rpc_error(&rpc))
        }
        _ => FailureReason::NetworkError,
    }
}
