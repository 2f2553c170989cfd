//! The seam between the sync engine and whatever actually talks to the chain.

use crate::{
    error::TransportError,
    types::{
        Address,
        Amount,
        ContractAddress,
        U256,
    },
};
use alloy::primitives::TxHash;
use std::fmt;

/// Block confirmations required before an entry counts as settled.
pub const CONFIRMATIONS_REQUIRED: u64 = 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReadCall {
    EntranceFee,
    NumberOfPlayers,
    RecentWinner,
}

impl ReadCall {
    pub const ALL: [ReadCall; 3] = [
        ReadCall::EntranceFee,
        ReadCall::NumberOfPlayers,
        ReadCall::RecentWinner,
    ];

    pub fn function_name(self) -> &'static str {
        match self {
            ReadCall::EntranceFee => "getEntranceFee",
            ReadCall::NumberOfPlayers => "getNumberOfPlayers",
            ReadCall::RecentWinner => "getRecentWinner",
        }
    }
}

impl fmt::Display for ReadCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum WriteCall {
    EnterLottery,
}

impl WriteCall {
    pub fn function_name(self) -> &'static str {
        match self {
            WriteCall::EnterLottery => "enterLotto",
        }
    }
}

impl fmt::Display for WriteCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

/// Decoded return value of a read call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallValue {
    Uint(U256),
    Address(Address),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TransactionHandle(TxHash);

impl TransactionHandle {
    pub fn new(hash: TxHash) -> Self {
        Self(hash)
    }

    pub fn hash(&self) -> TxHash {
        self.0
    }
}

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureReason {
    UserRejected,
    Reverted,
    NetworkError,
}

impl From<&TransportError> for FailureReason {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::UserRejected => FailureReason::UserRejected,
            TransportError::Reverted(_) => FailureReason::Reverted,
            TransportError::Network(_) => FailureReason::NetworkError,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::UserRejected => "rejected by user",
            FailureReason::Reverted => "reverted",
            FailureReason::NetworkError => "network error",
        };
        f.write_str(text)
    }
}

/// Terminal result of a submitted transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionOutcome {
    Confirmed,
    Failed(FailureReason),
}

pub trait ContractTransport: Send + Sync + 'static {
    fn read(
        &self,
        contract: ContractAddress,
        call: ReadCall,
    ) -> impl Future<Output = Result<CallValue, TransportError>> + Send;

    fn write(
        &self,
        contract: ContractAddress,
        call: WriteCall,
        value: Amount,
    ) -> impl Future<Output = Result<TransactionHandle, TransportError>> + Send;
}

pub trait ConfirmationWatcher: Send + Sync + 'static {
    /// Resolves once the transaction has `confirmations` blocks on top of it
    /// or is known to have failed. There is no timeout.
    fn await_confirmations(
        &self,
        handle: TransactionHandle,
        confirmations: u64,
    ) -> impl Future<Output = TransactionOutcome> + Send;
}
