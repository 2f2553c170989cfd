use crate::{
    transport::{
        CallValue,
        ReadCall,
    },
    types::{
        Amount,
        U256,
    },
};

/// Failure reported by the contract-call transport.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("request rejected by user")]
    UserRejected,
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("network error: {0}")]
    Network(String),
}

/// A snapshot read that could not be completed. The previous snapshot stays
/// in place when this happens.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ReadFailure {
    #[error("{call} failed: {source}")]
    Call {
        call: ReadCall,
        source: TransportError,
    },
    #[error("{call} returned an unexpected value: {found:?}")]
    UnexpectedValue { call: ReadCall, found: CallValue },
    #[error("{call} returned {value}, which does not fit in 64 bits")]
    Overflow { call: ReadCall, value: U256 },
}

/// Rejected locally before any network call was made.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InvalidSubmission {
    #[error("entry amount must be greater than zero")]
    ZeroAmount,
    #[error("no lottery contract is deployed on the current network")]
    NoContract,
    #[error("entry amount {offered} does not match the entrance fee {expected}")]
    FeeMismatch { expected: Amount, offered: Amount },
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    InvalidSubmission(#[from] InvalidSubmission),
    #[error("the sync engine has shut down")]
    SessionClosed,
}
