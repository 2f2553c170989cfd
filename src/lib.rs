pub mod bindings;
pub mod client;
pub mod config;
pub mod error;
pub mod evm;
pub mod network;
pub mod notification;
pub mod orchestrator;
pub mod reader;
pub mod resolver;
pub mod submitter;
pub mod transport;
pub mod types;
pub mod wallets;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use client::{
    LotteryClient,
    Subscription,
};
pub use orchestrator::{
    SyncState,
    SyncView,
};
