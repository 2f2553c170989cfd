//! In-memory stand-ins for the chain and the notification surface.

use crate::{
    bindings::ContractBinding,
    client::LotteryClient,
    error::TransportError,
    notification::{
        NotificationEvent,
        NotificationKind,
        NotificationPort,
    },
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
        Address,
        Amount,
        ContractAddress,
        NetworkId,
        NetworkSignal,
        U256,
    },
};
use alloy::primitives::TxHash;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
};
use tokio::{
    sync::watch,
    task::JoinHandle,
};

pub const LOCAL_NETWORK: NetworkId = NetworkId::new(31337);

pub const UNSUPPORTED_NETWORK: NetworkId = NetworkId::new(999);

pub fn lottery_address() -> ContractAddress {
    Address::repeat_byte(0xaa)
}

pub fn player(n: u8) -> Address {
    Address::repeat_byte(n)
}

// Confirmed entries are recorded under this account.
pub fn signer() -> Address {
    Address::repeat_byte(0x51)
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FakeLottery {
    pub entrance_fee: Amount,
    pub players: Vec<Address>,
    pub recent_winner: Address,
    /// Returned verbatim instead of the value derived from the fields above.
    pub raw_values: HashMap<ReadCall, CallValue>,
}

impl FakeLottery {
    pub fn new(entrance_fee: Amount) -> Self {
        Self {
            entrance_fee,
            ..Self::default()
        }
    }

    pub fn with_players(mut self, count: u8) -> Self {
        self.players = (1..=count).map(player).collect();
        self
    }

    pub fn with_winner(mut self, winner: Address) -> Self {
        self.recent_winner = winner;
        self
    }

    pub fn with_raw_value(mut self, call: ReadCall, value: CallValue) -> Self {
        self.raw_values.insert(call, value);
        self
    }

    fn value_of(&self, call: ReadCall) -> CallValue {
        if let Some(value) = self.raw_values.get(&call) {
            return *value;
        }
        match call {
            ReadCall::EntranceFee => CallValue::Uint(self.entrance_fee),
            ReadCall::NumberOfPlayers => CallValue::Uint(U256::from(self.players.len())),
            ReadCall::RecentWinner => CallValue::Address(self.recent_winner),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfirmationScript {
    Confirm,
    Fail(FailureReason),
    /// Never mined; the wait only ends when the caller is dropped.
    Never,
}

#[derive(Debug)]
struct SentEntry {
    contract: ContractAddress,
    value: Amount,
}

#[derive(Debug)]
struct FakeChainState {
    lotteries: HashMap<ContractAddress, FakeLottery>,
    reads: Vec<(ContractAddress, ReadCall)>,
    writes: Vec<(ContractAddress, WriteCall, Amount)>,
    read_failures: HashMap<ReadCall, TransportError>,
    write_failure: Option<TransportError>,
    confirmations: ConfirmationScript,
    confirmation_waits: usize,
    sent: HashMap<TransactionHandle, SentEntry>,
    gate: Option<watch::Receiver<bool>>,
    confirmation_gate: Option<watch::Receiver<bool>>,
}

/// In-memory lottery contract implementing both transport traits. Entries
/// only land in the player list once their transaction is confirmed.
#[derive(Clone, Debug)]
pub struct FakeChain {
    state: Arc<Mutex<FakeChainState>>,
    issued_reads: Arc<watch::Sender<usize>>,
}

#[derive(Debug)]
pub struct Gate {
    open: watch::Sender<bool>,
}

impl Gate {
    pub fn release(&self) {
        self.open.send_replace(true);
    }
}

impl Drop for Gate {
    fn drop(&mut self) {
        self.release();
    }
}

impl FakeChain {
    pub fn new() -> Self {
        let state = FakeChainState {
            lotteries: HashMap::new(),
            reads: Vec::new(),
            writes: Vec::new(),
            read_failures: HashMap::new(),
            write_failure: None,
            confirmations: ConfirmationScript::Confirm,
            confirmation_waits: 0,
            sent: HashMap::new(),
            gate: None,
            confirmation_gate: None,
        };
        let (issued_reads, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(state)),
            issued_reads: Arc::new(issued_reads),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeChainState> {
        self.state.lock().unwrap()
    }

    pub fn deploy(&self, contract: ContractAddress, lottery: FakeLottery) {
        self.lock().lotteries.insert(contract, lottery);
    }

    pub fn lottery(&self, contract: ContractAddress) -> Option<FakeLottery> {
        self.lock().lotteries.get(&contract).cloned()
    }

    /// Mutates contract storage directly, as another account's transaction would.
    pub fn update(&self, contract: ContractAddress, f: impl FnOnce(&mut FakeLottery)) {
        let mut state = self.lock();
        let lottery = state.lotteries.entry(contract).or_default();
        f(lottery);
    }

    pub fn fail_read(&self, call: ReadCall, err: TransportError) {
        self.lock().read_failures.insert(call, err);
    }

    pub fn heal_reads(&self) {
        self.lock().read_failures.clear();
    }

    pub fn fail_writes(&self, err: TransportError) {
        self.lock().write_failure = Some(err);
    }

    pub fn script_confirmations(&self, script: ConfirmationScript) {
        self.lock().confirmations = script;
    }

    /// Reads issued from now on wait until the returned gate is released or
    /// dropped. Installing a new gate leaves reads held by the old one waiting.
    pub fn hold_reads(&self) -> Gate {
        let (open, gate) = watch::channel(false);
        self.lock().gate = Some(gate);
        Gate { open }
    }

    pub fn hold_confirmations(&self) -> Gate {
        let (open, gate) = watch::channel(false);
        self.lock().confirmation_gate = Some(gate);
        Gate { open }
    }

    pub fn read_count(&self, call: ReadCall) -> usize {
        self.lock().reads.iter().filter(|(_, c)| *c == call).count()
    }

    /// Number of full snapshot refreshes, counted by entrance fee reads.
    pub fn refresh_count(&self) -> usize {
        self.read_count(ReadCall::EntranceFee)
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    pub fn writes(&self) -> Vec<(ContractAddress, WriteCall, Amount)> {
        self.lock().writes.clone()
    }

    pub fn confirmation_waits(&self) -> usize {
        self.lock().confirmation_waits
    }

    pub async fn wait_for_issued_reads(&self, count: usize) {
        let mut issued = self.issued_reads.subscribe();
        let _ = issued.wait_for(|n| *n >= count).await;
    }
}

impl Default for FakeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractTransport for FakeChain {
    async fn read(
        &self,
        contract: ContractAddress,
        call: ReadCall,
    ) -> Result<CallValue, TransportError> {
        // the value is captured when the read is issued, like a call against
        // the block that was latest at that moment
        let (result, gate) = {
            let mut state = self.lock();
            state.reads.push((contract, call));
            let result = match state.read_failures.get(&call) {
                Some(err) => Err(err.clone()),
                None => state
                    .lotteries
                    .get(&contract)
                    .map(|lottery| lottery.value_of(call))
                    .ok_or_else(|| {
                        TransportError::Reverted(format!("no contract at {contract}"))
                    }),
            };
            (result, state.gate.clone())
        };
        self.issued_reads.send_modify(|n| *n += 1);
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|open| *open).await;
        }
        result
    }

    async fn write(
        &self,
        contract: ContractAddress,
        call: WriteCall,
        value: Amount,
    ) -> Result<TransactionHandle, TransportError> {
        let mut state = self.lock();
        state.writes.push((contract, call, value));
        if let Some(err) = state.write_failure.clone() {
            return Err(err);
        }
        let nonce = state.writes.len() as u64;
        let hash = TxHash::from(U256::from(nonce).to_be_bytes::<32>());
        let handle = TransactionHandle::new(hash);
        state.sent.insert(handle, SentEntry { contract, value });
        Ok(handle)
    }
}

impl ConfirmationWatcher for FakeChain {
    async fn await_confirmations(
        &self,
        handle: TransactionHandle,
        _confirmations: u64,
    ) -> TransactionOutcome {
        let (script, gate) = {
            let mut state = self.lock();
            state.confirmation_waits += 1;
            (state.confirmations, state.confirmation_gate.clone())
        };
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|open| *open).await;
        }
        match script {
            ConfirmationScript::Confirm => {
                let mut state = self.lock();
                let Some(entry) = state.sent.remove(&handle) else {
                    return TransactionOutcome::Failed(FailureReason::NetworkError);
                };
                match state.lotteries.get_mut(&entry.contract) {
                    Some(lottery) if lottery.entrance_fee == entry.value => {
                        lottery.players.push(signer());
                        TransactionOutcome::Confirmed
                    }
                    _ => TransactionOutcome::Failed(FailureReason::Reverted),
                }
            }
            ConfirmationScript::Fail(reason) => TransactionOutcome::Failed(reason),
            ConfirmationScript::Never => std::future::pending().await,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.kind == kind)
            .count()
    }
}

impl NotificationPort for RecordingNotifier {
    fn notify(&self, event: NotificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A running `LotteryClient` wired to a `FakeChain` that has the lottery
/// deployed on `LOCAL_NETWORK`.
pub struct TestContext {
    pub chain: FakeChain,
    pub client: LotteryClient,
    pub engine: JoinHandle<()>,
}

impl TestContext {
    pub fn new(lottery: FakeLottery) -> Self {
        let chain = FakeChain::new();
        chain.deploy(lottery_address(), lottery);
        let binding = ContractBinding::new([(LOCAL_NETWORK, lottery_address())]);
        let shared = Arc::new(chain.clone());
        let (client, engine) = LotteryClient::spawn(binding, Arc::clone(&shared), shared);
        Self {
            chain,
            client,
            engine,
        }
    }

    pub fn switch_to(&self, network: NetworkId) {
        self.client
            .network_changed(NetworkSignal::ready(network))
            .unwrap();
    }

    pub async fn settle(&self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn write__many_entries__hands_out_distinct_handles() {
        // given
        let chain = FakeChain::new();
        chain.deploy(lottery_address(), FakeLottery::new(U256::from(100)));
        chain.script_confirmations(ConfirmationScript::Never);

        // when
        let mut handles = HashSet::new();
        for _ in 0..300 {
            let handle = chain
                .write(lottery_address(), WriteCall::EnterLottery, U256::from(100))
                .await
                .unwrap();
            handles.insert(handle);
        }

        // then
        assert_eq!(handles.len(), 300);
        assert_eq!(chain.lock().sent.len(), 300);
    }

    #[tokio::test]
    async fn read__raw_value__overrides_stored_field() {
        // given
        let chain = FakeChain::new();
        let lottery = FakeLottery::new(U256::from(100))
            .with_players(2)
            .with_raw_value(ReadCall::NumberOfPlayers, CallValue::Uint(U256::MAX));
        chain.deploy(lottery_address(), lottery);

        // when
        let players = chain
            .read(lottery_address(), ReadCall::NumberOfPlayers)
            .await
            .unwrap();
        let fee = chain.read(lottery_address(), ReadCall::EntranceFee).await.unwrap();

        // then
        assert_eq!(players, CallValue::Uint(U256::MAX));
        assert_eq!(fee, CallValue::Uint(U256::from(100)));
    }
}
