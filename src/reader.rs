use crate::{
    error::ReadFailure,
    transport::{
        CallValue,
        ContractTransport,
        ReadCall,
    },
    types::{
        Address,
        Amount,
        ContractAddress,
        LotterySnapshot,
    },
};
use std::sync::Arc;

/// Reads the derived lottery state from one contract.
pub struct ContractStateReader<T> {
    transport: Arc<T>,
}

impl<T> Clone for ContractStateReader<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: ContractTransport> ContractStateReader<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Issues the three reads concurrently and only yields a snapshot when all
    /// of them succeeded.
    pub async fn read_snapshot(
        &self,
        contract: ContractAddress,
    ) -> Result<LotterySnapshot, ReadFailure> {
        let (entrance_fee, player_count, recent_winner) = tokio::try_join!(
            self.read_uint(contract, ReadCall::EntranceFee),
            self.read_player_count(contract),
            self.read_winner(contract),
        )?;
        Ok(LotterySnapshot {
            entrance_fee,
            player_count,
            recent_winner,
        })
    }

    async fn read(
        &self,
        contract: ContractAddress,
        call: ReadCall,
    ) -> Result<CallValue, ReadFailure> {
        self.transport
            .read(contract, call)
            .await
            .map_err(|source| ReadFailure::Call { call, source })
    }

    async fn read_uint(
        &self,
        contract: ContractAddress,
        call: ReadCall,
    ) -> Result<Amount, ReadFailure> {
        match self.read(contract, call).await? {
            CallValue::Uint(value) => Ok(value),
            found => Err(ReadFailure::UnexpectedValue { call, found }),
        }
    }

    async fn read_player_count(&self, contract: ContractAddress) -> Result<u64, ReadFailure> {
        let call = ReadCall::NumberOfPlayers;
        let value = self.read_uint(contract, call).await?;
        u64::try_from(value).map_err(|_| ReadFailure::Overflow { call, value })
    }

    async fn read_winner(
        &self,
        contract: ContractAddress,
    ) -> Result<Option<Address>, ReadFailure> {
        let call = ReadCall::RecentWinner;
        match self.read(contract, call).await? {
            // no draw has happened yet
            CallValue::Address(winner) if winner == Address::ZERO => Ok(None),
            CallValue::Address(winner) => Ok(Some(winner)),
            found => Err(ReadFailure::UnexpectedValue { call, found }),
        }
    }
}
