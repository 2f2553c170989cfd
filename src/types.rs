use serde::{
    Deserialize,
    Deserializer,
    de,
};
use std::{
    fmt,
    str::FromStr,
};

pub use alloy::primitives::{
    Address,
    U256,
};

/// Payment amounts in the chain's base unit (wei).
pub type Amount = U256;

pub type ContractAddress = Address;

/// Identifier of the chain the wallet is connected to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NetworkId(u64);

impl NetworkId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl From<u64> for NetworkId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid network id {raw:?}: expected a decimal or 0x-prefixed hex integer")]
pub struct ParseNetworkIdError {
    raw: String,
}

impl FromStr for NetworkId {
    type Err = ParseNetworkIdError;

    // Wallets hand out chain ids as hex ("0x7a69") while deployment files key
    // them in decimal ("31337").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse::<u64>(),
        };
        parsed.map(Self).map_err(|_| ParseNetworkIdError {
            raw: s.to_string(),
        })
    }
}

// Keys in the bindings file use the same spellings as `FromStr`.
impl<'de> Deserialize<'de> for NetworkId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Wallet/network provider state as seen by the client.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NetworkSignal {
    pub network: Option<NetworkId>,
    pub ready: bool,
}

impl NetworkSignal {
    pub fn ready(network: NetworkId) -> Self {
        Self {
            network: Some(network),
            ready: true,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            network: None,
            ready: false,
        }
    }

    /// The network to sync against, if the provider is usable at all.
    pub fn active_network(&self) -> Option<NetworkId> {
        if self.ready { self.network } else { None }
    }
}

/// One consistent read of the lottery contract.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LotterySnapshot {
    pub entrance_fee: Amount,
    pub player_count: u64,
    pub recent_winner: Option<Address>,
}

impl LotterySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn from_str__accepts_decimal_and_hex() {
        assert_eq!("31337".parse::<NetworkId>(), Ok(NetworkId::new(31337)));
        assert_eq!("0x7a69".parse::<NetworkId>(), Ok(NetworkId::new(31337)));
        assert_eq!("0X4".parse::<NetworkId>(), Ok(NetworkId::new(4)));
    }

    #[test]
    fn from_str__rejects_garbage() {
        assert!("".parse::<NetworkId>().is_err());
        assert!("0x".parse::<NetworkId>().is_err());
        assert!("goerli".parse::<NetworkId>().is_err());
    }

    #[test]
    fn deserialize__hex_and_decimal_strings__match_from_str() {
        let hex: NetworkId = serde_json::from_str(r#""0x7a69""#).unwrap();
        let decimal: NetworkId = serde_json::from_str(r#""31337""#).unwrap();

        assert_eq!(hex, NetworkId::new(31337));
        assert_eq!(decimal, hex);
    }

    #[test]
    fn deserialize__garbage__reports_raw_value() {
        let err = serde_json::from_str::<NetworkId>(r#""goerli""#).unwrap_err();

        assert!(err.to_string().contains("goerli"));
    }

    #[test]
    fn active_network__requires_ready_flag() {
        let not_ready = NetworkSignal {
            network: Some(NetworkId::new(1)),
            ready: false,
        };
        assert_eq!(not_ready.active_network(), None);
        assert_eq!(NetworkSignal::disconnected().active_network(), None);
        assert_eq!(
            NetworkSignal::ready(NetworkId::new(1)).active_network(),
            Some(NetworkId::new(1))
        );
    }
}
