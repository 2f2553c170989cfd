use crate::types::{
    ContractAddress,
    NetworkId,
};
use anyhow::{
    Context,
    Result,
    anyhow,
};
use serde::{
    Deserialize,
    Deserializer,
    de::{
        MapAccess,
        Visitor,
    },
};
use std::{
    collections::HashMap,
    fmt,
    fs,
    path::Path,
    str::FromStr,
};

pub const DEFAULT_BINDINGS_FILE: &str = "contract-addresses.json";

/// Static table of the lottery contract deployed on each supported network.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ContractBinding {
    addresses: HashMap<NetworkId, ContractAddress>,
}

impl ContractBinding {
    pub fn new(entries: impl IntoIterator<Item = (NetworkId, ContractAddress)>) -> Self {
        Self {
            addresses: entries.into_iter().collect(),
        }
    }

    pub fn address_for(&self, network: NetworkId) -> Option<ContractAddress> {
        self.addresses.get(&network).copied()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).with_context(|| {
            format!("Failed to read contract bindings from {}", path.display())
        })?;
        Self::from_json_slice(&data).with_context(|| {
            format!("Failed to load contract bindings from {}", path.display())
        })
    }

    /// Parses `{"<chain id>": ["<address>", ...], ...}`. Only the first address
    /// of each network is bound.
    pub fn from_json_slice(data: &[u8]) -> Result<Self> {
        let BindingEntries(entries) = serde_json::from_slice(data)
            .context("Failed to parse contract bindings JSON; expected an object of address arrays")?;
        let mut addresses = HashMap::new();
        for (network, raw_addresses) in entries {
            let mut candidates = raw_addresses.into_iter();
            let Some(first) = candidates.next() else {
                tracing::warn!(%network, "no contract address listed; network stays unbound");
                continue;
            };
            let extra = candidates.count();
            if extra > 0 {
                tracing::debug!(%network, extra, "ignoring additional contract addresses");
            }
            let address = ContractAddress::from_str(first.trim()).map_err(|e| {
                anyhow!("Invalid contract address {first:?} for network {network}: {e}")
            })?;
            if addresses.insert(network, address).is_some() {
                return Err(anyhow!("Network {network} is listed more than once"));
            }
        }
        Ok(Self { addresses })
    }
}

// Object entries in file order. "4" and "0x4" name the same network, so a
// plain map would silently keep only one of them.
struct BindingEntries(Vec<(NetworkId, Vec<String>)>);

impl<'de> Deserialize<'de> for BindingEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = BindingEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping chain ids to address arrays")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<NetworkId, Vec<String>>()? {
                    entries.push(entry);
                }
                Ok(BindingEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    const LOCAL: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const RINKEBY: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";

    #[test]
    fn from_json_slice__binds_first_address_per_network() {
        // given
        let json = format!(r#"{{"31337": ["{LOCAL}", "{RINKEBY}"], "0x4": ["{RINKEBY}"]}}"#);

        // when
        let binding = ContractBinding::from_json_slice(json.as_bytes()).unwrap();

        // then
        assert_eq!(binding.len(), 2);
        assert_eq!(
            binding.address_for(NetworkId::new(31337)),
            Some(LOCAL.parse().unwrap())
        );
        assert_eq!(
            binding.address_for(NetworkId::new(4)),
            Some(RINKEBY.parse().unwrap())
        );
    }

    #[test]
    fn from_json_slice__skips_networks_without_addresses() {
        let json = format!(r#"{{"1": [], "31337": ["{LOCAL}"]}}"#);

        let binding = ContractBinding::from_json_slice(json.as_bytes()).unwrap();

        assert_eq!(binding.address_for(NetworkId::new(1)), None);
        assert_eq!(binding.len(), 1);
    }

    #[test]
    fn from_json_slice__rejects_invalid_address() {
        let json = r#"{"31337": ["0xnot-an-address"]}"#;

        let err = ContractBinding::from_json_slice(json.as_bytes()).unwrap_err();

        assert!(err.to_string().contains("Invalid contract address"));
    }

    #[test]
    fn from_json_slice__rejects_duplicate_network_spellings() {
        let json = format!(r#"{{"4": ["{LOCAL}"], "0x4": ["{RINKEBY}"]}}"#);

        assert!(ContractBinding::from_json_slice(json.as_bytes()).is_err());
    }

    #[test]
    fn from_json_slice__invalid_chain_id__errors() {
        let json = format!(r#"{{"goerli": ["{LOCAL}"]}}"#);

        let err = ContractBinding::from_json_slice(json.as_bytes()).unwrap_err();

        assert!(format!("{err:#}").contains("goerli"));
    }

    #[test]
    fn load__reads_file_from_disk() {
        // given
        let dir = tempdir::TempDir::new("bindings").unwrap();
        let path = dir.path().join(DEFAULT_BINDINGS_FILE);
        fs::write(&path, format!(r#"{{"31337": ["{LOCAL}"]}}"#)).unwrap();

        // when
        let binding = ContractBinding::load(&path).unwrap();

        // then
        assert_eq!(
            binding.address_for(NetworkId::new(31337)),
            Some(LOCAL.parse().unwrap())
        );
    }

    #[test]
    fn load__missing_file_mentions_path() {
        let err = ContractBinding::load("/definitely/not/here.json").unwrap_err();

        assert!(format!("{err:#}").contains("/definitely/not/here.json"));
    }
}
