use crate::{
    bindings::ContractBinding,
    types::{
        ContractAddress,
        NetworkId,
    },
};

/// Outcome of looking up the lottery contract for a network. `Unsupported` is
/// a normal result, not an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    Resolved(ContractAddress),
    Unsupported,
}

#[derive(Clone, Debug)]
pub struct ChainResolver {
    binding: ContractBinding,
}

impl ChainResolver {
    pub fn new(binding: ContractBinding) -> Self {
        Self { binding }
    }

    pub fn resolve(&self, network: NetworkId) -> Resolution {
        match self.binding.address_for(network) {
            Some(address) => Resolution::Resolved(address),
            None => Resolution::Unsupported,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::types::Address;
    use proptest::prelude::*;

    fn resolver_with(entries: &[(u64, u8)]) -> ChainResolver {
        ChainResolver::new(ContractBinding::new(entries.iter().map(|(id, byte)| {
            (NetworkId::new(*id), Address::repeat_byte(*byte))
        })))
    }

    #[test]
    fn resolve__bound_network__returns_its_address() {
        let resolver = resolver_with(&[(1, 0xaa), (31337, 0xbb)]);

        assert_eq!(
            resolver.resolve(NetworkId::new(1)),
            Resolution::Resolved(Address::repeat_byte(0xaa))
        );
        assert_eq!(
            resolver.resolve(NetworkId::new(31337)),
            Resolution::Resolved(Address::repeat_byte(0xbb))
        );
    }

    #[test]
    fn resolve__empty_binding__is_unsupported() {
        let resolver = ChainResolver::new(ContractBinding::default());

        assert_eq!(resolver.resolve(NetworkId::new(1)), Resolution::Unsupported);
    }

    proptest! {
        #[test]
        fn resolve__unbound_network__is_unsupported(
            bound in proptest::collection::hash_map(any::<u64>(), any::<u8>(), 0..8),
            queried in any::<u64>(),
        ) {
            prop_assume!(!bound.contains_key(&queried));
            let entries: Vec<(u64, u8)> = bound.into_iter().collect();
            let resolver = resolver_with(&entries);

            prop_assert_eq!(resolver.resolve(NetworkId::new(queried)), Resolution::Unsupported);
        }
    }
}
