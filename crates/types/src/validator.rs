//! Validator identities and the delegate set.

use crate::crypto::Address;

/// A single delegate identity.
///
/// Immutable for the lifetime of a consensus round; the public key is kept
/// in serialized form and deserialized at verification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    /// Account address, the lookup key for inbound messages.
    pub address: Address,
    /// Serialized ed25519 public key.
    pub pub_key: Vec<u8>,
    /// Voting power (currently uniform across delegates).
    pub voting_power: u64,
}

/// Ordered collection of delegates.
///
/// The ordering defines the default proposer rotation within a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
}

impl ValidatorSet {
    /// Create a set from an ordered list of validators.
    pub fn new(validators: Vec<Validator>) -> Self {
        Self { validators }
    }

    /// Number of delegates.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Look up a validator by address, returning its rotation index too.
    pub fn get_by_address(&self, address: &Address) -> Option<(usize, &Validator)> {
        self.validators
            .iter()
            .enumerate()
            .find(|(_, v)| v.address == *address)
    }

    /// Whether an address belongs to the set.
    pub fn has_address(&self, address: &Address) -> bool {
        self.get_by_address(address).is_some()
    }

    /// Validator at a rotation index.
    pub fn at(&self, index: usize) -> Option<&Validator> {
        self.validators.get(index)
    }

    /// Iterate over all validators in rotation order.
    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter()
    }
}

/// The delegate set plus the chain identifier used as a signing-domain tag.
///
/// External callers receive deep copies; the consensus core holds the single
/// current version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorManager {
    /// Current delegate set.
    pub validators: ValidatorSet,
    /// Signing-domain tag bound into every vote and notify payload.
    pub chain_id: String,
}

impl ValidatorManager {
    /// Create a manager for a chain.
    pub fn new(validators: ValidatorSet, chain_id: impl Into<String>) -> Self {
        Self {
            validators,
            chain_id: chain_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn validator(seed: u8) -> Validator {
        let kp = KeyPair::from_seed(&[seed; 32]);
        Validator {
            address: kp.address(),
            pub_key: kp.public_key().as_bytes().to_vec(),
            voting_power: 1,
        }
    }

    #[test]
    fn lookup_by_address() {
        let set = ValidatorSet::new(vec![validator(1), validator(2), validator(3)]);
        let target = validator(2);

        let (index, found) = set.get_by_address(&target.address).unwrap();
        assert_eq!(index, 1);
        assert_eq!(found.address, target.address);

        let stranger = validator(9);
        assert!(set.get_by_address(&stranger.address).is_none());
        assert!(!set.has_address(&stranger.address));
    }

    #[test]
    fn rotation_index_access() {
        let set = ValidatorSet::new(vec![validator(1), validator(2)]);
        assert_eq!(set.at(0).unwrap().address, validator(1).address);
        assert!(set.at(2).is_none());
    }
}
