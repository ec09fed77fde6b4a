use norn_hashes::{Hash, Hasher, HasherBase, MultisetFinalizeHash};
use secp256k1::{PublicKey, SECP256K1};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::Display;

pub const SERIALIZED_MULTISET_SIZE: usize = 33;

/// An elliptic-curve multiset hash: an order-independent, incrementally
/// updatable digest of a set of byte strings. Elements are mapped onto
/// secp256k1 via try-and-increment; the set digest is the group sum of the
/// element points, so removal is addition of the negated point.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Multiset {
    // None encodes the group identity (the empty multiset)
    point: Option<PublicKey>,
}

impl Default for Multiset {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct DeserializeError;

impl Display for DeserializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "serialized multiset is not a valid curve point")
    }
}

impl Error for DeserializeError {}

impl Multiset {
    /// Returns the empty multiset. When finalized it equals a set which had all
    /// its elements removed.
    #[inline]
    pub fn new() -> Self {
        Self { point: None }
    }

    /// Hashes the data and adds it to the multiset. Arbitrary length data is supported.
    pub fn add_element(&mut self, data: &[u8]) {
        let element = data_to_point(data);
        self.combine_point(Some(element));
    }

    /// Hashes the data and removes it from the multiset.
    pub fn remove_element(&mut self, data: &[u8]) {
        let element = data_to_point(data).negate(SECP256K1);
        self.combine_point(Some(element));
    }

    /// Adds the two multisets together. Equivalent to adding all the data
    /// elements of `other` one by one.
    pub fn combine(&mut self, other: &Self) {
        self.combine_point(other.point);
    }

    fn combine_point(&mut self, other: Option<PublicKey>) {
        self.point = match (self.point, other) {
            (None, p) => p,
            (p, None) => p,
            // combine fails only when the sum is the point at infinity,
            // i.e. the multisets cancel out back to the empty set
            (Some(a), Some(b)) => a.combine(&b).ok(),
        };
    }

    pub fn finalize(&self) -> Hash {
        MultisetFinalizeHash::hash(self.serialize())
    }

    pub fn serialize(&self) -> [u8; SERIALIZED_MULTISET_SIZE] {
        match self.point {
            Some(point) => point.serialize(),
            None => [0u8; SERIALIZED_MULTISET_SIZE],
        }
    }

    pub fn deserialize(data: [u8; SERIALIZED_MULTISET_SIZE]) -> Result<Self, DeserializeError> {
        if data == [0u8; SERIALIZED_MULTISET_SIZE] {
            return Ok(Self::new());
        }
        match PublicKey::from_slice(&data) {
            Ok(point) => Ok(Self { point: Some(point) }),
            Err(_) => Err(DeserializeError),
        }
    }
}

/// Maps arbitrary data onto a curve point by hashing together with an
/// incrementing counter until the digest is a valid x coordinate.
fn data_to_point(data: &[u8]) -> PublicKey {
    let mut candidate = [0u8; SERIALIZED_MULTISET_SIZE];
    candidate[0] = 0x02; // even-y compressed encoding
    for counter in 0u64.. {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_le_bytes());
        hasher.update(data);
        candidate[1..].copy_from_slice(hasher.finalize().as_slice());
        if let Ok(point) = PublicKey::from_slice(&candidate) {
            return point;
        }
    }
    unreachable!("a valid x coordinate is found after ~2 attempts on average")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{thread_rng, Rng};

    fn random_element() -> Vec<u8> {
        let mut rng = thread_rng();
        let len = rng.gen_range(1..200);
        (0..len).map(|_| rng.r#gen()).collect()
    }

    #[test]
    fn test_add_remove_roundtrip() {
        let empty = Multiset::new();
        let element = random_element();
        let mut set = Multiset::new();
        set.add_element(&element);
        assert_ne!(set.finalize(), empty.finalize());
        set.remove_element(&element);
        assert_eq!(set.finalize(), empty.finalize());
    }

    #[test]
    fn test_order_independence() {
        let (a, b, c) = (random_element(), random_element(), random_element());
        let mut first = Multiset::new();
        first.add_element(&a);
        first.add_element(&b);
        first.add_element(&c);
        let mut second = Multiset::new();
        second.add_element(&c);
        second.add_element(&a);
        second.add_element(&b);
        assert_eq!(first.finalize(), second.finalize());
    }

    #[test]
    fn test_combine_matches_element_wise_addition() {
        let (a, b) = (random_element(), random_element());
        let mut left = Multiset::new();
        left.add_element(&a);
        let mut right = Multiset::new();
        right.add_element(&b);
        left.combine(&right);

        let mut both = Multiset::new();
        both.add_element(&a);
        both.add_element(&b);
        assert_eq!(left.finalize(), both.finalize());
    }

    #[test]
    fn test_remove_before_add() {
        // Removal is group subtraction, so removing first and adding later cancels out
        let element = random_element();
        let mut set = Multiset::new();
        set.remove_element(&element);
        set.add_element(&element);
        assert_eq!(set.finalize(), Multiset::new().finalize());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut set = Multiset::new();
        set.add_element(&random_element());
        let restored = Multiset::deserialize(set.serialize()).unwrap();
        assert_eq!(set.finalize(), restored.finalize());

        assert_eq!(Multiset::deserialize([0u8; SERIALIZED_MULTISET_SIZE]).unwrap(), Multiset::new());
        assert_eq!(Multiset::deserialize([0xffu8; SERIALIZED_MULTISET_SIZE]), Err(DeserializeError));
    }
}
