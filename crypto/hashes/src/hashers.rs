pub trait HasherBase {
    fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self;
}

pub trait Hasher: HasherBase + Clone + Default {
    fn finalize(self) -> crate::Hash;
    fn reset(&mut self);
    #[inline(always)]
    fn hash<A: AsRef<[u8]>>(data: A) -> crate::Hash {
        let mut hasher = Self::default();
        hasher.update(data);
        hasher.finalize()
    }
}

/// The protocol hashes everything with double-SHA256. Distinct hasher types are
/// kept per usage so call sites state which commitment they produce.
macro_rules! double_sha256_hasher {
    ($(struct $name:ident,)+ ) => {$(
        #[derive(Clone)]
        pub struct $name(sha2::Sha256);

        impl $name {
            #[inline(always)]
            pub fn new() -> Self {
                use sha2::Digest;
                Self(sha2::Sha256::new())
            }

            pub fn write<A: AsRef<[u8]>>(&mut self, data: A) {
                sha2::Digest::update(&mut self.0, data.as_ref());
            }

            #[inline(always)]
            pub fn finalize(self) -> crate::Hash {
                use sha2::Digest;
                let first = sha2::Digest::finalize(self.0);
                let mut second = sha2::Sha256::new();
                second.update(first.as_slice());
                let mut out = [0u8; 32];
                out.copy_from_slice(second.finalize().as_slice());
                crate::Hash(out)
            }
        }
    impl_hasher!{ struct $name }
    )*};
}

macro_rules! impl_hasher {
    (struct $name:ident) => {
        impl HasherBase for $name {
            #[inline(always)]
            fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self {
                self.write(data);
                self
            }
        }
        impl Hasher for $name {
            #[inline(always)]
            fn finalize(self) -> crate::Hash {
                $name::finalize(self)
            }
            #[inline(always)]
            fn reset(&mut self) {
                *self = Self::new();
            }
        }
        impl Default for $name {
            #[inline(always)]
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

double_sha256_hasher! {
    struct BlockHash,
    struct TransactionHash,
    struct TransactionID,
    struct TransactionSigningHash,
    struct MerkleBranchHash,
    struct PayloadHash,
    struct MultisetFinalizeHash,
    struct PowHash,
}

use {double_sha256_hasher, impl_hasher};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_sha256_vectors() {
        // sha256d("") and sha256d("abc"), little-known but standard vectors
        assert_eq!(
            BlockHash::hash([]).to_string(),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
        assert_eq!(
            BlockHash::hash(b"abc").to_string(),
            "4f8b42c22dd3729b519ba6f68d2da7cc5b2d606d05daed5ad5128cc03e6c6358"
        );
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let mut hasher = TransactionHash::new();
        hasher.update(b"he").update(b"llo");
        assert_eq!(hasher.finalize(), TransactionHash::hash(b"hello"));
    }

    #[test]
    fn test_hasher_types_agree() {
        // All hashers share the same function; the types only document intent
        assert_eq!(BlockHash::hash(b"x"), TransactionID::hash(b"x"));
    }
}
