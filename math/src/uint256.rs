use borsh::{BorshDeserialize, BorshSerialize};
use norn_hashes::Hash;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::ops::{Add, AddAssign, Div, Shl, Shr, Sub};

/// Little-endian 256-bit unsigned integer (4 x u64 limbs).
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Uint256(pub [u64; 4]);

impl Uint256 {
    pub const ZERO: Uint256 = Uint256([0; 4]);
    pub const MAX: Uint256 = Uint256([u64::MAX; 4]);

    #[inline]
    pub const fn from_u64(word: u64) -> Self {
        Uint256([word, 0, 0, 0])
    }

    #[inline]
    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        let mut out = [0u64; 4];
        out.iter_mut()
            .zip(bytes.chunks_exact(8))
            .for_each(|(word, chunk)| *word = u64::from_le_bytes(chunk.try_into().unwrap()));
        Uint256(out)
    }

    #[inline]
    pub fn to_le_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.chunks_exact_mut(8).zip(self.0.iter()).for_each(|(chunk, word)| chunk.copy_from_slice(&word.to_le_bytes()));
        out
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == [0; 4]
    }

    /// Number of significant bits (0 for zero).
    pub fn bits(self) -> u32 {
        for (i, &word) in self.0.iter().enumerate().rev() {
            if word != 0 {
                return (i as u32) * 64 + (64 - word.leading_zeros());
            }
        }
        0
    }

    pub fn overflowing_add(self, other: Self) -> (Self, bool) {
        let mut out = [0u64; 4];
        let mut carry = false;
        for i in 0..4 {
            let (v, c1) = self.0[i].overflowing_add(other.0[i]);
            let (v, c2) = v.overflowing_add(carry as u64);
            out[i] = v;
            carry = c1 | c2;
        }
        (Uint256(out), carry)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        match self.overflowing_add(other) {
            (v, false) => Some(v),
            (_, true) => None,
        }
    }

    pub fn overflowing_sub(self, other: Self) -> (Self, bool) {
        let mut out = [0u64; 4];
        let mut borrow = false;
        for i in 0..4 {
            let (v, b1) = self.0[i].overflowing_sub(other.0[i]);
            let (v, b2) = v.overflowing_sub(borrow as u64);
            out[i] = v;
            borrow = b1 | b2;
        }
        (Uint256(out), borrow)
    }

    /// Multiplies by a u64, wrapping on overflow.
    pub fn wrapping_mul_u64(self, other: u64) -> Self {
        let mut out = [0u64; 4];
        let mut carry: u128 = 0;
        for i in 0..4 {
            let product = (self.0[i] as u128) * (other as u128) + carry;
            out[i] = product as u64;
            carry = product >> 64;
        }
        Uint256(out)
    }

    pub fn div_u64(self, divisor: u64) -> Self {
        assert!(divisor != 0, "division by zero");
        let mut out = [0u64; 4];
        let mut rem: u128 = 0;
        for i in (0..4).rev() {
            let acc = (rem << 64) | self.0[i] as u128;
            out[i] = (acc / divisor as u128) as u64;
            rem = acc % divisor as u128;
        }
        Uint256(out)
    }

    /// Binary long division.
    pub fn div_rem(self, divisor: Self) -> (Self, Self) {
        assert!(!divisor.is_zero(), "division by zero");
        if self < divisor {
            return (Self::ZERO, self);
        }
        let mut quotient = Self::ZERO;
        let mut remainder = Self::ZERO;
        for bit in (0..self.bits()).rev() {
            remainder = remainder << 1;
            if self.bit(bit) {
                remainder.0[0] |= 1;
            }
            if remainder >= divisor {
                remainder = remainder - divisor;
                quotient.set_bit(bit);
            }
        }
        (quotient, remainder)
    }

    #[inline]
    fn bit(&self, index: u32) -> bool {
        (self.0[(index / 64) as usize] >> (index % 64)) & 1 == 1
    }

    #[inline]
    fn set_bit(&mut self, index: u32) {
        self.0[(index / 64) as usize] |= 1 << (index % 64);
    }

    /// Converts a compact target representation (as stored in a header's `bits`
    /// field) to a full 256-bit target. The compact form packs a sign-less
    /// base-256 mantissa with an exponent: `mantissa * 256^(exponent-3)`.
    /// Returns `None` when the mantissa overflows 256 bits.
    pub fn from_compact_target_bits(bits: u32) -> Option<Self> {
        let exponent = bits >> 24;
        let mut mantissa = bits & 0x007f_ffff;
        // The sign bit is meaningless for targets; treat it as invalid
        if bits & 0x0080_0000 != 0 {
            return None;
        }
        if exponent <= 3 {
            mantissa >>= 8 * (3 - exponent);
            Some(Self::from_u64(mantissa as u64))
        } else {
            let shift = 8 * (exponent - 3);
            if shift > 256 - 24 {
                return None;
            }
            Some(Self::from_u64(mantissa as u64) << shift)
        }
    }

    /// Converts this value to its compact target representation.
    pub fn compact_target_bits(self) -> u32 {
        let mut exponent = self.bits().div_ceil(8);
        let mut mantissa = if exponent <= 3 {
            (self.0[0] << (8 * (3 - exponent))) as u32
        } else {
            (self >> (8 * (exponent - 3))).0[0] as u32
        };
        // Normalize away the sign bit by shifting the mantissa down a byte
        if mantissa & 0x0080_0000 != 0 {
            mantissa >>= 8;
            exponent += 1;
        }
        mantissa | (exponent << 24)
    }

    /// The expected number of hash attempts a target represents:
    /// `2^256 / (target + 1)`, computed as `~target / (target + 1) + 1`.
    pub fn work_from_target(target: Self) -> Self {
        if target == Self::MAX {
            return Self::from_u64(1);
        }
        let incremented = target + Self::from_u64(1);
        let negated = Uint256([!target.0[0], !target.0[1], !target.0[2], !target.0[3]]);
        negated.div_rem(incremented).0 + Self::from_u64(1)
    }
}

impl From<Hash> for Uint256 {
    fn from(hash: Hash) -> Self {
        Uint256(hash.to_le_u64())
    }
}

impl From<u64> for Uint256 {
    fn from(word: u64) -> Self {
        Self::from_u64(word)
    }
}

impl Ord for Uint256 {
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..4).rev() {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Uint256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for Uint256 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        let (v, overflow) = self.overflowing_add(other);
        debug_assert!(!overflow, "Uint256 add overflow");
        v
    }
}

impl AddAssign for Uint256 {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Uint256 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        let (v, underflow) = self.overflowing_sub(other);
        debug_assert!(!underflow, "Uint256 sub underflow");
        v
    }
}

impl Div for Uint256 {
    type Output = Self;
    fn div(self, other: Self) -> Self {
        self.div_rem(other).0
    }
}

impl Shl<u32> for Uint256 {
    type Output = Self;
    fn shl(self, shift: u32) -> Self {
        let mut out = [0u64; 4];
        let word_shift = (shift / 64) as usize;
        let bit_shift = shift % 64;
        for i in word_shift..4 {
            out[i] = self.0[i - word_shift] << bit_shift;
            if bit_shift > 0 && i > word_shift {
                out[i] |= self.0[i - word_shift - 1] >> (64 - bit_shift);
            }
        }
        Uint256(out)
    }
}

impl Shr<u32> for Uint256 {
    type Output = Self;
    fn shr(self, shift: u32) -> Self {
        let mut out = [0u64; 4];
        let word_shift = (shift / 64) as usize;
        let bit_shift = shift % 64;
        for i in word_shift..4 {
            out[i - word_shift] = self.0[i] >> bit_shift;
            if bit_shift > 0 && i < 3 {
                out[i - word_shift] |= self.0[i + 1] << (64 - bit_shift);
            }
        }
        Uint256(out)
    }
}

impl Display for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Big-endian hex, leading zeros trimmed
        let mut bytes = self.to_le_bytes();
        bytes.reverse();
        let mut hex = [0u8; 64];
        faster_hex::hex_encode(&bytes, &mut hex).expect("The output is exactly twice the size of the input");
        let s = std::str::from_utf8(&hex).unwrap().trim_start_matches('0');
        f.write_str(if s.is_empty() { "0" } else { s })
    }
}

impl Debug for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sub_roundtrip() {
        let a = Uint256([u64::MAX, 1, 2, 3]);
        let b = Uint256([5, 6, 7, 8]);
        assert_eq!((a + b) - b, a);
    }

    #[test]
    fn test_add_carry_chain() {
        let a = Uint256([u64::MAX, u64::MAX, u64::MAX, 0]);
        let one = Uint256::from_u64(1);
        assert_eq!(a + one, Uint256([0, 0, 0, 1]));
    }

    #[test]
    fn test_overflow_detection() {
        assert_eq!(Uint256::MAX.checked_add(Uint256::from_u64(1)), None);
        assert!(Uint256::MAX.checked_add(Uint256::ZERO).is_some());
    }

    #[test]
    fn test_shifts() {
        let one = Uint256::from_u64(1);
        assert_eq!((one << 64).0, [0, 1, 0, 0]);
        assert_eq!((one << 200) >> 200, one);
        assert_eq!((one << 1).0, [2, 0, 0, 0]);
    }

    #[test]
    fn test_ordering() {
        assert!(Uint256([0, 0, 0, 1]) > Uint256([u64::MAX, u64::MAX, u64::MAX, 0]));
        assert!(Uint256::from_u64(5) < Uint256::from_u64(6));
    }

    #[test]
    fn test_div_rem() {
        let a = Uint256::from_u64(1000);
        let b = Uint256::from_u64(7);
        let (q, r) = a.div_rem(b);
        assert_eq!(q, Uint256::from_u64(142));
        assert_eq!(r, Uint256::from_u64(6));

        let big = Uint256::from_u64(1) << 200;
        let (q, r) = big.div_rem(Uint256::from_u64(1) << 100);
        assert_eq!(q, Uint256::from_u64(1) << 100);
        assert!(r.is_zero());
    }

    #[test]
    fn test_compact_bits_roundtrip() {
        // Canonical mainnet-style compact targets survive the roundtrip
        for bits in [0x1d00ffffu32, 0x1b04864c, 0x207fffff, 0x1e7fffff] {
            let target = Uint256::from_compact_target_bits(bits).unwrap();
            assert_eq!(target.compact_target_bits(), bits, "bits {bits:#x}");
        }
    }

    #[test]
    fn test_compact_bits_rejects_sign() {
        assert_eq!(Uint256::from_compact_target_bits(0x1d80ffff), None);
    }

    #[test]
    fn test_work_from_target() {
        // A target of 2^255-1 means 2 expected attempts
        let half = Uint256::MAX >> 1;
        assert_eq!(Uint256::work_from_target(half), Uint256::from_u64(2));
        assert_eq!(Uint256::work_from_target(Uint256::MAX), Uint256::from_u64(1));
    }

    #[test]
    fn test_hash_conversion() {
        let hash = Hash::from_le_u64([1, 2, 3, 4]);
        assert_eq!(Uint256::from(hash).0, [1, 2, 3, 4]);
    }
}
