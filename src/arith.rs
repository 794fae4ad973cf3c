//! Fixed-width modular arithmetic over power-of-two moduli.
//!
//! All protocol values are carried as `u32`. Reducing modulo $`2^{\ell}`$ for $`\ell \le 31`$ is a mask,
//! and wrapping `u32` arithmetic followed by the mask is exact because $`2^{\ell}`$ divides $`2^{32}`$.

use scuttlebutt::Block;

/// The modulus $`2^{\ell}`$.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Modulus {
    lg: u32,
    mask: u32,
}

impl Modulus {
    /// Largest supported exponent.
    pub const MAX_LG: u32 = 31;

    /// $`2^{lg}`$. Callers validate `lg <= MAX_LG` beforehand (see [PoolParams](crate::params::PoolParams)).
    pub const fn from_lg(lg: u32) -> Self {
        let mask = if lg >= 32 { u32::MAX } else { (1u32 << lg) - 1 };
        Self { lg, mask }
    }

    /// Binary logarithm of the modulus.
    #[inline]
    pub fn lg(&self) -> u32 {
        self.lg
    }

    /// The modulus as a plain number.
    #[inline]
    pub fn value(&self) -> u64 {
        1u64 << self.lg
    }

    /// `v mod 2^lg`.
    #[inline(always)]
    pub fn reduce(&self, v: u32) -> u32 {
        v & self.mask
    }

    /// `(a + b) mod 2^lg`.
    #[inline(always)]
    pub fn add(&self, a: u32, b: u32) -> u32 {
        a.wrapping_add(b) & self.mask
    }

    /// `(a - b) mod 2^lg`.
    #[inline(always)]
    pub fn sub(&self, a: u32, b: u32) -> u32 {
        a.wrapping_sub(b) & self.mask
    }

    /// Sum of all values, reduced.
    pub fn sum<I: IntoIterator<Item = u32>>(&self, values: I) -> u32 {
        values
            .into_iter()
            .fold(0u32, |acc, v| acc.wrapping_add(v))
            & self.mask
    }
}

/// Low 32 bits of a block, read little-endian.
///
/// OT outputs are pseudorandom 128-bit blocks; the protocol only needs the low lane, which is
/// afterwards reduced by the relevant [Modulus].
#[inline]
pub fn block_lane(block: &Block) -> u32 {
    bytes_lane(block.as_ref())
}

/// Low 32 bits of a byte string (at least four bytes), read little-endian.
#[inline]
pub fn bytes_lane(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
