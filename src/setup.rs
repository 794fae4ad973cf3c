//! Key material and the one-time blinding step.
//!
//! The Evaluator combines its secret key with the pair pool choice bits into
//! $`\bar b = b \oplus sk`$ and publishes it once per pool. Either half alone is uniform, so
//! $`\bar b`$ reveals neither.

use crate::channel_utils::{read_bits, write_bits};
use crate::error::PoolError;
use anyhow::{bail, Context, Result};
use rand::{CryptoRng, Rng};
use scuttlebutt::AbstractChannel;
use std::fmt;

/// The Evaluator's `n`-bit key. Never leaves the Evaluator.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<bool>);

impl SecretKey {
    /// Uniform key of `n` bits.
    pub fn random<RNG: CryptoRng + Rng>(n: usize, rng: &mut RNG) -> Self {
        Self((0..n).map(|_| rng.gen::<bool>()).collect())
    }

    /// Key with the given bits.
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self(bits)
    }

    /// Key bits.
    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` for the zero-length key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<{} bits>)", self.0.len())
    }
}

/// Public $`\bar b`$.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlindingVector(Vec<bool>);

impl BlindingVector {
    /// $`\bar b = b \oplus sk`$.
    pub fn derive(choices: &[bool], sk: &SecretKey) -> Result<Self> {
        if choices.len() != sk.len() {
            bail!(PoolError::InternalInconsistency(format!(
                "{} choice bits for a key of {} bits",
                choices.len(),
                sk.len()
            )));
        }
        Ok(Self(
            choices
                .iter()
                .zip(sk.bits().iter())
                .map(|(&b, &s)| b ^ s)
                .collect(),
        ))
    }

    /// Wrap received bits.
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self(bits)
    }

    /// Bits of $`\bar b`$.
    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` for the zero-length vector.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Publish to the peer.
    pub fn write_to<C: AbstractChannel>(&self, channel: &mut C) -> Result<()> {
        write_bits(channel, &self.0).with_context(|| format!("@{}:{}", file!(), line!()))
    }

    /// Receive from the peer, expecting `n` bits.
    pub fn read_from<C: AbstractChannel>(channel: &mut C, n: usize) -> Result<Self> {
        let bits = read_bits(channel, n).with_context(|| format!("@{}:{}", file!(), line!()))?;
        Ok(Self(bits))
    }
}
