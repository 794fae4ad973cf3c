//! Random OT sources filling the preprocessing pools.
//!
//! Both pools consist of random oblivious transfers. The *pair pool* needs one-out-of-two random OTs:
//! the Requester ends up with pairs $`(S_0, S_1)`$ and the Evaluator with a choice bit $`b`$ and
//! $`R = S_b`$. The *digit pool* needs one-out-of-$`\delta`$ random OTs: the Evaluator ends up with
//! a table $`T[0..\delta)`$ and the Requester with a digit $`\beta`$ and $`R_c = T[\beta]`$.
//!
//! Each share trait below is the capability interface of such a source. One call to `receive`
//! performs the whole interactive exchange (base OTs, then extension) for the requested count, and
//! the two sides of one trait pair must be called with matching arguments on the two ends of a
//! channel.
//!
//! Backends:
//! - [OtPairSender] / [OtPairReceiver]: OT extension with random outputs (e.g. ALSZ).
//! - [KkrtDigitSender] / [KkrtDigitReceiver]: one-out-of-N OPRF (KKRT) used as one-out-of-$`\delta`$ OT.
//! - [NaorPinkasDigitSender] / [NaorPinkasDigitReceiver]: $`\lg \delta`$ one-out-of-two OTs per slot.
//! - [ideal]: trusted-dealer functionalities for tests.

use anyhow::Error;
use rand::{CryptoRng, Rng};
use scuttlebutt::channel::AbstractChannel;
use scuttlebutt::Block;

pub mod ideal;
pub mod kkrt;
pub use kkrt::{KkrtDigitReceiver, KkrtDigitSender};
pub mod naor_pinkas;
pub use naor_pinkas::{NaorPinkasDigitReceiver, NaorPinkasDigitSender};
pub mod ot_based;
pub use ot_based::{OtPairReceiver, OtPairSender};

/// Pair pool, Requester side (OT sender).
pub trait PairShareForRequester {
    /// Receive `count` random pairs $`(S_0, S_1)`$.
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        count: usize,
    ) -> Result<Vec<(Block, Block)>, Error>;
}

/// Pair pool, Evaluator side (OT receiver).
pub trait PairShareForEvaluator {
    /// Receive $`S_{b_j}`$ for every choice bit $`b_j`$.
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        choices: &[bool],
    ) -> Result<Vec<Block>, Error>;
}

/// Digit pool, Evaluator side (table holder).
pub trait DigitShareForEvaluator {
    /// Receive `count` random tables of `delta` entries each.
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        count: usize,
        delta: usize,
    ) -> Result<Vec<Vec<Block>>, Error>;
}

/// Digit pool, Requester side (chooser).
pub trait DigitShareForRequester {
    /// Receive $`T_j[\beta_j]`$ for every digit $`\beta_j \in [0, \delta)`$.
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        digits: &[u32],
        delta: usize,
    ) -> Result<Vec<Block>, Error>;
}
