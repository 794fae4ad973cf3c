//! # Pool OPRF
//!
//! An oblivious PRF whose online phase costs one consumed slot of precomputed OT randomness per query.
//! The function is a Learning-With-Rounding inner product,
//! $`F_{sk}(t, x) = \lfloor \langle sk, H(t, x) \rangle / \delta \rfloor \bmod p`$ with
//! $`H(t, x) \in \mathbb{Z}_q^n`$ and $`sk \in \{0, 1\}^n`$.
//!
//! - Offline: [pool] builds the pair pool and the digit pool from random OTs ([ot]).
//! - Setup: the Evaluator publishes its [blinding vector](setup::BlindingVector) once per pool.
//! - Online: [online] runs Request, BlindEval and Finalize, one slot per query.
//!
//! [demo] runs both parties in one process; it backs the `pool_oprf` binary.
#![warn(missing_docs)]

pub mod arith;
pub mod channel_utils;
pub mod cli_utils;
pub mod demo;
pub mod error;
mod hash_utils;
pub mod online;
pub mod ot;
pub mod params;
pub mod pool;
pub mod setup;
