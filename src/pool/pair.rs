//! Pair pool: one-out-of-two random OTs, `n` per round.
//!
//! Slot `(ctr, i)` lives at index `ctr * n + i`. The Requester holds $`(S_0, S_1) \in \mathbb{Z}_q^2`$
//! and the Evaluator holds $`R = S_{b_i}`$. The choice bit $`b_i`$ depends on the coordinate only,
//! so one blinding vector $`\bar b = b \oplus sk`$ serves every round.
//!
//! [Direct](PairPoolMode::Direct) runs `n * tau` OTs. [Amplified](PairPoolMode::Amplified) runs `n`
//! base OTs and seeds an [AesRng] with each of $`S_0, S_1, R`$; round `r` of coordinate `i` is the
//! `r`-th output of the generator seeded by base slot `i`. Since $`R = S_b`$ as blocks, the derived
//! values keep the relation.

use crate::arith::{block_lane, Modulus};
use crate::error::PoolError;
use crate::ot::{PairShareForEvaluator, PairShareForRequester};
use crate::params::{PairPoolMode, PoolParams};
use anyhow::{bail, Context, Error, Result};
use rand::{CryptoRng, Rng, SeedableRng};
use rayon::prelude::*;
use scuttlebutt::{AbstractChannel, AesRng, Block};

/// Requester half of the pair pool.
#[derive(Clone, Debug)]
pub struct RequesterPairPool {
    n: usize,
    rounds: usize,
    pads: Vec<[u32; 2]>,
}

/// Evaluator half of the pair pool.
#[derive(Clone, Debug)]
pub struct EvaluatorPairPool {
    n: usize,
    rounds: usize,
    choices: Vec<bool>,
    received: Vec<u32>,
}

impl RequesterPairPool {
    /// Offline phase. Runs the OT exchange selected by `params.pair_mode()`.
    pub fn precomp<C, RNG, P>(
        channel: &mut C,
        rng: &mut RNG,
        params: &PoolParams,
        share: &mut P,
    ) -> Result<Self, Error>
    where
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
        P: PairShareForRequester,
    {
        let n = params.n();
        let q = params.q();

        let pads = match params.pair_mode() {
            PairPoolMode::Direct => {
                let count = n * params.tau();
                let pairs = share
                    .receive(channel, rng, count)
                    .with_context(|| format!("@{}:{}", file!(), line!()))?;
                reduce_pairs(&pairs, q)
            }
            PairPoolMode::Amplified => {
                let base = share
                    .receive(channel, rng, n)
                    .with_context(|| format!("@{}:{}", file!(), line!()))?;
                amplify_pairs(&base, params.kappa(), q)
            }
        };

        Self::from_pads(n, pads)
    }

    /// Assemble a pool from round-major pads already reduced mod q.
    pub fn from_pads(n: usize, pads: Vec<[u32; 2]>) -> Result<Self> {
        if n == 0 || pads.len() % n != 0 {
            bail!(PoolError::InternalInconsistency(format!(
                "{} pads do not fill whole rounds of {}",
                pads.len(),
                n
            )));
        }
        Ok(Self {
            n,
            rounds: pads.len() / n,
            pads,
        })
    }

    /// Number of rounds the pool holds.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// The `n` pairs $`(S_0, S_1)`$ of round `ctr`.
    pub fn pads(&self, ctr: usize) -> Result<&[[u32; 2]]> {
        if ctr >= self.rounds {
            bail!(PoolError::PoolExhausted { tau: self.rounds });
        }
        Ok(&self.pads[ctr * self.n..(ctr + 1) * self.n])
    }
}

impl EvaluatorPairPool {
    /// Offline phase. Draws the choice bits and runs the OT exchange selected by `params.pair_mode()`.
    pub fn precomp<C, RNG, P>(
        channel: &mut C,
        rng: &mut RNG,
        params: &PoolParams,
        share: &mut P,
    ) -> Result<Self, Error>
    where
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
        P: PairShareForEvaluator,
    {
        let n = params.n();
        let q = params.q();
        let choices = (0..n).map(|_| rng.gen::<bool>()).collect::<Vec<_>>();

        let received = match params.pair_mode() {
            PairPoolMode::Direct => {
                let replicated = choices
                    .iter()
                    .copied()
                    .cycle()
                    .take(n * params.tau())
                    .collect::<Vec<_>>();
                let r = share
                    .receive(channel, rng, &replicated)
                    .with_context(|| format!("@{}:{}", file!(), line!()))?;
                r.iter().map(|b| q.reduce(block_lane(b))).collect()
            }
            PairPoolMode::Amplified => {
                let base = share
                    .receive(channel, rng, &choices)
                    .with_context(|| format!("@{}:{}", file!(), line!()))?;
                amplify_received(&base, params.kappa(), q)
            }
        };

        Self::from_parts(choices, received)
    }

    /// Assemble a pool from the choice bits and round-major received values reduced mod q.
    pub fn from_parts(choices: Vec<bool>, received: Vec<u32>) -> Result<Self> {
        let n = choices.len();
        if n == 0 || received.len() % n != 0 {
            bail!(PoolError::InternalInconsistency(format!(
                "{} received values do not fill whole rounds of {}",
                received.len(),
                n
            )));
        }
        Ok(Self {
            n,
            rounds: received.len() / n,
            choices,
            received,
        })
    }

    /// Number of rounds the pool holds.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Choice bits $`b`$, one per coordinate.
    pub fn choices(&self) -> &[bool] {
        &self.choices
    }

    /// The `n` values $`R`$ of round `ctr`.
    pub fn received(&self, ctr: usize) -> Result<&[u32]> {
        if ctr >= self.rounds {
            bail!(PoolError::PoolExhausted { tau: self.rounds });
        }
        Ok(&self.received[ctr * self.n..(ctr + 1) * self.n])
    }
}

/// Check $`R = S_b`$ on every slot.
pub fn verify_pair_pool(requester: &RequesterPairPool, evaluator: &EvaluatorPairPool) -> Result<()> {
    if requester.n != evaluator.n || requester.rounds != evaluator.rounds {
        bail!(PoolError::InternalInconsistency(format!(
            "pair pool shapes differ: {}x{} vs {}x{}",
            requester.rounds, requester.n, evaluator.rounds, evaluator.n
        )));
    }

    let n = requester.n;
    let bad = requester
        .pads
        .iter()
        .zip(evaluator.received.iter())
        .enumerate()
        .find(|(j, (pad, &r))| pad[evaluator.choices[j % n] as usize] != r);

    if let Some((j, _)) = bad {
        bail!(PoolError::InternalInconsistency(format!(
            "pair slot (ctr = {}, i = {}) violates R = S[b]",
            j / n,
            j % n
        )));
    }

    Ok(())
}

fn reduce_pairs(pairs: &[(Block, Block)], q: Modulus) -> Vec<[u32; 2]> {
    pairs
        .iter()
        .map(|(s0, s1)| [q.reduce(block_lane(s0)), q.reduce(block_lane(s1))])
        .collect()
}

fn expand(seed: Block, kappa: usize, q: Modulus) -> Vec<u32> {
    let mut prg = AesRng::from_seed(seed);
    (0..kappa)
        .map(|_| q.reduce(block_lane(&prg.gen::<Block>())))
        .collect()
}

// base-major expansion, then transposed into the round-major layout
fn transpose<T: Copy + Default>(columns: Vec<Vec<T>>, kappa: usize) -> Vec<T> {
    let n = columns.len();
    let mut out = vec![T::default(); n * kappa];
    for (i, col) in columns.into_iter().enumerate() {
        for (r, v) in col.into_iter().enumerate() {
            out[r * n + i] = v;
        }
    }
    out
}

/// Expand `n` base pairs into `kappa` rounds.
pub fn amplify_pairs(base: &[(Block, Block)], kappa: usize, q: Modulus) -> Vec<[u32; 2]> {
    let columns = base
        .par_iter()
        .map(|&(s0, s1)| {
            expand(s0, kappa, q)
                .into_iter()
                .zip(expand(s1, kappa, q))
                .map(|(a, b)| [a, b])
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    transpose(columns, kappa)
}

/// Expand `n` base received values into `kappa` rounds.
pub fn amplify_received(base: &[Block], kappa: usize, q: Modulus) -> Vec<u32> {
    let columns = base
        .par_iter()
        .map(|&r| expand(r, kappa, q))
        .collect::<Vec<_>>();
    transpose(columns, kappa)
}
