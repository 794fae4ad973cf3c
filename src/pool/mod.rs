//! Preprocessing pools.
//!
//! Each party ends the offline phase with one half of two pools:
//!
//! | pool | Requester | Evaluator |
//! |------|-----------|-----------|
//! | pair ([pair]) | $`(S_0, S_1)`$ per slot | $`b`$ per coordinate, $`R = S_b`$ per slot |
//! | digit ([digit]) | $`\beta`$, $`R_c = T[\beta]`$ per round | $`T[0..\delta)`$ per round |
//!
//! [preprocess_requester] and [preprocess_evaluator] build both halves against each other over a
//! channel, pair pool first. They either return complete pools or an error; nothing built before a
//! failure is kept.

use crate::channel_utils::{MeteredChannel, Traffic};
use crate::error::PoolError;
use crate::ot::{
    DigitShareForEvaluator, DigitShareForRequester, PairShareForEvaluator, PairShareForRequester,
};
use crate::params::PoolParams;
use crate::setup::BlindingVector;
use anyhow::{bail, Context, Result};
use rand::{CryptoRng, Rng};
use scuttlebutt::AbstractChannel;
use std::time::{Duration, Instant};

pub mod digit;
pub use digit::{verify_digit_pool, EvaluatorDigitPool, RequesterDigitPool};
pub mod pair;
pub use pair::{verify_pair_pool, EvaluatorPairPool, RequesterPairPool};

/// Cost of building one pool half.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Bytes written by this party.
    pub bytes_sent: usize,
    /// Bytes read by this party.
    pub bytes_received: usize,
    /// Wall-clock time of the whole exchange.
    pub elapsed: Duration,
}

impl PoolStats {
    fn new(traffic: Traffic, elapsed: Duration) -> Self {
        Self {
            bytes_sent: traffic.bytes_sent,
            bytes_received: traffic.bytes_received,
            elapsed,
        }
    }
}

/// Requester's half of both pools.
#[derive(Clone, Debug)]
pub struct RequesterPool {
    params: PoolParams,
    pairs: RequesterPairPool,
    digits: RequesterDigitPool,
}

/// Evaluator's half of both pools.
#[derive(Clone, Debug)]
pub struct EvaluatorPool {
    params: PoolParams,
    pairs: EvaluatorPairPool,
    digits: EvaluatorDigitPool,
}

impl RequesterPool {
    /// Combine two halves built for `params`.
    pub fn new(
        params: PoolParams,
        pairs: RequesterPairPool,
        digits: RequesterDigitPool,
    ) -> Result<Self> {
        if pairs.rounds() < params.tau() || digits.rounds() < params.tau() {
            bail!(PoolError::InternalInconsistency(format!(
                "pools hold {} pair rounds and {} digit rounds, tau = {}",
                pairs.rounds(),
                digits.rounds(),
                params.tau()
            )));
        }
        Ok(Self {
            params,
            pairs,
            digits,
        })
    }

    /// Parameters the pool was built for.
    pub fn params(&self) -> &PoolParams {
        &self.params
    }

    /// Pair pool half.
    pub fn pairs(&self) -> &RequesterPairPool {
        &self.pairs
    }

    /// Digit pool half.
    pub fn digits(&self) -> &RequesterDigitPool {
        &self.digits
    }

    /// Receive the blinding vector published by the Evaluator's setup.
    pub fn accept_blinding<C: AbstractChannel>(&self, channel: &mut C) -> Result<BlindingVector> {
        BlindingVector::read_from(channel, self.params.n())
            .with_context(|| format!("@{}:{}", file!(), line!()))
    }
}

impl EvaluatorPool {
    /// Combine two halves built for `params`.
    pub fn new(
        params: PoolParams,
        pairs: EvaluatorPairPool,
        digits: EvaluatorDigitPool,
    ) -> Result<Self> {
        if pairs.rounds() < params.tau() || digits.rounds() < params.tau() {
            bail!(PoolError::InternalInconsistency(format!(
                "pools hold {} pair rounds and {} digit rounds, tau = {}",
                pairs.rounds(),
                digits.rounds(),
                params.tau()
            )));
        }
        Ok(Self {
            params,
            pairs,
            digits,
        })
    }

    /// Parameters the pool was built for.
    pub fn params(&self) -> &PoolParams {
        &self.params
    }

    /// Pair pool half.
    pub fn pairs(&self) -> &EvaluatorPairPool {
        &self.pairs
    }

    /// Digit pool half.
    pub fn digits(&self) -> &EvaluatorDigitPool {
        &self.digits
    }
}

/// Requester side of the offline phase.
pub fn preprocess_requester<C, RNG, P, D>(
    channel: &mut MeteredChannel<C>,
    rng: &mut RNG,
    params: &PoolParams,
    pair_share: &mut P,
    digit_share: &mut D,
) -> Result<(RequesterPool, PoolStats)>
where
    C: AbstractChannel,
    RNG: CryptoRng + Rng,
    P: PairShareForRequester,
    D: DigitShareForRequester,
{
    let start = Instant::now();
    let before = channel.traffic();

    let pairs = RequesterPairPool::precomp(channel, rng, params, pair_share)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    tracing::debug!(rounds = pairs.rounds(), elapsed = ?start.elapsed(), "requester pair pool built");

    let digits = RequesterDigitPool::precomp(channel, rng, params, digit_share)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    let pool = RequesterPool::new(*params, pairs, digits)?;
    let stats = PoolStats::new(channel.traffic().since(before), start.elapsed());

    tracing::info!(
        role = "requester",
        n = params.n(),
        tau = params.tau(),
        statsec = params.statistical_security(),
        pair_rounds = pool.pairs.rounds(),
        bytes_sent = stats.bytes_sent,
        bytes_received = stats.bytes_received,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "preprocessing done"
    );

    Ok((pool, stats))
}

/// Evaluator side of the offline phase.
pub fn preprocess_evaluator<C, RNG, P, D>(
    channel: &mut MeteredChannel<C>,
    rng: &mut RNG,
    params: &PoolParams,
    pair_share: &mut P,
    digit_share: &mut D,
) -> Result<(EvaluatorPool, PoolStats)>
where
    C: AbstractChannel,
    RNG: CryptoRng + Rng,
    P: PairShareForEvaluator,
    D: DigitShareForEvaluator,
{
    let start = Instant::now();
    let before = channel.traffic();

    let pairs = EvaluatorPairPool::precomp(channel, rng, params, pair_share)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    tracing::debug!(rounds = pairs.rounds(), elapsed = ?start.elapsed(), "evaluator pair pool built");

    let digits = EvaluatorDigitPool::precomp(channel, rng, params, digit_share)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    let pool = EvaluatorPool::new(*params, pairs, digits)?;
    let stats = PoolStats::new(channel.traffic().since(before), start.elapsed());

    tracing::info!(
        role = "evaluator",
        n = params.n(),
        tau = params.tau(),
        statsec = params.statistical_security(),
        pair_rounds = pool.pairs.rounds(),
        bytes_sent = stats.bytes_sent,
        bytes_received = stats.bytes_received,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "preprocessing done"
    );

    Ok((pool, stats))
}

/// Build matching pools locally, as a trusted dealer would. For tests and local experiments only.
pub fn deal<RNG: CryptoRng + Rng>(
    params: &PoolParams,
    rng: &mut RNG,
) -> Result<(RequesterPool, EvaluatorPool)> {
    let n = params.n();
    let q = params.q();
    let p = params.p();
    let delta = params.delta();
    let delta_len = params.delta_len();
    let rounds = params.tau();

    let choices = (0..n).map(|_| rng.gen::<bool>()).collect::<Vec<_>>();
    let pads = (0..n * rounds)
        .map(|_| [q.reduce(rng.gen()), q.reduce(rng.gen())])
        .collect::<Vec<_>>();
    let received = pads
        .iter()
        .enumerate()
        .map(|(j, pad)| pad[choices[j % n] as usize])
        .collect::<Vec<_>>();

    let tables = (0..delta_len * rounds)
        .map(|_| p.reduce(rng.gen()))
        .collect::<Vec<_>>();
    let digits = (0..rounds)
        .map(|_| delta.reduce(rng.gen()))
        .collect::<Vec<_>>();
    let picked = digits
        .iter()
        .enumerate()
        .map(|(ctr, &d)| tables[ctr * delta_len + d as usize])
        .collect::<Vec<_>>();

    let requester = RequesterPool::new(
        *params,
        RequesterPairPool::from_pads(n, pads)?,
        RequesterDigitPool::from_parts(delta, digits, picked)?,
    )?;
    let evaluator = EvaluatorPool::new(
        *params,
        EvaluatorPairPool::from_parts(choices, received)?,
        EvaluatorDigitPool::from_tables(delta_len, tables)?,
    )?;

    Ok((requester, evaluator))
}

/// Check both OT relations across the two halves.
pub fn verify_pools(requester: &RequesterPool, evaluator: &EvaluatorPool) -> Result<()> {
    verify_pair_pool(&requester.pairs, &evaluator.pairs)?;
    verify_digit_pool(&requester.digits, &evaluator.digits)
}
