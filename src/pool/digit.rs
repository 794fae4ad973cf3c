//! Digit pool: one-out-of-$`\delta`$ random OTs, one per round.
//!
//! The Evaluator holds a table $`T[0..\delta) \in \mathbb{Z}_p^\delta`$ per round, the Requester a digit
//! $`\beta \in [0, \delta)`$ and $`R_c = T[\beta]`$.

use crate::arith::{block_lane, Modulus};
use crate::error::PoolError;
use crate::ot::{DigitShareForEvaluator, DigitShareForRequester};
use crate::params::PoolParams;
use anyhow::{bail, Context, Error, Result};
use rand::{CryptoRng, Rng};
use scuttlebutt::AbstractChannel;

/// Evaluator half of the digit pool.
#[derive(Clone, Debug)]
pub struct EvaluatorDigitPool {
    delta: usize,
    tables: Vec<u32>,
}

/// Requester half of the digit pool.
#[derive(Clone, Debug)]
pub struct RequesterDigitPool {
    digits: Vec<u32>,
    received: Vec<u32>,
}

impl EvaluatorDigitPool {
    /// Offline phase.
    pub fn precomp<C, RNG, D>(
        channel: &mut C,
        rng: &mut RNG,
        params: &PoolParams,
        share: &mut D,
    ) -> Result<Self, Error>
    where
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
        D: DigitShareForEvaluator,
    {
        let delta = params.delta_len();
        let p = params.p();

        let tables = share
            .receive(channel, rng, params.tau(), delta)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        if tables.len() != params.tau() || tables.iter().any(|t| t.len() != delta) {
            bail!(PoolError::InternalInconsistency(format!(
                "digit source returned {} tables, {} of {} expected",
                tables.len(),
                params.tau(),
                delta
            )));
        }

        let tables = tables
            .iter()
            .flatten()
            .map(|b| p.reduce(block_lane(b)))
            .collect();

        Self::from_tables(delta, tables)
    }

    /// Assemble a pool from round-major tables already reduced mod p.
    pub fn from_tables(delta: usize, tables: Vec<u32>) -> Result<Self> {
        if delta == 0 || tables.len() % delta != 0 {
            bail!(PoolError::InternalInconsistency(format!(
                "{} entries do not fill whole tables of {}",
                tables.len(),
                delta
            )));
        }
        Ok(Self { delta, tables })
    }

    /// Number of rounds the pool holds.
    pub fn rounds(&self) -> usize {
        self.tables.len() / self.delta
    }

    /// Table $`T`$ of round `ctr`.
    pub fn table(&self, ctr: usize) -> Result<&[u32]> {
        if ctr >= self.rounds() {
            bail!(PoolError::PoolExhausted { tau: self.rounds() });
        }
        Ok(&self.tables[ctr * self.delta..(ctr + 1) * self.delta])
    }
}

impl RequesterDigitPool {
    /// Offline phase. Draws the digits $`\beta`$ uniformly from $`[0, \delta)`$.
    pub fn precomp<C, RNG, D>(
        channel: &mut C,
        rng: &mut RNG,
        params: &PoolParams,
        share: &mut D,
    ) -> Result<Self, Error>
    where
        C: AbstractChannel,
        RNG: CryptoRng + Rng,
        D: DigitShareForRequester,
    {
        let delta = params.delta();
        let p = params.p();

        let digits = (0..params.tau())
            .map(|_| delta.reduce(rng.gen::<u32>()))
            .collect::<Vec<_>>();

        let received = share
            .receive(channel, rng, &digits, params.delta_len())
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let received = received.iter().map(|b| p.reduce(block_lane(b))).collect();

        Self::from_parts(delta, digits, received)
    }

    /// Assemble a pool from digits and the matching table entries reduced mod p.
    pub fn from_parts(delta: Modulus, digits: Vec<u32>, received: Vec<u32>) -> Result<Self> {
        if digits.len() != received.len() {
            bail!(PoolError::InternalInconsistency(format!(
                "{} digits but {} received values",
                digits.len(),
                received.len()
            )));
        }
        if let Some(&d) = digits.iter().find(|&&d| delta.reduce(d) != d) {
            bail!(PoolError::InternalInconsistency(format!(
                "digit {} outside [0, {})",
                d,
                delta.value()
            )));
        }
        Ok(Self { digits, received })
    }

    /// Number of rounds the pool holds.
    pub fn rounds(&self) -> usize {
        self.digits.len()
    }

    /// $`(\beta, R_c)`$ of round `ctr`.
    pub fn slot(&self, ctr: usize) -> Result<(u32, u32)> {
        if ctr >= self.rounds() {
            bail!(PoolError::PoolExhausted { tau: self.rounds() });
        }
        Ok((self.digits[ctr], self.received[ctr]))
    }
}

/// Check $`R_c = T[\beta]`$ on every slot.
pub fn verify_digit_pool(
    requester: &RequesterDigitPool,
    evaluator: &EvaluatorDigitPool,
) -> Result<()> {
    if requester.rounds() != evaluator.rounds() {
        bail!(PoolError::InternalInconsistency(format!(
            "digit pools hold {} and {} rounds",
            requester.rounds(),
            evaluator.rounds()
        )));
    }

    for ctr in 0..requester.rounds() {
        let (beta, rc) = requester.slot(ctr)?;
        if evaluator.table(ctr)?[beta as usize] != rc {
            bail!(PoolError::InternalInconsistency(format!(
                "digit slot {} violates Rc = T[beta]",
                ctr
            )));
        }
    }

    Ok(())
}
