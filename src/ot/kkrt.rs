//! One-out-of-$`\delta`$ random OT from the KKRT batched OPRF.
//!
//! The Evaluator plays the OPRF sender: for slot $`j`$ it obtains a seed $`k_j`$ and sets
//! $`T_j[k] = F(k_j, k)`$ for every $`k \in [0, \delta)`$. The Requester plays the OPRF receiver on
//! input $`\beta_j`$ and learns $`F(k_j, \beta_j) = T_j[\beta_j]`$ and nothing else.
//!
//! Slots are processed in batches of [BATCH_SIZE]; every batch is one correction message from the
//! Requester, which bounds both memory and the size of any single message.

use super::{DigitShareForEvaluator, DigitShareForRequester};
use crate::error::PoolError;
use anyhow::{bail, Context, Error, Result};
use ocelot::oprf::{Receiver as OprfReceiver, Sender as OprfSender};
use rand::{CryptoRng, Rng};
use scuttlebutt::channel::AbstractChannel;
use scuttlebutt::Block;
use std::marker::PhantomData;

/// Slots per correction exchange.
pub const BATCH_SIZE: usize = 1 << 10;

fn to_block<T: AsRef<[u8]>>(output: &T) -> Block {
    let mut b = [0u8; 16];
    b.copy_from_slice(&output.as_ref()[..16]);
    Block::from(b)
}

/// Digit pool source for the Evaluator backed by an OPRF sender (e.g. [KkrtSender](ocelot::oprf::KkrtSender)).
pub struct KkrtDigitSender<OP>(PhantomData<OP>)
where
    OP: OprfSender<Input = Block>;

impl<OP> KkrtDigitSender<OP>
where
    OP: OprfSender<Input = Block>,
{
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<OP> DigitShareForEvaluator for KkrtDigitSender<OP>
where
    OP: OprfSender<Input = Block>,
    OP::Seed: Copy,
    OP::Output: AsRef<[u8]>,
{
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        count: usize,
        delta: usize,
    ) -> Result<Vec<Vec<Block>>, Error> {
        let mut oprf = OP::init(channel, rng)
            .map_err(PoolError::transport("digit pool base exchange"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let inputs = (0..delta)
            .map(|k| Block::from(k as u128))
            .collect::<Vec<_>>();

        let mut tables = Vec::with_capacity(count);
        let mut done = 0;
        while done < count {
            let batch = BATCH_SIZE.min(count - done);

            let seeds = oprf
                .send(channel, batch, rng)
                .map_err(PoolError::transport("digit pool correction"))
                .with_context(|| format!("batch at {} @{}:{}", done, file!(), line!()))?;

            if seeds.len() != batch {
                bail!(PoolError::InternalInconsistency(format!(
                    "OPRF sender produced {} seeds for a batch of {}",
                    seeds.len(),
                    batch
                )));
            }

            tables.extend(seeds.into_iter().map(|seed| {
                inputs
                    .iter()
                    .map(|&k| to_block(&oprf.compute(seed, k)))
                    .collect::<Vec<_>>()
            }));

            done += batch;
            tracing::debug!(done, count, "digit pool batch corrected (sender)");
        }

        Ok(tables)
    }
}

/// Digit pool source for the Requester backed by an OPRF receiver (e.g. [KkrtReceiver](ocelot::oprf::KkrtReceiver)).
pub struct KkrtDigitReceiver<OP>(PhantomData<OP>)
where
    OP: OprfReceiver<Input = Block>;

impl<OP> KkrtDigitReceiver<OP>
where
    OP: OprfReceiver<Input = Block>,
{
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<OP> DigitShareForRequester for KkrtDigitReceiver<OP>
where
    OP: OprfReceiver<Input = Block>,
    OP::Output: AsRef<[u8]>,
{
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        digits: &[u32],
        delta: usize,
    ) -> Result<Vec<Block>, Error> {
        if let Some(&d) = digits.iter().find(|&&d| d as usize >= delta) {
            bail!(PoolError::InternalInconsistency(format!(
                "digit {} outside [0, {})",
                d, delta
            )));
        }

        let mut oprf = OP::init(channel, rng)
            .map_err(PoolError::transport("digit pool base exchange"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let mut received = Vec::with_capacity(digits.len());
        for (i, chunk) in digits.chunks(BATCH_SIZE).enumerate() {
            let inputs = chunk
                .iter()
                .map(|&d| Block::from(u128::from(d)))
                .collect::<Vec<_>>();

            let outputs = oprf
                .receive(channel, &inputs, rng)
                .map_err(PoolError::transport("digit pool correction"))
                .with_context(|| {
                    format!("batch at {} @{}:{}", i * BATCH_SIZE, file!(), line!())
                })?;

            if outputs.len() != inputs.len() {
                bail!(PoolError::InternalInconsistency(format!(
                    "OPRF receiver produced {} outputs for {} inputs",
                    outputs.len(),
                    inputs.len()
                )));
            }

            received.extend(outputs.iter().map(to_block));
            tracing::debug!(done = received.len(), "digit pool batch corrected (receiver)");
        }

        Ok(received)
    }
}
