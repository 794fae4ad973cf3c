//! Ideal random OT functionalities.
//!
//! The dealing side draws the random values and hands them to the choosing side over an in-process
//! link; the choosing side selects locally. Nothing goes over the protocol channel. Both halves of a
//! pair must live in the same process, typically on two threads of a test.

use super::{
    DigitShareForEvaluator, DigitShareForRequester, PairShareForEvaluator, PairShareForRequester,
};
use crate::error::PoolError;
use anyhow::{bail, Context, Error, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use rand::{CryptoRng, Rng};
use scuttlebutt::channel::AbstractChannel;
use scuttlebutt::Block;

/// Returns a linked pair of ideal one-out-of-two random OT sources.
pub fn ideal_pair_shares() -> (IdealPairSender, IdealPairReceiver) {
    let (s, r) = bounded(1);
    (IdealPairSender { link: s }, IdealPairReceiver { link: r })
}

/// Returns a linked pair of ideal one-out-of-$`\delta`$ random OT sources.
pub fn ideal_digit_shares() -> (IdealDigitSender, IdealDigitReceiver) {
    let (s, r) = bounded(1);
    (IdealDigitSender { link: s }, IdealDigitReceiver { link: r })
}

/// Ideal pair pool source, Requester side.
pub struct IdealPairSender {
    link: Sender<Vec<(Block, Block)>>,
}

/// Ideal pair pool source, Evaluator side.
pub struct IdealPairReceiver {
    link: Receiver<Vec<(Block, Block)>>,
}

/// Ideal digit pool source, Evaluator side.
pub struct IdealDigitSender {
    link: Sender<Vec<Vec<Block>>>,
}

/// Ideal digit pool source, Requester side.
pub struct IdealDigitReceiver {
    link: Receiver<Vec<Vec<Block>>>,
}

impl PairShareForRequester for IdealPairSender {
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        _channel: &mut C,
        rng: &mut RNG,
        count: usize,
    ) -> Result<Vec<(Block, Block)>, Error> {
        let pairs = (0..count)
            .map(|_| (rng.gen::<Block>(), rng.gen::<Block>()))
            .collect::<Vec<_>>();

        self.link
            .send(pairs.clone())
            .map_err(|_| PoolError::Transport {
                stage: "ideal pair pool",
                source: "peer dropped".into(),
            })
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        Ok(pairs)
    }
}

impl PairShareForEvaluator for IdealPairReceiver {
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        _channel: &mut C,
        _rng: &mut RNG,
        choices: &[bool],
    ) -> Result<Vec<Block>, Error> {
        let pairs = self
            .link
            .recv()
            .map_err(PoolError::transport("ideal pair pool"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        if pairs.len() != choices.len() {
            bail!(PoolError::InternalInconsistency(format!(
                "dealer produced {} pairs for {} choices",
                pairs.len(),
                choices.len()
            )));
        }

        Ok(pairs
            .into_iter()
            .zip(choices.iter())
            .map(|((s0, s1), &b)| if b { s1 } else { s0 })
            .collect())
    }
}

impl DigitShareForEvaluator for IdealDigitSender {
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        _channel: &mut C,
        rng: &mut RNG,
        count: usize,
        delta: usize,
    ) -> Result<Vec<Vec<Block>>, Error> {
        let tables = (0..count)
            .map(|_| (0..delta).map(|_| rng.gen::<Block>()).collect::<Vec<_>>())
            .collect::<Vec<_>>();

        self.link
            .send(tables.clone())
            .map_err(|_| PoolError::Transport {
                stage: "ideal digit pool",
                source: "peer dropped".into(),
            })
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        Ok(tables)
    }
}

impl DigitShareForRequester for IdealDigitReceiver {
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        _channel: &mut C,
        _rng: &mut RNG,
        digits: &[u32],
        delta: usize,
    ) -> Result<Vec<Block>, Error> {
        let tables = self
            .link
            .recv()
            .map_err(PoolError::transport("ideal digit pool"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        if tables.len() != digits.len() {
            bail!(PoolError::InternalInconsistency(format!(
                "dealer produced {} tables for {} digits",
                tables.len(),
                digits.len()
            )));
        }

        tables
            .iter()
            .zip(digits.iter())
            .map(|(table, &d)| match table.get(d as usize) {
                Some(&t) if table.len() == delta => Ok(t),
                _ => bail!(PoolError::InternalInconsistency(format!(
                    "digit {} outside a table of {} (delta = {})",
                    d,
                    table.len(),
                    delta
                ))),
            })
            .collect()
    }
}
