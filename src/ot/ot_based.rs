use super::{PairShareForEvaluator, PairShareForRequester};
use crate::error::PoolError;
use anyhow::{bail, Context, Error, Result};
use ocelot::ot::{RandomReceiver as OtReceiver, RandomSender as OtSender};
use rand::{CryptoRng, Rng};
use scuttlebutt::channel::AbstractChannel;
use scuttlebutt::Block;
use std::marker::PhantomData;
use std::time::Instant;

/// Pair pool source backed by a random-OT extension sender (e.g. [AlszSender](ocelot::ot::AlszSender)).
pub struct OtPairSender<OT>(PhantomData<OT>)
where
    OT: OtSender<Msg = Block>;

impl<OT> Clone for OtPairSender<OT>
where
    OT: OtSender<Msg = Block>,
{
    fn clone(&self) -> Self {
        Self(PhantomData)
    }
}

impl<OT> Copy for OtPairSender<OT> where OT: OtSender<Msg = Block> {}

impl<OT> OtPairSender<OT>
where
    OT: OtSender<Msg = Block>,
{
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<OT> PairShareForRequester for OtPairSender<OT>
where
    OT: OtSender<Msg = Block>,
{
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        count: usize,
    ) -> Result<Vec<(Block, Block)>, Error> {
        let start = Instant::now();

        let mut ot = OT::init(channel, rng)
            .map_err(PoolError::transport("pair pool base exchange"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        tracing::debug!(elapsed = ?start.elapsed(), "pair pool base exchange done (sender)");

        let pairs = ot
            .send_random(channel, count, rng)
            .map_err(PoolError::transport("pair pool extension"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        if pairs.len() != count {
            bail!(PoolError::InternalInconsistency(format!(
                "OT sender produced {} pairs, {} requested",
                pairs.len(),
                count
            )));
        }

        Ok(pairs)
    }
}

/// Pair pool source backed by a random-OT extension receiver (e.g. [AlszReceiver](ocelot::ot::AlszReceiver)).
pub struct OtPairReceiver<OT>(PhantomData<OT>)
where
    OT: OtReceiver<Msg = Block>;

impl<OT> Clone for OtPairReceiver<OT>
where
    OT: OtReceiver<Msg = Block>,
{
    fn clone(&self) -> Self {
        Self(PhantomData)
    }
}

impl<OT> Copy for OtPairReceiver<OT> where OT: OtReceiver<Msg = Block> {}

impl<OT> OtPairReceiver<OT>
where
    OT: OtReceiver<Msg = Block>,
{
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<OT> PairShareForEvaluator for OtPairReceiver<OT>
where
    OT: OtReceiver<Msg = Block>,
{
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        choices: &[bool],
    ) -> Result<Vec<Block>, Error> {
        let start = Instant::now();

        let mut ot = OT::init(channel, rng)
            .map_err(PoolError::transport("pair pool base exchange"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        tracing::debug!(elapsed = ?start.elapsed(), "pair pool base exchange done (receiver)");

        let received = ot
            .receive_random(channel, choices, rng)
            .map_err(PoolError::transport("pair pool extension"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        if received.len() != choices.len() {
            bail!(PoolError::InternalInconsistency(format!(
                "OT receiver produced {} outputs for {} choices",
                received.len(),
                choices.len()
            )));
        }

        Ok(received)
    }
}
