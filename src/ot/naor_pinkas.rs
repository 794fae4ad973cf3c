//! One-out-of-$`\delta`$ random OT composed from $`\lg \delta`$ random one-out-of-two OTs.
//!
//! For slot $`j`$ the Evaluator holds key pairs $`(K^0_{j,l}, K^1_{j,l})`$, $`l \in [0, \lg \delta)`$,
//! and sets $`T_j[k] = H(j, K^{k_0}_{j,0}, \ldots, K^{k_{\lg\delta - 1}}_{j,\lg\delta - 1})`$ where
//! $`k_l`$ is bit $`l`$ of $`k`$. The Requester chooses with the bits of $`\beta_j`$ (least significant
//! first) and hashes the keys it received.

use super::{DigitShareForEvaluator, DigitShareForRequester};
use crate::error::PoolError;
use crate::hash_utils::combine_keys;
use itertools::Itertools;
use anyhow::{bail, Context, Error, Result};
use ocelot::ot::{RandomReceiver as OtReceiver, RandomSender as OtSender};
use rand::{CryptoRng, Rng};
use scuttlebutt::channel::AbstractChannel;
use scuttlebutt::Block;
use std::marker::PhantomData;

fn bit_len(delta: usize) -> Result<usize> {
    if !delta.is_power_of_two() {
        bail!(PoolError::InternalInconsistency(format!(
            "digit domain {} is not a power of two",
            delta
        )));
    }
    Ok(delta.trailing_zeros() as usize)
}

/// Digit pool source for the Evaluator, acting as sender of the underlying one-out-of-two OTs.
pub struct NaorPinkasDigitSender<OT>(PhantomData<OT>)
where
    OT: OtSender<Msg = Block>;

impl<OT> NaorPinkasDigitSender<OT>
where
    OT: OtSender<Msg = Block>,
{
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<OT> DigitShareForEvaluator for NaorPinkasDigitSender<OT>
where
    OT: OtSender<Msg = Block>,
{
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        count: usize,
        delta: usize,
    ) -> Result<Vec<Vec<Block>>, Error> {
        let lg = bit_len(delta)?;
        if lg == 0 {
            return Ok((0..count)
                .map(|j| vec![combine_keys(j as u64, &[])])
                .collect());
        }

        let mut ot = OT::init(channel, rng)
            .map_err(PoolError::transport("digit pool base exchange"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let pairs = ot
            .send_random(channel, count * lg, rng)
            .map_err(PoolError::transport("digit pool extension"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        if pairs.len() != count * lg {
            bail!(PoolError::InternalInconsistency(format!(
                "OT sender produced {} pairs, {} requested",
                pairs.len(),
                count * lg
            )));
        }

        let mut keys = Vec::with_capacity(lg);
        let tables = pairs
            .chunks_exact(lg)
            .enumerate()
            .map(|(j, slot)| {
                (0..delta)
                    .map(|k| {
                        keys.clear();
                        keys.extend(slot.iter().enumerate().map(|(l, &(k0, k1))| {
                            if (k >> l) & 1 == 1 {
                                k1
                            } else {
                                k0
                            }
                        }));
                        combine_keys(j as u64, &keys)
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        tracing::debug!(count, delta, "digit pool tables derived");

        Ok(tables)
    }
}

/// Digit pool source for the Requester, acting as receiver of the underlying one-out-of-two OTs.
pub struct NaorPinkasDigitReceiver<OT>(PhantomData<OT>)
where
    OT: OtReceiver<Msg = Block>;

impl<OT> NaorPinkasDigitReceiver<OT>
where
    OT: OtReceiver<Msg = Block>,
{
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<OT> DigitShareForRequester for NaorPinkasDigitReceiver<OT>
where
    OT: OtReceiver<Msg = Block>,
{
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        digits: &[u32],
        delta: usize,
    ) -> Result<Vec<Block>, Error> {
        let lg = bit_len(delta)?;
        if let Some(&d) = digits.iter().find(|&&d| d as usize >= delta) {
            bail!(PoolError::InternalInconsistency(format!(
                "digit {} outside [0, {})",
                d, delta
            )));
        }
        if lg == 0 {
            return Ok((0..digits.len())
                .map(|j| combine_keys(j as u64, &[]))
                .collect());
        }

        let choices = digits
            .iter()
            .flat_map(|&d| (0..lg).map(move |l| (d >> l) & 1 == 1))
            .collect::<Vec<_>>();

        let mut ot = OT::init(channel, rng)
            .map_err(PoolError::transport("digit pool base exchange"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let keys = ot
            .receive_random(channel, &choices, rng)
            .map_err(PoolError::transport("digit pool extension"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        if keys.len() != choices.len() {
            bail!(PoolError::InternalInconsistency(format!(
                "OT receiver produced {} outputs for {} choices",
                keys.len(),
                choices.len()
            )));
        }

        Ok(keys
            .into_iter()
            .chunks(lg)
            .into_iter()
            .enumerate()
            .map(|(j, slot)| combine_keys(j as u64, &slot.collect_vec()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocelot::ot::{AlszReceiver, AlszSender};
    use scuttlebutt::{AesRng, Channel};
    use std::io::{BufReader, BufWriter};
    use std::os::unix::net::UnixStream;

    fn test_composed_share_base(count: usize, delta: usize) {
        let (sender, receiver) = UnixStream::pair().unwrap();
        let handle = std::thread::spawn(move || {
            let mut rng = AesRng::new();
            let reader = BufReader::new(sender.try_clone().unwrap());
            let writer = BufWriter::new(sender);
            let mut channel = Channel::new(reader, writer);

            let mut share = NaorPinkasDigitSender::<AlszSender>::new();
            share.receive(&mut channel, &mut rng, count, delta).unwrap()
        });

        let mut rng = AesRng::new();
        let reader = BufReader::new(receiver.try_clone().unwrap());
        let writer = BufWriter::new(receiver);
        let mut channel = Channel::new(reader, writer);

        let digits = (0..count)
            .map(|_| rng.gen_range(0..delta as u32))
            .collect::<Vec<_>>();
        let mut share = NaorPinkasDigitReceiver::<AlszReceiver>::new();
        let received = share
            .receive(&mut channel, &mut rng, &digits, delta)
            .unwrap();

        let tables = handle.join().unwrap();

        assert_eq!(tables.len(), count);
        for ((table, &d), r) in tables.iter().zip(digits.iter()).zip(received.iter()) {
            assert_eq!(table.len(), delta);
            assert_eq!(&table[d as usize], r);
            assert_eq!(table.iter().filter(|&t| t == r).count(), 1);
        }
    }

    #[test]
    fn test_composed_share() {
        test_composed_share_base(200, 16);
    }

    #[test]
    fn test_composed_share_binary() {
        test_composed_share_base(64, 2);
    }

    #[test]
    fn test_out_of_domain_digit() {
        let (ch, _peer) = crate::channel_utils::sync_channel::create_unix_channel_pair().unwrap();
        let mut ch = ch;
        let mut rng = AesRng::new();
        let mut share = NaorPinkasDigitReceiver::<AlszReceiver>::new();
        let err = share.receive(&mut ch, &mut rng, &[0, 4], 4).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PoolError>(),
            Some(PoolError::InternalInconsistency(_))
        ));
    }
}
