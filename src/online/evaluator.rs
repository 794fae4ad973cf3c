use super::counter::ConsumedSlots;
use super::{BlindEvalMessage, RequestMessage};
use crate::error::PoolError;
use crate::params::PoolParams;
use crate::pool::EvaluatorPool;
use crate::setup::{BlindingVector, SecretKey};
use anyhow::{bail, Context, Result};
use scuttlebutt::AbstractChannel;
use std::sync::atomic::{AtomicBool, Ordering};

/// Evaluator of the online phase. Owns its pool half and the secret key.
#[derive(Debug)]
pub struct Evaluator {
    params: PoolParams,
    pool: EvaluatorPool,
    sk: SecretKey,
    consumed: ConsumedSlots,
    published: AtomicBool,
}

impl Evaluator {
    /// Online Evaluator over `pool` with key `sk`.
    pub fn new(pool: EvaluatorPool, sk: SecretKey) -> Result<Self> {
        let params = *pool.params();
        if sk.len() != params.n() {
            bail!(PoolError::invalid(
                "sk",
                format!("{} bits, n = {}", sk.len(), params.n()),
            ));
        }
        Ok(Self {
            params,
            consumed: ConsumedSlots::new(params.tau()),
            pool,
            sk,
            published: AtomicBool::new(false),
        })
    }

    /// Parameters of the pool.
    pub fn params(&self) -> &PoolParams {
        &self.params
    }

    /// $`\bar b = b \oplus sk`$ for this pool.
    pub fn blinding(&self) -> Result<BlindingVector> {
        BlindingVector::derive(self.pool.pairs().choices(), &self.sk)
    }

    /// Publish the blinding vector. Runs at most once per pool.
    pub fn setup<C: AbstractChannel>(&self, channel: &mut C) -> Result<BlindingVector> {
        if self.published.swap(true, Ordering::SeqCst) {
            bail!(PoolError::InternalInconsistency(
                "setup already ran for this pool".to_string()
            ));
        }

        let blinding = self.blinding()?;
        blinding
            .write_to(channel)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        tracing::debug!(n = blinding.len(), "blinding vector published");

        Ok(blinding)
    }

    /// BlindEval step. Each slot answers once.
    pub fn blind_eval(&self, request: &RequestMessage) -> Result<BlindEvalMessage> {
        request.validate(&self.params)?;

        let ctr = request.ctr;
        self.consumed.consume(ctr)?;

        let q = self.params.q();
        let p = self.params.p();
        let delta = self.params.delta();
        let lg_delta = delta.lg();

        let received = self.pool.pairs().received(ctr)?;
        let table = self.pool.digits().table(ctr)?;

        let atil_sum = q.sum(
            request
                .e0
                .iter()
                .zip(request.e1.iter())
                .zip(received.iter())
                .zip(self.sk.bits().iter())
                .map(|(((&e0, &e1), &r), &s)| q.sub(if s { e1 } else { e0 }, r)),
        );

        let y = (0..self.params.delta_len() as u32)
            .map(|k| {
                let rounded = q.sub(atil_sum, k) >> lg_delta;
                p.add(rounded, table[delta.sub(k, request.beta_bar) as usize])
            })
            .collect();

        tracing::debug!(ctr, "request answered");

        Ok(BlindEvalMessage { ctr, y })
    }

    /// Receive one request from `channel` and answer it. Returns the slot consumed.
    pub fn serve<C: AbstractChannel>(&self, channel: &mut C) -> Result<usize> {
        let request = RequestMessage::read_from(channel, &self.params)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        let reply = self.blind_eval(&request)?;
        reply
            .write_to(channel)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        Ok(reply.ctr)
    }

    /// Slots answered so far.
    pub fn answered(&self) -> Result<usize> {
        self.consumed.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_utils::sync_channel::create_unix_channel_pair;
    use crate::online::{expand_query, plaintext_eval, Requester};
    use crate::pool::deal;
    use rand::Rng;
    use scuttlebutt::AesRng;

    fn params(n: usize, tau: usize) -> PoolParams {
        PoolParams::builder()
            .n(n)
            .q(1 << 12)
            .p(1 << 4)
            .delta(1 << 4)
            .tau(tau)
            .build()
            .unwrap()
    }

    fn parties(params: &PoolParams, sk: SecretKey) -> (Requester, Evaluator) {
        let mut rng = AesRng::new();
        let (rpool, epool) = deal(params, &mut rng).unwrap();
        let evaluator = Evaluator::new(epool, sk).unwrap();
        let requester = Requester::new(rpool, evaluator.blinding().unwrap()).unwrap();
        (requester, evaluator)
    }

    #[test]
    fn test_concrete_scenario() {
        let params = PoolParams::builder()
            .n(4)
            .q(16)
            .p(4)
            .delta(4)
            .tau(1)
            .build()
            .unwrap();
        let sk = SecretKey::from_bits(vec![true, false, true, false]);

        // every pool draw must give the same answer
        for _ in 0..50 {
            let (requester, evaluator) = parties(&params, sk.clone());
            let mut requested = requester.request_with_query(&[3, 9, 12, 5]).unwrap();
            let reply = evaluator.blind_eval(requested.message().unwrap()).unwrap();
            assert_eq!(requested.finalize(&reply).unwrap(), 3);
        }
    }

    #[test]
    fn test_matches_plaintext() {
        let mut rng = AesRng::new();
        let params = params(64, 200);
        let sk = SecretKey::random(64, &mut rng);
        let (requester, evaluator) = parties(&params, sk.clone());

        for _ in 0..200 {
            let a = (0..64)
                .map(|_| params.q().reduce(rng.gen()))
                .collect::<Vec<_>>();
            let mut requested = requester.request_with_query(&a).unwrap();
            let reply = evaluator.blind_eval(requested.message().unwrap()).unwrap();
            let z = requested.finalize(&reply).unwrap();
            assert_eq!(z, plaintext_eval(&params, &sk, &a));
        }

        let err = requester.request(0, 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PoolError>(),
            Some(PoolError::PoolExhausted { tau: 200 })
        ));
    }

    #[test]
    fn test_slot_reuse_is_rejected() {
        let params = params(16, 4);
        let mut rng = AesRng::new();
        let (requester, evaluator) = parties(&params, SecretKey::random(16, &mut rng));

        let mut requested = requester.request(7, 7).unwrap();
        let msg = requested.message().unwrap().clone();
        evaluator.blind_eval(&msg).unwrap();

        let err = evaluator.blind_eval(&msg).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PoolError>(),
            Some(PoolError::SlotConsumed { ctr: 0 })
        ));
        assert!(err
            .downcast_ref::<PoolError>()
            .is_some_and(PoolError::refuses_slot));

        let beyond = RequestMessage { ctr: 4, ..msg };
        let err = evaluator.blind_eval(&beyond).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PoolError>(),
            Some(PoolError::PoolExhausted { tau: 4 })
        ));
        assert_eq!(evaluator.answered().unwrap(), 1);
    }

    #[test]
    fn test_malformed_request_keeps_slot() {
        let params = params(16, 4);
        let mut rng = AesRng::new();
        let sk = SecretKey::random(16, &mut rng);
        let (requester, evaluator) = parties(&params, sk.clone());

        let mut requested = requester.request(5, 6).unwrap();
        let msg = requested.message().unwrap().clone();

        let short = RequestMessage {
            e0: vec![0; 15],
            ..msg.clone()
        };
        let mut wide_e1 = msg.e1.clone();
        wide_e1[3] = params.q().value() as u32;
        let wide = RequestMessage {
            e1: wide_e1,
            ..msg.clone()
        };
        let beta = RequestMessage {
            beta_bar: params.delta().value() as u32,
            ..msg.clone()
        };

        for bad in [short, wide, beta] {
            let err = evaluator.blind_eval(&bad).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PoolError>(),
                Some(PoolError::MalformedMessage(_))
            ));
            assert_eq!(evaluator.answered().unwrap(), 0);
        }

        // the slot is still available to the genuine request
        let reply = evaluator.blind_eval(&msg).unwrap();
        assert_eq!(evaluator.answered().unwrap(), 1);
        let z = requested.finalize(&reply).unwrap();
        let a = expand_query(&params, 5, 6);
        assert_eq!(z, plaintext_eval(&params, &sk, &a));
    }

    #[test]
    fn test_mismatched_reply() {
        let params = params(16, 4);
        let mut rng = AesRng::new();
        let (requester, evaluator) = parties(&params, SecretKey::random(16, &mut rng));

        let mut first = requester.request(1, 1).unwrap();
        let mut second = requester.request(2, 2).unwrap();
        evaluator.blind_eval(first.message().unwrap()).unwrap();
        let reply = evaluator.blind_eval(second.message().unwrap()).unwrap();

        let err = first.finalize(&reply).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PoolError>(),
            Some(PoolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_setup_and_serve_over_channel() {
        let params = params(32, 8);
        let mut rng = AesRng::new();
        let sk = SecretKey::random(32, &mut rng);
        let (rpool, epool) = deal(&params, &mut rng).unwrap();
        let (mut ch1, mut ch2) = create_unix_channel_pair().unwrap();

        let evaluator = Evaluator::new(epool, sk.clone()).unwrap();
        let handle = std::thread::spawn(move || {
            let published = evaluator.setup(&mut ch2).unwrap();
            assert!(evaluator.setup(&mut ch2).is_err());
            for _ in 0..8 {
                evaluator.serve(&mut ch2).unwrap();
            }
            published
        });

        let blinding = rpool.accept_blinding(&mut ch1).unwrap();
        let requester = Requester::new(rpool, blinding.clone()).unwrap();
        for i in 0..8u64 {
            let z = requester.evaluate(&mut ch1, i, i * 3).unwrap();
            let a = expand_query(&params, i, i * 3);
            assert_eq!(z, plaintext_eval(&params, &sk, &a));
        }

        assert_eq!(handle.join().unwrap(), blinding);
    }

    #[test]
    fn test_concurrent_rounds() {
        let params = params(32, 64);
        let mut rng = AesRng::new();
        let sk = SecretKey::random(32, &mut rng);
        let (requester, evaluator) = parties(&params, sk.clone());
        let (requester, evaluator) = (std::sync::Arc::new(requester), std::sync::Arc::new(evaluator));

        let handles = (0..4u64)
            .map(|w| {
                let (requester, evaluator) = (requester.clone(), evaluator.clone());
                let sk = sk.clone();
                std::thread::spawn(move || {
                    for i in 0..16u64 {
                        let mut requested = requester.request(w, i).unwrap();
                        let reply = evaluator.blind_eval(requested.message().unwrap()).unwrap();
                        let z = requested.finalize(&reply).unwrap();
                        let a = expand_query(&params, w, i);
                        assert_eq!(z, plaintext_eval(&params, &sk, &a));
                    }
                })
            })
            .collect::<Vec<_>>();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(evaluator.answered().unwrap(), 64);
        assert_eq!(requester.counter().remaining().unwrap(), 0);
    }
}
