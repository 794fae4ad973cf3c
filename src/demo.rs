//! Both parties in one process: preprocessing, setup, online rounds, and a plaintext cross-check.

use crate::channel_utils::MeteredChannel;
use crate::cli_utils::{create_channel_pair, create_digit_shares, PoolArgs};
use crate::error::PoolError;
use crate::online::{expand_query, plaintext_eval, Evaluator, Requester};
use crate::ot::{OtPairReceiver, OtPairSender};
use crate::pool::{preprocess_evaluator, preprocess_requester};
use crate::setup::SecretKey;
use anyhow::{bail, Context, Result};
use ocelot::ot::{AlszReceiver as OtReceiver, AlszSender as OtSender};
use rand::Rng;
use scuttlebutt::AesRng;
use std::time::Instant;

/// Run the demo described by `args`.
pub fn run(args: PoolArgs) -> Result<()> {
    let params = args
        .params()
        .with_context(|| "Failed to validate parameters.")?;

    if args.rounds > params.tau() {
        bail!(PoolError::invalid(
            "rounds",
            format!("{} rounds requested from a pool of {}", args.rounds, params.tau()),
        ));
    }

    tracing::info!(
        n = params.n(),
        lg_q = params.q().lg(),
        lg_p = params.p().lg(),
        lg_delta = params.delta().lg(),
        tau = params.tau(),
        statsec = params.statistical_security(),
        pair = %args.pair_type,
        digit = %args.digit_type,
        channel = %args.channel_type,
        "parameters"
    );

    let (requester_channel, evaluator_channel) = create_channel_pair(args.channel_type, args.port)
        .with_context(|| "Failed to create channels.")?;
    let (mut digit_for_e, mut digit_for_r) = create_digit_shares(args.digit_type);
    let rounds = args.rounds;

    let handle = std::thread::spawn(move || -> Result<SecretKey> {
        let mut rng = AesRng::new();
        let mut channel = MeteredChannel::new(evaluator_channel);

        // offline phase
        let (pool, _) = preprocess_evaluator(
            &mut channel,
            &mut rng,
            &params,
            &mut OtPairReceiver::<OtReceiver>::new(),
            &mut digit_for_e,
        )
        .with_context(|| "Failed to build the evaluator pool.")?;

        let sk = SecretKey::random(params.n(), &mut rng);
        let evaluator = Evaluator::new(pool, sk.clone())?;
        evaluator
            .setup(&mut channel)
            .with_context(|| "Failed to publish the blinding vector.")?;

        // online phase
        let start = Instant::now();
        let before = channel.traffic();
        for _ in 0..rounds {
            evaluator
                .serve(&mut channel)
                .with_context(|| "Failed to answer a request.")?;
        }
        let traffic = channel.traffic().since(before);

        tracing::info!(
            role = "evaluator",
            rounds,
            bytes_sent = traffic.bytes_sent,
            bytes_received = traffic.bytes_received,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "online phase done"
        );

        Ok(sk)
    });

    let mut rng = AesRng::new();
    let mut channel = MeteredChannel::new(requester_channel);

    // offline phase
    let (pool, _) = preprocess_requester(
        &mut channel,
        &mut rng,
        &params,
        &mut OtPairSender::<OtSender>::new(),
        &mut digit_for_r,
    )
    .with_context(|| "Failed to build the requester pool.")?;

    let blinding = pool
        .accept_blinding(&mut channel)
        .with_context(|| "Failed to receive the blinding vector.")?;
    let requester = Requester::new(pool, blinding)?;

    // online phase
    let start = Instant::now();
    let before = channel.traffic();
    let outputs = (0..rounds)
        .map(|_| -> Result<(u64, u64, u32)> {
            let (t, x) = (rng.gen::<u64>(), rng.gen::<u64>());
            let z = requester
                .evaluate(&mut channel, t, x)
                .with_context(|| "Failed to run a round.")?;
            Ok((t, x, z))
        })
        .collect::<Result<Vec<_>>>()?;
    let traffic = channel.traffic().since(before);

    tracing::info!(
        role = "requester",
        rounds,
        bytes_sent = traffic.bytes_sent,
        bytes_received = traffic.bytes_received,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "online phase done"
    );

    let sk = match handle.join() {
        Ok(r) => r?,
        Err(_) => bail!("evaluator thread panicked @{}:{}", file!(), line!()),
    };

    // sanity check against the clear evaluation
    for (t, x, z) in outputs {
        let a = expand_query(&params, t, x);
        let expected = plaintext_eval(&params, &sk, &a);
        if z != expected {
            bail!(PoolError::InternalInconsistency(format!(
                "oblivious output {} differs from plaintext {}",
                z, expected
            )));
        }
    }

    tracing::info!(rounds, "all outputs match the plaintext evaluation");

    Ok(())
}
