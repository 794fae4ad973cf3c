use ocelot::oprf::{KkrtReceiver, KkrtSender};
use ocelot::ot::{AlszReceiver, AlszSender};
use pool_oprf::channel_utils::sync_channel::create_unix_channel_pair;
use pool_oprf::channel_utils::MeteredChannel;
use pool_oprf::error::PoolError;
use pool_oprf::online::{expand_query, plaintext_eval, Evaluator, Requester};
use pool_oprf::ot::{KkrtDigitReceiver, KkrtDigitSender, OtPairReceiver, OtPairSender};
use pool_oprf::params::{PairPoolMode, PoolParams};
use pool_oprf::pool::{preprocess_evaluator, preprocess_requester};
use pool_oprf::setup::SecretKey;
use rand::Rng;
use scuttlebutt::AesRng;

fn protocol(params: PoolParams, rounds: usize) {
    let (ch_r, ch_e) = create_unix_channel_pair().unwrap();

    let handle = std::thread::spawn(move || {
        let mut rng = AesRng::new();
        let mut channel = MeteredChannel::new(ch_e);
        let (pool, _) = preprocess_evaluator(
            &mut channel,
            &mut rng,
            &params,
            &mut OtPairReceiver::<AlszReceiver>::new(),
            &mut KkrtDigitSender::<KkrtSender>::new(),
        )
        .unwrap();

        let sk = SecretKey::random(params.n(), &mut rng);
        let evaluator = Evaluator::new(pool, sk.clone()).unwrap();
        evaluator.setup(&mut channel).unwrap();

        let served = (0..rounds)
            .map(|_| evaluator.serve(&mut channel).unwrap())
            .collect::<Vec<_>>();

        // the pool is spent once every slot is served
        if rounds == params.tau() {
            assert_eq!(evaluator.answered().unwrap(), params.tau());
        }

        (sk, served)
    });

    let mut rng = AesRng::new();
    let mut channel = MeteredChannel::new(ch_r);
    let (pool, _) = preprocess_requester(
        &mut channel,
        &mut rng,
        &params,
        &mut OtPairSender::<AlszSender>::new(),
        &mut KkrtDigitReceiver::<KkrtReceiver>::new(),
    )
    .unwrap();

    let blinding = pool.accept_blinding(&mut channel).unwrap();
    let requester = Requester::new(pool, blinding).unwrap();

    let queries = (0..rounds)
        .map(|_| (rng.gen::<u64>(), rng.gen::<u64>()))
        .collect::<Vec<_>>();
    let outputs = queries
        .iter()
        .map(|&(t, x)| requester.evaluate(&mut channel, t, x).unwrap())
        .collect::<Vec<_>>();

    let (sk, served) = handle.join().unwrap();

    assert_eq!(served, (0..rounds).collect::<Vec<_>>());
    for (&(t, x), &z) in queries.iter().zip(outputs.iter()) {
        let a = expand_query(&params, t, x);
        assert_eq!(z, plaintext_eval(&params, &sk, &a));
    }

    if rounds == params.tau() {
        let err = requester.request(0, 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PoolError>(),
            Some(PoolError::PoolExhausted { .. })
        ));
    }
}

#[test]
fn test_direct_pool() {
    let params = PoolParams::builder()
        .n(64)
        .q(1 << 12)
        .p(1 << 8)
        .delta(1 << 4)
        .tau(32)
        .build()
        .unwrap();
    protocol(params, 32);
}

#[test]
fn test_amplified_pool() {
    let params = PoolParams::builder()
        .n(64)
        .q(1 << 12)
        .p(1 << 8)
        .delta(1 << 4)
        .tau(48)
        .kappa(64)
        .pair_mode(PairPoolMode::Amplified)
        .build()
        .unwrap();
    protocol(params, 20);
}

#[test]
fn test_reference_moduli() {
    let reference = PoolParams::reference().unwrap();
    let params = PoolParams::builder()
        .n(reference.n())
        .q(reference.q().value())
        .p(reference.p().value())
        .delta(reference.delta().value())
        .tau(16)
        .build()
        .unwrap();
    protocol(params, 16);
}
