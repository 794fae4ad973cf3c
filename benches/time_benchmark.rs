use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use criterion::{criterion_group, criterion_main};
use time_common::{online_unix_fn, preprocess_unix_fn};

fn bench_preprocess(c: &mut Criterion) {
    let min_e = 6;
    let max_e = 10;

    let mut group = c.benchmark_group("preprocess_time");
    for e in min_e..=max_e {
        let tau: usize = 1 << e;
        group.throughput(Throughput::Elements(tau as u64));
        group.bench_with_input(
            BenchmarkId::new("UnixStream", tau),
            &tau,
            preprocess_unix_fn(),
        );
    }
    group.finish();
}

fn bench_online(c: &mut Criterion) {
    let min_e = 4;
    let max_e = 10;

    let mut group = c.benchmark_group("online_time");
    for e in min_e..=max_e {
        let rounds: usize = 1 << e;
        group.throughput(Throughput::Elements(rounds as u64));
        group.bench_with_input(
            BenchmarkId::new("UnixStream", rounds),
            &rounds,
            online_unix_fn(),
        );
    }
    group.finish();
}

criterion_group!(
    name = time_benches;
    config = Criterion::default().sample_size(10);
    targets = bench_preprocess, bench_online
);
criterion_main!(time_benches);

// cargo bench preprocess_time
// cargo bench online_time
