use ark_std::rand::{rngs::StdRng, SeedableRng};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use shamir_poll::{
    shamir::{ParticipantSet, ShamirScheme},
    Fp2203, PollConfig, PollSession,
};

fn bench_share_reconstruct(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut group = c.benchmark_group("share_reconstruct");

    for n in [4usize, 8, 16, 30] {
        let participants = ParticipantSet::sequential::<Fp2203>(n).unwrap();
        let scheme = ShamirScheme::<Fp2203>::new(n / 2).unwrap();
        let shares = scheme
            .share(Fp2203::from(42u64), &participants, &mut rng)
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(n), &shares, |b, inp| {
            b.iter(|| scheme.reconstruct(inp).unwrap());
        });
    }

    group.finish();
}

fn bench_vote(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut group = c.benchmark_group("vote");
    group.sample_size(10);

    for n in [4usize, 8, 16, 30] {
        // The first ballot only initializes; each later one runs a full round.
        let mut setup = || {
            let config = PollConfig::new(n, ["A", "B", "C", "D"], "bench");
            let mut poll = PollSession::<Fp2203>::with_rng(config, &mut rng).unwrap();
            poll.vote("A").unwrap();
            poll
        };

        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter_batched(&mut setup, |mut poll| poll.vote("B").unwrap(), BatchSize::SmallInput);
        });
    }

    group.finish();
}

criterion_group!(benches, bench_share_reconstruct, bench_vote);
criterion_main!(benches);
