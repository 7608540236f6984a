use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use stars_auth::token::DEFAULT_SESSION_LIFETIME;
use stars_auth::{Permission, Role, TokenCodec};
use stars_core::UserId;

fn permissions(count: usize) -> Vec<Permission> {
    (0..count)
        .map(|i| Permission::new(format!("/system/section-{i}")))
        .collect()
}

fn bench_issue(c: &mut Criterion) {
    let codec = TokenCodec::new(b"bench-secret", DEFAULT_SESSION_LIFETIME);
    let mut group = c.benchmark_group("token_issue");

    for count in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let perms = permissions(count);
            b.iter(|| {
                let issued = codec
                    .issue(
                        UserId::new(1),
                        "admin",
                        vec![Role::ADMIN],
                        black_box(perms.clone()),
                    )
                    .unwrap();
                black_box(issued);
            });
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let codec = TokenCodec::new(b"bench-secret", DEFAULT_SESSION_LIFETIME);
    let mut group = c.benchmark_group("token_parse");

    for count in [1usize, 10, 100] {
        let token = codec
            .issue(UserId::new(1), "admin", vec![Role::ADMIN], permissions(count))
            .unwrap()
            .token;

        group.bench_with_input(BenchmarkId::from_parameter(count), &token, |b, token| {
            b.iter(|| black_box(codec.parse(black_box(token)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_issue, bench_parse);
criterion_main!(benches);
