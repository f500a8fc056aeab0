use std::hint::black_box;

use argon2id::Argon2id;
use criterion::{criterion_group, criterion_main, Criterion};

const PASSWORD: &[u8] = b"cargo bench --release";
const SALT: &[u8] = b"benchmark-salt";

fn bench_derive(c: &mut Criterion) {
    let mut out = [0u8; 32];

    let small = Argon2id::new(3, 1, 1024).unwrap();
    c.bench_function("derive t=3 m=1MiB p=1", |b| {
        b.iter(|| {
            small
                .derive(&mut out, black_box(PASSWORD), black_box(SALT))
                .unwrap()
        })
    });

    let recommended = Argon2id::new(3, 4, 64 * 1024).unwrap();
    c.bench_function("derive t=3 m=64MiB p=4", |b| {
        b.iter(|| {
            recommended
                .derive(&mut out, black_box(PASSWORD), black_box(SALT))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_derive);
criterion_main!(benches);
