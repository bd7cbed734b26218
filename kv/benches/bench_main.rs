use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kv::hash::hash64;
use kv::storage::kv_store::KVStore;

fn bench_hash64(c: &mut Criterion) {
    c.bench_function("hash64 short key", |b| {
        b.iter(|| hash64(black_box("127.0.0.1:9000")))
    });
}

fn bench_kv_store_put_get(c: &mut Criterion) {
    let dir = tempdir::TempDir::new("kv_bench").unwrap().into_path();
    let store = KVStore::new(dir).unwrap();

    c.bench_function("kv_store put+get", |b| {
        b.iter(|| {
            store.put(black_box("bench-key"), black_box("bench-value")).unwrap();
            black_box(store.get("bench-key").unwrap());
        })
    });
}

criterion_group!(benches, bench_hash64, bench_kv_store_put_get);
criterion_main!(benches);
