//! Benchmarks for the BizDesk vault and record listing
//!
//! Run with: cargo bench

use bizdesk::listing::{self, ListQuery, SortDirection};
use bizdesk::vault::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::tempdir;

fn create_test_rows(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "id": format!("inv-{}", i),
                "number": format!("INV-{:05}", i),
                "status": if i % 3 == 0 { "paid" } else { "sent" },
                "total": (i * 37 % 1000) as f64,
                "client_name": if i % 2 == 0 { "Acme Ltd" } else { "Globex" },
            })
        })
        .collect()
}

fn disk_store(dir: &std::path::Path) -> FallbackStore {
    let backends: Vec<Arc<dyn StorageBackend>> = vec![
        Arc::new(DirBackend::open(dir.join("local"), Tier::Local).unwrap()),
        Arc::new(SqliteBackend::open(&dir.join("vault.db")).unwrap()),
    ];
    FallbackStore::with_backends(backends, VaultConfig::new(dir))
}

fn bench_vault(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("vault");

    group.bench_function("save_single", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let dir = tempdir().unwrap();
                let store = disk_store(dir.path());
                let settings = json!({"theme": "dark", "currency": "USD"});

                let start = std::time::Instant::now();

                for _ in 0..iters {
                    store.save("user_settings", black_box(&settings)).await.unwrap();
                }

                start.elapsed()
            })
        });
    });

    group.bench_function("get_freshest", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let dir = tempdir().unwrap();
                let store = disk_store(dir.path());
                store.save("clients", &create_test_rows(100)).await.unwrap();

                let start = std::time::Instant::now();

                for _ in 0..iters {
                    let rows: Option<Vec<Value>> = store.get(black_box("clients")).await;
                    assert!(rows.is_some());
                }

                start.elapsed()
            })
        });
    });

    group.bench_function("backup_all_critical", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let dir = tempdir().unwrap();
                let store = disk_store(dir.path());
                for key in store.config().critical_keys.clone() {
                    store.save(&key, &create_test_rows(20)).await.unwrap();
                }

                let start = std::time::Instant::now();

                for _ in 0..iters {
                    store.backup_all_critical().await;
                }

                start.elapsed()
            })
        });
    });

    group.finish();
}

fn bench_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("listing");

    for size in [100, 1000, 10000] {
        let rows = create_test_rows(size);
        let query = ListQuery::new()
            .search("acme")
            .filter("status", "sent")
            .sort_by("total", SortDirection::Desc)
            .page(0, 50);

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("apply_{}", size), |b| {
            b.iter(|| listing::apply(black_box(rows.clone()), &query))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_vault, bench_listing);
criterion_main!(benches);
