use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use db_pool_collector::collector::PoolCollector;
use db_pool_collector::descriptor::Options;
use db_pool_collector::stats::PoolStats;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;

fn collector(pools: usize) -> PoolCollector {
    let collector = PoolCollector::new(Options::new("db_").with_labels(["service", "shard"]));
    for i in 0..pools {
        let pool = Arc::new(move || PoolStats {
            max_open_connections: 100,
            open_connections: 10,
            wait_count: i as u64,
            ..Default::default()
        });
        collector.register(pool, ["orders".to_string(), i.to_string()]);
    }
    collector
}

pub fn collect(c: &mut Criterion) {
    for pools in [1, 100] {
        c.bench_function(&format!("collect {pools} pool(s)"), |b| {
            let collector = collector(pools);

            b.iter(|| {
                let mut sum = 0.0;
                collector.collect(|sample| sum += sample.value());
                sum
            })
        });

        c.bench_function(&format!("encode {pools} pool(s) as text"), |b| {
            let mut registry = Registry::default();
            registry.register_collector(Box::new(collector(pools)));
            let mut buffer = String::new();

            b.iter(|| {
                buffer.clear();
                encode(&mut buffer, &registry).unwrap();
            })
        });
    }
}

criterion_group!(benches, collect);
criterion_main!(benches);
