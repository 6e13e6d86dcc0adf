//! Benchmark runner for colframe cursors and transforms
//!
//! Takes an optional path to a JSON [`BenchConfig`]; missing fields keep
//! their defaults. Logs at `info` unless `RUST_LOG` says otherwise.

use std::fs;

use anyhow::Context;
use colframe_bench::{bench_batching, compare_prefetch_sizes, BenchConfig, BenchResult};
use tracing_subscriber::EnvFilter;

fn print_result(result: &BenchResult) {
    println!("\nBenchmark: {}", result.name);
    println!("  Total time:     {:?}", result.total_time);
    println!("  Average time:   {:?}", result.avg_time);
    println!("  Min time:       {:?}", result.min_time);
    println!("  Max time:       {:?}", result.max_time);
    println!("  Throughput:     {:.2} rows/sec", result.throughput);
    println!("  Upstream calls: {}", result.stats.upstream_calls);
    println!(
        "  Cache hits:     {} / {}",
        result.stats.cache_hits,
        result.stats.cache_hits + result.stats.cache_misses
    );
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str::<BenchConfig>(&json).with_context(|| format!("parsing {path}"))?
        }
        None => BenchConfig::default(),
    };

    println!("=== colframe Benchmarks ===");
    println!("{} rows, {} iterations", config.rows, config.iterations);

    println!("\n=== On-demand vs prefetch ===");
    for result in compare_prefetch_sizes(&config, &[16, 256, 4096])? {
        print_result(&result);
    }

    println!("\n=== Batching ===");
    for batch_size in [16, 64, 256] {
        let config = BenchConfig {
            batch_size,
            ..config.clone()
        };
        print_result(&bench_batching(&config)?);
    }

    Ok(())
}
