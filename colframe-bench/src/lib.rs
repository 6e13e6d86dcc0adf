//! Benchmarks for colframe cursors and transforms

use std::time::{Duration, Instant};

use colframe_core::{
    ColumnId, CursorConfig, CursorStats, Dataframe, ElementType, Error, Result, RowFn, Value,
};
use colframe_readers::from_iter;
use colframe_transforms::{batching, copy_scalar, one_hot, OneHotOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Number of timed iterations
    pub iterations: usize,

    /// Warmup iterations
    pub warmup_iterations: usize,

    /// Rows in the source store
    pub rows: usize,

    /// Rows materialized per prefetch call
    pub prefetch_size: usize,

    /// Rows per batch for the batching benchmark
    pub batch_size: usize,

    /// Depth of the one-hot encoding for the batching benchmark
    pub depth: usize,

    /// Cursor configuration used by every benchmark
    pub cursor: CursorConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            warmup_iterations: 3,
            rows: 100_000,
            prefetch_size: 256,
            batch_size: 64,
            depth: 10,
            cursor: CursorConfig::default(),
        }
    }
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchResult {
    /// Name of the benchmark
    pub name: String,

    /// Total time taken
    pub total_time: Duration,

    /// Average time per iteration
    pub avg_time: Duration,

    /// Min time per iteration
    pub min_time: Duration,

    /// Max time per iteration
    pub max_time: Duration,

    /// Cursor counters of the last iteration
    pub stats: CursorStats,

    /// Throughput (rows/second)
    pub throughput: f64,
}

/// Run a benchmark
///
/// `func` performs one full pass and returns the counters of the cursor it
/// drove. `rows_per_iteration` is used for the throughput figure.
pub fn run_benchmark<F>(
    name: &str,
    config: &BenchConfig,
    rows_per_iteration: usize,
    mut func: F,
) -> Result<BenchResult>
where
    F: FnMut() -> Result<CursorStats>,
{
    if config.iterations == 0 {
        return Err(Error::InvalidArgument("A benchmark needs at least one iteration".into()));
    }

    for _ in 0..config.warmup_iterations {
        func()?;
    }

    let mut times = Vec::with_capacity(config.iterations);
    let mut stats = CursorStats::default();
    let start_total = Instant::now();

    for _ in 0..config.iterations {
        let start = Instant::now();
        stats = func()?;
        times.push(start.elapsed());
    }

    let total_time = start_total.elapsed();
    let avg_time = total_time / u32::try_from(times.len()).unwrap_or(u32::MAX);
    let min_time = times.iter().min().copied().unwrap_or_default();
    let max_time = times.iter().max().copied().unwrap_or_default();

    #[allow(clippy::cast_precision_loss)]
    let throughput = (config.iterations * rows_per_iteration) as f64 / total_time.as_secs_f64();

    debug!(name, ?avg_time, throughput, "benchmark finished");
    Ok(BenchResult {
        name: name.to_string(),
        total_time,
        avg_time,
        min_time,
        max_time,
        stats,
        throughput,
    })
}

/// Build the benchmark pipeline: integer labels, a `+1` map over them and
/// a scalar tensor copy of the map
///
/// Returns the frame and the id of the tensor column.
pub fn build_pipeline(rows: usize) -> Result<(Dataframe, ColumnId)> {
    let frame = from_iter((0..rows).map(|i| i64::try_from(i).unwrap_or(i64::MAX)));
    let incremented = frame.register_map(
        RowFn::new(|value: &Value| -> Result<Value> { Ok(Value::Int(value.expect_int()? + 1)) }),
        &[0],
    )?;
    let scalar = copy_scalar(&frame, incremented, ElementType::F32)?;
    Ok((frame, scalar))
}

fn drain(frame: &Dataframe, columns: &[ColumnId], config: &BenchConfig, prefetch: usize) -> Result<CursorStats> {
    let mut cursor = frame.iter_with_config(columns, config.cursor.clone())?;
    if prefetch == 0 {
        while cursor.next_row()?.is_some() {}
    } else {
        while !cursor.is_exhausted() {
            cursor.prefetch(prefetch)?;
            cursor.next_rows(prefetch)?;
        }
    }
    Ok(cursor.stats())
}

/// Iterate the pipeline one row at a time, computing on demand
pub fn bench_on_demand(config: &BenchConfig) -> Result<BenchResult> {
    let (frame, column) = build_pipeline(config.rows)?;
    run_benchmark("On-demand iteration", config, config.rows, || {
        drain(&frame, &[column], config, 0)
    })
}

/// Iterate the pipeline in prefetched blocks of `config.prefetch_size`
pub fn bench_prefetch(config: &BenchConfig) -> Result<BenchResult> {
    let (frame, column) = build_pipeline(config.rows)?;
    let name = format!("Prefetch {}", config.prefetch_size);
    run_benchmark(&name, config, config.rows, || {
        drain(&frame, &[column], config, config.prefetch_size)
    })
}

/// One-hot encode shuffled labels and iterate the batched store
pub fn bench_batching(config: &BenchConfig) -> Result<BenchResult> {
    let frame = from_iter((0..config.rows).map(|i| i64::try_from(i % config.depth.max(1)).unwrap_or(0)));
    frame.shuffle(42);
    let encoded = one_hot(&frame, 0, OneHotOptions::with_depth(config.depth))?;
    let batched = batching(&frame, &[encoded], config.batch_size, 1)?;
    let name = format!("One-hot batching {}", config.batch_size);
    run_benchmark(&name, config, config.rows, || drain(&batched, &[0], config, 0))
}

/// Compare on-demand iteration against several prefetch sizes
pub fn compare_prefetch_sizes(config: &BenchConfig, sizes: &[usize]) -> Result<Vec<BenchResult>> {
    let mut results = vec![bench_on_demand(config)?];
    for &prefetch_size in sizes {
        let config = BenchConfig {
            prefetch_size,
            ..config.clone()
        };
        results.push(bench_prefetch(&config)?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> BenchConfig {
        BenchConfig {
            iterations: 2,
            warmup_iterations: 1,
            rows: 50,
            prefetch_size: 8,
            batch_size: 4,
            ..BenchConfig::default()
        }
    }

    #[test]
    fn test_pipeline_values() {
        let (frame, column) = build_pipeline(3).unwrap();
        let values: Vec<f32> = frame
            .iter(&[column])
            .unwrap()
            .map(|row| row.unwrap()[0].expect_tensor().unwrap().as_slice::<f32>().unwrap()[0])
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_prefetch_uses_fewer_upstream_calls() {
        let config = small();
        let on_demand = bench_on_demand(&config).unwrap();
        let prefetched = bench_prefetch(&config).unwrap();
        assert!(prefetched.stats.upstream_calls < on_demand.stats.upstream_calls);
        assert!(on_demand.min_time <= on_demand.max_time);
    }

    #[test]
    fn test_batching_runs() {
        let result = bench_batching(&small()).unwrap();
        assert!(result.throughput > 0.0);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let config = BenchConfig {
            iterations: 0,
            ..small()
        };
        assert!(bench_on_demand(&config).is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: BenchConfig = serde_json::from_str(r#"{ "rows": 10 }"#).unwrap();
        assert_eq!(config.rows, 10);
        assert_eq!(config.prefetch_size, 256);
    }
}
