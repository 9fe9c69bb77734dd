// Esox.ConnPool - demo binary
// Runs a pool of SQLite connections against a shared counter table.
//
// Run with: RUST_LOG=esox_connpool=debug cargo run

use esox_connpool::{BoxError, ConnectionPool, PoolConfiguration, SqliteSpec};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const CAPACITY: usize = 4;
const WORKERS: usize = 12;
const ITERATIONS: usize = 250;

fn main() -> Result<(), BoxError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    println!("=== Esox.ConnPool v1.0.0 ===");

    let path = std::env::temp_dir().join(format!("esox-connpool-demo-{}.db", std::process::id()));
    let pool = counter_pool(&path)?;
    let started = Instant::now();

    let result = run_workload(&pool, WORKERS, ITERATIONS);
    let elapsed = started.elapsed();

    if let Ok(value) = &result {
        println!("  Workers: {}, iterations each: {}", WORKERS, ITERATIONS);
        println!("  Counter: {} (expected {})", value, WORKERS * ITERATIONS);
        println!("  Elapsed: {:?}", elapsed);

        println!("\n  Metrics:");
        let mut metrics: Vec<_> = pool.export_metrics().into_iter().collect();
        metrics.sort();
        for (key, value) in metrics {
            println!("    {}: {}", key, value);
        }
    }

    pool.close();
    let _ = std::fs::remove_file(&path);
    result.map(|_| ())
}

fn counter_pool(path: &Path) -> Result<ConnectionPool<rusqlite::Connection>, BoxError> {
    let config = PoolConfiguration::<rusqlite::Connection>::new()
        .with_capacity(CAPACITY)
        .with_on_first_connection(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS counter (
                     id INTEGER PRIMARY KEY,
                     value INTEGER NOT NULL
                 );
                 INSERT OR REPLACE INTO counter (id, value) VALUES (1, 0);",
            )
        })
        .with_on_connection(|conn| conn.busy_timeout(Duration::from_secs(5)));

    Ok(ConnectionPool::new(&SqliteSpec::file(path), config)?)
}

/// Increment the counter from `workers` threads and return its final value.
///
/// A failing update stops the workload with that error; a panicking worker
/// keeps panicking on the calling thread.
fn run_workload(
    pool: &ConnectionPool<rusqlite::Connection>,
    workers: usize,
    iterations: usize,
) -> Result<i64, BoxError> {
    let outcome = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|_| -> rusqlite::Result<()> {
                    for _ in 0..iterations {
                        let conn = pool.acquire();
                        conn.execute("UPDATE counter SET value = value + 1 WHERE id = 1", [])?;
                    }
                    Ok(())
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect::<rusqlite::Result<()>>()
    })
    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));

    if let Err(err) = outcome {
        tracing::error!(error = %err, "counter update failed");
        return Err(err.into());
    }

    let value = pool
        .acquire()
        .query_row("SELECT value FROM counter WHERE id = 1", [], |row| row.get(0))?;
    Ok(value)
}
