//! devcast-bench: host→device broadcast/update throughput.
//!
//! ```bash
//! devcast-bench <N> <K> <D>
//! ```
//!
//! N bytes per field, K fields per round, D devices. Prints the mean
//! round time and the aggregate message rate, then per-device checksum
//! verdicts.

use std::process;
use std::sync::Arc;

use clap::Parser;

use devcast::bench::{self, BenchParams};
use devcast::{CpuRuntime, DevcastConfig};

#[derive(Parser)]
#[command(name = "devcast-bench", about = "Multi-device broadcast microbenchmark")]
struct Args {
    /// Bytes per field (N)
    n: usize,

    /// Fields updated per round (K)
    k: usize,

    /// Device count (D)
    d: u32,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args = Args::try_parse().unwrap_or_else(|e| {
        eprintln!("{e}");
        eprintln!("Usage: devcast-bench <N> <K> <D>");
        process::exit(1);
    });

    let params = BenchParams {
        field_bytes: args.n,
        num_fields: args.k,
        num_devices: args.d,
    };
    let config = DevcastConfig::from_env();
    let runtime = Arc::new(CpuRuntime::new(args.d));

    let report = match bench::run(runtime, params, &config).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("benchmark failed: {e}");
            process::exit(1);
        }
    };

    println!("N: {}", report.params.field_bytes);
    println!("K: {}", report.params.num_fields);
    println!("NumDevices: {}", report.params.num_devices);
    println!("AvgRuntime: {:.6}s", report.avg_round.as_secs_f64());
    println!(
        "AvgThroughput: {:.4} messages/s",
        report.throughput_msgs_per_sec
    );
    println!("----");
    let want = report.expected_checksum();
    for (device, &sum) in report.checksums.iter().enumerate() {
        if sum == want {
            println!("Device={device}: CORRECT SUM={sum}");
        } else {
            println!("Device={device}: WRONG SUM={sum} (expected {want})");
        }
    }

    if !report.verified() {
        process::exit(1);
    }
}
