//! devcast-sim: grouped-tree propagation driving the cross-section
//! lookup proxy app.

use std::process;
use std::sync::Arc;

use clap::Parser;

use devcast::sim::{self, GridKind, SimInput};
use devcast::{CpuRuntime, DevcastConfig};

#[derive(Parser)]
#[command(name = "devcast-sim", about = "Cross-section lookup proxy app")]
struct Args {
    /// Lookups per device
    #[arg(short = 'l', long, default_value = "100000")]
    lookups: usize,

    /// Number of isotopes
    #[arg(short = 'i', long, default_value = "68")]
    isotopes: usize,

    /// Grid points per isotope
    #[arg(short = 'g', long, default_value = "1000")]
    gridpoints: usize,

    /// Lookup method: nuclide, unionized or hash
    #[arg(short = 'm', long, default_value = "unionized")]
    method: GridKind,

    /// Hash bin count (hash method only)
    #[arg(short = 'b', long, default_value = "10000")]
    hash_bins: usize,

    /// Device count
    #[arg(short = 'd', long, default_value = "8")]
    devices: u32,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args = Args::try_parse().unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    let input = SimInput {
        lookups: args.lookups,
        n_isotopes: args.isotopes,
        n_gridpoints: args.gridpoints,
        grid: args.method,
        hash_bins: args.hash_bins,
    };
    let config = DevcastConfig::from_env();
    let runtime = Arc::new(CpuRuntime::new(args.devices));

    println!("Num Devices: {}", args.devices);
    println!("Lookups per device: {}", input.lookups);
    println!("Lookup method: {}", input.grid);

    let report = match sim::run_simulation(runtime, &input, &config).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("simulation failed: {e}");
            process::exit(1);
        }
    };

    println!("Transfer: {:.6}s", report.transfer_elapsed.as_secs_f64());
    println!("Compute: {:.6}s", report.compute_elapsed.as_secs_f64());
    println!("Lookups/s: {:.1}", report.lookups_per_sec);
    println!("----");
    for (device, &v) in report.verification.iter().enumerate() {
        println!("Device={device}: verification={v}");
    }
    if report.consistent() {
        println!("Verification: PASSED (all devices agree)");
    } else {
        println!("Verification: FAILED (devices disagree)");
        process::exit(1);
    }
}
