//! Host→device update microbenchmark.
//!
//! Measures repeated flat-broadcast rounds of K fields of N bytes to every
//! device: allocate replicas once, run a few untimed warmup rounds, then
//! time `execute` + `barrier` per round and report the mean and the
//! aggregate message rate. Replica checksums are verified after the timed
//! loop on every run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::info;

use crate::config::DevcastConfig;
use crate::device::DeviceRuntime;
use crate::error::{DevcastError, Result};
use crate::topology::{Topology, plan};
use crate::transfer::TransferExecutor;
use crate::types::FieldSpec;

/// Parameters of one benchmark run.
#[derive(Debug, Clone, Copy)]
pub struct BenchParams {
    /// N: bytes per field.
    pub field_bytes: usize,
    /// K: number of fields updated per round.
    pub num_fields: usize,
    /// D: number of devices.
    pub num_devices: u32,
}

/// Outcome of a benchmark run.
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub params: BenchParams,
    /// Mean wall time of one timed round.
    pub avg_round: Duration,
    /// K * D field updates per second at the mean round time.
    pub throughput_msgs_per_sec: f64,
    pub warmup_rounds: u32,
    pub timed_rounds: u32,
    /// Per-device sum over all replica bytes; every byte of the source is
    /// 1, so the expected value is K * N.
    pub checksums: Vec<u64>,
}

impl BenchReport {
    /// Expected per-device checksum: every replicated byte is 1.
    pub fn expected_checksum(&self) -> u64 {
        (self.params.num_fields * self.params.field_bytes) as u64
    }

    /// True when every device replicated the source exactly.
    pub fn verified(&self) -> bool {
        let want = self.expected_checksum();
        self.checksums.iter().all(|&c| c == want)
    }
}

/// Run the microbenchmark against `runtime`.
pub async fn run(
    runtime: Arc<dyn DeviceRuntime>,
    params: BenchParams,
    config: &DevcastConfig,
) -> Result<BenchReport> {
    if runtime.device_count() != params.num_devices {
        return Err(DevcastError::UnknownDevice {
            device: params.num_devices,
            device_count: runtime.device_count(),
        });
    }

    let fields: Vec<FieldSpec> = (0..params.num_fields)
        .map(|_| FieldSpec {
            name: "payload",
            elem_bytes: 1,
            len: params.field_bytes,
        })
        .collect();
    let host: Vec<Bytes> = (0..params.num_fields)
        .map(|_| Bytes::from(vec![1u8; params.field_bytes]))
        .collect();

    let graph = plan(params.num_devices, &Topology::Flat)?;
    let mut exec = TransferExecutor::new(runtime, fields, config)?;

    let warmup = config.warmup_rounds;
    let rounds = config.timed_rounds(params.field_bytes);
    let mut total = Duration::ZERO;

    for i in 0..warmup + rounds {
        exec.reset_round()?;
        let start = Instant::now();
        exec.execute(&graph, &host)?;
        exec.barrier().await?;
        if i >= warmup {
            total += start.elapsed();
        }
    }

    let avg_round = total / rounds;
    let throughput =
        (params.num_fields as f64 * params.num_devices as f64) / avg_round.as_secs_f64();

    let mut checksums = Vec::with_capacity(params.num_devices as usize);
    for device in 0..params.num_devices {
        let mut sum = 0u64;
        for field in 0..params.num_fields {
            sum += exec
                .read_replica(device, field)?
                .iter()
                .map(|&b| b as u64)
                .sum::<u64>();
        }
        checksums.push(sum);
    }

    exec.release()?;

    info!(
        n = params.field_bytes,
        k = params.num_fields,
        devices = params.num_devices,
        avg_round_us = avg_round.as_micros() as u64,
        "microbenchmark complete"
    );

    Ok(BenchReport {
        params,
        avg_round,
        throughput_msgs_per_sec: throughput,
        warmup_rounds: warmup,
        timed_rounds: rounds,
        checksums,
    })
}
