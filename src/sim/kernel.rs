use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::DevcastConfig;
use crate::device::DeviceRuntime;
use crate::error::{DevcastError, Result};
use crate::topology::{Topology, plan};
use crate::transfer::TransferExecutor;
use crate::types::DeviceId;

use super::data::{NuclideGridPoint, SimData};
use super::input::SimInput;
use super::lookup::{self, STARTING_SEED, XsTables};

/// Field order within a round; must match [`SimData::fields`].
const F_NUM_NUCS: usize = 0;
const F_CONCS: usize = 1;
const F_MATS: usize = 2;
const F_UNIONIZED: usize = 3;
const F_INDEX: usize = 4;
const F_NUCLIDE_GRID: usize = 5;

/// One device's owned copy of the replicated tables, decoded from the
/// replica bytes after the barrier.
struct DeviceTables {
    num_nucs: Vec<i32>,
    concs: Vec<f64>,
    mats: Vec<i32>,
    unionized_energy: Vec<f64>,
    index_grid: Vec<i32>,
    nuclide_grid: Vec<NuclideGridPoint>,
}

impl DeviceTables {
    fn load(exec: &TransferExecutor, device: DeviceId) -> Result<Self> {
        Ok(Self {
            num_nucs: bytemuck::pod_collect_to_vec(&exec.read_replica(device, F_NUM_NUCS)?),
            concs: bytemuck::pod_collect_to_vec(&exec.read_replica(device, F_CONCS)?),
            mats: bytemuck::pod_collect_to_vec(&exec.read_replica(device, F_MATS)?),
            unionized_energy: bytemuck::pod_collect_to_vec(
                &exec.read_replica(device, F_UNIONIZED)?,
            ),
            index_grid: bytemuck::pod_collect_to_vec(&exec.read_replica(device, F_INDEX)?),
            nuclide_grid: bytemuck::pod_collect_to_vec(
                &exec.read_replica(device, F_NUCLIDE_GRID)?,
            ),
        })
    }

    fn view<'a>(&'a self, input: &SimInput, max_num_nucs: usize) -> XsTables<'a> {
        XsTables {
            num_nucs: &self.num_nucs,
            concs: &self.concs,
            mats: &self.mats,
            egrid: &self.unionized_energy,
            index_grid: &self.index_grid,
            nuclide_grid: &self.nuclide_grid,
            max_num_nucs,
            n_isotopes: input.n_isotopes,
            n_gridpoints: input.n_gridpoints,
            grid: input.grid,
            hash_bins: input.hash_bins,
        }
    }
}

/// Sequential event-based lookup loop for one device.
///
/// Each lookup is independent: its LCG stream is fast-forwarded to
/// `2 * lookup_index` (two draws per lookup: energy and material), so the
/// loop order never affects the result. The per-lookup argmax channel is
/// folded into an order-independent verification sum.
fn device_kernel(tables: &DeviceTables, input: &SimInput, max_num_nucs: usize) -> Result<u64> {
    let view = tables.view(input, max_num_nucs);
    let mut verification = 0u64;

    for i in 0..input.lookups {
        let mut seed = lookup::fast_forward_lcg(STARTING_SEED, 2 * i as u64);
        let p_energy = lookup::lcg_random_double(&mut seed);
        let mat = lookup::pick_mat(&mut seed);

        let macro_xs = lookup::macro_xs(&view, p_energy, mat)?;

        let mut max = -1.0f64;
        let mut max_idx = 0usize;
        for (k, &xs) in macro_xs.iter().enumerate() {
            if xs > max {
                max = xs;
                max_idx = k;
            }
        }
        verification += max_idx as u64;
    }

    Ok(verification)
}

/// Outcome of one proxy-app run.
#[derive(Debug, Clone)]
pub struct SimReport {
    /// Verification value per device; identical across devices iff every
    /// replica matched the host tables.
    pub verification: Vec<u64>,
    pub transfer_elapsed: Duration,
    pub compute_elapsed: Duration,
    pub lookups_per_sec: f64,
    pub num_devices: u32,
}

impl SimReport {
    /// All devices computed the same verification value.
    pub fn consistent(&self) -> bool {
        self.verification.windows(2).all(|w| w[0] == w[1])
    }
}

/// Run the full proxy app: stage the tables, propagate them through the
/// grouped tree, then run the lookup kernel on every device.
pub async fn run_simulation(
    runtime: Arc<dyn DeviceRuntime>,
    input: &SimInput,
    config: &DevcastConfig,
) -> Result<SimReport> {
    input.validate()?;
    let num_devices = runtime.device_count();
    let data = SimData::generate(input);
    let max_num_nucs = data.max_num_nucs;
    let (specs, host_fields) = data.fields();

    let graph = plan(
        num_devices,
        &Topology::GroupedTree {
            group_size: config.group_size,
        },
    )?;
    debug!(
        devices = num_devices,
        depth = graph.depth(),
        "planned grouped-tree propagation"
    );

    let mut exec = TransferExecutor::new(runtime, specs, config)?;

    let transfer_start = Instant::now();
    exec.execute(&graph, &host_fields)?;
    exec.barrier().await?;
    let transfer_elapsed = transfer_start.elapsed();

    // Compute must never start on a partially populated device.
    exec.assert_complete()?;

    let compute_start = Instant::now();
    let mut handles = Vec::with_capacity(num_devices as usize);
    for device in 0..num_devices {
        let tables = DeviceTables::load(&exec, device)?;
        let input = *input;
        handles.push(tokio::task::spawn_blocking(move || {
            device_kernel(&tables, &input, max_num_nucs)
        }));
    }

    let joined = futures::future::try_join_all(handles)
        .await
        .map_err(|e| DevcastError::TaskFailed(e.to_string()))?;
    let mut verification = Vec::with_capacity(num_devices as usize);
    for (device, v) in joined.into_iter().enumerate() {
        let v = v?;
        debug!(device, verification = v, "device kernel finished");
        verification.push(v);
    }
    let compute_elapsed = compute_start.elapsed();

    exec.release()?;

    let report = SimReport {
        lookups_per_sec: (input.lookups as f64 * num_devices as f64)
            / compute_elapsed.as_secs_f64(),
        verification,
        transfer_elapsed,
        compute_elapsed,
        num_devices,
    };
    if report.consistent() {
        info!(
            devices = num_devices,
            lookups = input.lookups,
            "simulation complete, replicas consistent"
        );
    } else {
        warn!(
            verification = ?report.verification,
            "devices disagree on verification value"
        );
    }
    Ok(report)
}
