use std::sync::Arc;

use bytes::Bytes;
use devcast::{
    CpuRuntime, DevcastConfig, DeviceRuntime, FieldSpec, Result, Topology, TransferExecutor, plan,
};

/// Deterministic non-uniform payload so shifted or truncated copies
/// cannot pass the fidelity checks.
pub fn pattern_bytes(len: usize, salt: u8) -> Bytes {
    Bytes::from(
        (0..len)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(salt))
            .collect::<Vec<u8>>(),
    )
}

/// Standard two-field layout used across the broadcast tests.
pub fn two_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec {
            name: "grid",
            elem_bytes: 1,
            len: 257,
        },
        FieldSpec {
            name: "index",
            elem_bytes: 1,
            len: 64,
        },
    ]
}

pub fn host_payload(fields: &[FieldSpec]) -> Vec<Bytes> {
    fields
        .iter()
        .enumerate()
        .map(|(i, f)| pattern_bytes(f.size_bytes(), i as u8))
        .collect()
}

/// Run one full round under `topology` and return the executor for
/// replica inspection, together with the runtime for leak checks.
pub async fn run_round(
    num_devices: u32,
    topology: &Topology,
) -> Result<(TransferExecutor, Arc<CpuRuntime>)> {
    let runtime = Arc::new(CpuRuntime::new(num_devices));
    let fields = two_fields();
    let host = host_payload(&fields);

    let graph = plan(num_devices, topology)?;
    let mut exec = TransferExecutor::new(
        Arc::clone(&runtime) as Arc<dyn DeviceRuntime>,
        fields,
        &DevcastConfig::default(),
    )?;
    exec.execute(&graph, &host)?;
    exec.barrier().await?;
    Ok((exec, runtime))
}
