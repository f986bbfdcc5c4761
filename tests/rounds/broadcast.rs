use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use devcast::{
    BufferHandle, CpuRuntime, DevcastConfig, DevcastError, DeviceId, DeviceRuntime, FieldSpec,
    Result, Topology, TransferExecutor, plan,
};

use super::helpers::{host_payload, pattern_bytes, run_round, two_fields};

#[tokio::test]
async fn test_round_trip_fidelity_flat() {
    for n in [1u32, 2, 4, 7, 13] {
        let (exec, _rt) = run_round(n, &Topology::Flat).await.unwrap();
        let host = host_payload(&two_fields());
        for d in 0..n {
            for (f, expected) in host.iter().enumerate() {
                assert_eq!(
                    exec.read_replica(d, f).unwrap(),
                    expected.as_ref(),
                    "flat n={n} device={d} field={f}"
                );
            }
        }
    }
}

#[tokio::test]
async fn test_round_trip_fidelity_grouped() {
    for n in [1u32, 3, 4, 5, 8, 9, 16, 23] {
        let (exec, _rt) = run_round(n, &Topology::grouped()).await.unwrap();
        let host = host_payload(&two_fields());
        for d in 0..n {
            for (f, expected) in host.iter().enumerate() {
                assert_eq!(
                    exec.read_replica(d, f).unwrap(),
                    expected.as_ref(),
                    "grouped n={n} device={d} field={f}"
                );
            }
        }
    }
}

#[tokio::test]
async fn test_policies_produce_identical_replicas() {
    // The key equivalence property: flat and grouped-tree fan-out must
    // land bit-identical replicas everywhere.
    for n in [1u32, 5, 8, 12] {
        let (flat, _a) = run_round(n, &Topology::Flat).await.unwrap();
        let (grouped, _b) = run_round(n, &Topology::grouped()).await.unwrap();
        for d in 0..n {
            for f in 0..two_fields().len() {
                assert_eq!(
                    flat.read_replica(d, f).unwrap(),
                    grouped.read_replica(d, f).unwrap(),
                    "n={n} device={d} field={f}"
                );
            }
        }
    }
}

#[tokio::test]
async fn test_rounds_idempotent_after_reset() {
    let runtime: Arc<dyn DeviceRuntime> = Arc::new(CpuRuntime::new(6));
    let fields = two_fields();
    let host = host_payload(&fields);
    let graph = plan(6, &Topology::grouped()).unwrap();
    let mut exec =
        TransferExecutor::new(runtime, fields.clone(), &DevcastConfig::default()).unwrap();

    let mut snapshots: Vec<Vec<Vec<u8>>> = Vec::new();
    for _ in 0..3 {
        exec.reset_round().unwrap();
        exec.execute(&graph, &host).unwrap();
        exec.barrier().await.unwrap();
        let snap: Vec<Vec<u8>> = (0..6)
            .flat_map(|d| (0..fields.len()).map(move |f| (d, f)))
            .map(|(d, f)| exec.read_replica(d, f).unwrap())
            .collect();
        snapshots.push(snap);
    }
    assert_eq!(snapshots[0], snapshots[1]);
    assert_eq!(snapshots[1], snapshots[2]);
    exec.release().unwrap();
}

#[tokio::test]
async fn test_release_balances_allocations() {
    let (mut exec, runtime) = run_round(9, &Topology::grouped()).await.unwrap();
    exec.release().unwrap();
    for d in 0..9 {
        let (allocs, frees) = runtime.alloc_free_counts(d);
        assert_eq!(allocs, frees, "device {d} leaked replicas");
        assert_eq!(runtime.live_buffers(d), 0);
    }
}

/// Wraps `CpuRuntime` and stalls the first `slow_copies` host→device
/// copies long enough to outlive a short barrier timeout; later copies
/// run at full speed.
struct SlowRuntime {
    inner: CpuRuntime,
    delay: Duration,
    slow_copies: AtomicU32,
}

impl SlowRuntime {
    fn new(num_devices: u32, delay: Duration, slow_copies: u32) -> Self {
        Self {
            inner: CpuRuntime::new(num_devices),
            delay,
            slow_copies: AtomicU32::new(slow_copies),
        }
    }
}

impl DeviceRuntime for SlowRuntime {
    fn device_count(&self) -> u32 {
        self.inner.device_count()
    }
    fn alloc(&self, device: DeviceId, size_bytes: usize) -> Result<BufferHandle> {
        self.inner.alloc(device, size_bytes)
    }
    fn free(&self, device: DeviceId, handle: BufferHandle) -> Result<()> {
        self.inner.free(device, handle)
    }
    fn copy_host_to_device(&self, device: DeviceId, dst: BufferHandle, src: &[u8]) -> Result<()> {
        let stall = self
            .slow_copies
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if stall {
            std::thread::sleep(self.delay);
        }
        self.inner.copy_host_to_device(device, dst, src)
    }
    fn copy_device_to_host(
        &self,
        device: DeviceId,
        src: BufferHandle,
        dst: &mut [u8],
    ) -> Result<()> {
        self.inner.copy_device_to_host(device, src, dst)
    }
    fn copy_device_to_device(
        &self,
        src_device: DeviceId,
        dst_device: DeviceId,
        src: BufferHandle,
        dst: BufferHandle,
    ) -> Result<()> {
        self.inner.copy_device_to_device(src_device, dst_device, src, dst)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_barrier_timeout_names_pending_tokens() {
    let runtime: Arc<dyn DeviceRuntime> =
        Arc::new(SlowRuntime::new(2, Duration::from_millis(400), u32::MAX));
    let config = DevcastConfig {
        barrier_timeout: Duration::from_millis(50),
        ..DevcastConfig::default()
    };
    let fields = vec![FieldSpec {
        name: "a",
        elem_bytes: 1,
        len: 8,
    }];
    let mut exec = TransferExecutor::new(runtime, fields, &config).unwrap();
    let graph = plan(2, &Topology::Flat).unwrap();
    exec.execute(&graph, &[Bytes::from(vec![1u8; 8])]).unwrap();

    match exec.barrier().await {
        Err(DevcastError::TransferTimeout { pending, timeout_ms }) => {
            assert_eq!(timeout_ms, 50);
            assert!(!pending.is_empty(), "timeout must name stuck tokens");
        }
        other => panic!("expected TransferTimeout, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_orphaned_transfer_cannot_satisfy_next_round() {
    // A copy the barrier timeout cannot cancel must not flip a token
    // once the round has been reset.
    let runtime: Arc<dyn DeviceRuntime> =
        Arc::new(SlowRuntime::new(2, Duration::from_millis(300), 2));
    let config = DevcastConfig {
        barrier_timeout: Duration::from_millis(50),
        ..DevcastConfig::default()
    };
    let fields = vec![FieldSpec {
        name: "a",
        elem_bytes: 1,
        len: 8,
    }];
    let mut exec = TransferExecutor::new(runtime, fields, &config).unwrap();
    let graph = plan(2, &Topology::Flat).unwrap();
    exec.execute(&graph, &[Bytes::from(vec![1u8; 8])]).unwrap();
    assert!(matches!(
        exec.barrier().await,
        Err(DevcastError::TransferTimeout { .. })
    ));

    exec.reset_round().unwrap();
    assert_eq!(exec.tokens().pending().len(), 2);

    // Let the stalled copies run to completion; their satisfy calls
    // carry the old round's epoch and must be dropped.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        exec.tokens().pending().len(),
        2,
        "stale transfer satisfied a token of the new round"
    );
    assert!(!exec.tokens().is_satisfied(0, 0));
    assert!(!exec.tokens().is_satisfied(1, 0));

    // The reset round still works end to end.
    exec.execute(&graph, &[Bytes::from(vec![2u8; 8])]).unwrap();
    exec.barrier().await.unwrap();
    for d in 0..2 {
        assert_eq!(exec.read_replica(d, 0).unwrap(), vec![2u8; 8]);
    }
    exec.release().unwrap();
}

/// Fails every device-to-device copy; host copies succeed.
struct BrokenLinkRuntime {
    inner: CpuRuntime,
}

impl DeviceRuntime for BrokenLinkRuntime {
    fn device_count(&self) -> u32 {
        self.inner.device_count()
    }
    fn alloc(&self, device: DeviceId, size_bytes: usize) -> Result<BufferHandle> {
        self.inner.alloc(device, size_bytes)
    }
    fn free(&self, device: DeviceId, handle: BufferHandle) -> Result<()> {
        self.inner.free(device, handle)
    }
    fn copy_host_to_device(&self, device: DeviceId, dst: BufferHandle, src: &[u8]) -> Result<()> {
        self.inner.copy_host_to_device(device, dst, src)
    }
    fn copy_device_to_host(
        &self,
        device: DeviceId,
        src: BufferHandle,
        dst: &mut [u8],
    ) -> Result<()> {
        self.inner.copy_device_to_host(device, src, dst)
    }
    fn copy_device_to_device(
        &self,
        _src_device: DeviceId,
        dst_device: DeviceId,
        _src: BufferHandle,
        _dst: BufferHandle,
    ) -> Result<()> {
        Err(DevcastError::alloc(dst_device, 0, "peer link down"))
    }
}

#[tokio::test]
async fn test_failed_transfer_aborts_round() {
    let runtime: Arc<dyn DeviceRuntime> = Arc::new(BrokenLinkRuntime {
        inner: CpuRuntime::new(6),
    });
    let config = DevcastConfig {
        barrier_timeout: Duration::from_secs(2),
        ..DevcastConfig::default()
    };
    let fields = vec![FieldSpec {
        name: "a",
        elem_bytes: 1,
        len: 16,
    }];
    let mut exec = TransferExecutor::new(runtime, fields, &config).unwrap();
    // Grouped tree needs device-to-device copies, which all fail here.
    let graph = plan(6, &Topology::grouped()).unwrap();
    exec.execute(&graph, &[pattern_bytes(16, 0)]).unwrap();
    let err = exec.barrier().await.unwrap_err();
    assert!(
        matches!(
            err,
            DevcastError::DeviceAllocation { .. } | DevcastError::TransferTimeout { .. }
        ),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_single_device_flat_is_one_host_edge() {
    let graph = plan(1, &Topology::Flat).unwrap();
    assert_eq!(graph.edges().len(), 1);
    assert_eq!(graph.host_fed(), vec![0]);

    let (exec, _rt) = run_round(1, &Topology::Flat).await.unwrap();
    let host = host_payload(&two_fields());
    assert_eq!(exec.read_replica(0, 0).unwrap(), host[0].as_ref());
}
