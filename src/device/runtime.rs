use crate::error::Result;
use crate::types::DeviceId;

/// Opaque handle to a device-resident buffer.
///
/// Handles are only meaningful to the runtime that issued them, on the
/// device they were allocated for. Replicas are addressed handle-by-value
/// (arena + index), never by raw pointers shared across devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

impl std::fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "buf#{}", self.0)
    }
}

/// Boundary to the underlying accelerator runtime.
///
/// devcast schedules transfers; the runtime moves the bytes. The built-in
/// [`CpuRuntime`](super::CpuRuntime) simulates N devices in host memory;
/// real accelerator back ends implement the same surface over their own
/// alloc/memcpy primitives.
///
/// Copies are synchronous from the runtime's point of view; asynchrony
/// and ordering live in the transfer executor, which calls these from
/// spawned tasks under token dependencies.
pub trait DeviceRuntime: Send + Sync {
    /// Number of devices the runtime exposes.
    fn device_count(&self) -> u32;

    /// Allocate `size_bytes` on `device`.
    fn alloc(&self, device: DeviceId, size_bytes: usize) -> Result<BufferHandle>;

    /// Release a buffer previously returned by [`alloc`](Self::alloc).
    fn free(&self, device: DeviceId, handle: BufferHandle) -> Result<()>;

    /// Copy host bytes into a device buffer. The destination must have
    /// been allocated with at least `src.len()` bytes.
    fn copy_host_to_device(&self, device: DeviceId, dst: BufferHandle, src: &[u8]) -> Result<()>;

    /// Copy a device buffer back into host memory.
    fn copy_device_to_host(&self, device: DeviceId, src: BufferHandle, dst: &mut [u8])
    -> Result<()>;

    /// Copy between buffers on two (possibly distinct) devices.
    fn copy_device_to_device(
        &self,
        src_device: DeviceId,
        dst_device: DeviceId,
        src: BufferHandle,
        dst: BufferHandle,
    ) -> Result<()>;

    /// Re-copy host bytes into an already-allocated device buffer.
    ///
    /// Semantically a host→device copy that promises not to reallocate;
    /// back ends may fast-path it (pinned staging, persistent mappings).
    fn update(&self, device: DeviceId, dst: BufferHandle, src: &[u8]) -> Result<()> {
        self.copy_host_to_device(device, dst, src)
    }
}
