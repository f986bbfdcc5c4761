use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{DevcastError, Result};
use crate::types::DeviceId;

use super::runtime::{BufferHandle, DeviceRuntime};

/// In-process device runtime: N simulated devices, each backed by its own
/// buffer arena in host memory.
///
/// Exists so the planner, token grid and executor can be exercised (and
/// benchmarked for scheduling overhead) without accelerator hardware.
/// Tracks live allocations per device so tests can assert alloc/free
/// balance at round end.
pub struct CpuRuntime {
    devices: Vec<Mutex<Arena>>,
    capacity_bytes: Option<usize>,
}

#[derive(Default)]
struct Arena {
    buffers: HashMap<u64, Vec<u8>>,
    next_handle: u64,
    used_bytes: usize,
    total_allocs: u64,
    total_frees: u64,
}

impl CpuRuntime {
    /// Create a runtime exposing `num_devices` simulated devices with
    /// unbounded memory.
    pub fn new(num_devices: u32) -> Self {
        Self {
            devices: (0..num_devices).map(|_| Mutex::new(Arena::default())).collect(),
            capacity_bytes: None,
        }
    }

    /// Create a runtime whose devices each hold at most `capacity_bytes`.
    /// Allocations past the cap fail with `DeviceAllocation`.
    pub fn with_capacity(num_devices: u32, capacity_bytes: usize) -> Self {
        Self {
            devices: (0..num_devices).map(|_| Mutex::new(Arena::default())).collect(),
            capacity_bytes: Some(capacity_bytes),
        }
    }

    /// Number of live (not yet freed) buffers on `device`.
    pub fn live_buffers(&self, device: DeviceId) -> usize {
        self.arena(device).map_or(0, |a| a.lock().unwrap().buffers.len())
    }

    /// Lifetime (alloc, free) counters for `device`.
    pub fn alloc_free_counts(&self, device: DeviceId) -> (u64, u64) {
        self.arena(device).map_or((0, 0), |a| {
            let a = a.lock().unwrap();
            (a.total_allocs, a.total_frees)
        })
    }

    fn arena(&self, device: DeviceId) -> Option<&Mutex<Arena>> {
        self.devices.get(device as usize)
    }

    fn checked_arena(&self, device: DeviceId) -> Result<&Mutex<Arena>> {
        self.arena(device).ok_or(DevcastError::UnknownDevice {
            device,
            device_count: self.devices.len() as u32,
        })
    }
}

impl DeviceRuntime for CpuRuntime {
    fn device_count(&self) -> u32 {
        self.devices.len() as u32
    }

    fn alloc(&self, device: DeviceId, size_bytes: usize) -> Result<BufferHandle> {
        let arena = self.checked_arena(device)?;
        let mut arena = arena.lock().unwrap();
        if let Some(cap) = self.capacity_bytes {
            if arena.used_bytes + size_bytes > cap {
                return Err(DevcastError::alloc(
                    device,
                    size_bytes,
                    format!("device capacity {cap} bytes exceeded"),
                ));
            }
        }
        let handle = BufferHandle(arena.next_handle);
        arena.next_handle += 1;
        arena.used_bytes += size_bytes;
        arena.total_allocs += 1;
        arena.buffers.insert(handle.0, vec![0u8; size_bytes]);
        Ok(handle)
    }

    fn free(&self, device: DeviceId, handle: BufferHandle) -> Result<()> {
        let arena = self.checked_arena(device)?;
        let mut arena = arena.lock().unwrap();
        match arena.buffers.remove(&handle.0) {
            Some(buf) => {
                arena.used_bytes -= buf.len();
                arena.total_frees += 1;
                Ok(())
            }
            None => Err(DevcastError::InvalidHandle { device }),
        }
    }

    fn copy_host_to_device(&self, device: DeviceId, dst: BufferHandle, src: &[u8]) -> Result<()> {
        let arena = self.checked_arena(device)?;
        let mut arena = arena.lock().unwrap();
        let buf = arena
            .buffers
            .get_mut(&dst.0)
            .ok_or(DevcastError::InvalidHandle { device })?;
        if buf.len() < src.len() {
            return Err(DevcastError::ReplicaSizeMismatch {
                expected: src.len(),
                actual: buf.len(),
            });
        }
        buf[..src.len()].copy_from_slice(src);
        Ok(())
    }

    fn copy_device_to_host(
        &self,
        device: DeviceId,
        src: BufferHandle,
        dst: &mut [u8],
    ) -> Result<()> {
        let arena = self.checked_arena(device)?;
        let arena = arena.lock().unwrap();
        let buf = arena
            .buffers
            .get(&src.0)
            .ok_or(DevcastError::InvalidHandle { device })?;
        if dst.len() > buf.len() {
            return Err(DevcastError::ReplicaSizeMismatch {
                expected: dst.len(),
                actual: buf.len(),
            });
        }
        dst.copy_from_slice(&buf[..dst.len()]);
        Ok(())
    }

    fn copy_device_to_device(
        &self,
        src_device: DeviceId,
        dst_device: DeviceId,
        src: BufferHandle,
        dst: BufferHandle,
    ) -> Result<()> {
        if src_device == dst_device {
            let arena = self.checked_arena(src_device)?;
            let mut arena = arena.lock().unwrap();
            let data = arena
                .buffers
                .get(&src.0)
                .ok_or(DevcastError::InvalidHandle { device: src_device })?
                .clone();
            let buf = arena
                .buffers
                .get_mut(&dst.0)
                .ok_or(DevcastError::InvalidHandle { device: dst_device })?;
            if buf.len() != data.len() {
                return Err(DevcastError::ReplicaSizeMismatch {
                    expected: data.len(),
                    actual: buf.len(),
                });
            }
            buf.copy_from_slice(&data);
            return Ok(());
        }

        // Lock in device-id order so concurrent cross-copies cannot deadlock.
        let (first, second) = if src_device < dst_device {
            (src_device, dst_device)
        } else {
            (dst_device, src_device)
        };
        let first_arena = self.checked_arena(first)?.lock().unwrap();
        let second_arena = self.checked_arena(second)?.lock().unwrap();
        let (src_arena, mut dst_arena) = if src_device < dst_device {
            (first_arena, second_arena)
        } else {
            (second_arena, first_arena)
        };

        let src_buf = src_arena
            .buffers
            .get(&src.0)
            .ok_or(DevcastError::InvalidHandle { device: src_device })?;
        let dst_buf = dst_arena
            .buffers
            .get_mut(&dst.0)
            .ok_or(DevcastError::InvalidHandle { device: dst_device })?;
        if dst_buf.len() != src_buf.len() {
            return Err(DevcastError::ReplicaSizeMismatch {
                expected: src_buf.len(),
                actual: dst_buf.len(),
            });
        }
        dst_buf.copy_from_slice(src_buf);
        Ok(())
    }
}
