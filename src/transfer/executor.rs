use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::DevcastConfig;
use crate::device::{BufferHandle, DeviceRuntime};
use crate::error::{DevcastError, Result};
use crate::topology::TransferGraph;
use crate::types::{DeviceId, FieldId, FieldSpec, Source};

use super::tokens::TokenGrid;

/// Issues the transfers of a broadcast round and owns everything the
/// round needs: the per-(device, field) replica registry, the token grid
/// and one execution lane per device.
///
/// Replica state is per-instance, never process-global, so independent
/// rounds (or concurrent executors over disjoint runtimes) cannot alias.
///
/// A round is: optional [`reset_round`](Self::reset_round), then
/// [`execute`](Self::execute), then [`barrier`](Self::barrier). Compute
/// may only touch replicas once the barrier has returned; callers guard
/// that with [`assert_complete`](Self::assert_complete).
pub struct TransferExecutor {
    runtime: Arc<dyn DeviceRuntime>,
    fields: Vec<FieldSpec>,
    num_devices: u32,
    /// `device * num_fields + field`; emptied by `release`.
    replicas: Vec<BufferHandle>,
    tokens: Arc<TokenGrid>,
    /// One permit per device: at most one in-flight operation targets a
    /// given device at a time.
    lanes: Arc<Vec<Semaphore>>,
    tasks: JoinSet<Result<()>>,
    barrier_timeout: Duration,
    released: bool,
}

impl TransferExecutor {
    /// Allocate one replica per (device, field) on every device the
    /// runtime exposes. Frees whatever was already allocated if any
    /// allocation fails.
    pub fn new(
        runtime: Arc<dyn DeviceRuntime>,
        fields: Vec<FieldSpec>,
        config: &DevcastConfig,
    ) -> Result<Self> {
        let num_devices = runtime.device_count();
        if num_devices == 0 {
            return Err(DevcastError::topology(0, "runtime exposes no devices"));
        }

        let mut replicas: Vec<BufferHandle> = Vec::with_capacity(num_devices as usize * fields.len());
        for device in 0..num_devices {
            for field in &fields {
                match runtime.alloc(device, field.size_bytes()) {
                    Ok(h) => replicas.push(h),
                    Err(e) => {
                        for (i, h) in replicas.into_iter().enumerate() {
                            let d = (i / fields.len()) as DeviceId;
                            let _ = runtime.free(d, h);
                        }
                        return Err(e);
                    }
                }
            }
        }
        debug!(
            devices = num_devices,
            fields = fields.len(),
            "allocated replica registry"
        );

        let tokens = Arc::new(TokenGrid::new(num_devices, fields.len()));
        let lanes = Arc::new((0..num_devices).map(|_| Semaphore::new(1)).collect::<Vec<_>>());

        Ok(Self {
            runtime,
            num_devices,
            replicas,
            tokens,
            lanes,
            tasks: JoinSet::new(),
            barrier_timeout: config.barrier_timeout,
            fields,
            released: false,
        })
    }

    pub fn num_devices(&self) -> u32 {
        self.num_devices
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Readiness tokens of the current round.
    pub fn tokens(&self) -> &TokenGrid {
        &self.tokens
    }

    fn replica(&self, device: DeviceId, field: FieldId) -> BufferHandle {
        self.replicas[device as usize * self.fields.len() + field]
    }

    /// Issue one asynchronous transfer per edge and field.
    ///
    /// Host-sourced transfers start as soon as their device lane is free;
    /// device-sourced transfers first wait for the source replica's token.
    /// Every completed transfer satisfies its destination token. The call
    /// returns once everything is issued; completion is observed through
    /// [`barrier`](Self::barrier).
    pub fn execute(&mut self, graph: &TransferGraph, host_fields: &[Bytes]) -> Result<()> {
        if !self.tasks.is_empty() {
            return Err(DevcastError::IncompleteTransfer {
                pending: self.tokens.pending().len(),
            });
        }
        if graph.num_devices() != self.num_devices {
            return Err(DevcastError::topology(
                graph.num_devices(),
                format!("graph does not match executor's {} device(s)", self.num_devices),
            ));
        }
        if host_fields.len() != self.fields.len() {
            return Err(DevcastError::ReplicaSizeMismatch {
                expected: self.fields.len(),
                actual: host_fields.len(),
            });
        }
        for (spec, buf) in self.fields.iter().zip(host_fields) {
            if buf.len() != spec.size_bytes() {
                return Err(DevcastError::ReplicaSizeMismatch {
                    expected: spec.size_bytes(),
                    actual: buf.len(),
                });
            }
        }

        // Tasks orphaned by a timed-out barrier may still be mid-copy
        // when the next round starts; tagging every satisfy with the
        // issuing round's epoch keeps their tokens out of it.
        let epoch = self.tokens.epoch();
        for edge in graph.edges() {
            for field in 0..self.fields.len() {
                let runtime = Arc::clone(&self.runtime);
                let tokens = Arc::clone(&self.tokens);
                let lanes = Arc::clone(&self.lanes);
                let dst = edge.dst;
                let dst_handle = self.replica(dst, field);

                match edge.src {
                    Source::Host => {
                        let data = host_fields[field].clone();
                        self.tasks.spawn(async move {
                            let _permit = lanes[dst as usize]
                                .acquire()
                                .await
                                .map_err(|e| DevcastError::TaskFailed(e.to_string()))?;
                            if epoch != tokens.epoch() {
                                return Ok(());
                            }
                            runtime.update(dst, dst_handle, &data)?;
                            tokens.satisfy_at(dst, field, epoch)
                        });
                    }
                    Source::Device(src) => {
                        let src_handle = self.replica(src, field);
                        self.tasks.spawn(async move {
                            tokens.wait_at(src, field, epoch).await;
                            let _permit = lanes[dst as usize]
                                .acquire()
                                .await
                                .map_err(|e| DevcastError::TaskFailed(e.to_string()))?;
                            if epoch != tokens.epoch() {
                                return Ok(());
                            }
                            runtime.copy_device_to_device(src, dst, src_handle, dst_handle)?;
                            tokens.satisfy_at(dst, field, epoch)
                        });
                    }
                }
            }
        }

        debug!(
            transfers = graph.edges().len() * self.fields.len(),
            "issued broadcast round"
        );
        Ok(())
    }

    /// Wait for every transfer of the current round.
    ///
    /// A failed transfer aborts the rest of the round and propagates its
    /// error; a round that outlives the configured timeout surfaces as
    /// `TransferTimeout` naming the tokens that never satisfied.
    pub async fn barrier(&mut self) -> Result<()> {
        let timeout = self.barrier_timeout;
        let drained = tokio::time::timeout(timeout, async {
            while let Some(joined) = self.tasks.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => return Err(e),
                    Err(e) => return Err(DevcastError::TaskFailed(e.to_string())),
                }
            }
            Ok(())
        })
        .await;

        match drained {
            Ok(Ok(())) => {
                if !self.tokens.all_satisfied() {
                    return Err(DevcastError::IncompleteTransfer {
                        pending: self.tokens.pending().len(),
                    });
                }
                Ok(())
            }
            Ok(Err(e)) => {
                self.tasks.abort_all();
                self.tasks.detach_all();
                Err(e)
            }
            Err(_) => {
                self.tasks.abort_all();
                self.tasks.detach_all();
                Err(DevcastError::TransferTimeout {
                    pending: self.tokens.pending(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// All tokens of the current round satisfied and nothing in flight.
    /// The compute step calls this before touching replicas.
    pub fn assert_complete(&self) -> Result<()> {
        let pending = self.tokens.pending().len();
        if pending > 0 || !self.tasks.is_empty() {
            return Err(DevcastError::IncompleteTransfer { pending });
        }
        Ok(())
    }

    /// Return every token to pending so the same graph can run again.
    pub fn reset_round(&mut self) -> Result<()> {
        if !self.tasks.is_empty() {
            return Err(DevcastError::IncompleteTransfer {
                pending: self.tokens.pending().len(),
            });
        }
        self.tokens.reset();
        Ok(())
    }

    /// Copy a replica back to the host for verification.
    pub fn read_replica(&self, device: DeviceId, field: FieldId) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.fields[field].size_bytes()];
        self.runtime
            .copy_device_to_host(device, self.replica(device, field), &mut out)?;
        Ok(out)
    }

    /// Free every replica. Alloc/free counts balance per device after
    /// this returns. Idempotent.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        for (i, h) in self.replicas.drain(..).enumerate() {
            let device = (i / self.fields.len()) as DeviceId;
            self.runtime.free(device, h)?;
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for TransferExecutor {
    fn drop(&mut self) {
        if !self.released {
            warn!("executor dropped without release; freeing replicas");
            for (i, h) in self.replicas.drain(..).enumerate() {
                let device = (i / self.fields.len()) as DeviceId;
                let _ = self.runtime.free(device, h);
            }
        }
    }
}
