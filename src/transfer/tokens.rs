use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::error::{DevcastError, Result};
use crate::types::{DeviceId, FieldId};

/// Grid of readiness tokens, one per (device, field) replica.
///
/// A token is pending until the single transfer that populates its
/// replica satisfies it; transfers reading from that replica wait on the
/// token first. The grid carries no payload data, only ordering. Between
/// rounds [`reset`](Self::reset) returns every token to pending.
///
/// Each token records the round epoch at which it was satisfied, and a
/// satisfy call carries the epoch of the round that issued it. A transfer
/// that outlives its round (a barrier timeout orphans tasks it cannot
/// cancel mid-copy) therefore writes a stale epoch, which the next round
/// still reads as pending.
pub struct TokenGrid {
    num_devices: u32,
    num_fields: usize,
    /// Current round. Starts at 1; token value 0 means never satisfied.
    epoch: AtomicU64,
    /// Epoch at which each token was satisfied.
    tokens: Vec<watch::Sender<u64>>,
}

impl TokenGrid {
    /// All-pending grid for `num_devices` x `num_fields`.
    pub fn new(num_devices: u32, num_fields: usize) -> Self {
        let tokens = (0..num_devices as usize * num_fields)
            .map(|_| watch::channel(0u64).0)
            .collect();
        Self {
            num_devices,
            num_fields,
            epoch: AtomicU64::new(1),
            tokens,
        }
    }

    pub fn num_devices(&self) -> u32 {
        self.num_devices
    }

    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    /// Total token count.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The current round epoch.
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn index(&self, device: DeviceId, field: FieldId) -> usize {
        assert!(device < self.num_devices, "device {device} out of grid");
        assert!(field < self.num_fields, "field {field} out of grid");
        device as usize * self.num_fields + field
    }

    /// Mark the (device, field) replica ready in the current round. A
    /// second call within the same round violates the single-writer
    /// invariant.
    pub fn satisfy(&self, device: DeviceId, field: FieldId) -> Result<()> {
        self.satisfy_at(device, field, self.epoch())
    }

    /// Mark the replica ready for the round identified by `epoch`. A call
    /// carrying a past epoch is dropped: the round it belonged to is
    /// over, and its token must not leak into the current one.
    pub(crate) fn satisfy_at(&self, device: DeviceId, field: FieldId, epoch: u64) -> Result<()> {
        if epoch != self.epoch() {
            return Ok(());
        }
        let tx = &self.tokens[self.index(device, field)];
        let mut already = false;
        // A reset racing this write can at worst leave the token holding
        // the superseded epoch, which the new round still reads as
        // pending.
        tx.send_if_modified(|v| {
            if *v == epoch {
                already = true;
                false
            } else {
                *v = epoch;
                true
            }
        });
        if already {
            return Err(DevcastError::TokenAlreadySatisfied { device, field });
        }
        Ok(())
    }

    /// Wait until the (device, field) replica is ready in the current
    /// round.
    pub async fn wait(&self, device: DeviceId, field: FieldId) {
        self.wait_at(device, field, self.epoch()).await
    }

    /// Wait for readiness within the round identified by `epoch`.
    pub(crate) async fn wait_at(&self, device: DeviceId, field: FieldId, epoch: u64) {
        let mut rx = self.tokens[self.index(device, field)].subscribe();
        // The sender lives in the grid for our whole lifetime, so the
        // channel cannot close while we wait.
        let _ = rx.wait_for(|&v| v == epoch).await;
    }

    pub fn is_satisfied(&self, device: DeviceId, field: FieldId) -> bool {
        *self.tokens[self.index(device, field)].borrow() == self.epoch()
    }

    /// Tokens still pending, as (device, field) pairs.
    pub fn pending(&self) -> Vec<(DeviceId, FieldId)> {
        let epoch = self.epoch();
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, tx)| *tx.borrow() != epoch)
            .map(|(i, _)| {
                (
                    (i / self.num_fields) as DeviceId,
                    i % self.num_fields,
                )
            })
            .collect()
    }

    pub fn all_satisfied(&self) -> bool {
        let epoch = self.epoch();
        self.tokens.iter().all(|tx| *tx.borrow() == epoch)
    }

    /// Return every token to pending for the next round. Satisfy calls
    /// still in flight from the previous round become no-ops.
    pub fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}
