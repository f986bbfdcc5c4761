use crate::types::{DeviceId, FieldId};

pub type Result<T> = std::result::Result<T, DevcastError>;

/// Errors surfaced by devcast. All are fatal for the current round; no
/// operation is retried.
#[derive(Debug, thiserror::Error)]
pub enum DevcastError {
    #[error("device {device} allocation of {requested_bytes} bytes failed: {reason}")]
    DeviceAllocation {
        device: DeviceId,
        requested_bytes: usize,
        reason: String,
    },

    #[error("round incomplete: {pending} transfer(s) still pending")]
    IncompleteTransfer { pending: usize },

    #[error("barrier timed out after {timeout_ms}ms; unsatisfied tokens: {pending:?}")]
    TransferTimeout {
        pending: Vec<(DeviceId, FieldId)>,
        timeout_ms: u64,
    },

    #[error("unsupported topology for {num_devices} device(s): {reason}")]
    UnsupportedTopology { num_devices: u32, reason: String },

    #[error("lookup index {index} out of range for table of length {len}")]
    InvalidLookupIndex { index: usize, len: usize },

    #[error("invalid simulation input: {reason}")]
    InvalidSimInput { reason: String },

    #[error("token for (device {device}, field {field}) satisfied more than once in a round")]
    TokenAlreadySatisfied { device: DeviceId, field: FieldId },

    #[error("unknown device {device}: runtime reports {device_count} device(s)")]
    UnknownDevice {
        device: DeviceId,
        device_count: u32,
    },

    #[error("invalid buffer handle on device {device}")]
    InvalidHandle { device: DeviceId },

    #[error("replica size mismatch: expected {expected} bytes, got {actual}")]
    ReplicaSizeMismatch { expected: usize, actual: usize },

    #[error("transfer task failed: {0}")]
    TaskFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DevcastError {
    /// Create a `DeviceAllocation` error.
    pub fn alloc(device: DeviceId, requested_bytes: usize, reason: impl Into<String>) -> Self {
        Self::DeviceAllocation {
            device,
            requested_bytes,
            reason: reason.into(),
        }
    }

    /// Create an `UnsupportedTopology` error.
    pub fn topology(num_devices: u32, reason: impl Into<String>) -> Self {
        Self::UnsupportedTopology {
            num_devices,
            reason: reason.into(),
        }
    }
}
