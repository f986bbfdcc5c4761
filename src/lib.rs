//! devcast: multi-device broadcast scheduling, benchmarked.
//!
//! A host stages a set of byte fields; a [`topology`] planner decides how
//! the fields propagate across N devices (flat broadcast, or a grouped
//! tree that bounds host egress); the [`transfer`] executor issues the
//! copies asynchronously under per-(device, field) readiness tokens and
//! provides the round barrier. [`bench`] measures raw update throughput;
//! [`sim`] exercises the grouped tree with an XSBench-style cross-section
//! lookup kernel that doubles as a replica-fidelity check.

pub mod bench;
pub mod config;
pub mod device;
pub mod error;
pub mod sim;
pub mod topology;
pub mod transfer;
pub mod types;

pub use config::DevcastConfig;
pub use device::{BufferHandle, CpuRuntime, DeviceRuntime};
pub use error::{DevcastError, Result};
pub use topology::{Edge, Topology, TransferGraph, plan};
pub use transfer::{TokenGrid, TransferExecutor};
pub use types::{DeviceId, FieldId, FieldSpec, Source};
