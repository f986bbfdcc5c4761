//! Broadcast propagation planning.
//!
//! A plan is a pure function of the device count and the topology policy;
//! nothing here touches device memory. The executor consumes the resulting
//! [`TransferGraph`] and attaches per-field tokens.

use tracing::debug;

use crate::error::{DevcastError, Result};
use crate::types::Source;

use super::graph::{Edge, TransferGraph};

/// How replicas propagate from the host to the devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Every device pulls independently from the host. Depth 1, no
    /// device-to-device edges, maximal host egress contention.
    Flat,

    /// Devices are partitioned into groups of `group_size`; the host
    /// feeds the leaders of the first two groups, leaders fan out to
    /// further group leaders through a binary tree over group indices,
    /// and group members receive from their own leader. Bounds host
    /// egress to two streams at logarithmic depth.
    GroupedTree { group_size: u32 },
}

impl Topology {
    /// Grouped tree with the standard group size of 4.
    pub const fn grouped() -> Self {
        Topology::GroupedTree { group_size: 4 }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Flat => f.write_str("flat"),
            Topology::GroupedTree { group_size } => write!(f, "grouped-tree/{group_size}"),
        }
    }
}

/// Compute the transfer graph for `num_devices` under `topology`.
pub fn plan(num_devices: u32, topology: &Topology) -> Result<TransferGraph> {
    if num_devices == 0 {
        return Err(DevcastError::topology(0, "no devices to broadcast to"));
    }

    let graph = match *topology {
        Topology::Flat => plan_flat(num_devices),
        Topology::GroupedTree { group_size } => {
            if group_size == 0 {
                return Err(DevcastError::topology(num_devices, "group size must be > 0"));
            }
            plan_grouped(num_devices, group_size)
        }
    };

    graph.validate()?;
    debug!(
        devices = num_devices,
        %topology,
        edges = graph.edges().len(),
        depth = graph.depth(),
        "planned broadcast"
    );
    Ok(graph)
}

fn plan_flat(num_devices: u32) -> TransferGraph {
    let edges = (0..num_devices)
        .map(|dst| Edge {
            dst,
            src: Source::Host,
        })
        .collect();
    TransferGraph::new(num_devices, edges)
}

/// Grouped tree: `leader(d) = (d / G) * G`. The host feeds device 0 and
/// device G. Each leader L = g*G forwards to the leaders of groups 2g+1
/// (at 2L + G, suppressed for g = 0 since group 1 is host-fed) and 2g+2
/// (at 2L + 2G); that heap rule gives every group exactly one parent for
/// any device count. Members receive from their own leader.
fn plan_grouped(num_devices: u32, g: u32) -> TransferGraph {
    let mut edges = Vec::new();

    edges.push(Edge {
        dst: 0,
        src: Source::Host,
    });
    if g < num_devices {
        edges.push(Edge {
            dst: g,
            src: Source::Host,
        });
    }

    let mut leader = 0;
    while leader < num_devices {
        let left = 2 * leader + g;
        let right = 2 * leader + 2 * g;
        if leader != 0 && left < num_devices {
            edges.push(Edge {
                dst: left,
                src: Source::Device(leader),
            });
        }
        if right < num_devices {
            edges.push(Edge {
                dst: right,
                src: Source::Device(leader),
            });
        }
        for member in leader + 1..(leader + g).min(num_devices) {
            edges.push(Edge {
                dst: member,
                src: Source::Device(leader),
            });
        }
        leader += g;
    }

    TransferGraph::new(num_devices, edges)
}
