use std::collections::{HashMap, VecDeque};

use crate::error::{DevcastError, Result};
use crate::types::{DeviceId, Source};

/// One transfer: populate `dst`'s replica from `src`.
///
/// Edges are per-device; the executor applies the same edge to every
/// field of the round, attaching one token per (device, field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub dst: DeviceId,
    pub src: Source,
}

/// Directed acyclic transfer graph over devices.
///
/// Invariants (checked by [`validate`](Self::validate)):
/// - every device has exactly one incoming edge (single writer per replica),
/// - the graph is acyclic,
/// - every device is reachable from a host-origin edge.
#[derive(Debug, Clone)]
pub struct TransferGraph {
    num_devices: u32,
    edges: Vec<Edge>,
}

impl TransferGraph {
    pub(crate) fn new(num_devices: u32, edges: Vec<Edge>) -> Self {
        Self { num_devices, edges }
    }

    pub fn num_devices(&self) -> u32 {
        self.num_devices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The edge populating `device`, if the graph covers it.
    pub fn source_of(&self, device: DeviceId) -> Option<Source> {
        self.edges.iter().find(|e| e.dst == device).map(|e| e.src)
    }

    /// Devices populated directly from `device`.
    pub fn children_of(&self, device: DeviceId) -> Vec<DeviceId> {
        self.edges
            .iter()
            .filter(|e| e.src == Source::Device(device))
            .map(|e| e.dst)
            .collect()
    }

    /// Devices fed directly from the host.
    pub fn host_fed(&self) -> Vec<DeviceId> {
        self.edges
            .iter()
            .filter(|e| e.src == Source::Host)
            .map(|e| e.dst)
            .collect()
    }

    /// Length of the longest host-rooted dependency chain. Flat broadcast
    /// has depth 1; the grouped tree stays logarithmic in the group count.
    pub fn depth(&self) -> u32 {
        let mut depth_of: HashMap<DeviceId, u32> = HashMap::new();
        let mut queue: VecDeque<DeviceId> = VecDeque::new();
        for &d in &self.host_fed() {
            depth_of.insert(d, 1);
            queue.push_back(d);
        }
        let mut max = 0;
        while let Some(d) = queue.pop_front() {
            let here = depth_of[&d];
            max = max.max(here);
            for child in self.children_of(d) {
                if !depth_of.contains_key(&child) {
                    depth_of.insert(child, here + 1);
                    queue.push_back(child);
                }
            }
        }
        max
    }

    /// Check the structural invariants. Violations indicate a planner bug
    /// and surface as `UnsupportedTopology`.
    pub fn validate(&self) -> Result<()> {
        let mut incoming = vec![0u32; self.num_devices as usize];
        for e in &self.edges {
            if e.dst >= self.num_devices {
                return Err(DevcastError::topology(
                    self.num_devices,
                    format!("edge targets out-of-range device {}", e.dst),
                ));
            }
            if let Source::Device(s) = e.src {
                if s >= self.num_devices {
                    return Err(DevcastError::topology(
                        self.num_devices,
                        format!("edge sources out-of-range device {s}"),
                    ));
                }
                if s == e.dst {
                    return Err(DevcastError::topology(
                        self.num_devices,
                        format!("self-edge on device {s}"),
                    ));
                }
            }
            incoming[e.dst as usize] += 1;
        }
        for (d, &n) in incoming.iter().enumerate() {
            if n != 1 {
                return Err(DevcastError::topology(
                    self.num_devices,
                    format!("device {d} has {n} incoming edges, expected 1"),
                ));
            }
        }

        // Single incoming edge per device means host-reachability implies
        // acyclicity: a cycle could never be reached from a host edge.
        let mut reached = vec![false; self.num_devices as usize];
        let mut queue: VecDeque<DeviceId> = self.host_fed().into();
        while let Some(d) = queue.pop_front() {
            if std::mem::replace(&mut reached[d as usize], true) {
                continue;
            }
            queue.extend(self.children_of(d));
        }
        if let Some(d) = reached.iter().position(|&r| !r) {
            return Err(DevcastError::topology(
                self.num_devices,
                format!("device {d} unreachable from host"),
            ));
        }
        Ok(())
    }
}
