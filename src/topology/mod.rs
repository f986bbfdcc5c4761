mod graph;
mod planner;

pub use graph::{Edge, TransferGraph};
pub use planner::{Topology, plan};
