//! Cross-section lookup proxy application.
//!
//! Exercises the realistic broadcast pattern: six simulation tables are
//! staged on the host, propagated to every device through the grouped
//! tree, then each device runs an independent Monte-Carlo-style lookup
//! kernel against its local replicas. Every device performs the same
//! lookups, so per-device verification values agree exactly iff the
//! replicas are bit-identical.

mod data;
mod input;
mod kernel;
mod lookup;

pub use data::{NuclideGridPoint, SimData};
pub use input::{GridKind, SimInput};
pub use kernel::{SimReport, run_simulation};
pub use lookup::{STARTING_SEED, fast_forward_lcg, grid_search, lcg_random_double, pick_mat};
