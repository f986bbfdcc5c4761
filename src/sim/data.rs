use bytes::Bytes;
use tracing::debug;

use crate::types::FieldSpec;

use super::input::{GridKind, SimInput};
use super::lookup::{self, STARTING_SEED, grid_search, lcg_random_double};

/// One energy point of one nuclide: the energy level and the cross
/// section of each of the five reaction channels.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct NuclideGridPoint {
    pub energy: f64,
    pub total_xs: f64,
    pub elastic_xs: f64,
    pub absorbtion_xs: f64,
    pub fission_xs: f64,
    pub nu_fission_xs: f64,
}

/// Nuclide counts per material, largest first (fuel). Clamped to the
/// configured isotope count for small runs.
const NUM_NUCS_TABLE: [usize; 12] = [34, 5, 4, 4, 27, 21, 21, 21, 21, 21, 9, 9];

/// The simulation tables staged on the host and replicated per device.
///
/// Six arrays; `unionized_energy` and `index_grid` may be empty depending
/// on the lookup strategy.
pub struct SimData {
    /// Nuclides per material; length 12.
    pub num_nucs: Vec<i32>,
    /// Concentration of each nuclide in each material; 12 x max_num_nucs.
    pub concs: Vec<f64>,
    /// Nuclide indices composing each material; 12 x max_num_nucs.
    pub mats: Vec<i32>,
    /// Unionized energy grid (Unionized only).
    pub unionized_energy: Vec<f64>,
    /// Per-(energy, nuclide) indices into the nuclide grid (Unionized)
    /// or per-(bin, nuclide) lower bounds (Hash).
    pub index_grid: Vec<i32>,
    /// All nuclides' sorted grids, n_isotopes x n_gridpoints.
    pub nuclide_grid: Vec<NuclideGridPoint>,
    /// Largest material composition, the stride of `concs` and `mats`.
    pub max_num_nucs: usize,
}

impl SimData {
    /// Generate the tables for `input`. Deterministic: the same input
    /// always produces the same tables.
    pub fn generate(input: &SimInput) -> Self {
        let mut seed = STARTING_SEED;

        // Sorted per-nuclide energy grids with random channel data.
        let mut nuclide_grid =
            Vec::with_capacity(input.n_isotopes * input.n_gridpoints);
        for _ in 0..input.n_isotopes {
            let start = nuclide_grid.len();
            for _ in 0..input.n_gridpoints {
                nuclide_grid.push(NuclideGridPoint {
                    energy: lcg_random_double(&mut seed),
                    total_xs: lcg_random_double(&mut seed),
                    elastic_xs: lcg_random_double(&mut seed),
                    absorbtion_xs: lcg_random_double(&mut seed),
                    fission_xs: lcg_random_double(&mut seed),
                    nu_fission_xs: lcg_random_double(&mut seed),
                });
            }
            nuclide_grid[start..].sort_by(|a, b| a.energy.total_cmp(&b.energy));
        }

        // Material compositions. Nuclide picks may repeat; only the
        // concentration weighting matters to the kernel.
        let num_nucs: Vec<i32> = NUM_NUCS_TABLE
            .iter()
            .map(|&n| n.min(input.n_isotopes) as i32)
            .collect();
        let max_num_nucs = num_nucs.iter().map(|&n| n as usize).max().unwrap_or(0);

        let mut mats = vec![0i32; lookup::N_MATERIALS * max_num_nucs];
        let mut concs = vec![0.0f64; lookup::N_MATERIALS * max_num_nucs];
        for (mat, &n) in num_nucs.iter().enumerate() {
            for j in 0..n as usize {
                mats[mat * max_num_nucs + j] =
                    (lcg_random_double(&mut seed) * input.n_isotopes as f64) as i32;
                concs[mat * max_num_nucs + j] = lcg_random_double(&mut seed);
            }
        }

        // Acceleration structures for the chosen strategy. Per-nuclide
        // energy vectors are materialized once so each index entry is a
        // single binary search.
        let energies: Vec<Vec<f64>> = (0..input.n_isotopes)
            .map(|nuc| {
                nuclide_grid[nuc * input.n_gridpoints..(nuc + 1) * input.n_gridpoints]
                    .iter()
                    .map(|p| p.energy)
                    .collect()
            })
            .collect();

        let (unionized_energy, index_grid) = match input.grid {
            GridKind::Nuclide => (Vec::new(), Vec::new()),
            GridKind::Unionized => {
                let mut union: Vec<f64> =
                    nuclide_grid.iter().map(|p| p.energy).collect();
                union.sort_by(f64::total_cmp);

                let mut index =
                    vec![0i32; union.len() * input.n_isotopes];
                for (e, &energy) in union.iter().enumerate() {
                    for (nuc, grid) in energies.iter().enumerate() {
                        index[e * input.n_isotopes + nuc] = grid_search(grid, energy) as i32;
                    }
                }
                (union, index)
            }
            GridKind::Hash => {
                let mut index = vec![0i32; input.hash_bins * input.n_isotopes];
                for bin in 0..input.hash_bins {
                    let energy = bin as f64 / input.hash_bins as f64;
                    for (nuc, grid) in energies.iter().enumerate() {
                        index[bin * input.n_isotopes + nuc] = grid_search(grid, energy) as i32;
                    }
                }
                (Vec::new(), index)
            }
        };

        debug!(
            isotopes = input.n_isotopes,
            gridpoints = input.n_gridpoints,
            grid = %input.grid,
            max_num_nucs,
            "generated simulation tables"
        );

        Self {
            num_nucs,
            concs,
            mats,
            unionized_energy,
            index_grid,
            nuclide_grid,
            max_num_nucs,
        }
    }

    /// The replicated field set: specs plus host byte buffers, in the
    /// fixed order the executor and kernel agree on.
    pub fn fields(&self) -> (Vec<FieldSpec>, Vec<Bytes>) {
        let point_bytes = std::mem::size_of::<NuclideGridPoint>();
        let specs = vec![
            FieldSpec {
                name: "num_nucs",
                elem_bytes: 4,
                len: self.num_nucs.len(),
            },
            FieldSpec {
                name: "concs",
                elem_bytes: 8,
                len: self.concs.len(),
            },
            FieldSpec {
                name: "mats",
                elem_bytes: 4,
                len: self.mats.len(),
            },
            FieldSpec {
                name: "unionized_energy",
                elem_bytes: 8,
                len: self.unionized_energy.len(),
            },
            FieldSpec {
                name: "index_grid",
                elem_bytes: 4,
                len: self.index_grid.len(),
            },
            FieldSpec {
                name: "nuclide_grid",
                elem_bytes: point_bytes,
                len: self.nuclide_grid.len(),
            },
        ];
        let buffers = vec![
            Bytes::copy_from_slice(bytemuck::cast_slice(&self.num_nucs)),
            Bytes::copy_from_slice(bytemuck::cast_slice(&self.concs)),
            Bytes::copy_from_slice(bytemuck::cast_slice(&self.mats)),
            Bytes::copy_from_slice(bytemuck::cast_slice(&self.unionized_energy)),
            Bytes::copy_from_slice(bytemuck::cast_slice(&self.index_grid)),
            Bytes::copy_from_slice(bytemuck::cast_slice(&self.nuclide_grid)),
        ];
        (specs, buffers)
    }
}
