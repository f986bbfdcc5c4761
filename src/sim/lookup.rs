//! The numeric lookup kernel: LCG sampling, energy-grid search and
//! five-channel cross-section interpolation.
//!
//! The arithmetic follows the classic XSBench formulation, including the
//! 2^63-modulus LCG so lookup streams are reproducible and seekable.

use crate::error::{DevcastError, Result};

use super::data::NuclideGridPoint;
use super::input::GridKind;

/// Seed every lookup stream is fast-forwarded from.
pub const STARTING_SEED: u64 = 1070;

const LCG_M: u64 = 9223372036854775808; // 2^63
const LCG_A: u64 = 2806196910506780709;
const LCG_C: u64 = 1;

/// Advance the LCG one step and map the state into [0, 1).
pub fn lcg_random_double(seed: &mut u64) -> f64 {
    *seed = LCG_A.wrapping_mul(*seed).wrapping_add(LCG_C) % LCG_M;
    *seed as f64 / LCG_M as f64
}

/// Jump the LCG forward `n` steps in O(log n) without generating the
/// intermediate values.
pub fn fast_forward_lcg(seed: u64, n: u64) -> u64 {
    let mut n = n % LCG_M;
    let mut a = LCG_A;
    let mut c = LCG_C;
    let mut a_new: u64 = 1;
    let mut c_new: u64 = 0;

    while n > 0 {
        if n & 1 == 1 {
            a_new = a_new.wrapping_mul(a);
            c_new = c_new.wrapping_mul(a).wrapping_add(c);
        }
        c = c.wrapping_mul(a.wrapping_add(1));
        a = a.wrapping_mul(a);
        n >>= 1;
    }

    a_new.wrapping_mul(seed).wrapping_add(c_new) % LCG_M
}

/// Volume fractions of the twelve reactor materials; biases which
/// material a lookup lands in.
const MAT_DIST: [f64; 12] = [
    0.140, // fuel
    0.052, // cladding
    0.275, // cold, borated water
    0.134, // hot, borated water
    0.154, // RPV
    0.064, // lower, radial reflector
    0.066, // upper reflector / top plate
    0.055, // bottom plate
    0.008, // bottom nozzle
    0.015, // top nozzle
    0.025, // top of fuel assemblies
    0.013, // bottom of fuel assemblies
];

/// Number of materials in the reactor model.
pub(crate) const N_MATERIALS: usize = MAT_DIST.len();

/// Sample a material index from the volume-fraction distribution.
pub fn pick_mat(seed: &mut u64) -> usize {
    let roll = lcg_random_double(seed);
    for i in 0..N_MATERIALS {
        let mut running = 0.0;
        for j in (1..=i).rev() {
            running += MAT_DIST[j];
        }
        if roll < running {
            return i;
        }
    }
    0
}

/// Binary search a sorted energy grid: the largest index `i` with
/// `grid[i] <= quarry`, clamped to `[0, n-2]` so `i + 1` always brackets.
pub fn grid_search(grid: &[f64], quarry: f64) -> usize {
    let mut lower = 0usize;
    let mut upper = grid.len() - 1;
    while upper - lower > 1 {
        let mid = lower + (upper - lower) / 2;
        if grid[mid] > quarry {
            upper = mid;
        } else {
            lower = mid;
        }
    }
    lower
}

/// Same search over one nuclide's grid points within `[low, high]`.
fn grid_search_points(points: &[NuclideGridPoint], quarry: f64, low: usize, high: usize) -> usize {
    let mut lower = low;
    let mut upper = high;
    while upper - lower > 1 {
        let mid = lower + (upper - lower) / 2;
        if points[mid].energy > quarry {
            upper = mid;
        } else {
            lower = mid;
        }
    }
    lower
}

/// Borrowed view over one device's replicated simulation tables.
pub(crate) struct XsTables<'a> {
    pub num_nucs: &'a [i32],
    pub concs: &'a [f64],
    pub mats: &'a [i32],
    pub egrid: &'a [f64],
    pub index_grid: &'a [i32],
    pub nuclide_grid: &'a [NuclideGridPoint],
    pub max_num_nucs: usize,
    pub n_isotopes: usize,
    pub n_gridpoints: usize,
    pub grid: GridKind,
    pub hash_bins: usize,
}

fn get<T: Copy>(table: &[T], index: usize) -> Result<T> {
    table.get(index).copied().ok_or(DevcastError::InvalidLookupIndex {
        index,
        len: table.len(),
    })
}

/// Microscopic cross section of one nuclide at `p_energy`: locate the
/// bracketing grid points per the active lookup strategy, then linearly
/// interpolate the five reaction channels.
fn micro_xs(tables: &XsTables<'_>, p_energy: f64, nuc: usize, idx: usize) -> Result<[f64; 5]> {
    let ngp = tables.n_gridpoints;
    let base = nuc * ngp;
    let sub = tables
        .nuclide_grid
        .get(base..base + ngp)
        .ok_or(DevcastError::InvalidLookupIndex {
            index: base + ngp - 1,
            len: tables.nuclide_grid.len(),
        })?;

    let lower = match tables.grid {
        GridKind::Nuclide => grid_search_points(sub, p_energy, 0, ngp - 1),
        GridKind::Unionized => {
            // The unionized index grid already knows each nuclide's slot.
            get(tables.index_grid, idx * tables.n_isotopes + nuc)? as usize
        }
        GridKind::Hash => {
            let u_low = get(tables.index_grid, idx * tables.n_isotopes + nuc)? as usize;
            let u_high = if idx == tables.hash_bins - 1 {
                ngp - 1
            } else {
                get(tables.index_grid, (idx + 1) * tables.n_isotopes + nuc)? as usize + 1
            };

            let e_low = get(sub, u_low)?.energy;
            let e_high = get(sub, u_high)?.energy;
            if p_energy <= e_low {
                0
            } else if p_energy >= e_high {
                ngp - 1
            } else {
                grid_search_points(sub, p_energy, u_low, u_high)
            }
        }
    };

    // Never read past the end of the nuclide's grid.
    let lower = if lower == ngp - 1 { lower - 1 } else { lower };
    let low = get(sub, lower)?;
    let high = get(sub, lower + 1)?;

    let f = (high.energy - p_energy) / (high.energy - low.energy);
    Ok([
        high.total_xs - f * (high.total_xs - low.total_xs),
        high.elastic_xs - f * (high.elastic_xs - low.elastic_xs),
        high.absorbtion_xs - f * (high.absorbtion_xs - low.absorbtion_xs),
        high.fission_xs - f * (high.fission_xs - low.fission_xs),
        high.nu_fission_xs - f * (high.nu_fission_xs - low.nu_fission_xs),
    ])
}

/// Macroscopic cross section of `mat` at `p_energy`: concentration-
/// weighted sum of the microscopic XS of every nuclide in the material.
pub(crate) fn macro_xs(tables: &XsTables<'_>, p_energy: f64, mat: usize) -> Result<[f64; 5]> {
    let idx = match tables.grid {
        GridKind::Unionized => grid_search(tables.egrid, p_energy),
        GridKind::Hash => (p_energy * tables.hash_bins as f64) as usize,
        GridKind::Nuclide => 0,
    };

    let mut macro_vec = [0.0f64; 5];
    let nucs_in_mat = get(tables.num_nucs, mat)? as usize;
    for j in 0..nucs_in_mat {
        let slot = mat * tables.max_num_nucs + j;
        let nuc = get(tables.mats, slot)? as usize;
        let conc = get(tables.concs, slot)?;
        let xs = micro_xs(tables, p_energy, nuc, idx)?;
        for k in 0..5 {
            macro_vec[k] += xs[k] * conc;
        }
    }
    Ok(macro_vec)
}
