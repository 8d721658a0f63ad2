// Exposure and lighting: the per-column outside map, the five one-hot light
// planes, and the sparse `light_fov` overlay written by dynamic sources.
//
// Baseline light lives in five mutually exclusive boolean planes: per voxel
// exactly one of levels 0..=4 is set, and `set_light_tile` is the only
// writer, so the one-hot shape cannot drift. On top of the baseline,
// `light_fov` holds per-voxel overlay values owned by dynamic sources
// (braziers, fire, smoke). Reading an effective level resolves in order:
// burning voxels are pinned at 4, then an overlay entry clamped to the
// column ceiling, then the baseline plane.
//
// The `outside` map records, per column, the z of the topmost filled voxel.
// A voxel at or above it is open to the sky and caps at level 4; anything
// under a roof caps at 3.
//
// `diffuse` is a single in-place pass, not an iteration to fixed point:
// later voxels in the scan read values written earlier in the same pass. The
// pass only touches indoor voxels.
//
// **Critical constraint: determinism.** The overlay is a `BTreeMap` and every
// full-grid walk runs in (z, x, y) scan order, so a reloaded state replays
// identically.
//
// See also: `effects.rs` for the overlay writers, `fire.rs` for the pre-fire
// snapshots consulted when a burning voxel's light is restored.

use crate::types::{VoxelCoord, map_as_pairs};
use crate::world::VoxelWorld;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of discrete light levels (0..=4).
pub const LIGHT_LEVELS: usize = 5;

/// Highest representable light level.
pub const MAX_LIGHT: i32 = (LIGHT_LEVELS - 1) as i32;

/// Ceiling for voxels under a roof.
pub const INDOOR_CEILING: i32 = 3;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightField {
    depth: u32,
    width: u32,
    height: u32,
    /// One boolean plane per light level, voxel-indexed. One-hot per voxel.
    planes: [Vec<bool>; LIGHT_LEVELS],
    /// Per column (`x * height + y`): z of the topmost filled voxel, 0 for an
    /// entirely empty column.
    outside: Vec<i32>,
    /// Sparse overlay written by dynamic light sources. Entries linger at
    /// whatever value the last source left; they are composed, not deleted.
    #[serde(with = "map_as_pairs")]
    pub light_fov: BTreeMap<VoxelCoord, i32>,
}

impl LightField {
    /// Create a field for a grid of the given dimensions, every voxel at
    /// level 0 and every column recorded as empty.
    pub fn new(depth: u32, width: u32, height: u32) -> Self {
        let total = (depth as usize) * (width as usize) * (height as usize);
        let columns = (width as usize) * (height as usize);
        Self {
            depth,
            width,
            height,
            planes: [
                vec![true; total],
                vec![false; total],
                vec![false; total],
                vec![false; total],
                vec![false; total],
            ],
            outside: vec![0; columns],
            light_fov: BTreeMap::new(),
        }
    }

    fn index(&self, coord: VoxelCoord) -> Option<usize> {
        if coord.z >= 0
            && coord.x >= 0
            && coord.y >= 0
            && (coord.z as u32) < self.depth
            && (coord.x as u32) < self.width
            && (coord.y as u32) < self.height
        {
            let h = self.height as usize;
            let w = self.width as usize;
            Some((coord.z as usize * w + coord.x as usize) * h + coord.y as usize)
        } else {
            None
        }
    }

    fn column(&self, x: i32, y: i32) -> Option<usize> {
        if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
            Some(x as usize * self.height as usize + y as usize)
        } else {
            None
        }
    }

    // -----------------------------------------------------------------------
    // One-hot plane primitives
    // -----------------------------------------------------------------------

    /// Baseline light level of a voxel. 0 out of bounds.
    pub fn get_light_tile(&self, coord: VoxelCoord) -> i32 {
        match self.index(coord) {
            Some(i) => (0..LIGHT_LEVELS)
                .find(|&level| self.planes[level][i])
                .unwrap_or(0) as i32,
            None => 0,
        }
    }

    /// Set the baseline level, clamped into [0, 4]. Clears the other four
    /// planes for the voxel. No-op out of bounds.
    pub fn set_light_tile(&mut self, coord: VoxelCoord, level: i32) {
        if let Some(i) = self.index(coord) {
            let level = level.clamp(0, MAX_LIGHT) as usize;
            for plane in &mut self.planes {
                plane[i] = false;
            }
            self.planes[level][i] = true;
        }
    }

    // -----------------------------------------------------------------------
    // Outside exposure
    // -----------------------------------------------------------------------

    /// The column's exposure height: z of its topmost filled voxel, 0 when
    /// the column is entirely empty (everything exposed). 0 out of bounds.
    pub fn outside(&self, x: i32, y: i32) -> i32 {
        self.column(x, y).map(|c| self.outside[c]).unwrap_or(0)
    }

    /// Whether a voxel is open to the exterior (at or above its column's
    /// exposure height).
    pub fn is_outdoor(&self, coord: VoxelCoord) -> bool {
        coord.z >= self.outside(coord.x, coord.y)
    }

    /// The maximum light level this voxel's column admits.
    pub fn ceiling(&self, coord: VoxelCoord) -> i32 {
        if self.is_outdoor(coord) {
            MAX_LIGHT
        } else {
            INDOOR_CEILING
        }
    }

    /// Clamp a light value into [0, ceiling] for the voxel's column.
    pub fn clamp_to_ceiling(&self, coord: VoxelCoord, level: i32) -> i32 {
        level.clamp(0, self.ceiling(coord))
    }

    /// Rescan every column top-down for its first filled voxel.
    pub fn compute_exposure(&mut self, world: &VoxelWorld) {
        for x in 0..self.width as i32 {
            for y in 0..self.height as i32 {
                if let Some(c) = self.column(x, y) {
                    self.outside[c] = world.column_top(x, y).unwrap_or(0);
                }
            }
        }
    }

    /// Record that a voxel was added at z in the column, raising the exposure
    /// height if it now tops the column. Lowering is handled by the rescans.
    pub fn raise_exposure(&mut self, x: i32, y: i32, z: i32) {
        if let Some(c) = self.column(x, y) {
            if self.outside[c] < z {
                self.outside[c] = z;
            }
        }
    }

    /// Rescan one column after a collapse and seed every newly exposed voxel
    /// to full daylight.
    pub fn reseed_exposed_column(&mut self, world: &VoxelWorld, x: i32, y: i32) {
        let Some(c) = self.column(x, y) else { return };
        let old = self.outside[c];
        let new = world.column_top(x, y).unwrap_or(0);
        self.outside[c] = new;
        for z in new..old {
            self.set_light_tile(VoxelCoord::new(z, x, y), MAX_LIGHT);
        }
    }

    // -----------------------------------------------------------------------
    // Seeding and diffusion
    // -----------------------------------------------------------------------

    /// Initial light assignment: daylight (4) for exposed voxels, a dim
    /// indoor baseline (1) under cover. Run once after the first exposure
    /// scan, never per turn.
    pub fn seed_light(&mut self) {
        for coord in self.coords() {
            let level = if self.is_outdoor(coord) { MAX_LIGHT } else { 1 };
            self.set_light_tile(coord, level);
        }
    }

    /// One in-place smoothing pass over every indoor voxel:
    /// `new = (sum over in-bounds in-plane 8-neighbors of (level + 1)) /
    /// count - 1`, integer division. Writes land immediately, so voxels later
    /// in the scan read already-diffused values from earlier ones.
    pub fn diffuse(&mut self) {
        for coord in self.coords() {
            if self.is_outdoor(coord) {
                continue;
            }
            let mut sum = 0;
            let mut count = 0;
            for n in coord.plane_neighbors8() {
                if self.index(n).is_some() {
                    sum += self.get_light_tile(n) + 1;
                    count += 1;
                }
            }
            if count > 0 {
                self.set_light_tile(coord, sum / count - 1);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Effective light
    // -----------------------------------------------------------------------

    /// The light level a viewer sees at a voxel: burning voxels are pinned at
    /// 4; otherwise an overlay entry wins, clamped to the column ceiling;
    /// otherwise the baseline plane.
    pub fn light_level(&self, world: &VoxelWorld, coord: VoxelCoord) -> i32 {
        if world.is_on_fire(coord) {
            return MAX_LIGHT;
        }
        match self.light_fov.get(&coord) {
            Some(&value) => self.clamp_to_ceiling(coord, value),
            None => self.get_light_tile(coord),
        }
    }

    fn coords(&self) -> impl Iterator<Item = VoxelCoord> + use<> {
        let (d, w, h) = (self.depth as i32, self.width as i32, self.height as i32);
        (0..d).flat_map(move |z| {
            (0..w).flat_map(move |x| (0..h).map(move |y| VoxelCoord::new(z, x, y)))
        })
    }
}
