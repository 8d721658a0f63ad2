// Data-driven game configuration.
//
// All tunable simulation parameters live here in `GameConfig`, loaded from
// JSON at startup. The sim never uses magic numbers — it reads from the
// config. This enables balance iteration without recompilation.
//
// Parameters are grouped by engine: `CollapseParams` (damage dealt when
// structure gives way), `FireParams` (ignition and burn pacing),
// `VisionParams` (field-of-view and light-boost radii), and `SmokeParams`
// (the default emitted particle). Tile/material intrinsics (walkable flags,
// base hit points) are catalog values in `tile.rs`, not config.
//
// **Critical constraint: determinism.** Config values feed directly into
// simulation logic; two runs over the same layout with identical configs must
// produce identical results.

use crate::particles::{ParticleKind, ParticleTemplate};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Engine parameter groups
// ---------------------------------------------------------------------------

/// Damage dealt by a collapse batch (see the damage pass in `sim.rs`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollapseParams {
    /// Debris damage per collapsed tile stacked above the landing voxel,
    /// applied to any actor standing there, reduced by the actor's defense.
    pub debris_damage_per_tile: i32,
    /// Fall damage per z-level fallen. Not reduced by defense.
    pub fall_damage_per_level: i32,
}

/// Ignition and burn pacing (see `fire.rs`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FireParams {
    /// Turns an ignition must smolder before the voxel is actually burning.
    pub ignition_turns: u32,
    /// Structural hit points lost per turn while burning.
    pub burn_damage_per_turn: i32,
    /// Reference hit points of a default wooden tile. A burning voxel starts
    /// igniting its neighbors once its hp drops below half of this.
    pub wood_default_hp: i32,
}

/// Field-of-view and light-boost radii (see `fov.rs` and `effects.rs`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VisionParams {
    /// Sight radius for living actors.
    pub fov_radius: i32,
    /// Inner ring of a light-boosting fixture: voxels within this radius get
    /// a +2 light overlay.
    pub boost_tight_radius: i32,
    /// Outer ring: voxels within this radius but outside the tight ring get
    /// a +1 light overlay.
    pub boost_wide_radius: i32,
}

/// The default smoke particle emitted by vents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SmokeParams {
    /// Initial density of an emitted cloud.
    pub density: i32,
    /// Flat density lost per turn.
    pub density_decay: i32,
    /// Turns between spread events (1 = spreads every turn).
    pub spread_rate: u32,
    /// Fraction of density handed to neighbors on a spread event.
    pub spread_decay: f32,
    /// Density required per point of light reduction in the attached
    /// visibility effect.
    pub per_density_amt: i32,
    /// Turns between emissions from a vent fixture.
    pub vent_interval: u32,
}

impl SmokeParams {
    /// The particle template a vent instantiates.
    pub fn template(&self) -> ParticleTemplate {
        ParticleTemplate {
            kind: ParticleKind::Smoke,
            density: self.density,
            density_decay: self.density_decay,
            spread_rate: self.spread_rate,
            spread_decay: self.spread_decay,
            per_density_amt: self.per_density_amt,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level game config
// ---------------------------------------------------------------------------

/// Top-level game configuration. Loaded from JSON, never mutated at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    /// World dimensions in voxels as (depth, width, height) — depth is the
    /// number of stacked z-levels.
    pub world_size: (u32, u32, u32),

    /// Collapse damage parameters.
    pub collapse: CollapseParams,

    /// Fire ignition/burn parameters.
    pub fire: FireParams,

    /// Field-of-view and light-boost radii.
    pub vision: VisionParams,

    /// Default emitted smoke particle.
    pub smoke: SmokeParams,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            world_size: (10, 80, 43),
            collapse: CollapseParams {
                debris_damage_per_tile: 4,
                fall_damage_per_level: 5,
            },
            fire: FireParams {
                ignition_turns: 3,
                burn_damage_per_turn: 2,
                wood_default_hp: 60,
            },
            vision: VisionParams {
                fov_radius: 8,
                boost_tight_radius: 2,
                boost_wide_radius: 4,
            },
            smoke: SmokeParams {
                density: 300,
                density_decay: 25,
                spread_rate: 1,
                spread_decay: 0.1,
                per_density_amt: 100,
                vent_interval: 4,
            },
        }
    }
}
