// Environment effects: reversible visibility modifiers bound to one voxel.
//
// An effect belongs to exactly one parent (a particle or a fixture) and acts
// on exactly one voxel, the parent's position, for its whole activation
// lifetime; moving a source means deactivate-then-reactivate. Two effects
// touching the same voxel must activate and deactivate in strict LIFO order
// or the cached baselines go stale — the single-effect-per-voxel contract.
// The contract is held by construction: one effect per particle, one
// reconciliation pass per turn, LIFO fixture removal.
//
// The two variants differ in cadence. `LowerVisibility` (smoke) re-activates
// every turn at the parent's current density and is idempotent across
// repeated activations; it caches the pre-effect baseline once and keeps
// writing fresh lowered values over it. `IncreaseVisibility` (a lamp)
// activates exactly once, when the source is placed — a second activation
// double-counts — and records every voxel it touched for exact reversal.
//
// Overlay composition: both variants read and write `light_fov`. Smoke over
// a lamp-lit voxel re-reads its base from the overlay each turn, so the lamp
// going out or the smoke thinning always resolves to a consistent level.
//
// See also: `light.rs` for the overlay and clamping rules, `particles.rs`
// for the reconciliation pass, `fixture.rs` for brazier placement.

use crate::config::VisionParams;
use crate::fire::FireField;
use crate::fov;
use crate::light::LightField;
use crate::types::VoxelCoord;
use crate::world::VoxelWorld;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Borrowed simulation state an effect reads and writes.
pub struct EffectCtx<'a> {
    pub world: &'a mut VoxelWorld,
    pub light: &'a mut LightField,
    pub fire: &'a FireField,
    /// Cached base values of live smoke effects keyed by voxel (latest
    /// particle wins; 0 stands for "no usable base"). Only consulted when a
    /// light boost seeds fresh overlay entries.
    pub smoke_base: &'a BTreeMap<VoxelCoord, i32>,
}

/// Tagged union over the effect variants, with a uniform
/// activate/deactivate contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum EnvEffect {
    LowerVisibility(LowerVisibility),
    IncreaseVisibility(IncreaseVisibility),
}

impl EnvEffect {
    pub fn activate(
        &mut self,
        at: VoxelCoord,
        density: i32,
        vision: &VisionParams,
        ctx: &mut EffectCtx<'_>,
    ) {
        match self {
            Self::LowerVisibility(effect) => effect.activate(at, density, ctx),
            Self::IncreaseVisibility(effect) => effect.activate(at, vision, ctx),
        }
    }

    pub fn deactivate(&mut self, at: VoxelCoord, ctx: &mut EffectCtx<'_>) {
        match self {
            Self::LowerVisibility(effect) => effect.deactivate(at, ctx),
            Self::IncreaseVisibility(effect) => effect.deactivate(ctx),
        }
    }
}

// ---------------------------------------------------------------------------
// LowerVisibility — smoke dims and eventually blinds its voxel
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LowerVisibility {
    /// Density required per point of light reduction.
    pub per_density_amt: i32,
    base_value: Option<i32>,
    base_transparency: Option<bool>,
}

impl LowerVisibility {
    pub fn new(per_density_amt: i32) -> Self {
        Self {
            per_density_amt,
            base_value: None,
            base_transparency: None,
        }
    }

    /// The cached pre-effect baseline, once activated.
    pub fn base_value(&self) -> Option<i32> {
        self.base_value
    }

    fn activate(&mut self, at: VoxelCoord, density: i32, ctx: &mut EffectCtx<'_>) {
        // The base refreshes from the overlay whenever one exists (another
        // source may have moved it since last turn); otherwise it is cached
        // exactly once.
        let base = if let Some(&overlay) = ctx.light.light_fov.get(&at) {
            self.base_value = Some(overlay);
            overlay
        } else if let Some(cached) = self.base_value {
            cached
        } else {
            let fresh = reference_level(at, ctx);
            self.base_value = Some(fresh);
            fresh
        };
        if self.base_transparency.is_none() {
            self.base_transparency = Some(ctx.world.is_transparent(at));
        }
        let lowered = base.min(ctx.light.ceiling(at)) - density / self.per_density_amt;
        if lowered < 0 {
            // Thick enough to block sight entirely.
            ctx.world.set_transparent(at, false);
            ctx.light.set_light_tile(at, 0);
        } else {
            if let Some(transparency) = self.base_transparency {
                ctx.world.set_transparent(at, transparency);
            }
            ctx.light.set_light_tile(at, lowered);
        }
    }

    fn deactivate(&mut self, at: VoxelCoord, ctx: &mut EffectCtx<'_>) {
        let value = match ctx.light.light_fov.get(&at) {
            Some(&overlay) => overlay,
            None => match self.base_value {
                Some(cached) => cached,
                // Never activated; nothing to restore.
                None => return,
            },
        };
        ctx.light.set_light_tile(at, value.min(ctx.light.ceiling(at)));
        if let Some(transparency) = self.base_transparency {
            ctx.world.set_transparent(at, transparency);
        }
    }
}

/// The level a fresh effect measures at a voxel: the pre-fire snapshot while
/// it burns, the baseline plane otherwise.
fn reference_level(at: VoxelCoord, ctx: &EffectCtx<'_>) -> i32 {
    if ctx.world.is_on_fire(at) {
        match ctx.fire.snapshot(at) {
            Some(snapshot) => snapshot,
            None => ctx.light.get_light_tile(at),
        }
    } else {
        ctx.light.get_light_tile(at)
    }
}

// ---------------------------------------------------------------------------
// IncreaseVisibility — a placed light source boosts two concentric rings
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IncreaseVisibility {
    /// Voxels boosted +2, in the order they were touched.
    tight: Vec<VoxelCoord>,
    /// Voxels boosted +1.
    wide: Vec<VoxelCoord>,
}

impl IncreaseVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the boost. Called exactly once, when the source is placed.
    fn activate(&mut self, at: VoxelCoord, vision: &VisionParams, ctx: &mut EffectCtx<'_>) {
        let origin = (at.x, at.y);
        let tight_ring =
            fov::visible_plane(ctx.world, at.z, origin, vision.boost_tight_radius);
        let wide_ring = fov::visible_plane(ctx.world, at.z, origin, vision.boost_wide_radius);
        let height = ctx.world.height as i32;
        for x in 0..ctx.world.width as i32 {
            for y in 0..height {
                let i = (x * height + y) as usize;
                // The rings overlap; the tight boost takes the voxel.
                let delta = if tight_ring[i] {
                    2
                } else if wide_ring[i] {
                    1
                } else {
                    continue;
                };
                let v = VoxelCoord::new(at.z, x, y);
                let boosted = match ctx.light.light_fov.get(&v) {
                    Some(&existing) => existing + delta,
                    None => {
                        let reference = match ctx.smoke_base.get(&v) {
                            Some(&base) if base != 0 => base,
                            _ => reference_level(v, ctx),
                        };
                        reference + delta
                    }
                };
                ctx.light.light_fov.insert(v, boosted);
                if delta == 2 {
                    self.tight.push(v);
                } else {
                    self.wide.push(v);
                }
                let level = boosted.min(ctx.light.ceiling(v));
                ctx.light.set_light_tile(v, level);
            }
        }
    }

    /// Withdraw the boost from every recorded voxel. Overlay entries are
    /// decremented, never deleted; burning voxels keep their plane value
    /// until extinguished.
    fn deactivate(&mut self, ctx: &mut EffectCtx<'_>) {
        for (ring, delta) in [(&self.tight, 2), (&self.wide, 1)] {
            for &v in ring {
                if let Some(entry) = ctx.light.light_fov.get_mut(&v) {
                    *entry -= delta;
                }
                if !ctx.world.is_on_fire(v) {
                    let remaining = ctx.light.light_fov.get(&v).copied().unwrap_or(0);
                    let level = ctx
                        .light
                        .get_light_tile(v)
                        .min(remaining.min(ctx.light.ceiling(v)));
                    ctx.light.set_light_tile(v, level);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FireParams;
    use crate::tile::{Material, TileType};

    /// A 9x9 grid, roofed at z = 2 so z in {0, 1} is indoor, with a seeded
    /// light field.
    fn roofed_rig() -> (VoxelWorld, LightField, FireField) {
        let mut world = VoxelWorld::new(3, 9, 9);
        for x in 0..9 {
            for y in 0..9 {
                world.place_tile(VoxelCoord::new(2, x, y), TileType::Floor, Material::Stone);
            }
        }
        let mut light = LightField::new(3, 9, 9);
        light.compute_exposure(&world);
        light.seed_light();
        (world, light, FireField::new())
    }

    fn vision() -> VisionParams {
        VisionParams {
            fov_radius: 8,
            boost_tight_radius: 2,
            boost_wide_radius: 4,
        }
    }

    #[test]
    fn lower_visibility_roundtrip_restores_exact_state() {
        let (mut world, mut light, fire) = roofed_rig();
        let empty = BTreeMap::new();
        let at = VoxelCoord::new(1, 4, 4);
        light.set_light_tile(at, 2);
        assert!(world.is_transparent(at));

        let mut effect = LowerVisibility::new(100);
        let mut ctx = EffectCtx {
            world: &mut world,
            light: &mut light,
            fire: &fire,
            smoke_base: &empty,
        };
        effect.activate(at, 150, &mut ctx);
        assert_eq!(ctx.light.get_light_tile(at), 1);
        assert!(ctx.world.is_transparent(at));

        effect.deactivate(at, &mut ctx);
        assert_eq!(light.get_light_tile(at), 2);
        assert!(world.is_transparent(at));
    }

    #[test]
    fn thick_smoke_blinds_the_voxel() {
        let (mut world, mut light, fire) = roofed_rig();
        let empty = BTreeMap::new();
        let at = VoxelCoord::new(1, 4, 4);
        light.set_light_tile(at, 2);

        let mut effect = LowerVisibility::new(100);
        let mut ctx = EffectCtx {
            world: &mut world,
            light: &mut light,
            fire: &fire,
            smoke_base: &empty,
        };
        effect.activate(at, 400, &mut ctx);
        assert_eq!(ctx.light.get_light_tile(at), 0);
        assert!(!ctx.world.is_transparent(at));

        // Thinning back out restores sight through the cloud.
        effect.activate(at, 150, &mut ctx);
        assert_eq!(ctx.light.get_light_tile(at), 1);
        assert!(ctx.world.is_transparent(at));

        effect.deactivate(at, &mut ctx);
        assert_eq!(light.get_light_tile(at), 2);
        assert!(world.is_transparent(at));
    }

    #[test]
    fn repeated_activation_keeps_the_cached_base() {
        let (mut world, mut light, fire) = roofed_rig();
        let empty = BTreeMap::new();
        let at = VoxelCoord::new(1, 3, 3);
        light.set_light_tile(at, 3);

        let mut effect = LowerVisibility::new(100);
        let mut ctx = EffectCtx {
            world: &mut world,
            light: &mut light,
            fire: &fire,
            smoke_base: &empty,
        };
        effect.activate(at, 100, &mut ctx);
        assert_eq!(ctx.light.get_light_tile(at), 2);
        // The second activation must not cache the already-lowered level.
        effect.activate(at, 100, &mut ctx);
        assert_eq!(ctx.light.get_light_tile(at), 2);
        assert_eq!(effect.base_value(), Some(3));
    }

    #[test]
    fn activation_rereads_base_from_the_overlay() {
        let (mut world, mut light, fire) = roofed_rig();
        let empty = BTreeMap::new();
        let at = VoxelCoord::new(1, 3, 3);
        light.light_fov.insert(at, 3);

        let mut effect = LowerVisibility::new(100);
        let mut ctx = EffectCtx {
            world: &mut world,
            light: &mut light,
            fire: &fire,
            smoke_base: &empty,
        };
        effect.activate(at, 100, &mut ctx);
        assert_eq!(effect.base_value(), Some(3));
        assert_eq!(ctx.light.get_light_tile(at), 2);

        // Deactivation restores the overlay value, not the plane the smoke
        // overwrote.
        effect.deactivate(at, &mut ctx);
        assert_eq!(light.get_light_tile(at), 3);
    }

    #[test]
    fn smoke_on_a_burning_voxel_measures_the_snapshot() {
        let (mut world, mut light, mut fire) = roofed_rig();
        let empty = BTreeMap::new();
        // A wood wall on the bedrock level, under the roof.
        let at = VoxelCoord::new(0, 4, 4);
        world.place_tile(at, TileType::Wall, Material::Wood);
        let (graph, _) = crate::support::initialize(&mut world);
        fire.ignite(at);
        let params = FireParams {
            ignition_turns: 1,
            burn_damage_per_turn: 2,
            wood_default_hp: 60,
        };
        let mut events = Vec::new();
        crate::fire::fire_tick(&mut world, &light, &graph, &mut fire, &params, 1, &mut events)
            .unwrap();
        assert!(world.is_on_fire(at));
        assert_eq!(fire.snapshot(at), Some(1));
        // The plane drifts while it burns; smoke must measure the snapshot.
        light.set_light_tile(at, 0);

        let mut effect = LowerVisibility::new(100);
        let mut ctx = EffectCtx {
            world: &mut world,
            light: &mut light,
            fire: &fire,
            smoke_base: &empty,
        };
        effect.activate(at, 100, &mut ctx);
        assert_eq!(effect.base_value(), Some(1));
        assert_eq!(ctx.light.get_light_tile(at), 0);
    }

    #[test]
    fn light_boost_shapes_two_rings_and_stops_at_walls() {
        let (mut world, mut light, fire) = roofed_rig();
        let empty = BTreeMap::new();
        // A full wall row two columns east of the source.
        for y in 0..9 {
            world.place_tile(VoxelCoord::new(1, 6, y), TileType::Wall, Material::Stone);
        }
        let at = VoxelCoord::new(1, 4, 4);

        let mut boost = IncreaseVisibility::new();
        let mut ctx = EffectCtx {
            world: &mut world,
            light: &mut light,
            fire: &fire,
            smoke_base: &empty,
        };
        boost.activate(at, &vision(), &mut ctx);

        // Tight ring: +2 over the indoor baseline of 1, ceiling-clamped to 3.
        assert_eq!(light.light_fov.get(&at), Some(&3));
        assert_eq!(light.get_light_tile(at), 3);
        assert_eq!(light.light_fov.get(&VoxelCoord::new(1, 4, 6)), Some(&3));
        // Wide ring: +1.
        assert_eq!(light.light_fov.get(&VoxelCoord::new(1, 4, 7)), Some(&2));
        assert_eq!(light.get_light_tile(VoxelCoord::new(1, 4, 7)), 2);
        assert_eq!(light.light_fov.get(&VoxelCoord::new(1, 0, 4)), Some(&2));
        // The wall face is lit; the far side is not.
        assert_eq!(light.light_fov.get(&VoxelCoord::new(1, 6, 4)), Some(&3));
        assert_eq!(light.light_fov.get(&VoxelCoord::new(1, 8, 4)), None);
        assert_eq!(light.get_light_tile(VoxelCoord::new(1, 8, 4)), 1);
    }

    #[test]
    fn light_boost_deactivation_reverses_both_rings() {
        let (mut world, mut light, fire) = roofed_rig();
        let empty = BTreeMap::new();
        let at = VoxelCoord::new(1, 4, 4);
        let mut boost = IncreaseVisibility::new();
        let mut ctx = EffectCtx {
            world: &mut world,
            light: &mut light,
            fire: &fire,
            smoke_base: &empty,
        };
        boost.activate(at, &vision(), &mut ctx);
        boost.deactivate(&mut ctx);

        // Overlay entries linger at the pre-boost reference; planes are back
        // at the indoor baseline.
        assert_eq!(light.light_fov.get(&at), Some(&1));
        assert_eq!(light.get_light_tile(at), 1);
        let wide = VoxelCoord::new(1, 4, 7);
        assert_eq!(light.light_fov.get(&wide), Some(&1));
        assert_eq!(light.get_light_tile(wide), 1);
    }

    #[test]
    fn light_boost_seeds_from_an_active_smoke_base() {
        let (mut world, mut light, fire) = roofed_rig();
        let at = VoxelCoord::new(1, 4, 4);
        let smoky = VoxelCoord::new(1, 4, 5);
        // A smoke cloud at `smoky` cached base 2 before dimming the plane.
        light.set_light_tile(smoky, 0);
        let mut smoke_base = BTreeMap::new();
        smoke_base.insert(smoky, 2);

        let mut boost = IncreaseVisibility::new();
        let mut ctx = EffectCtx {
            world: &mut world,
            light: &mut light,
            fire: &fire,
            smoke_base: &smoke_base,
        };
        boost.activate(at, &vision(), &mut ctx);
        // Seeded from the smoke's cached base, not the dimmed plane.
        assert_eq!(light.light_fov.get(&smoky), Some(&4));
        assert_eq!(light.get_light_tile(smoky), 3);
    }

    #[test]
    fn effect_enum_delegates_both_variants() {
        let (mut world, mut light, fire) = roofed_rig();
        let empty = BTreeMap::new();
        let at = VoxelCoord::new(1, 2, 2);
        light.set_light_tile(at, 3);

        let mut effect = EnvEffect::LowerVisibility(LowerVisibility::new(100));
        let mut ctx = EffectCtx {
            world: &mut world,
            light: &mut light,
            fire: &fire,
            smoke_base: &empty,
        };
        effect.activate(at, 200, &vision(), &mut ctx);
        assert_eq!(ctx.light.get_light_tile(at), 1);
        effect.deactivate(at, &mut ctx);
        assert_eq!(light.get_light_tile(at), 3);
    }
}
