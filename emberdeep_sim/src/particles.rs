// Density-bearing gas particles and their per-turn spread.
//
// A particle is a transient entity pinned to one voxel with a density that
// decays every turn and an attached environment effect dimming (or, in
// principle, brightening) that voxel. Spread is a flood: once every
// `spread_rate` turns a particle hands a `spread_decay` fraction of its
// density to the open voxels around it, merging into clouds already there or
// budding off clones. A cloud dies the turn its density reaches zero, and
// its effect is withdrawn at that moment.
//
// Spread prefers one vertical direction per tick: gas sinks through open
// floor gaps and down-stairs first, and only rises through up-stairs or open
// ceilings when it cannot sink. The two checks are mutually exclusive within
// a tick; a cloud never splits both up and down at once.
//
// **Critical constraint: determinism.** Particles tick in creation-id order,
// spread targets are enumerated in a fixed neighbor order, and the per-voxel
// occupancy index is only ever probed by key. Two runs over the same state
// spread identically.
//
// See also: `effects.rs` for what activation does, `fixture.rs` for the
// vents that emit these, `sim.rs` for where the tick sits in the turn.

use crate::config::VisionParams;
use crate::effects::{EffectCtx, EnvEffect, LowerVisibility};
use crate::event::{SimEvent, SimEventKind};
use crate::fire::FireField;
use crate::light::LightField;
use crate::tile::TileType;
use crate::types::{ParticleId, VoxelCoord};
use crate::world::VoxelWorld;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// What a particle is made of. Kinds never merge with each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParticleKind {
    Smoke,
    Miasma,
}

/// Blueprint for emitted particles, carried by vents and spells.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticleTemplate {
    pub kind: ParticleKind,
    pub density: i32,
    pub density_decay: i32,
    pub spread_rate: u32,
    pub spread_decay: f32,
    pub per_density_amt: i32,
}

impl ParticleTemplate {
    pub fn instantiate(&self, at: VoxelCoord) -> Particle {
        Particle {
            kind: self.kind,
            position: at,
            density: self.density,
            density_decay: self.density_decay,
            spread_rate: self.spread_rate,
            spread_counter: 0,
            spread_decay: self.spread_decay,
            effect: EnvEffect::LowerVisibility(LowerVisibility::new(self.per_density_amt)),
        }
    }
}

/// A live cloud. Alive while `density > 0`; owned by the sim's particle
/// arena and addressed by [`ParticleId`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Particle {
    pub kind: ParticleKind,
    pub position: VoxelCoord,
    pub density: i32,
    pub density_decay: i32,
    pub spread_rate: u32,
    pub spread_counter: u32,
    pub spread_decay: f32,
    pub effect: EnvEffect,
}

/// Cached smoke-effect base values by voxel, for seeding fresh light-boost
/// overlay entries. The latest-created particle wins a shared voxel; a
/// particle whose effect has not activated yet contributes 0, which readers
/// treat as "no usable base".
pub fn smoke_base_map(particles: &BTreeMap<ParticleId, Particle>) -> BTreeMap<VoxelCoord, i32> {
    let mut bases = BTreeMap::new();
    for particle in particles.values() {
        if let EnvEffect::LowerVisibility(effect) = &particle.effect {
            bases.insert(particle.position, effect.base_value().unwrap_or(0));
        }
    }
    bases
}

/// One spread pass over every live particle, in creation order.
pub fn spread_tick(
    world: &mut VoxelWorld,
    light: &mut LightField,
    fire: &FireField,
    particles: &mut BTreeMap<ParticleId, Particle>,
    next_id: &mut u64,
    turn: u64,
    events: &mut Vec<SimEvent>,
) {
    let ids: Vec<ParticleId> = particles.keys().copied().collect();
    // Per-voxel occupancy, rebuilt each tick. Entries can go stale when a
    // particle dies mid-tick; lookups tolerate that.
    let mut index: FxHashMap<(VoxelCoord, ParticleKind), ParticleId> = FxHashMap::default();
    for (&id, particle) in particles.iter() {
        index.insert((particle.position, particle.kind), id);
    }
    let no_smoke = BTreeMap::new();

    for id in ids {
        let Some(particle) = particles.get_mut(&id) else {
            continue;
        };
        particle.density -= particle.density_decay;
        if particle.density <= 0 {
            let Some(mut dead) = particles.remove(&id) else {
                continue;
            };
            let mut ctx = EffectCtx {
                world: &mut *world,
                light: &mut *light,
                fire,
                smoke_base: &no_smoke,
            };
            dead.effect.deactivate(dead.position, &mut ctx);
            if index.get(&(dead.position, dead.kind)) == Some(&id) {
                index.remove(&(dead.position, dead.kind));
            }
            events.push(SimEvent::new(
                turn,
                SimEventKind::ParticleDissipated {
                    particle: id,
                    at: dead.position,
                },
            ));
            continue;
        }

        particle.spread_counter += 1;
        if particle.spread_counter < particle.spread_rate {
            continue;
        }
        particle.spread_counter = 0;

        let position = particle.position;
        let kind = particle.kind;
        let mut targets: SmallVec<[VoxelCoord; 5]> = SmallVec::new();
        for neighbor in position.plane_neighbors4() {
            if world.is_open(neighbor) {
                targets.push(neighbor);
            }
        }
        let here = world.tile(position);
        if matches!(here, TileType::Empty | TileType::DownStairs) && world.is_open(position.below())
        {
            targets.push(position.below());
        } else if matches!(here, TileType::Empty | TileType::UpStairs)
            && world.is_open(position.above())
        {
            targets.push(position.above());
        }
        if targets.is_empty() {
            continue;
        }

        let total = (particle.density as f32 * particle.spread_decay) as i32;
        let share = total / targets.len() as i32;
        if share <= 0 {
            continue;
        }
        particle.density -= share * targets.len() as i32;
        // Merge cap: a child cloud never grows past the spreader's own
        // post-deduction density.
        let budget = particle.density;

        for target in targets {
            let merged = match index.get(&(target, kind)).copied() {
                Some(occupant_id) => match particles.get_mut(&occupant_id) {
                    Some(occupant) => {
                        if occupant.density + share <= budget {
                            occupant.density += share;
                        }
                        // Else the share dissipates into the room.
                        true
                    }
                    // Stale entry: the occupant died earlier this tick.
                    None => false,
                },
                None => false,
            };
            if merged {
                continue;
            }
            let Some(parent) = particles.get(&id) else {
                continue;
            };
            let effect = match &parent.effect {
                EnvEffect::LowerVisibility(e) => {
                    EnvEffect::LowerVisibility(LowerVisibility::new(e.per_density_amt))
                }
                // Placed light boosts never ride a spreading cloud.
                EnvEffect::IncreaseVisibility(_) => continue,
            };
            let child = Particle {
                kind,
                position: target,
                density: share,
                density_decay: parent.density_decay,
                spread_rate: parent.spread_rate,
                spread_counter: 0,
                spread_decay: parent.spread_decay,
                effect,
            };
            let child_id = ParticleId(*next_id);
            *next_id += 1;
            index.insert((target, kind), child_id);
            particles.insert(child_id, child);
        }
    }
}

/// Re-apply every surviving smoke effect at its current density. Runs after
/// spreading and venting so fresh clouds dim their voxels the same turn they
/// appear.
pub fn reconcile_effects(
    world: &mut VoxelWorld,
    light: &mut LightField,
    fire: &FireField,
    particles: &mut BTreeMap<ParticleId, Particle>,
    vision: &VisionParams,
) {
    let no_smoke = BTreeMap::new();
    let ids: Vec<ParticleId> = particles.keys().copied().collect();
    for id in ids {
        let Some(particle) = particles.get_mut(&id) else {
            continue;
        };
        if matches!(particle.effect, EnvEffect::LowerVisibility(_)) {
            let (position, density) = (particle.position, particle.density);
            let mut ctx = EffectCtx {
                world: &mut *world,
                light: &mut *light,
                fire,
                smoke_base: &no_smoke,
            };
            particle.effect.activate(position, density, vision, &mut ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::Material;

    fn rig(depth: u32, side: u32) -> (VoxelWorld, LightField, FireField) {
        let world = VoxelWorld::new(depth, side, side);
        let mut light = LightField::new(depth, side, side);
        light.compute_exposure(&world);
        light.seed_light();
        (world, light, FireField::new())
    }

    fn smoke(at: VoxelCoord, density: i32, density_decay: i32) -> Particle {
        Particle {
            kind: ParticleKind::Smoke,
            position: at,
            density,
            density_decay,
            spread_rate: 1,
            spread_counter: 0,
            spread_decay: 0.1,
            effect: EnvEffect::LowerVisibility(LowerVisibility::new(100)),
        }
    }

    fn vision() -> VisionParams {
        VisionParams {
            fov_radius: 8,
            boost_tight_radius: 2,
            boost_wide_radius: 4,
        }
    }

    #[test]
    fn template_instantiates_with_a_fresh_effect() {
        let template = ParticleTemplate {
            kind: ParticleKind::Smoke,
            density: 300,
            density_decay: 25,
            spread_rate: 2,
            spread_decay: 0.1,
            per_density_amt: 100,
        };
        let particle = template.instantiate(VoxelCoord::new(1, 2, 3));
        assert_eq!(particle.kind, ParticleKind::Smoke);
        assert_eq!(particle.position, VoxelCoord::new(1, 2, 3));
        assert_eq!(particle.density, 300);
        assert_eq!(particle.spread_counter, 0);
        match particle.effect {
            EnvEffect::LowerVisibility(e) => assert_eq!(e.per_density_amt, 100),
            EnvEffect::IncreaseVisibility(_) => panic!("wrong effect variant"),
        }
    }

    #[test]
    fn spread_hands_out_an_even_share_and_keeps_the_rest() {
        let (mut world, mut light, fire) = rig(1, 5);
        let at = VoxelCoord::new(0, 2, 2);
        let mut particles = BTreeMap::new();
        particles.insert(ParticleId(0), smoke(at, 1000, 0));
        let mut next_id = 1;
        let mut events = Vec::new();

        spread_tick(
            &mut world,
            &mut light,
            &fire,
            &mut particles,
            &mut next_id,
            1,
            &mut events,
        );

        // 10% of 1000 split across the four open in-plane neighbors.
        assert_eq!(particles[&ParticleId(0)].density, 900);
        assert_eq!(particles.len(), 5);
        let children: Vec<_> = particles
            .values()
            .filter(|p| p.position != at)
            .map(|p| (p.position, p.density))
            .collect();
        for (_, density) in &children {
            assert_eq!(*density, 25);
        }
        let total: i32 = particles.values().map(|p| p.density).sum();
        assert_eq!(total, 1000);
        assert!(events.is_empty());
    }

    #[test]
    fn merge_respects_the_parent_density_cap() {
        let (mut world, mut light, fire) = rig(1, 5);
        let at = VoxelCoord::new(0, 2, 2);
        let mut particles = BTreeMap::new();
        particles.insert(ParticleId(0), smoke(at, 1000, 0));
        // An almost-saturated cloud north and a thin one south. Both get a
        // slow spread rate so only the big cloud moves this tick.
        let mut north = smoke(VoxelCoord::new(0, 2, 1), 880, 0);
        north.spread_rate = 5;
        let mut south = smoke(VoxelCoord::new(0, 2, 3), 100, 0);
        south.spread_rate = 5;
        particles.insert(ParticleId(1), north);
        particles.insert(ParticleId(2), south);
        let mut next_id = 3;
        let mut events = Vec::new();

        spread_tick(
            &mut world,
            &mut light,
            &fire,
            &mut particles,
            &mut next_id,
            1,
            &mut events,
        );

        // 880 + 25 would outgrow the spreader's remaining 900; that share is
        // lost. 100 + 25 stays under and merges.
        assert_eq!(particles[&ParticleId(0)].density, 900);
        assert_eq!(particles[&ParticleId(1)].density, 880);
        assert_eq!(particles[&ParticleId(2)].density, 125);
    }

    #[test]
    fn gas_sinks_before_it_rises() {
        let (mut world, mut light, fire) = rig(3, 5);
        // Mid-level cloud over an open shaft: both above and below are open,
        // only below is taken.
        let at = VoxelCoord::new(1, 2, 2);
        let mut particles = BTreeMap::new();
        particles.insert(ParticleId(0), smoke(at, 1000, 0));
        let mut next_id = 1;
        let mut events = Vec::new();

        spread_tick(
            &mut world,
            &mut light,
            &fire,
            &mut particles,
            &mut next_id,
            1,
            &mut events,
        );

        // Five targets: four in-plane plus the voxel below.
        assert_eq!(particles[&ParticleId(0)].density, 900);
        assert!(particles.values().any(|p| p.position == at.below()));
        assert!(particles.values().all(|p| p.position != at.above()));
        let below = particles.values().find(|p| p.position == at.below());
        assert_eq!(below.map(|p| p.density), Some(20));
    }

    #[test]
    fn gas_rises_through_up_stairs() {
        let (mut world, mut light, fire) = rig(2, 5);
        let at = VoxelCoord::new(0, 2, 2);
        world.place_tile(at, TileType::UpStairs, Material::Stone);
        let mut particles = BTreeMap::new();
        particles.insert(ParticleId(0), smoke(at, 1000, 0));
        let mut next_id = 1;
        let mut events = Vec::new();

        spread_tick(
            &mut world,
            &mut light,
            &fire,
            &mut particles,
            &mut next_id,
            1,
            &mut events,
        );

        assert!(particles.values().any(|p| p.position == at.above()));
    }

    #[test]
    fn a_walled_pocket_never_spreads() {
        let (mut world, mut light, fire) = rig(1, 5);
        let at = VoxelCoord::new(0, 2, 2);
        world.place_tile(at, TileType::Floor, Material::Stone);
        for neighbor in at.plane_neighbors4() {
            world.place_tile(neighbor, TileType::Wall, Material::Stone);
        }
        let mut particles = BTreeMap::new();
        particles.insert(ParticleId(0), smoke(at, 500, 25));
        let mut next_id = 1;
        let mut events = Vec::new();

        spread_tick(
            &mut world,
            &mut light,
            &fire,
            &mut particles,
            &mut next_id,
            1,
            &mut events,
        );

        assert_eq!(particles.len(), 1);
        assert_eq!(particles[&ParticleId(0)].density, 475);
    }

    #[test]
    fn death_withdraws_the_effect_and_reports_it() {
        let (mut world, mut light, fire) = rig(1, 5);
        let at = VoxelCoord::new(0, 2, 2);
        light.set_light_tile(at, 2);
        let mut particles = BTreeMap::new();
        particles.insert(ParticleId(7), smoke(at, 120, 150));
        reconcile_effects(&mut world, &mut light, &fire, &mut particles, &vision());
        assert_eq!(light.get_light_tile(at), 1);

        let mut next_id = 8;
        let mut events = Vec::new();
        spread_tick(
            &mut world,
            &mut light,
            &fire,
            &mut particles,
            &mut next_id,
            3,
            &mut events,
        );

        assert!(particles.is_empty());
        assert_eq!(light.get_light_tile(at), 2);
        assert_eq!(
            events,
            vec![SimEvent::new(
                3,
                SimEventKind::ParticleDissipated {
                    particle: ParticleId(7),
                    at,
                }
            )]
        );
    }

    #[test]
    fn a_dead_occupant_is_replaced_by_a_fresh_clone() {
        let (mut world, mut light, fire) = rig(1, 5);
        let at = VoxelCoord::new(0, 2, 2);
        let east = VoxelCoord::new(0, 3, 2);
        let mut particles = BTreeMap::new();
        // The occupant dies at the top of the same tick the spreader runs.
        particles.insert(ParticleId(0), smoke(east, 10, 25));
        particles.insert(ParticleId(1), smoke(at, 1000, 0));
        let mut next_id = 2;
        let mut events = Vec::new();

        spread_tick(
            &mut world,
            &mut light,
            &fire,
            &mut particles,
            &mut next_id,
            1,
            &mut events,
        );

        let clone = particles
            .values()
            .find(|p| p.position == east)
            .map(|p| p.density);
        assert_eq!(clone, Some(25));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn reconcile_tracks_the_current_density() {
        let (mut world, mut light, fire) = rig(1, 5);
        let at = VoxelCoord::new(0, 2, 2);
        let mut particles = BTreeMap::new();
        particles.insert(ParticleId(0), smoke(at, 250, 0));
        reconcile_effects(&mut world, &mut light, &fire, &mut particles, &vision());
        assert_eq!(light.get_light_tile(at), 2);

        // Thinner next turn: the cached base stays 4, the reduction shrinks.
        if let Some(p) = particles.get_mut(&ParticleId(0)) {
            p.density = 150;
        }
        reconcile_effects(&mut world, &mut light, &fire, &mut particles, &vision());
        assert_eq!(light.get_light_tile(at), 3);
    }

    #[test]
    fn smoke_base_map_prefers_the_latest_particle() {
        let (mut world, mut light, fire) = rig(1, 5);
        let at = VoxelCoord::new(0, 2, 2);
        let mut particles = BTreeMap::new();
        particles.insert(ParticleId(0), smoke(at, 250, 0));
        reconcile_effects(&mut world, &mut light, &fire, &mut particles, &vision());
        // A younger, never-activated cloud lands on the same voxel.
        particles.insert(ParticleId(5), smoke(at, 50, 0));

        let bases = smoke_base_map(&particles);
        assert_eq!(bases.get(&at), Some(&0));

        particles.remove(&ParticleId(5));
        let bases = smoke_base_map(&particles);
        assert_eq!(bases.get(&at), Some(&4));
    }
}
