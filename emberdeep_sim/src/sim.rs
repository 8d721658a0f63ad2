// The simulation aggregate: one struct owning every engine's state, the
// mutators the action layer calls, and the per-turn pipeline.
//
// Turn pipeline: fire tick (burn-away collapses settle immediately) →
// particle spread → vent emission → exposure recompute when topology changed
// → baseline diffusion → effect reconciliation. Reconciliation runs last so
// a live smoke cloud's dimming is what callers read between turns, not the
// diffused average underneath it.
//
// Collapse settlement is shared by every trigger (demolition, burn-away,
// initialization floaters): announce the cascade, scrub fire state off every
// fallen voxel, run the damage pass, relight the opened columns.
//
// **Critical constraint: determinism.** Entity maps are ordered by monotonic
// creation ids, per-voxel tables are coordinate-ordered, and the pipeline
// holds no RNG; a saved state replays identically after reload.
//
// See also: `support.rs` for the cascade itself, `light.rs` for exposure and
// diffusion, `particles.rs` and `fixture.rs` for the gas pipeline.

use crate::actor::Actor;
use crate::config::GameConfig;
use crate::effects::EffectCtx;
use crate::error::{SimError, SimResult};
use crate::event::{SimEvent, SimEventKind};
use crate::fire::{self, FireField};
use crate::fixture::{self, Fixture, FixtureKind};
use crate::fov;
use crate::light::LightField;
use crate::particles::{self, Particle, ParticleTemplate};
use crate::support::{self, SupportGraph};
use crate::tile::{Material, TileType};
use crate::types::{ActorId, FixtureId, ParticleId, VoxelCoord};
use crate::world::VoxelWorld;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Everything a renderer wants to know about one voxel, in one read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDescriptor {
    pub tile: TileType,
    pub material: Option<Material>,
    pub hp: i32,
    pub max_hp: i32,
    pub walkable: bool,
    pub transparent: bool,
    pub on_fire: bool,
    pub supported: bool,
    pub light: i32,
    pub visible: bool,
    pub explored: bool,
}

/// The whole simulation. Serializing this is the save format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimState {
    config: GameConfig,
    turn: u64,
    world: VoxelWorld,
    light: LightField,
    support: SupportGraph,
    fire: FireField,
    actors: BTreeMap<ActorId, Actor>,
    particles: BTreeMap<ParticleId, Particle>,
    fixtures: BTreeMap<FixtureId, Fixture>,
    next_actor_id: u64,
    next_particle_id: u64,
    next_fixture_id: u64,
    topology_dirty: bool,
    events: Vec<SimEvent>,
}

impl SimState {
    /// Build the world from a tile layout, run the support flood, compute
    /// exposure, seed and diffuse the light. Floating clusters in the layout
    /// collapse here, before the first turn.
    pub fn initialize(
        config: GameConfig,
        layout: &[(VoxelCoord, TileType, Material)],
    ) -> Self {
        let (depth, width, height) = config.world_size;
        let mut world = VoxelWorld::new(depth, width, height);
        for &(at, tile, material) in layout {
            world.place_tile(at, tile, material);
        }
        let (support, unreachable) = support::initialize(&mut world);
        let mut light = LightField::new(depth, width, height);
        light.compute_exposure(&world);
        light.seed_light();
        log::info!(
            "initialized {depth}x{width}x{height} world, {} tiles placed",
            layout.len()
        );
        let mut state = Self {
            config,
            turn: 0,
            world,
            light,
            support,
            fire: FireField::new(),
            actors: BTreeMap::new(),
            particles: BTreeMap::new(),
            fixtures: BTreeMap::new(),
            next_actor_id: 0,
            next_particle_id: 0,
            next_fixture_id: 0,
            topology_dirty: false,
            events: Vec::new(),
        };
        state.settle_collapse(&unreachable, false);
        // Exposure above already reflects the flood's clears.
        state.topology_dirty = false;
        state.light.diffuse();
        state
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Take the buffered events, oldest first.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Turn pipeline
    // -----------------------------------------------------------------------

    /// Resolve one turn: fire, particles, vents, lighting, reconciliation.
    pub fn advance_turn(&mut self) -> SimResult<()> {
        self.turn += 1;
        let burned = fire::fire_tick(
            &mut self.world,
            &self.light,
            &self.support,
            &mut self.fire,
            &self.config.fire,
            self.turn,
            &mut self.events,
        )?;
        for at in burned {
            // An earlier burn-away's cascade may have taken this voxel.
            if self.world.tile(at) == TileType::Empty {
                self.fire.clear(at);
                continue;
            }
            self.events
                .push(SimEvent::new(self.turn, SimEventKind::VoxelBurnedAway { at }));
            let falling = support::remove_voxel(&mut self.world, &mut self.support, at)?;
            self.settle_collapse(&falling, true);
        }
        particles::spread_tick(
            &mut self.world,
            &mut self.light,
            &self.fire,
            &mut self.particles,
            &mut self.next_particle_id,
            self.turn,
            &mut self.events,
        );
        fixture::vent_tick(&mut self.fixtures, &mut self.particles, &mut self.next_particle_id);
        if self.topology_dirty {
            self.light.compute_exposure(&self.world);
            self.topology_dirty = false;
        }
        self.light.diffuse();
        particles::reconcile_effects(
            &mut self.world,
            &mut self.light,
            &self.fire,
            &mut self.particles,
            &self.config.vision,
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Structural mutations
    // -----------------------------------------------------------------------

    /// Demolish a voxel and settle whatever its removal lets go.
    pub fn remove_voxel(&mut self, at: VoxelCoord) -> SimResult<()> {
        let falling = support::remove_voxel(&mut self.world, &mut self.support, at)?;
        self.settle_collapse(&falling, true);
        Ok(())
    }

    /// Build a voxel against some currently-supported neighbor.
    pub fn add_voxel(
        &mut self,
        at: VoxelCoord,
        tile: TileType,
        material: Material,
    ) -> SimResult<()> {
        support::add_voxel(&mut self.world, &mut self.support, at, tile, material)?;
        self.light.raise_exposure(at.x, at.y, at.z);
        self.topology_dirty = true;
        Ok(())
    }

    /// Shared settlement for any collapse batch. `quiet_trigger` suppresses
    /// the collapse event for `falling[0]`, which a deliberate removal or a
    /// burn-away has already accounted for.
    fn settle_collapse(&mut self, falling: &[VoxelCoord], quiet_trigger: bool) {
        if falling.is_empty() {
            return;
        }
        self.topology_dirty = true;
        for (i, &at) in falling.iter().enumerate() {
            if quiet_trigger && i == 0 {
                continue;
            }
            self.events
                .push(SimEvent::new(self.turn, SimEventKind::VoxelCollapsed { at }));
        }
        for &at in falling {
            self.fire.clear(at);
        }
        self.damage_pass(falling);
    }

    /// Debris and falls for one collapse batch, then relight the opened
    /// columns. Debris piles at the nearest filled voxel below each opened
    /// column; an actor stands in a walkable landing tile, or on top of a
    /// solid one.
    fn damage_pass(&mut self, falling: &[VoxelCoord]) {
        // Per column: how many tiles fell and the lowest opened level.
        let mut columns: BTreeMap<(i32, i32), (i32, i32)> = BTreeMap::new();
        for &v in falling {
            let entry = columns.entry((v.x, v.y)).or_insert((0, v.z));
            entry.0 += 1;
            entry.1 = entry.1.min(v.z);
        }
        let mut stands: BTreeMap<(i32, i32), Option<i32>> = BTreeMap::new();
        for (&(x, y), &(_, lowest)) in &columns {
            let mut landing = None;
            let mut z = lowest - 1;
            while z >= 0 {
                let at = VoxelCoord::new(z, x, y);
                if self.world.tile(at) != TileType::Empty {
                    landing = Some(at);
                    break;
                }
                z -= 1;
            }
            let stand = landing.map(|at| {
                if self.world.is_walkable(at) {
                    at.z
                } else {
                    at.z + 1
                }
            });
            stands.insert((x, y), stand);
        }

        // Debris onto anyone standing at a landing site.
        for (&(x, y), &(stacked, _)) in &columns {
            let Some(&Some(stand_z)) = stands.get(&(x, y)) else {
                continue;
            };
            let site = VoxelCoord::new(stand_z, x, y);
            let hit: Vec<ActorId> = self
                .actors
                .iter()
                .filter(|(_, a)| a.alive && a.position == site)
                .map(|(&id, _)| id)
                .collect();
            for id in hit {
                let Some(actor) = self.actors.get_mut(&id) else {
                    continue;
                };
                let damage =
                    (self.config.collapse.debris_damage_per_tile * stacked - actor.defense).max(0);
                let died = actor.take_damage(damage);
                self.events
                    .push(SimEvent::new(self.turn, SimEventKind::DebrisHit { actor: id, damage }));
                if died {
                    self.events
                        .push(SimEvent::new(self.turn, SimEventKind::ActorDied { actor: id }));
                }
            }
        }

        // Anyone whose footing collapsed falls to the landing level, or out
        // of the grid when the column is open all the way down.
        let opened: BTreeSet<VoxelCoord> = falling.iter().copied().collect();
        let fallers: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|(_, a)| a.alive && opened.contains(&a.position))
            .map(|(&id, _)| id)
            .collect();
        for id in fallers {
            let Some(actor) = self.actors.get_mut(&id) else {
                continue;
            };
            let column = (actor.position.x, actor.position.y);
            match stands.get(&column).copied().flatten() {
                Some(stand_z) => {
                    let levels = actor.position.z - stand_z;
                    let damage = self.config.collapse.fall_damage_per_level * levels;
                    actor.position = VoxelCoord::new(stand_z, column.0, column.1);
                    let died = actor.take_damage(damage);
                    self.events.push(SimEvent::new(
                        self.turn,
                        SimEventKind::ActorFell {
                            actor: id,
                            levels,
                            damage,
                        },
                    ));
                    if died {
                        self.events
                            .push(SimEvent::new(self.turn, SimEventKind::ActorDied { actor: id }));
                    }
                }
                None => {
                    self.actors.remove(&id);
                    self.events
                        .push(SimEvent::new(self.turn, SimEventKind::ActorLost { actor: id }));
                }
            }
        }

        let opened_columns: Vec<(i32, i32)> = columns.keys().copied().collect();
        for (x, y) in opened_columns {
            self.light.reseed_exposed_column(&self.world, x, y);
        }
    }

    // -----------------------------------------------------------------------
    // Fire mutations
    // -----------------------------------------------------------------------

    /// Start a voxel smoldering. It catches fire after the configured number
    /// of turns.
    pub fn ignite_voxel(&mut self, at: VoxelCoord) -> SimResult<()> {
        if self.world.tile(at) == TileType::Empty {
            return Err(SimError::impossible(format!("nothing to ignite at {at}")));
        }
        if !self.fire.ignite(at) {
            return Err(SimError::impossible(format!("{at} is already igniting")));
        }
        Ok(())
    }

    /// Put out a smoldering or burning voxel, restoring its snapshotted
    /// light.
    pub fn extinguish_voxel(&mut self, at: VoxelCoord) -> SimResult<()> {
        fire::extinguish(
            &mut self.world,
            &mut self.light,
            &mut self.fire,
            at,
            self.turn,
            &mut self.events,
        )
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    pub fn spawn_actor(
        &mut self,
        name: &str,
        at: VoxelCoord,
        max_hp: i32,
        defense: i32,
    ) -> SimResult<ActorId> {
        self.require_standable(at)?;
        if self.actors.values().any(|a| a.alive && a.position == at) {
            return Err(SimError::impossible(format!("{at} is occupied")));
        }
        let id = ActorId(self.next_actor_id);
        self.next_actor_id += 1;
        self.actors.insert(id, Actor::new(name, at, max_hp, defense));
        Ok(id)
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Place a fixture on a standable voxel. A brazier's light boost goes
    /// live here.
    pub fn place_fixture(&mut self, mut fixture: Fixture) -> SimResult<FixtureId> {
        self.require_standable(fixture.position)?;
        if let FixtureKind::Brazier { effect } = &mut fixture.kind {
            let smoke_base = particles::smoke_base_map(&self.particles);
            let mut ctx = EffectCtx {
                world: &mut self.world,
                light: &mut self.light,
                fire: &self.fire,
                smoke_base: &smoke_base,
            };
            effect.activate(fixture.position, 0, &self.config.vision, &mut ctx);
        }
        let id = FixtureId(self.next_fixture_id);
        self.next_fixture_id += 1;
        self.fixtures.insert(id, fixture);
        Ok(id)
    }

    /// Remove a fixture, withdrawing a brazier's boost. Overlapping braziers
    /// must come out in reverse placement order.
    pub fn remove_fixture(&mut self, id: FixtureId) -> SimResult<()> {
        let Some(mut fixture) = self.fixtures.remove(&id) else {
            return Err(SimError::impossible(format!("no fixture {id}")));
        };
        if let FixtureKind::Brazier { effect } = &mut fixture.kind {
            let smoke_base = particles::smoke_base_map(&self.particles);
            let mut ctx = EffectCtx {
                world: &mut self.world,
                light: &mut self.light,
                fire: &self.fire,
                smoke_base: &smoke_base,
            };
            effect.deactivate(fixture.position, &mut ctx);
        }
        Ok(())
    }

    /// Release a particle into an open voxel. Merges into a same-kind cloud
    /// already there, keeping one effect writer per voxel and kind.
    pub fn spawn_particle(
        &mut self,
        template: &ParticleTemplate,
        at: VoxelCoord,
    ) -> SimResult<ParticleId> {
        if !self.world.in_bounds(at) || !self.world.is_open(at) {
            return Err(SimError::impossible(format!(
                "no open voxel at {at} for a particle"
            )));
        }
        let existing = self
            .particles
            .iter_mut()
            .find(|(_, p)| p.position == at && p.kind == template.kind);
        if let Some((&id, cloud)) = existing {
            cloud.density += template.density;
            return Ok(id);
        }
        let id = ParticleId(self.next_particle_id);
        self.next_particle_id += 1;
        self.particles.insert(id, template.instantiate(at));
        Ok(id)
    }

    fn require_standable(&self, at: VoxelCoord) -> SimResult<()> {
        if !self.world.is_walkable(at) {
            return Err(SimError::impossible(format!("{at} is not walkable")));
        }
        if !self.support.is_supported(at) {
            return Err(SimError::impossible(format!("{at} is not supported")));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Field of view
    // -----------------------------------------------------------------------

    /// Recompute visibility from every living actor; explored accumulates.
    pub fn update_fov(&mut self) {
        self.world.clear_visible();
        let origins: Vec<VoxelCoord> = self
            .actors
            .values()
            .filter(|a| a.alive)
            .map(|a| a.position)
            .collect();
        let radius = self.config.vision.fov_radius;
        for origin in origins {
            let seen = fov::visible_coords(&self.world, origin.z, (origin.x, origin.y), radius);
            for at in seen {
                self.world.mark_visible(at);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn tile_at(&self, at: VoxelCoord) -> TileDescriptor {
        TileDescriptor {
            tile: self.world.tile(at),
            material: self.world.material(at),
            hp: self.world.hp(at),
            max_hp: self.world.max_hp(at),
            walkable: self.world.is_walkable(at),
            transparent: self.world.is_transparent(at),
            on_fire: self.world.is_on_fire(at),
            supported: self.support.is_supported(at),
            light: self.light.light_level(&self.world, at),
            visible: self.world.is_visible(at),
            explored: self.world.is_explored(at),
        }
    }

    pub fn is_walkable(&self, at: VoxelCoord) -> bool {
        self.world.is_walkable(at)
    }

    pub fn is_transparent(&self, at: VoxelCoord) -> bool {
        self.world.is_transparent(at)
    }

    pub fn is_on_fire(&self, at: VoxelCoord) -> bool {
        self.world.is_on_fire(at)
    }

    pub fn is_supported(&self, at: VoxelCoord) -> bool {
        self.support.is_supported(at)
    }

    /// Effective light level: fire pin, then overlay, then baseline.
    pub fn light_level(&self, at: VoxelCoord) -> i32 {
        self.light.light_level(&self.world, at)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn to_json(&self) -> SimResult<String> {
        serde_json::to_string(self)
            .map_err(|e| SimError::invariant(format!("serialize state: {e}")))
    }

    pub fn from_json(json: &str) -> SimResult<Self> {
        serde_json::from_str(json).map_err(|e| SimError::invariant(format!("parse state: {e}")))
    }
}
