// emberdeep_sim — pure Rust dungeon-simulation library.
//
// This crate contains all simulation logic for Emberdeep: the voxel world,
// structural support and collapse, exposure-based lighting, fire, gas
// particles with visibility effects, fixtures, and actors. It has zero
// rendering or engine dependencies and can be tested, benchmarked, and run
// headless; a host embeds `sim::SimState` and drives it through actions.
//
// Module overview:
// - `sim.rs`:       Top-level SimState, the turn pipeline, mutations, queries.
// - `world.rs`:     Dense 3D voxel grid (the world's spatial truth).
// - `tile.rs`:      Tile and material catalog — walkability, transparency, hit points.
// - `support.rs`:   Dependency-graph structural integrity + cascading collapse.
// - `light.rs`:     Per-column outside exposure, 5-level light planes, diffusion.
// - `fov.rs`:       Radius-limited visibility flood on a z-plane.
// - `fire.rs`:      Ignition countdowns, burn damage, spread along support edges.
// - `particles.rs`: Gas clouds — decay, cadenced spread, effect reconciliation.
// - `effects.rs`:   Reversible per-voxel visibility effects (dim and boost).
// - `fixture.rs`:   Placed objects — braziers and particle vents.
// - `actor.rs`:     Actors and the damage they take from collapses.
// - `event.rs`:     Narrative SimEvents the pipeline reports to the host.
// - `config.rs`:    GameConfig — every tunable in one serializable bundle.
// - `error.rs`:     SimError / SimResult for rejected actions and broken invariants.
// - `types.rs`:     VoxelCoord, entity IDs, serde helpers.
//
// **Critical constraint: determinism.** The simulation is a pure function:
// `(state, actions) -> (new_state, events)`. No RNG, no system time, no OS
// entropy, and no `HashMap` iteration; every loop runs over `BTreeMap`s
// keyed by coordinates or monotonic creation IDs. A state serialized with
// `SimState::to_json` and reloaded replays turn-for-turn identically.

pub mod actor;
pub mod config;
pub mod effects;
pub mod error;
pub mod event;
pub mod fire;
pub mod fixture;
pub mod fov;
pub mod light;
pub mod particles;
pub mod sim;
pub mod support;
pub mod tile;
pub mod types;
pub mod world;
