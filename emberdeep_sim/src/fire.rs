// Fire: ignition records, burn damage, and flame spread.
//
// A voxel that is ignited smolders first: its record counts turns until the
// ignition threshold, and only then does `on_fire` flip. At that moment the
// voxel's baseline light level is snapshotted for restoration when the fire
// goes out; a snapshot that already exists at that point means the
// bookkeeping leaked, and the tick aborts with an invariant error instead of
// overwriting it.
//
// While burning, a voxel loses hit points every tick. Once its hp falls
// under half the default wooden tile's, the flame starts reaching for
// neighbors: the in-plane 4-neighbors plus the vertical voxels a Wall/Door
// carries — the same chain `support.rs` floods — restricted to supported,
// Wood-material tiles not already ignited. At 0 hp the voxel has burned away;
// the caller clears its fire state and removes it through the regular
// collapse path.
//
// Burning voxels render at full brightness; that pin lives in
// `LightField::light_level`, not here.
//
// See also: `sim.rs` for the burn-away collapse, `effects.rs` which reads the
// snapshots when smoke or a brazier touches a burning voxel.

use crate::config::FireParams;
use crate::error::{SimError, SimResult};
use crate::event::{SimEvent, SimEventKind};
use crate::light::LightField;
use crate::support::{self, SupportGraph};
use crate::tile::Material;
use crate::types::{VoxelCoord, map_as_pairs};
use crate::world::VoxelWorld;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ignition records and pre-fire light snapshots, keyed by voxel.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FireField {
    /// Turns each ignited voxel has smoldered or burned.
    #[serde(with = "map_as_pairs")]
    records: BTreeMap<VoxelCoord, u32>,
    /// Baseline light level captured the moment each voxel caught fire.
    #[serde(with = "map_as_pairs")]
    snapshots: BTreeMap<VoxelCoord, i32>,
}

impl FireField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an ignition record at turn count 0. Returns false when the voxel
    /// is already ignited.
    pub fn ignite(&mut self, coord: VoxelCoord) -> bool {
        if self.records.contains_key(&coord) {
            return false;
        }
        self.records.insert(coord, 0);
        true
    }

    /// Turns this voxel has been ignited, if it is.
    pub fn record(&self, coord: VoxelCoord) -> Option<u32> {
        self.records.get(&coord).copied()
    }

    /// The pre-fire baseline light level, present once the voxel is burning.
    pub fn snapshot(&self, coord: VoxelCoord) -> Option<i32> {
        self.snapshots.get(&coord).copied()
    }

    /// Forget all fire state for a voxel (burned away, collapsed, or
    /// extinguished).
    pub fn clear(&mut self, coord: VoxelCoord) {
        self.records.remove(&coord);
        self.snapshots.remove(&coord);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Advance every ignition record one turn: smolder toward the threshold,
/// burn hit points down, spread to eligible neighbors. Returns the voxels
/// that burned away this tick; the caller removes them from the grid.
pub fn fire_tick(
    world: &mut VoxelWorld,
    light: &LightField,
    graph: &SupportGraph,
    fire: &mut FireField,
    params: &FireParams,
    turn: u64,
    events: &mut Vec<SimEvent>,
) -> SimResult<Vec<VoxelCoord>> {
    let mut burned_away = Vec::new();
    let mut ignitions: Vec<(VoxelCoord, VoxelCoord)> = Vec::new();
    let coords: Vec<VoxelCoord> = fire.records.keys().copied().collect();
    for coord in coords {
        if let Some(count) = fire.records.get_mut(&coord) {
            *count += 1;
        }
        if !world.is_on_fire(coord) {
            let count = fire.record(coord).unwrap_or(0);
            if count >= params.ignition_turns {
                if fire.snapshots.contains_key(&coord) {
                    log::error!("fire snapshot already present at {coord}");
                    return Err(SimError::invariant(format!(
                        "duplicate fire snapshot at {coord}"
                    )));
                }
                fire.snapshots.insert(coord, light.get_light_tile(coord));
                world.set_on_fire(coord, true);
                events.push(SimEvent::new(turn, SimEventKind::VoxelIgnited { at: coord }));
            }
            // Catching fire and taking burn damage never share a tick.
            continue;
        }
        let hp = world.hp(coord) - params.burn_damage_per_turn;
        world.set_hp(coord, hp);
        if hp < params.wood_default_hp / 2 {
            for n in support::neighbors_supported_by(world, coord) {
                if world.material(n) == Some(Material::Wood)
                    && graph.is_supported(n)
                    && fire.record(n).is_none()
                    && !world.is_on_fire(n)
                {
                    ignitions.push((coord, n));
                }
            }
        }
        if hp <= 0 {
            burned_away.push(coord);
        }
    }
    for (source, target) in ignitions {
        // Two burners can nominate the same target; the first in coordinate
        // order wins.
        if fire.ignite(target) {
            events.push(SimEvent::new(
                turn,
                SimEventKind::FireSpread {
                    from: source,
                    to: target,
                },
            ));
        }
    }
    Ok(burned_away)
}

/// Put out a smoldering or burning voxel. For a burning one, the baseline
/// light level is restored from the snapshot, clamped to the column ceiling.
pub fn extinguish(
    world: &mut VoxelWorld,
    light: &mut LightField,
    fire: &mut FireField,
    coord: VoxelCoord,
    turn: u64,
    events: &mut Vec<SimEvent>,
) -> SimResult<()> {
    if fire.record(coord).is_none() {
        return Err(SimError::impossible(format!(
            "extinguish at {coord}: nothing is burning there"
        )));
    }
    if world.is_on_fire(coord) {
        if let Some(snapshot) = fire.snapshot(coord) {
            let restored = light.clamp_to_ceiling(coord, snapshot);
            light.set_light_tile(coord, restored);
        }
        world.set_on_fire(coord, false);
        events.push(SimEvent::new(
            turn,
            SimEventKind::FireExtinguished { at: coord },
        ));
    }
    fire.clear(coord);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileType;

    /// A wooden wall run at z = 1 anchored to the rim, lit field around it.
    fn burn_rig() -> (VoxelWorld, LightField, SupportGraph, FireField, FireParams) {
        let mut world = VoxelWorld::new(4, 8, 8);
        for x in 0..4 {
            world.place_tile(VoxelCoord::new(1, x, 2), TileType::Wall, Material::Wood);
        }
        // One stone link in the run, and a wooden floor on top of the chain.
        world.place_tile(VoxelCoord::new(1, 4, 2), TileType::Wall, Material::Stone);
        world.place_tile(VoxelCoord::new(2, 2, 2), TileType::Floor, Material::Wood);
        let (graph, collapsed) = support::initialize(&mut world);
        assert!(collapsed.is_empty());
        let mut light = LightField::new(4, 8, 8);
        light.compute_exposure(&world);
        light.seed_light();
        let params = FireParams {
            ignition_turns: 3,
            burn_damage_per_turn: 2,
            wood_default_hp: 60,
        };
        (world, light, graph, FireField::new(), params)
    }

    fn tick(
        world: &mut VoxelWorld,
        light: &LightField,
        graph: &SupportGraph,
        fire: &mut FireField,
        params: &FireParams,
        events: &mut Vec<SimEvent>,
    ) -> Vec<VoxelCoord> {
        fire_tick(world, light, graph, fire, params, 1, events).unwrap()
    }

    #[test]
    fn ignition_smolders_for_the_threshold_then_catches() {
        let (mut world, light, graph, mut fire, params) = burn_rig();
        let v = VoxelCoord::new(1, 1, 2);
        let hp_before = world.hp(v);
        assert!(fire.ignite(v));
        assert!(!fire.ignite(v));

        let mut events = Vec::new();
        tick(&mut world, &light, &graph, &mut fire, &params, &mut events);
        tick(&mut world, &light, &graph, &mut fire, &params, &mut events);
        assert!(!world.is_on_fire(v));
        assert!(events.is_empty());

        tick(&mut world, &light, &graph, &mut fire, &params, &mut events);
        assert!(world.is_on_fire(v));
        assert_eq!(fire.snapshot(v), Some(light.get_light_tile(v)));
        assert_eq!(
            events,
            vec![SimEvent::new(1, SimEventKind::VoxelIgnited { at: v })]
        );
        // No burn damage on the tick it catches.
        assert_eq!(world.hp(v), hp_before);

        tick(&mut world, &light, &graph, &mut fire, &params, &mut events);
        assert_eq!(world.hp(v), hp_before - params.burn_damage_per_turn);
    }

    #[test]
    fn duplicate_snapshot_is_an_invariant_violation() {
        let (mut world, light, graph, mut fire, params) = burn_rig();
        let v = VoxelCoord::new(1, 1, 2);
        fire.ignite(v);
        fire.snapshots.insert(v, 2);
        let mut events = Vec::new();
        for _ in 0..2 {
            fire_tick(&mut world, &light, &graph, &mut fire, &params, 1, &mut events).unwrap();
        }
        let err =
            fire_tick(&mut world, &light, &graph, &mut fire, &params, 1, &mut events).unwrap_err();
        assert!(matches!(err, SimError::Invariant(_)));
    }

    #[test]
    fn weakened_burner_ignites_wood_neighbors_only() {
        let (mut world, light, graph, mut fire, params) = burn_rig();
        let v = VoxelCoord::new(1, 2, 2);
        fire.ignite(v);
        let mut events = Vec::new();
        for _ in 0..3 {
            tick(&mut world, &light, &graph, &mut fire, &params, &mut events);
        }
        assert!(world.is_on_fire(v));
        // Still at full hp: the flame stays put.
        tick(&mut world, &light, &graph, &mut fire, &params, &mut events);
        assert_eq!(fire.record(VoxelCoord::new(1, 1, 2)), None);

        // Weaken it under half the wood default and tick again.
        world.set_hp(v, params.wood_default_hp / 2 - 1);
        events.clear();
        tick(&mut world, &light, &graph, &mut fire, &params, &mut events);
        // In-plane wood neighbors catch, stone does not.
        assert_eq!(fire.record(VoxelCoord::new(1, 1, 2)), Some(0));
        assert_eq!(fire.record(VoxelCoord::new(1, 3, 2)), Some(0));
        // The wall carries flame to the wooden floor above it.
        assert_eq!(fire.record(VoxelCoord::new(2, 2, 2)), Some(0));
        assert!(events.iter().any(|e| matches!(
            e.kind,
            SimEventKind::FireSpread { to, .. } if to == VoxelCoord::new(1, 1, 2)
        )));

        // The stone link never ignites even as the run keeps burning.
        assert_eq!(fire.record(VoxelCoord::new(1, 4, 2)), None);
    }

    #[test]
    fn burned_out_voxels_are_reported_for_removal() {
        let (mut world, light, graph, mut fire, params) = burn_rig();
        let v = VoxelCoord::new(1, 1, 2);
        fire.ignite(v);
        let mut events = Vec::new();
        for _ in 0..3 {
            tick(&mut world, &light, &graph, &mut fire, &params, &mut events);
        }
        world.set_hp(v, params.burn_damage_per_turn);
        let burned = tick(&mut world, &light, &graph, &mut fire, &params, &mut events);
        assert_eq!(burned, vec![v]);
        assert_eq!(world.hp(v), 0);
    }

    #[test]
    fn extinguish_restores_the_snapshotted_light() {
        let (mut world, mut light, graph, mut fire, params) = burn_rig();
        let v = VoxelCoord::new(1, 1, 2);
        light.set_light_tile(v, 2);
        fire.ignite(v);
        let mut events = Vec::new();
        for _ in 0..3 {
            tick(&mut world, &light, &graph, &mut fire, &params, &mut events);
        }
        assert_eq!(fire.snapshot(v), Some(2));
        // The baseline drifts while the voxel burns (diffusion), but readers
        // see the fire pin.
        light.set_light_tile(v, 0);
        assert_eq!(light.light_level(&world, v), 4);

        events.clear();
        extinguish(&mut world, &mut light, &mut fire, v, 5, &mut events).unwrap();
        assert!(!world.is_on_fire(v));
        assert_eq!(light.get_light_tile(v), 2);
        assert_eq!(fire.record(v), None);
        assert_eq!(fire.snapshot(v), None);
        assert_eq!(
            events,
            vec![SimEvent::new(5, SimEventKind::FireExtinguished { at: v })]
        );
    }

    #[test]
    fn extinguish_without_a_record_is_impossible() {
        let (mut world, mut light, _, mut fire, _) = burn_rig();
        let err = extinguish(
            &mut world,
            &mut light,
            &mut fire,
            VoxelCoord::new(1, 1, 2),
            0,
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SimError::Impossible(_)));
    }
}
