// Structural support: which voxels stand, and what falls when one is removed.
//
// Support originates at the map boundary: the x/y rim of every level plus the
// z = 0 bedrock plane. A filled voxel stands iff it reaches an anchor through
// the support relation: in-plane 4-neighbors hold each other up, and Wall or
// Door voxels additionally carry support vertically (a wall holds the voxel
// above it, and holds a filled voxel below it).
//
// `initialize` floods support outward from the anchors and records, per
// discovered voxel, the single neighbor that justified it — a spanning tree,
// kept as two maps in lockstep (`dependents`: supporter -> reliers,
// `justifiers`: relier -> supporters). Anchors never appear on the relier
// side. `add_voxel` grows the maps; `remove_voxel` walks the tree instead of
// re-flooding: a voxel whose last recorded justifier collapses will collapse
// too, even when an unrecorded path to an anchor still exists in the grid.
// `flood_reachable` is the full-rescan oracle tests use to pin down exactly
// that divergence.
//
// **Critical constraint: determinism.** Both maps are BTreeMaps and the flood
// seeds in (z, x, y) scan order, so cascade order is a pure function of the
// grid.
//
// See also: `sim.rs` for the damage pass that consumes collapse batches, and
// `fire.rs` which reuses the vertical Wall/Door chain for flame spread.

use crate::error::{SimError, SimResult};
use crate::tile::{Material, TileType};
use crate::types::{VoxelCoord, map_as_pairs};
use crate::world::VoxelWorld;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Per-voxel structural standing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupportState {
    /// Not yet examined by the flood.
    #[default]
    Unknown,
    /// Anchored to the boundary, directly or transitively.
    Supported,
    /// Filled but justification lost; transient while a cascade runs.
    Unsupported,
    /// Empty, either from the start or through collapse.
    Collapsed,
}

/// The support states plus the justification graph discovered by the flood.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupportGraph {
    depth: u32,
    width: u32,
    height: u32,
    states: Vec<SupportState>,
    /// supporter -> voxels whose recorded justification runs through it.
    #[serde(with = "map_as_pairs")]
    dependents: BTreeMap<VoxelCoord, BTreeSet<VoxelCoord>>,
    /// relier -> its recorded supporters. Never holds boundary voxels.
    #[serde(with = "map_as_pairs")]
    justifiers: BTreeMap<VoxelCoord, BTreeSet<VoxelCoord>>,
}

impl SupportGraph {
    pub fn new(depth: u32, width: u32, height: u32) -> Self {
        let total = (depth as usize) * (width as usize) * (height as usize);
        Self {
            depth,
            width,
            height,
            states: vec![SupportState::Unknown; total],
            dependents: BTreeMap::new(),
            justifiers: BTreeMap::new(),
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
            let w = self.width as usize;
            let h = self.height as usize;
            Some((coord.z as usize * w + coord.x as usize) * h + coord.y as usize)
        } else {
            None
        }
    }

    /// Support state of a voxel. Out of bounds reads as Collapsed: nothing
    /// stands outside the grid.
    pub fn state(&self, coord: VoxelCoord) -> SupportState {
        self.index(coord)
            .map(|i| self.states[i])
            .unwrap_or(SupportState::Collapsed)
    }

    fn set_state(&mut self, coord: VoxelCoord, state: SupportState) {
        if let Some(i) = self.index(coord) {
            self.states[i] = state;
        }
    }

    pub fn is_supported(&self, coord: VoxelCoord) -> bool {
        self.state(coord) == SupportState::Supported
    }

    /// Record that `supporter` justifies `relier`.
    fn add_edge(&mut self, supporter: VoxelCoord, relier: VoxelCoord) {
        self.dependents.entry(supporter).or_default().insert(relier);
        self.justifiers.entry(relier).or_default().insert(supporter);
    }

    fn has_justification(&self, coord: VoxelCoord) -> bool {
        self.justifiers.get(&coord).is_some_and(|s| !s.is_empty())
    }

    /// Drop a voxel from both maps, scrubbing every cross-reference to it.
    /// Returns the voxels whose justification ran through it.
    fn detach(&mut self, coord: VoxelCoord) -> BTreeSet<VoxelCoord> {
        if let Some(supporters) = self.justifiers.remove(&coord) {
            for supporter in supporters {
                let emptied = match self.dependents.get_mut(&supporter) {
                    Some(set) => {
                        set.remove(&coord);
                        set.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    self.dependents.remove(&supporter);
                }
            }
        }
        let reliers = self.dependents.remove(&coord).unwrap_or_default();
        for relier in &reliers {
            let emptied = match self.justifiers.get_mut(relier) {
                Some(set) => {
                    set.remove(&coord);
                    set.is_empty()
                }
                None => false,
            };
            if emptied {
                self.justifiers.remove(relier);
            }
        }
        reliers
    }

    /// Iterate the supporter -> reliers map, for consistency checks.
    pub fn supporters(&self) -> impl Iterator<Item = (&VoxelCoord, &BTreeSet<VoxelCoord>)> {
        self.dependents.iter()
    }

    /// The recorded supporters of a voxel, if any.
    pub fn justification_of(&self, coord: VoxelCoord) -> Option<&BTreeSet<VoxelCoord>> {
        self.justifiers.get(&coord)
    }
}

// ---------------------------------------------------------------------------
// Support relation
// ---------------------------------------------------------------------------

/// Neighbors that `a` holds up: in-plane filled 4-neighbors always; the voxel
/// above, and a filled voxel below, when `a` is Wall/Door. Fire spread walks
/// the same chain.
pub(crate) fn neighbors_supported_by(
    world: &VoxelWorld,
    a: VoxelCoord,
) -> SmallVec<[VoxelCoord; 6]> {
    let mut out = SmallVec::new();
    for n in a.plane_neighbors4() {
        if world.tile(n) != TileType::Empty {
            out.push(n);
        }
    }
    if world.tile(a).vertical_support() {
        let up = a.above();
        if world.tile(up) != TileType::Empty {
            out.push(up);
        }
        let down = a.below();
        if world.tile(down) != TileType::Empty {
            out.push(down);
        }
    }
    out
}

/// Neighbors that hold `v` up: filled in-plane 4-neighbors; a Wall/Door
/// directly below; a Wall/Door directly above.
fn neighbors_justifying(world: &VoxelWorld, v: VoxelCoord) -> SmallVec<[VoxelCoord; 6]> {
    let mut out = SmallVec::new();
    for n in v.plane_neighbors4() {
        if world.tile(n) != TileType::Empty {
            out.push(n);
        }
    }
    if world.tile(v.below()).vertical_support() {
        out.push(v.below());
    }
    if world.tile(v.above()).vertical_support() {
        out.push(v.above());
    }
    out
}

// ---------------------------------------------------------------------------
// Flood, removal, addition
// ---------------------------------------------------------------------------

/// Flood support from the boundary anchors over the whole grid. Voxels no
/// flood wave reaches are converted to Empty and returned for the damage
/// pass.
pub fn initialize(world: &mut VoxelWorld) -> (SupportGraph, Vec<VoxelCoord>) {
    let mut graph = SupportGraph::new(world.depth, world.width, world.height);
    let mut queue = VecDeque::new();
    for coord in world.coords() {
        if world.tile(coord) == TileType::Empty {
            graph.set_state(coord, SupportState::Collapsed);
        } else if world.is_edge(coord) {
            graph.set_state(coord, SupportState::Supported);
            queue.push_back(coord);
        }
    }
    while let Some(a) = queue.pop_front() {
        for b in neighbors_supported_by(world, a) {
            if graph.state(b) == SupportState::Unknown {
                graph.set_state(b, SupportState::Supported);
                graph.add_edge(a, b);
                queue.push_back(b);
            }
        }
    }
    let mut collapsed = Vec::new();
    for coord in world.coords() {
        if graph.state(coord) == SupportState::Unknown {
            graph.set_state(coord, SupportState::Collapsed);
            world.clear_tile(coord);
            collapsed.push(coord);
        }
    }
    if !collapsed.is_empty() {
        log::info!(
            "support flood: {} unreachable voxels collapsed",
            collapsed.len()
        );
    }
    (graph, collapsed)
}

/// Demolish a filled voxel and cascade the collapse through every voxel
/// whose recorded justification no longer holds. Returns the full batch of
/// voxels that flipped to Empty, the trigger first.
pub fn remove_voxel(
    world: &mut VoxelWorld,
    graph: &mut SupportGraph,
    trigger: VoxelCoord,
) -> SimResult<Vec<VoxelCoord>> {
    if world.tile(trigger) == TileType::Empty {
        return Err(SimError::impossible(format!(
            "remove at {trigger}: voxel is already empty"
        )));
    }
    let mut falling = vec![trigger];
    graph.set_state(trigger, SupportState::Unsupported);
    let mut stack: Vec<VoxelCoord> = graph.detach(trigger).into_iter().collect();
    while let Some(v) = stack.pop() {
        if graph.state(v) != SupportState::Supported {
            continue;
        }
        if graph.has_justification(v) {
            continue;
        }
        graph.set_state(v, SupportState::Unsupported);
        falling.push(v);
        for relier in graph.detach(v) {
            if relier != trigger {
                stack.push(relier);
            }
        }
    }
    for &v in &falling {
        graph.set_state(v, SupportState::Collapsed);
        world.clear_tile(v);
    }
    if falling.len() > 1 {
        log::debug!(
            "collapse cascade from {trigger}: {} voxels fell",
            falling.len()
        );
    }
    Ok(falling)
}

/// Build a voxel. A boundary target self-justifies and becomes a fresh
/// anchor for the supported neighbors around it; an interior target needs at
/// least one currently-supported justifying neighbor, and links with each of
/// them in both directions (boundary neighbors only ever take the supporter
/// side). On success the tile is placed and the graph updated; on error
/// nothing changed.
pub fn add_voxel(
    world: &mut VoxelWorld,
    graph: &mut SupportGraph,
    coord: VoxelCoord,
    tile: TileType,
    material: Material,
) -> SimResult<()> {
    if tile == TileType::Empty {
        return Err(SimError::impossible(format!(
            "add at {coord}: cannot build an empty tile"
        )));
    }
    if !world.in_bounds(coord) {
        return Err(SimError::impossible(format!(
            "add at {coord}: outside the grid"
        )));
    }
    if world.tile(coord) != TileType::Empty {
        return Err(SimError::impossible(format!(
            "add at {coord}: voxel is occupied"
        )));
    }
    if world.is_edge(coord) {
        world.place_tile(coord, tile, material);
        graph.set_state(coord, SupportState::Supported);
        for n in neighbors_supported_by(world, coord) {
            if graph.is_supported(n) && !world.is_edge(n) {
                graph.add_edge(coord, n);
            }
        }
        return Ok(());
    }
    let supporters: SmallVec<[VoxelCoord; 6]> = neighbors_justifying(world, coord)
        .into_iter()
        .filter(|&n| graph.is_supported(n))
        .collect();
    if supporters.is_empty() {
        return Err(SimError::impossible(format!(
            "add at {coord}: no supported neighbor to build from"
        )));
    }
    world.place_tile(coord, tile, material);
    graph.set_state(coord, SupportState::Supported);
    for n in supporters {
        graph.add_edge(n, coord);
        if !world.is_edge(n) {
            graph.add_edge(coord, n);
        }
    }
    Ok(())
}

/// Independent ground truth: the set of filled voxels reachable from a
/// boundary anchor in the current grid, recomputed from scratch. The cascade
/// in `remove_voxel` deliberately does not consult this.
pub fn flood_reachable(world: &VoxelWorld) -> BTreeSet<VoxelCoord> {
    let mut reached = BTreeSet::new();
    let mut queue = VecDeque::new();
    for coord in world.coords() {
        if world.tile(coord) != TileType::Empty && world.is_edge(coord) && reached.insert(coord) {
            queue.push_back(coord);
        }
    }
    while let Some(a) = queue.pop_front() {
        for b in neighbors_supported_by(world, a) {
            if reached.insert(b) {
                queue.push_back(b);
            }
        }
    }
    reached
}
