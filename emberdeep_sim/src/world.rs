// Dense 3D voxel grid for the dungeon world.
//
// Storage is struct-of-planes: one flat `Vec` per field (tile type, material,
// hit points, transparency, fire/visibility flags), all indexed by
// `(z * width + x) * height + y`, giving O(1) read/write access.
// Out-of-bounds reads return the `Empty` defaults; out-of-bounds writes are
// no-ops.
//
// The grid holds the per-voxel *state* only. The rules that mutate it live in
// the engines: `support.rs` decides what may stand, `light.rs` owns the light
// planes and exposure map, `fire.rs` burns hit points down. `transparent` is
// stored per voxel (not derived from the tile type) because smoke effects
// toggle it at runtime; the catalog default is restored when they let go.
//
// Unlike caches that can be rebuilt, every plane here is serialized — a
// reloaded grid must replay identically, including half-burned hit points and
// effect-darkened transparency.
//
// See also: `tile.rs` for the catalog defaults, `sim.rs` which owns the
// `VoxelWorld` as part of `SimState`.
//
// **Critical constraint: determinism.** All world modifications go through
// deterministic sim logic during a turn's resolution. No concurrent mutation.

use crate::tile::{self, Material, TileType};
use crate::types::VoxelCoord;
use serde::{Deserialize, Serialize};

/// Dense 3D voxel grid with per-voxel dynamic state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VoxelWorld {
    /// Number of stacked z-levels.
    pub depth: u32,
    pub width: u32,
    pub height: u32,
    /// Flat planes: index = (z * width + x) * height + y.
    tiles: Vec<TileType>,
    materials: Vec<Option<Material>>,
    hp: Vec<i32>,
    transparent: Vec<bool>,
    on_fire: Vec<bool>,
    visible: Vec<bool>,
    explored: Vec<bool>,
}

impl VoxelWorld {
    /// Create a new world filled with `Empty`.
    pub fn new(depth: u32, width: u32, height: u32) -> Self {
        let total = (depth as usize) * (width as usize) * (height as usize);
        Self {
            depth,
            width,
            height,
            tiles: vec![TileType::Empty; total],
            materials: vec![None; total],
            hp: vec![0; total],
            transparent: vec![TileType::Empty.transparent(); total],
            on_fire: vec![false; total],
            visible: vec![false; total],
            explored: vec![false; total],
        }
    }

    /// Check whether a coordinate is within bounds.
    pub fn in_bounds(&self, coord: VoxelCoord) -> bool {
        coord.z >= 0
            && coord.x >= 0
            && coord.y >= 0
            && (coord.z as u32) < self.depth
            && (coord.x as u32) < self.width
            && (coord.y as u32) < self.height
    }

    /// Whether the coordinate lies on the map boundary rim (the x/y edges of
    /// its level) or on bedrock (z = 0). These voxels anchor the support
    /// flood: support originates there and never needs justification.
    pub fn is_edge(&self, coord: VoxelCoord) -> bool {
        self.in_bounds(coord)
            && (coord.x == 0
                || coord.y == 0
                || coord.x as u32 == self.width - 1
                || coord.y as u32 == self.height - 1
                || coord.z == 0)
    }

    /// Convert a coordinate to a flat index. Returns `None` if out of bounds.
    fn index(&self, coord: VoxelCoord) -> Option<usize> {
        if self.in_bounds(coord) {
            let z = coord.z as usize;
            let x = coord.x as usize;
            let y = coord.y as usize;
            let w = self.width as usize;
            let h = self.height as usize;
            Some((z * w + x) * h + y)
        } else {
            None
        }
    }

    // -----------------------------------------------------------------------
    // Tile type and material
    // -----------------------------------------------------------------------

    /// Read a voxel's tile type. Returns `Empty` for out-of-bounds coordinates.
    pub fn tile(&self, coord: VoxelCoord) -> TileType {
        self.index(coord)
            .map(|i| self.tiles[i])
            .unwrap_or(TileType::Empty)
    }

    /// Read a voxel's material. `None` for Empty voxels and out of bounds.
    pub fn material(&self, coord: VoxelCoord) -> Option<Material> {
        self.index(coord).and_then(|i| self.materials[i])
    }

    /// Place a filled tile: sets type and material, resets hit points to the
    /// derived maximum and transparency to the catalog default. No-op out of
    /// bounds.
    pub fn place_tile(&mut self, coord: VoxelCoord, tile: TileType, material: Material) {
        if let Some(i) = self.index(coord) {
            self.tiles[i] = tile;
            self.materials[i] = Some(material);
            self.hp[i] = tile::max_hp(tile, material);
            self.transparent[i] = tile.transparent();
        }
    }

    /// Clear a voxel back to `Empty`: drops material, hit points, fire, and
    /// restores `Empty`'s transparency. Visibility flags are left as-is (an
    /// explored voxel stays explored after it collapses). No-op out of bounds.
    pub fn clear_tile(&mut self, coord: VoxelCoord) {
        if let Some(i) = self.index(coord) {
            self.tiles[i] = TileType::Empty;
            self.materials[i] = None;
            self.hp[i] = 0;
            self.transparent[i] = TileType::Empty.transparent();
            self.on_fire[i] = false;
        }
    }

    // -----------------------------------------------------------------------
    // Structural hit points
    // -----------------------------------------------------------------------

    /// Current structural hit points. 0 for Empty voxels and out of bounds.
    pub fn hp(&self, coord: VoxelCoord) -> i32 {
        self.index(coord).map(|i| self.hp[i]).unwrap_or(0)
    }

    pub fn set_hp(&mut self, coord: VoxelCoord, hp: i32) {
        if let Some(i) = self.index(coord) {
            self.hp[i] = hp;
        }
    }

    /// Derived maximum hit points for the voxel as currently placed.
    pub fn max_hp(&self, coord: VoxelCoord) -> i32 {
        match self.material(coord) {
            Some(m) => tile::max_hp(self.tile(coord), m),
            None => 0,
        }
    }

    // -----------------------------------------------------------------------
    // Movement and optics
    // -----------------------------------------------------------------------

    /// Whether an actor can occupy this voxel. Out of bounds is not walkable.
    pub fn is_walkable(&self, coord: VoxelCoord) -> bool {
        self.in_bounds(coord) && self.tile(coord).walkable()
    }

    /// Whether sight currently passes through this voxel. This is the
    /// per-voxel dynamic flag, which environment effects may have overridden;
    /// out of bounds is opaque.
    pub fn is_transparent(&self, coord: VoxelCoord) -> bool {
        self.index(coord).map(|i| self.transparent[i]).unwrap_or(false)
    }

    pub fn set_transparent(&mut self, coord: VoxelCoord, transparent: bool) {
        if let Some(i) = self.index(coord) {
            self.transparent[i] = transparent;
        }
    }

    /// Whether a particle can occupy/enter this voxel: anything but solid
    /// construction. Out of bounds is closed.
    pub fn is_open(&self, coord: VoxelCoord) -> bool {
        self.in_bounds(coord) && !matches!(self.tile(coord), TileType::Wall | TileType::Door)
    }

    // -----------------------------------------------------------------------
    // Fire flag
    // -----------------------------------------------------------------------

    pub fn is_on_fire(&self, coord: VoxelCoord) -> bool {
        self.index(coord).map(|i| self.on_fire[i]).unwrap_or(false)
    }

    pub fn set_on_fire(&mut self, coord: VoxelCoord, on_fire: bool) {
        if let Some(i) = self.index(coord) {
            self.on_fire[i] = on_fire;
        }
    }

    // -----------------------------------------------------------------------
    // Visibility bitmaps
    // -----------------------------------------------------------------------

    pub fn is_visible(&self, coord: VoxelCoord) -> bool {
        self.index(coord).map(|i| self.visible[i]).unwrap_or(false)
    }

    pub fn is_explored(&self, coord: VoxelCoord) -> bool {
        self.index(coord).map(|i| self.explored[i]).unwrap_or(false)
    }

    /// Mark a voxel currently seen; seen voxels become explored for good.
    pub fn mark_visible(&mut self, coord: VoxelCoord) {
        if let Some(i) = self.index(coord) {
            self.visible[i] = true;
            self.explored[i] = true;
        }
    }

    /// Clear the whole visible bitmap (start of a fresh field-of-view pass).
    pub fn clear_visible(&mut self) {
        self.visible.fill(false);
    }

    // -----------------------------------------------------------------------
    // Iteration helpers
    // -----------------------------------------------------------------------

    /// Iterate every coordinate in the grid in deterministic (z, x, y) scan
    /// order.
    pub fn coords(&self) -> impl Iterator<Item = VoxelCoord> + use<> {
        let (d, w, h) = (self.depth as i32, self.width as i32, self.height as i32);
        (0..d).flat_map(move |z| {
            (0..w).flat_map(move |x| (0..h).map(move |y| VoxelCoord::new(z, x, y)))
        })
    }

    /// The topmost non-Empty z in the column at (x, y), scanning from the sky
    /// down. `None` when the column is entirely Empty.
    pub fn column_top(&self, x: i32, y: i32) -> Option<i32> {
        (0..self.depth as i32)
            .rev()
            .find(|&z| self.tile(VoxelCoord::new(z, x, y)) != TileType::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_world_is_all_empty() {
        let world = VoxelWorld::new(3, 4, 4);
        for coord in world.coords() {
            assert_eq!(world.tile(coord), TileType::Empty);
            assert_eq!(world.material(coord), None);
            assert!(world.is_transparent(coord));
            assert!(!world.is_walkable(coord));
        }
    }

    #[test]
    fn place_and_clear_tile() {
        let mut world = VoxelWorld::new(4, 8, 8);
        let coord = VoxelCoord::new(2, 3, 5);
        world.place_tile(coord, TileType::Wall, Material::Wood);
        assert_eq!(world.tile(coord), TileType::Wall);
        assert_eq!(world.material(coord), Some(Material::Wood));
        assert_eq!(world.hp(coord), 60);
        assert!(!world.is_transparent(coord));
        // Neighbors untouched.
        assert_eq!(world.tile(VoxelCoord::new(2, 3, 6)), TileType::Empty);

        world.clear_tile(coord);
        assert_eq!(world.tile(coord), TileType::Empty);
        assert_eq!(world.material(coord), None);
        assert_eq!(world.hp(coord), 0);
        assert!(world.is_transparent(coord));
    }

    #[test]
    fn out_of_bounds_reads_return_empty_defaults() {
        let world = VoxelWorld::new(4, 4, 4);
        assert_eq!(world.tile(VoxelCoord::new(-1, 0, 0)), TileType::Empty);
        assert_eq!(world.tile(VoxelCoord::new(0, 4, 0)), TileType::Empty);
        assert_eq!(world.tile(VoxelCoord::new(100, 100, 100)), TileType::Empty);
        assert!(!world.is_walkable(VoxelCoord::new(-1, 0, 0)));
        // Out of bounds blocks sight and particles.
        assert!(!world.is_transparent(VoxelCoord::new(0, -1, 0)));
        assert!(!world.is_open(VoxelCoord::new(0, 0, -1)));
    }

    #[test]
    fn out_of_bounds_write_is_noop() {
        let mut world = VoxelWorld::new(4, 4, 4);
        // Should not panic.
        world.place_tile(VoxelCoord::new(-1, 0, 0), TileType::Wall, Material::Stone);
        world.clear_tile(VoxelCoord::new(100, 0, 0));
        world.set_on_fire(VoxelCoord::new(0, 0, 100), true);
    }

    #[test]
    fn edge_test_covers_rim_and_bedrock() {
        let world = VoxelWorld::new(5, 8, 8);
        // Rim of a mid level.
        assert!(world.is_edge(VoxelCoord::new(2, 0, 4)));
        assert!(world.is_edge(VoxelCoord::new(2, 7, 4)));
        assert!(world.is_edge(VoxelCoord::new(2, 4, 0)));
        assert!(world.is_edge(VoxelCoord::new(2, 4, 7)));
        // Bedrock.
        assert!(world.is_edge(VoxelCoord::new(0, 4, 4)));
        // Interior of a mid level is not an edge.
        assert!(!world.is_edge(VoxelCoord::new(2, 4, 4)));
        // The top of the world is not an anchor.
        assert!(!world.is_edge(VoxelCoord::new(4, 4, 4)));
        // Out of bounds is never an edge.
        assert!(!world.is_edge(VoxelCoord::new(-1, 0, 0)));
    }

    #[test]
    fn door_is_walkable_but_closed_to_particles() {
        let mut world = VoxelWorld::new(3, 4, 4);
        let coord = VoxelCoord::new(1, 1, 1);
        world.place_tile(coord, TileType::Door, Material::Wood);
        assert!(world.is_walkable(coord));
        assert!(!world.is_transparent(coord));
        assert!(!world.is_open(coord));
    }

    #[test]
    fn clear_tile_preserves_exploration() {
        let mut world = VoxelWorld::new(3, 4, 4);
        let coord = VoxelCoord::new(1, 2, 2);
        world.place_tile(coord, TileType::Floor, Material::Stone);
        world.mark_visible(coord);
        world.clear_visible();
        assert!(!world.is_visible(coord));
        assert!(world.is_explored(coord));
        world.clear_tile(coord);
        assert!(world.is_explored(coord));
    }

    #[test]
    fn column_top_scans_from_the_sky() {
        let mut world = VoxelWorld::new(6, 4, 4);
        assert_eq!(world.column_top(2, 2), None);
        world.place_tile(VoxelCoord::new(1, 2, 2), TileType::Floor, Material::Stone);
        world.place_tile(VoxelCoord::new(3, 2, 2), TileType::Wall, Material::Stone);
        assert_eq!(world.column_top(2, 2), Some(3));
    }

    #[test]
    fn serialization_roundtrip_keeps_dynamic_state() {
        let mut world = VoxelWorld::new(3, 4, 4);
        let coord = VoxelCoord::new(1, 1, 1);
        world.place_tile(coord, TileType::Wall, Material::Wood);
        world.set_hp(coord, 17);
        world.set_on_fire(coord, true);
        world.set_transparent(coord, true);
        world.mark_visible(coord);

        let json = serde_json::to_string(&world).unwrap();
        let restored: VoxelWorld = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.tile(coord), TileType::Wall);
        assert_eq!(restored.hp(coord), 17);
        assert!(restored.is_on_fire(coord));
        assert!(restored.is_transparent(coord));
        assert!(restored.is_explored(coord));
    }
}
