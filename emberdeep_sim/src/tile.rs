// Tile catalog: the static properties of each voxel type.
//
// Every voxel in the grid carries a `TileType` and (when filled) a `Material`.
// The type fixes the movement/optics defaults — whether the tile can be walked
// over and whether it blocks sight — and a structural multiplier; the material
// fixes the base hit points. `max_hp = material base × type multiplier`.
//
// Note the two deliberate asymmetries in the catalog: `Empty` is transparent
// but not walkable (open air you can see through but not stand in), and
// `Door` is walkable but not transparent (you pass through it, sight does
// not).
//
// See also: `world.rs` which stores these per voxel, `support.rs` for how
// Wall/Door participate in the vertical support chain.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tile types
// ---------------------------------------------------------------------------

/// The type of a single voxel in the world grid.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TileType {
    /// Open air. Not walkable, fully transparent, no material.
    #[default]
    Empty,
    /// A walkable surface cell — the interior of rooms and corridors.
    Floor,
    /// Solid construction. Blocks movement and sight; carries vertical support.
    Wall,
    /// Walkable but opaque. Carries vertical support like a wall.
    Door,
    /// Stairs leading up to the next level.
    UpStairs,
    /// Stairs leading down to the level below.
    DownStairs,
}

impl TileType {
    /// Whether an actor can occupy this tile.
    pub fn walkable(self) -> bool {
        match self {
            TileType::Empty | TileType::Wall => false,
            TileType::Floor | TileType::Door | TileType::UpStairs | TileType::DownStairs => true,
        }
    }

    /// Whether sight passes through this tile by default. Environment
    /// effects may override the per-voxel flag at runtime (see `effects.rs`);
    /// this is the catalog value restored when they let go.
    pub fn transparent(self) -> bool {
        match self {
            TileType::Wall | TileType::Door => false,
            TileType::Empty | TileType::Floor | TileType::UpStairs | TileType::DownStairs => true,
        }
    }

    /// Whether this tile participates in the vertical support chain: a
    /// Wall/Door holds up the voxel resting on it and the voxel hanging
    /// beneath it. Everything else only passes support in-plane.
    pub fn vertical_support(self) -> bool {
        matches!(self, TileType::Wall | TileType::Door)
    }

    /// Structural hit point multiplier applied to the material base.
    pub fn hp_multiplier(self) -> i32 {
        match self {
            TileType::Empty => 0,
            TileType::Wall => 2,
            TileType::Floor | TileType::Door | TileType::UpStairs | TileType::DownStairs => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Materials
// ---------------------------------------------------------------------------

/// What a filled voxel is made of. Determines base hit points and whether
/// fire can take hold (only Wood burns).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Material {
    Wood,
    Stone,
    Metal,
}

impl Material {
    /// Base structural hit points before the tile-type multiplier.
    pub fn base_hp(self) -> i32 {
        match self {
            Material::Wood => 30,
            Material::Stone => 100,
            Material::Metal => 150,
        }
    }

    pub fn flammable(self) -> bool {
        matches!(self, Material::Wood)
    }
}

/// Derived maximum hit points for a tile/material pairing.
pub fn max_hp(tile: TileType, material: Material) -> i32 {
    material.base_hp() * tile.hp_multiplier()
}
