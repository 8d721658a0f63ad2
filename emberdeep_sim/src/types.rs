// Core types shared across the simulation.
//
// Defines the spatial coordinate (`VoxelCoord`) and strongly-typed entity
// identifiers. All types derive `Serialize` and `Deserialize` so the whole
// simulation state can be saved and reloaded verbatim.
//
// **Critical constraint: determinism.** Entity IDs are plain monotonic
// counters handed out by `SimState` in creation order. They double as the
// iteration tie-break for every per-entity pass, so do not generate them from
// clocks, randomness, or OS entropy.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A position in the 3D voxel grid, addressed as (z, x, y).
///
/// The grid is a stack of 2D levels:
/// - Z: up (positive) / down (negative) — level index, sky at high z
/// - X: east/west across a level
/// - Y: north/south across a level
///
/// Field order matters: the derived `Ord` sorts by level first, so ordered
/// iteration over coordinate-keyed maps walks the world bottom-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelCoord {
    pub z: i32,
    pub x: i32,
    pub y: i32,
}

impl VoxelCoord {
    pub const fn new(z: i32, x: i32, y: i32) -> Self {
        Self { z, x, y }
    }

    /// The voxel directly above (one level up).
    pub const fn above(self) -> Self {
        Self::new(self.z + 1, self.x, self.y)
    }

    /// The voxel directly below (one level down).
    pub const fn below(self) -> Self {
        Self::new(self.z - 1, self.x, self.y)
    }

    /// The four in-plane (same level) neighbors, in fixed scan order.
    pub const fn plane_neighbors4(self) -> [Self; 4] {
        [
            Self::new(self.z, self.x - 1, self.y),
            Self::new(self.z, self.x + 1, self.y),
            Self::new(self.z, self.x, self.y - 1),
            Self::new(self.z, self.x, self.y + 1),
        ]
    }

    /// The eight in-plane neighbors (diagonals included), in fixed scan order.
    pub const fn plane_neighbors8(self) -> [Self; 8] {
        [
            Self::new(self.z, self.x - 1, self.y - 1),
            Self::new(self.z, self.x - 1, self.y),
            Self::new(self.z, self.x - 1, self.y + 1),
            Self::new(self.z, self.x, self.y - 1),
            Self::new(self.z, self.x, self.y + 1),
            Self::new(self.z, self.x + 1, self.y - 1),
            Self::new(self.z, self.x + 1, self.y),
            Self::new(self.z, self.x + 1, self.y + 1),
        ]
    }

    /// Manhattan distance between two coordinates.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        ((self.z - other.z).unsigned_abs())
            + ((self.x - other.x).unsigned_abs())
            + ((self.y - other.y).unsigned_abs())
    }
}

impl fmt::Display for VoxelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.z, self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Strongly-typed entity ID wrappers — monotonic creation counters
// ---------------------------------------------------------------------------

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

entity_id!(/// Unique identifier for an actor.
ActorId);
entity_id!(/// Unique identifier for a live particle.
ParticleId);
entity_id!(/// Unique identifier for a placed fixture.
FixtureId);

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Serialize a coordinate-keyed `BTreeMap` as a list of `[key, value]` pairs.
///
/// JSON object keys must be strings, so maps keyed by `VoxelCoord` cannot go
/// through serde_json's default map representation. Annotate them with
/// `#[serde(with = "map_as_pairs")]` instead.
pub mod map_as_pairs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(K, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
