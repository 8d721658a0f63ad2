// Simulation events: structured notifications of what a turn did.
//
// Engines push events into a buffer on the simulation state as they resolve;
// the embedding game drains the buffer after each mutation or turn and turns
// them into messages, animations, or triggers. Events are facts about state
// changes that already happened — consuming or ignoring them never alters
// the simulation.

use crate::types::{ActorId, ParticleId, VoxelCoord};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Turn counter value when the event fired. 0 for initialization.
    pub turn: u64,
    pub kind: SimEventKind,
}

impl SimEvent {
    pub fn new(turn: u64, kind: SimEventKind) -> Self {
        Self { turn, kind }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEventKind {
    /// A voxel flipped filled -> Empty, by demolition or cascade.
    VoxelCollapsed { at: VoxelCoord },
    /// Falling debris reached an actor. `damage` is 0 when their defense
    /// absorbed the whole hit; the event still fires.
    DebrisHit { actor: ActorId, damage: i32 },
    /// An actor dropped to a lower level when their footing vanished.
    ActorFell {
        actor: ActorId,
        levels: i32,
        damage: i32,
    },
    /// An actor fell out of the grid entirely; they are removed.
    ActorLost { actor: ActorId },
    ActorDied { actor: ActorId },
    /// A smoldering voxel crossed the ignition threshold.
    VoxelIgnited { at: VoxelCoord },
    /// A burning voxel set a neighbor smoldering.
    FireSpread { from: VoxelCoord, to: VoxelCoord },
    /// Fire consumed the voxel's hit points entirely.
    VoxelBurnedAway { at: VoxelCoord },
    FireExtinguished { at: VoxelCoord },
    /// A particle's density decayed to nothing and its effect was retracted.
    ParticleDissipated { particle: ParticleId, at: VoxelCoord },
}

impl fmt::Display for SimEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VoxelCollapsed { at } => write!(f, "the structure at {at} collapses"),
            Self::DebrisHit { actor, damage: 0 } => {
                write!(f, "debris rains down on {actor} but does no damage")
            }
            Self::DebrisHit { actor, damage } => {
                write!(f, "debris hits {actor} for {damage} damage")
            }
            Self::ActorFell {
                actor,
                levels,
                damage,
            } => write!(f, "{actor} falls {levels} levels, taking {damage} damage"),
            Self::ActorLost { actor } => write!(f, "{actor} plummets out of sight"),
            Self::ActorDied { actor } => write!(f, "{actor} dies"),
            Self::VoxelIgnited { at } => write!(f, "the tile at {at} catches fire"),
            Self::FireSpread { from, to } => write!(f, "fire spreads from {from} to {to}"),
            Self::VoxelBurnedAway { at } => write!(f, "the tile at {at} burns away"),
            Self::FireExtinguished { at } => write!(f, "the fire at {at} goes out"),
            Self::ParticleDissipated { at, .. } => write!(f, "the cloud at {at} dissipates"),
        }
    }
}
