// Actors as the collapse and fall passes see them.
//
// Combat, AI, and movement live outside the simulation core; what remains
// here is the minimal body the world can hurt: a position, hit points, and
// the defense value debris damage is reduced by. The sim never moves an
// actor except by dropping it.

use crate::types::VoxelCoord;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub position: VoxelCoord,
    pub hp: i32,
    pub max_hp: i32,
    /// Flat reduction applied to debris damage. Falls ignore it.
    pub defense: i32,
    pub alive: bool,
}

impl Actor {
    pub fn new(name: impl Into<String>, position: VoxelCoord, max_hp: i32, defense: i32) -> Self {
        Self {
            name: name.into(),
            position,
            hp: max_hp,
            max_hp,
            defense,
            alive: true,
        }
    }

    /// Apply damage that has already been reduced and floored by the caller.
    /// Returns true when this kills the actor.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        self.hp -= amount;
        if self.hp <= 0 {
            self.hp = 0;
            self.alive = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_floors_hp_and_marks_death() {
        let mut actor = Actor::new("miner", VoxelCoord::new(1, 2, 3), 20, 2);
        assert!(!actor.take_damage(12));
        assert_eq!(actor.hp, 8);
        assert!(actor.alive);
        assert!(actor.take_damage(30));
        assert_eq!(actor.hp, 0);
        assert!(!actor.alive);
    }
}
