// Placed fixtures: braziers that boost light and vents that emit gas.
//
// A fixture occupies one walkable, supported voxel and persists until
// removed. A brazier owns an `IncreaseVisibility` effect that is activated
// exactly once at placement and withdrawn at removal; overlapping braziers
// must be removed in reverse placement order (the LIFO contract in
// `effects.rs`). A vent owns a particle template and emits an instance every
// `interval` turns; an emission into a voxel that already hosts a same-kind
// cloud merges into it, so each (voxel, kind) pair keeps a single effect
// writer.
//
// See also: `sim.rs` for placement validation and brazier activation.

use crate::effects::{EnvEffect, IncreaseVisibility};
use crate::particles::{Particle, ParticleTemplate};
use crate::types::{FixtureId, ParticleId, VoxelCoord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fixture {
    pub name: String,
    pub position: VoxelCoord,
    pub kind: FixtureKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FixtureKind {
    /// A standing light source. The owned effect is live from placement to
    /// removal.
    Brazier { effect: EnvEffect },
    /// A gas emitter on a fixed cadence.
    Vent {
        template: ParticleTemplate,
        interval: u32,
        counter: u32,
    },
}

impl Fixture {
    pub fn brazier(name: impl Into<String>, at: VoxelCoord) -> Self {
        Self {
            name: name.into(),
            position: at,
            kind: FixtureKind::Brazier {
                effect: EnvEffect::IncreaseVisibility(IncreaseVisibility::new()),
            },
        }
    }

    pub fn vent(
        name: impl Into<String>,
        at: VoxelCoord,
        template: ParticleTemplate,
        interval: u32,
    ) -> Self {
        Self {
            name: name.into(),
            position: at,
            kind: FixtureKind::Vent {
                template,
                interval,
                counter: 0,
            },
        }
    }
}

/// Advance every vent by one turn, emitting where a cadence comes due.
/// Runs after particle spread so a fresh emission is not spread on the turn
/// it appears; the reconciliation pass afterwards activates its effect.
pub fn vent_tick(
    fixtures: &mut BTreeMap<FixtureId, Fixture>,
    particles: &mut BTreeMap<ParticleId, Particle>,
    next_particle_id: &mut u64,
) {
    for fixture in fixtures.values_mut() {
        let FixtureKind::Vent {
            template,
            interval,
            counter,
        } = &mut fixture.kind
        else {
            continue;
        };
        *counter += 1;
        if *counter < *interval {
            continue;
        }
        *counter = 0;
        let existing = particles
            .values_mut()
            .find(|p| p.position == fixture.position && p.kind == template.kind);
        match existing {
            Some(cloud) => cloud.density += template.density,
            None => {
                let id = ParticleId(*next_particle_id);
                *next_particle_id += 1;
                particles.insert(id, template.instantiate(fixture.position));
            }
        }
    }
}
