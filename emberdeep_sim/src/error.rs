// Simulation error taxonomy.
//
// Two tiers, matching how callers recover:
// - `Impossible`: the action layer asked for something the simulation rejects
//   without side effects (building on thin air, digging out a voxel that is
//   already empty). The caller re-prompts or ignores it.
// - `Invariant`: internal bookkeeping is out of sync (a duplicate fire light
//   snapshot, a support-state mismatch). Not locally recoverable; the
//   operation aborts and the error surfaces loudly instead of continuing on
//   corrupted state.

use thiserror::Error;

/// Errors surfaced by the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// Rejected player/AI action; the world was not modified.
    #[error("impossible operation: {0}")]
    Impossible(String),

    /// Internal consistency violation; the current operation was aborted.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl SimError {
    pub fn impossible(msg: impl Into<String>) -> Self {
        Self::Impossible(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;
