//! Simulation state definitions.
//!
//! Combat and AI systems only advance while the simulation is `Running`.
//! Pausing freezes every agent loop and every attack timeline at a tick
//! boundary, so nothing resumes mid-step.

use bevy::prelude::*;

/// Top-level simulation state.
#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum SimState {
    /// Fixed-rate combat tick is advancing.
    #[default]
    Running,
    /// Tick is frozen; the world stays visible.
    Paused,
}
