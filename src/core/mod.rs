//! Core module - simulation state, events, curves and shared error types.
//!
//! This module provides the foundation that the combat and AI systems build upon.

mod error;
mod events;
mod plugin;
mod states;
mod tween;

pub use error::ConfigError;
pub use events::*;
pub use plugin::{CombatDataPaths, CombatSet, CorePlugin};
pub use states::*;
pub use tween::*;
