//! AI module - the combat behavior orchestrator and everything it drives.
//!
//! The decision logic (orchestrator, selector, behaviors, perception) is
//! plain Rust over the traits in [`facade`]; the Bevy systems only build an
//! [`AgentEnv`] per agent per tick and forward what comes back.

pub mod behaviors;
mod components;
pub mod data;
pub mod facade;
pub mod nav;
pub mod orchestrator;
pub mod patrol;
pub mod perception;
mod plugin;
pub mod profile;
pub mod selector;
mod spawning;
mod systems;

pub use behaviors::{BehaviorKind, Directive};
pub use components::*;
pub use data::{EnemyDefinition, EnemyRegistry};
pub use facade::{AgentEnv, Navigator, TargetScanner, TargetView, Vision};
pub use nav::{NavAgent, NavArea};
pub use orchestrator::{CombatOrchestrator, EndReason, EnqueueError, Notice};
pub use patrol::{Patrol, PatrolConfig};
pub use perception::in_combat_vision;
pub use plugin::AiPlugin;
pub use profile::{BehaviorId, BehaviorProfile, OrchestratorSettings, ProfileRegistry, WeightedBehavior};
pub use selector::{choose_weighted, select_behavior};
pub use spawning::spawn_enemy;
pub use systems::{RapierVision, WorldScanner};
