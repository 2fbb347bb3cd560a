//! Crawler Combat - melee combat AI and attack timelines for a first-person dungeon crawler in Bevy.
//!
//! # Architecture
//!
//! The crate is organized into plugins, each handling a specific aspect:
//!
//! - **Core**: Simulation state, fixed-tick ordering, global events, curves
//! - **Player**: First-person movement and camera, the player's weapon
//! - **Combat**: Attack data, the attack timeline engine, hit volumes, damage
//! - **AI**: Behavior profiles, the combat orchestrator and its behaviors

pub mod ai;
pub mod combat;
pub mod core;
pub mod player;

use bevy::prelude::*;

/// Main plugin that adds all sub-plugins.
///
/// Physics is left to the host: add `RapierPhysicsPlugin` alongside this.
pub struct CrawlerCombatPlugin;

impl Plugin for CrawlerCombatPlugin {
    fn build(&self, app: &mut App) {
        app
            // Core systems (must be first)
            .add_plugins(core::CorePlugin)

            // Player systems
            .add_plugins(player::PlayerPlugin)

            // Combat systems
            .add_plugins(combat::CombatPlugin)

            // AI systems
            .add_plugins(ai::AiPlugin);
    }
}
