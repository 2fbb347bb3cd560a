//! AI plugin - registers data loading, spawning and the orchestrator systems.

use bevy::prelude::*;

use super::data::EnemyRegistry;
use super::nav::NavArea;
use super::patrol;
use super::profile::ProfileRegistry;
use super::spawning::spawn_enemies_at_points;
use super::systems;
use crate::core::CombatSet;

/// AI plugin - handles enemy spawning, engagement, the combat loop and patrols.
pub struct AiPlugin;

impl Plugin for AiPlugin {
    fn build(&self, app: &mut App) {
        app
            .init_resource::<ProfileRegistry>()
            .init_resource::<EnemyRegistry>()
            .init_resource::<NavArea>()

            // Load definitions before anything is spawned
            .add_systems(PreStartup, (systems::load_profiles, systems::load_enemies))
            .add_systems(Update, spawn_enemies_at_points)

            .add_systems(
                FixedUpdate,
                (
                    systems::halt_dead_agents,
                    systems::investigate_on_damage,
                    systems::deliver_ally_alerts,
                    systems::detect_engagement,
                )
                    .chain()
                    .in_set(CombatSet::Perception),
            )
            .add_systems(
                FixedUpdate,
                (
                    systems::drive_orchestrators,
                    systems::forward_notices,
                    patrol::resume_patrols,
                    patrol::walk_patrols,
                )
                    .chain()
                    .in_set(CombatSet::Decision),
            )
            .add_systems(
                FixedUpdate,
                systems::move_nav_agents.in_set(CombatSet::Movement),
            );
    }
}
