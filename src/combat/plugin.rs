//! Combat plugin - attack timelines, hit volumes, projectiles and damage.

use bevy::prelude::*;

use super::attack::AttackLibrary;
use super::input::{self, TriggerBindings};
use super::projectile::{self, ProjectileLaunchEvent};
use super::systems;
use super::timeline::ComboTriggers;
use crate::core::{CombatSet, SimState};

/// Combat plugin - handles every weapon wielder, player or AI.
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app
            // Resources
            .init_resource::<AttackLibrary>()
            .init_resource::<ComboTriggers>()
            .init_resource::<TriggerBindings>()
            .add_event::<ProjectileLaunchEvent>()

            // Data
            .add_systems(PreStartup, systems::load_attacks)

            // Raw input is sampled per frame, consumed per fixed tick
            .add_systems(Update, input::gather_triggers.run_if(in_state(SimState::Running)))
            .add_systems(OnEnter(SimState::Paused), input::drop_pending_triggers)

            .add_systems(
                FixedUpdate,
                (input::tick_attack_cooldowns, input::player_attack_input)
                    .chain()
                    .in_set(CombatSet::Input),
            )
            .add_systems(
                FixedUpdate,
                (
                    systems::advance_attack_timelines,
                    systems::sync_hit_volumes,
                    projectile::spawn_projectiles,
                )
                    .chain()
                    .in_set(CombatSet::Timeline),
            )
            .add_systems(
                FixedUpdate,
                projectile::move_projectiles.in_set(CombatSet::Movement),
            )
            .add_systems(
                FixedUpdate,
                (
                    systems::detect_weapon_hits,
                    projectile::detect_projectile_hits,
                    systems::apply_damage,
                    systems::check_deaths,
                    systems::despawn_dead,
                )
                    .chain()
                    .in_set(CombatSet::Damage),
            );
    }
}
