//! Core plugin that sets up simulation state, schedule ordering and global events.

use bevy::prelude::*;

use super::events::*;
use super::states::*;

/// Fixed-tick ordering shared by the combat and AI plugins.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum CombatSet {
    /// Player triggers and attack starts
    Input,
    /// Attack timelines advance
    Timeline,
    /// Engagement detection and damage reactions
    Perception,
    /// Orchestrators select and run behaviors
    Decision,
    /// Navigation agents move
    Movement,
    /// Hit registration, damage and death
    Damage,
}

/// Where the data loaders look for RON files.
#[derive(Resource, Debug, Clone)]
pub struct CombatDataPaths {
    pub attacks_dir: String,
    pub profiles_dir: String,
    pub enemies_dir: String,
}

impl Default for CombatDataPaths {
    fn default() -> Self {
        Self {
            attacks_dir: "assets/data/attacks".to_string(),
            profiles_dir: "assets/data/behavior_profiles".to_string(),
            enemies_dir: "assets/data/enemies".to_string(),
        }
    }
}

/// Core plugin - must be added first as other plugins depend on it.
///
/// This plugin sets up:
/// - Simulation state (Running / Paused)
/// - The [`CombatSet`] chain on `FixedUpdate`
/// - Global events (damage, death, engagement notifications)
pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        app
            .init_state::<SimState>()
            .init_resource::<CombatDataPaths>()

            // Register global events
            .add_event::<DamageEvent>()
            .add_event::<DamagedEvent>()
            .add_event::<DeathEvent>()
            .add_event::<CombatEngagedEvent>()
            .add_event::<CombatDisengagedEvent>()
            .add_event::<AllyAlertEvent>()

            // Everything combat-related is simulated at the fixed rate
            .configure_sets(
                FixedUpdate,
                (
                    CombatSet::Input,
                    CombatSet::Timeline,
                    CombatSet::Perception,
                    CombatSet::Decision,
                    CombatSet::Movement,
                    CombatSet::Damage,
                )
                    .chain()
                    .run_if(in_state(SimState::Running)),
            )

            // Pause/unpause with Escape key
            .add_systems(Update, handle_pause_input);
    }
}

/// Handle Escape key to pause/unpause the simulation.
fn handle_pause_input(
    keyboard: Option<Res<ButtonInput<KeyCode>>>,
    current_state: Res<State<SimState>>,
    mut next_state: ResMut<NextState<SimState>>,
) {
    let Some(keyboard) = keyboard else {
        return;
    };

    if keyboard.just_pressed(KeyCode::Escape) {
        match current_state.get() {
            SimState::Running => next_state.set(SimState::Paused),
            SimState::Paused => next_state.set(SimState::Running),
        }
    }
}
