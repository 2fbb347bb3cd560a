//! Named trigger glue between raw input and the attack timeline.
//!
//! Raw button state is sampled every frame and folded into [`ComboTriggers`];
//! the fixed-tick timeline consumes and clears it, so a press is seen by
//! exactly one tick.

use bevy::prelude::*;

use super::components::{AttackCooldown, Dead, Weapon};
use super::timeline::{AttackRuntime, ComboTriggers, TriggerSource};
use crate::player::Player;

pub const PRIMARY_ATTACK: &str = "primary_attack";
pub const HEAVY_ATTACK: &str = "heavy_attack";

/// A physical input that fires a named trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputBinding {
    Mouse(MouseButton),
    Key(KeyCode),
}

/// Trigger name -> physical input.
#[derive(Resource, Debug, Clone)]
pub struct TriggerBindings {
    pub bindings: Vec<(String, InputBinding)>,
}

impl Default for TriggerBindings {
    fn default() -> Self {
        Self {
            bindings: vec![
                (PRIMARY_ATTACK.to_string(), InputBinding::Mouse(MouseButton::Left)),
                (HEAVY_ATTACK.to_string(), InputBinding::Mouse(MouseButton::Right)),
                ("combo_slot_1".to_string(), InputBinding::Key(KeyCode::Digit1)),
                ("combo_slot_2".to_string(), InputBinding::Key(KeyCode::Digit2)),
                ("combo_slot_3".to_string(), InputBinding::Key(KeyCode::Digit3)),
            ],
        }
    }
}

/// Fold this frame's presses into the trigger set.
pub fn gather_triggers(
    bindings: Res<TriggerBindings>,
    mouse: Option<Res<ButtonInput<MouseButton>>>,
    keyboard: Option<Res<ButtonInput<KeyCode>>>,
    mut triggers: ResMut<ComboTriggers>,
) {
    for (name, binding) in &bindings.bindings {
        let pressed = match binding {
            InputBinding::Mouse(button) => mouse
                .as_ref()
                .is_some_and(|mouse| mouse.just_pressed(*button)),
            InputBinding::Key(key) => keyboard
                .as_ref()
                .is_some_and(|keyboard| keyboard.just_pressed(*key)),
        };
        if pressed {
            triggers.press(name.clone());
        }
    }
}

/// Start the opener when the primary trigger fires on an idle, rested weapon.
///
/// Presses during an attack are left to the timeline's combo poll. A press
/// that starts the opener is used up and never also counts as a combo.
pub fn player_attack_input(
    mut triggers: ResMut<ComboTriggers>,
    mut query: Query<(&mut AttackRuntime, &Weapon, &mut AttackCooldown), (With<Player>, Without<Dead>)>,
) {
    if !triggers.triggered(PRIMARY_ATTACK) {
        return;
    }

    let mut opened = false;
    for (mut runtime, weapon, mut cooldown) in query.iter_mut() {
        if runtime.is_attacking() || cooldown.0 > 0.0 {
            continue;
        }
        if runtime.play_current() {
            cooldown.0 = weapon.attack_cooldown;
            opened = true;
        }
    }
    if opened {
        triggers.consume(PRIMARY_ATTACK);
    }
}

/// Presses gathered before a pause never reach the next tick.
pub fn drop_pending_triggers(mut triggers: ResMut<ComboTriggers>) {
    triggers.clear();
}

/// Count attack cooldowns down.
pub fn tick_attack_cooldowns(time: Res<Time>, mut query: Query<&mut AttackCooldown>) {
    for mut cooldown in query.iter_mut() {
        if cooldown.0 > 0.0 {
            cooldown.0 = (cooldown.0 - time.delta_secs()).max(0.0);
        }
    }
}
