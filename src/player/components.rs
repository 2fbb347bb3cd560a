//! Player-related components.

use bevy::prelude::*;

/// Marker component for the player entity.
#[derive(Component)]
pub struct Player;

/// Vertical speed carried between frames; horizontal motion is recomputed from input.
#[derive(Component, Default, Debug)]
pub struct Fall {
    pub grounded: bool,
    pub speed: f32,
}

/// Tuning for the first-person wielder.
#[derive(Resource, Debug, Clone)]
pub struct PlayerConfig {
    /// Radians of turn per pixel of mouse motion
    pub look_sensitivity: f32,
    pub invert_y: bool,
    pub walk_speed: f32,
    pub sprint_multiplier: f32,
    pub gravity: f32,
    pub max_health: f32,
    pub weapon_name: String,
    pub weapon_damage: f32,
    /// Attack the player's timeline opens with
    pub opener: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            look_sensitivity: 0.0015,
            invert_y: false,
            walk_speed: 5.0,
            sprint_multiplier: 1.5,
            gravity: 15.0,
            max_health: 100.0,
            weapon_name: "Short Sword".to_string(),
            weapon_damage: 12.0,
            opener: "slash".to_string(),
        }
    }
}
