//! Player plugin - movement, camera and cursor handling.

use bevy::prelude::*;

use super::components::*;
use super::movement;

/// Player plugin - handles player movement and camera.
///
/// Spawning is left to the host via [`super::spawn_player`].
pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlayerConfig>();
        movement::setup_movement_systems(app);
    }
}
