//! Player module - the first-person wielder the AI fights.

mod components;
mod movement;
mod plugin;

pub use components::*;
pub use movement::{spawn_player, PlayerCamera};
pub use plugin::PlayerPlugin;
