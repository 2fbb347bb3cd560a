//! Combat module - attack data, the attack timeline engine, hit volumes,
//! projectiles and damage.

pub mod attack;
mod components;
pub mod input;
mod plugin;
pub mod projectile;
mod systems;
pub mod timeline;

pub use attack::{load_attack_library, AttackDefinition, AttackLibrary, ComboLink, Phase, ProjectileSpec};
pub use components::*;
pub use input::{InputBinding, TriggerBindings, HEAVY_ATTACK, PRIMARY_ATTACK};
pub use plugin::CombatPlugin;
pub use projectile::{Projectile, ProjectileLaunchEvent};
pub use timeline::{AttackRuntime, ComboTriggers, NoTriggers, TimelineEvent, TimelineState, TriggerSource};
