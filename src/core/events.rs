//! Global events used for cross-system communication.
//!
//! Events keep the weapon, damage and AI systems decoupled. Every event here
//! is delivered once to each reader; there is no global "current target" or
//! shared mutable state between agents. A recipient reacts by mutating only
//! its own components.

use bevy::prelude::*;

/// Element types for damage calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize)]
pub enum Element {
    #[default]
    Physical,
    Fire,
    Ice,
    Lightning,
    Poison,
    Holy,
    Dark,
}

/// Sent when a hit volume (or anything else) deals damage.
///
/// The damage system listens for these events and applies the actual
/// health reduction, taking resistances into account.
#[derive(Event, Debug, Clone)]
pub struct DamageEvent {
    /// Entity receiving damage
    pub target: Entity,
    /// Entity that caused the damage
    pub source: Entity,
    /// Damage amount, already scaled by the attack's damage multiplier
    pub amount: f32,
    /// Element type for resistance calculation
    pub element: Element,
    /// World-space point of contact
    pub hit_point: Vec3,
    /// Knockback direction and force
    pub knockback: Vec3,
}

/// Sent after damage has been applied to a living entity.
///
/// The AI listens for this to investigate the point of impact when the
/// attacker is out of sight.
#[derive(Event, Debug, Clone)]
pub struct DamagedEvent {
    pub target: Entity,
    pub source: Entity,
    pub amount: f32,
    pub hit_point: Vec3,
}

/// Sent when an entity dies (health reaches 0).
#[derive(Event, Debug, Clone)]
pub struct DeathEvent {
    /// Entity that died
    pub entity: Entity,
    /// Entity that killed them (if any)
    pub killed_by: Option<Entity>,
}

/// Sent when an agent binds a target and starts its combat loop.
#[derive(Event, Debug, Clone)]
pub struct CombatEngagedEvent {
    pub agent: Entity,
    pub target: Entity,
}

/// Sent whenever an agent leaves combat.
///
/// Patrol or idle controllers resume from this.
#[derive(Event, Debug, Clone)]
pub struct CombatDisengagedEvent {
    pub agent: Entity,
}

/// Fire-and-forget request for nearby allies to join a fight.
#[derive(Event, Debug, Clone)]
pub struct AllyAlertEvent {
    /// Agent that raised the alert
    pub caller: Entity,
    /// Target the caller engaged
    pub target: Entity,
    /// Position the alert was raised from
    pub origin: Vec3,
    /// Allies within this radius respond
    pub radius: f32,
}
