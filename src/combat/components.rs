//! Combat-related components.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use std::collections::HashSet;

// Re-export from core to avoid duplication
pub use crate::core::{DamageEvent, DamagedEvent, DeathEvent, Element};

/// Component for entities that can take damage.
#[derive(Component, Debug, Clone)]
pub struct Health {
    pub current: f32,
    pub maximum: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            maximum: max,
        }
    }

    pub fn take_damage(&mut self, amount: f32) -> f32 {
        let actual = amount.max(0.0).min(self.current);
        self.current -= actual;
        actual
    }

    pub fn heal(&mut self, amount: f32) -> f32 {
        let actual = amount.max(0.0).min(self.maximum - self.current);
        self.current += actual;
        actual
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }

    pub fn percentage(&self) -> f32 {
        self.current / self.maximum
    }
}

/// Elemental resistances (percentage reduction, 0.0 to 1.0).
#[derive(Component, Default, Debug, Clone)]
pub struct Resistances {
    pub physical: f32,
    pub fire: f32,
    pub ice: f32,
    pub lightning: f32,
    pub poison: f32,
    pub holy: f32,
    pub dark: f32,
}

impl Resistances {
    pub fn get(&self, element: Element) -> f32 {
        match element {
            Element::Physical => self.physical,
            Element::Fire => self.fire,
            Element::Ice => self.ice,
            Element::Lightning => self.lightning,
            Element::Poison => self.poison,
            Element::Holy => self.holy,
            Element::Dark => self.dark,
        }
    }
}

/// Weapon stats carried by a wielder.
#[derive(Component, Debug, Clone)]
pub struct Weapon {
    pub name: String,
    pub base_damage: f32,
    pub element: Element,
    /// Minimum seconds between two player-started attacks
    pub attack_cooldown: f32,
}

impl Default for Weapon {
    fn default() -> Self {
        Self {
            name: "Fists".to_string(),
            base_damage: 5.0,
            element: Element::Physical,
            attack_cooldown: 0.5,
        }
    }
}

/// Seconds until the wielder may start another attack by input.
#[derive(Component, Default, Debug)]
pub struct AttackCooldown(pub f32);

/// Marker for the child entity the attack timeline poses.
#[derive(Component)]
pub struct WeaponModel;

/// Sensor collider that deals the wielder's damage on contact.
///
/// Enabled only while the owner's timeline has a damage window open.
#[derive(Component, Debug)]
pub struct WeaponHitVolume {
    pub owner: Entity,
    /// Targets already struck during the current attack
    pub struck: HashSet<Entity>,
    /// Owner's attack serial `struck` belongs to
    pub attack_serial: u32,
}

impl WeaponHitVolume {
    pub fn new(owner: Entity) -> Self {
        Self {
            owner,
            struck: HashSet::new(),
            attack_serial: 0,
        }
    }
}

/// Sensor box for a weapon model child, spawned disabled.
///
/// Wielders are kinematic bodies, so kinematic-kinematic contacts must be
/// reported for the sensor to see anything.
pub fn weapon_hit_volume(owner: Entity, half_extents: Vec3) -> impl Bundle {
    (
        WeaponHitVolume::new(owner),
        Collider::cuboid(half_extents.x, half_extents.y, half_extents.z),
        Sensor,
        ActiveEvents::COLLISION_EVENTS,
        ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_KINEMATIC,
        ColliderDisabled,
        Transform::default(),
    )
}

/// Marker component for entities that have died (prevents multiple death events).
#[derive(Component)]
pub struct Dead;

/// Time a corpse stays around before it is despawned.
#[derive(Component)]
pub struct DeathTimer(pub Timer);

impl Default for DeathTimer {
    fn default() -> Self {
        Self(Timer::from_seconds(2.0, TimerMode::Once))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_clamps_damage_and_heal() {
        let mut health = Health::new(50.0);
        assert_eq!(health.take_damage(20.0), 20.0);
        assert_eq!(health.heal(100.0), 20.0);
        assert_eq!(health.take_damage(80.0), 50.0);
        assert!(health.is_dead());
        assert_eq!(health.percentage(), 0.0);
    }

    #[test]
    fn test_resistance_lookup() {
        let resistances = Resistances {
            fire: 0.5,
            ..default()
        };
        assert_eq!(resistances.get(Element::Fire), 0.5);
        assert_eq!(resistances.get(Element::Physical), 0.0);
    }
}
