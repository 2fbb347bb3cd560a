//! AI-related components.

use bevy::prelude::*;

/// Marker component for all AI-driven combatants.
#[derive(Component)]
pub struct Enemy;

/// Enemy type identifier (matches the definition's file stem).
#[derive(Component, Clone, Debug)]
pub struct EnemyType(pub String);

/// Something enemies may engage, chase and strike.
#[derive(Component)]
pub struct Targetable;

/// Placeholder that becomes an enemy of `kind` once definitions are loaded.
#[derive(Component, Clone, Debug)]
pub struct EnemySpawnPoint {
    pub kind: String,
}

impl EnemySpawnPoint {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}
