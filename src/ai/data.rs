//! Enemy data loading from RON files.

use bevy::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::patrol::PatrolConfig;
use crate::combat::Weapon;
use crate::core::{ConfigError, Element};

/// Collider configuration for an enemy type.
#[derive(Deserialize, Clone, Debug)]
pub struct ColliderConfig {
    pub half_height: f32,
    pub radius: f32,
}

impl Default for ColliderConfig {
    fn default() -> Self {
        Self {
            half_height: 0.5,
            radius: 0.3,
        }
    }
}

/// Weapon an enemy type carries.
#[derive(Deserialize, Clone, Debug)]
pub struct WeaponConfig {
    pub name: String,
    pub base_damage: f32,
    #[serde(default)]
    pub element: Element,
    /// Attack the timeline opens with (name in the attack library)
    pub opener: String,
}

impl WeaponConfig {
    pub fn to_weapon(&self) -> Weapon {
        Weapon {
            name: self.name.clone(),
            base_damage: self.base_damage,
            element: self.element,
            ..default()
        }
    }
}

/// Enemy definition loaded from RON file.
#[derive(Deserialize, Clone, Debug)]
pub struct EnemyDefinition {
    pub name: String,
    pub max_health: f32,
    /// Behavior profile name
    pub profile: String,
    pub move_speed: f32,
    pub weapon: WeaponConfig,
    #[serde(default = "default_color")]
    pub color: (f32, f32, f32),
    #[serde(default)]
    pub collider: Option<ColliderConfig>,
    /// Route walked while out of combat; none means stand guard
    #[serde(default)]
    pub patrol: Option<PatrolConfig>,
}

fn default_color() -> (f32, f32, f32) {
    (0.6, 0.2, 0.2)
}

/// Resource holding all loaded enemy definitions.
#[derive(Resource, Default, Debug)]
pub struct EnemyRegistry {
    pub definitions: HashMap<String, EnemyDefinition>,
}

impl EnemyRegistry {
    /// Get an enemy definition by type name.
    pub fn get(&self, enemy_type: &str) -> Option<&EnemyDefinition> {
        self.definitions.get(enemy_type)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Parse one RON enemy definition.
pub fn parse_enemy_definition(path: &str, contents: &str) -> Result<EnemyDefinition, ConfigError> {
    ron::from_str::<EnemyDefinition>(contents).map_err(|e| ConfigError::ParseError {
        path: path.to_string(),
        details: e.to_string(),
    })
}

/// Load every enemy definition in `dir`, keyed by file stem.
///
/// Broken files are logged and skipped.
pub fn load_enemy_registry(dir: &Path) -> Result<EnemyRegistry, ConfigError> {
    if !dir.exists() {
        return Err(ConfigError::FileNotFound(dir.display().to_string()));
    }

    let entries = fs::read_dir(dir).map_err(|e| ConfigError::ReadError {
        path: dir.display().to_string(),
        details: e.to_string(),
    })?;

    let mut registry = EnemyRegistry::default();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.extension().is_some_and(|ext| ext == "ron") {
            continue;
        }

        let enemy_type = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        let path_str = path.display().to_string();

        let loaded = fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadError {
                path: path_str.clone(),
                details: e.to_string(),
            })
            .and_then(|contents| parse_enemy_definition(&path_str, &contents));

        match loaded {
            Ok(definition) => {
                info!("Loaded enemy definition: {} ({})", definition.name, enemy_type);
                registry.definitions.insert(enemy_type, definition);
            }
            Err(e) => {
                error!("Skipping enemy definition {}: {}", path_str, e);
            }
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enemy_definition() {
        let ron = r#"(
            name: "Skeleton",
            max_health: 40.0,
            profile: "skirmisher",
            move_speed: 3.0,
            weapon: (name: "Rusty Sword", base_damage: 8.0, opener: "slash"),
        )"#;
        let definition = parse_enemy_definition("skeleton.ron", ron).unwrap();
        assert_eq!(definition.profile, "skirmisher");
        assert_eq!(definition.weapon.element, Element::Physical);
        assert_eq!(definition.color, default_color());
        assert!(definition.collider.is_none());
        assert!(definition.patrol.is_none());

        let weapon = definition.weapon.to_weapon();
        assert_eq!(weapon.base_damage, 8.0);
        assert_eq!(weapon.name, "Rusty Sword");
    }

    #[test]
    fn test_parse_patrol_route() {
        let ron = r#"(
            name: "Cultist",
            max_health: 30.0,
            profile: "caster",
            move_speed: 3.0,
            weapon: (name: "Ember Staff", base_damage: 10.0, element: Fire, opener: "fire_bolt"),
            patrol: Some((waypoints: [(4.0, 0.0, 0.0), (4.0, 0.0, 4.0)], wait_time: 1.5)),
        )"#;
        let definition = parse_enemy_definition("cultist.ron", ron).unwrap();
        let patrol = definition.patrol.unwrap();
        assert_eq!(patrol.waypoints.len(), 2);
        assert_eq!(patrol.wait_time, 1.5);
        assert_eq!(patrol.speed, 2.5);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(matches!(
            load_enemy_registry(Path::new("does/not/exist")),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_shipped_data_is_consistent() {
        use crate::ai::profile::load_profile_registry;
        use crate::combat::load_attack_library;

        let enemies = load_enemy_registry(Path::new("assets/data/enemies")).unwrap();
        let profiles = load_profile_registry(Path::new("assets/data/behavior_profiles")).unwrap();
        let attacks = load_attack_library(Path::new("assets/data/attacks")).unwrap();

        assert_eq!(enemies.len(), 3);
        assert_eq!(profiles.len(), 3);
        for (kind, definition) in &enemies.definitions {
            assert!(profiles.get(&definition.profile).is_some(), "{kind}: missing profile");
            assert!(attacks.get(&definition.weapon.opener).is_some(), "{kind}: missing opener");
        }
        assert_eq!(enemies.get("lurker").unwrap().weapon.element, Element::Dark);

        // The caster's opener actually fires something.
        let bolt = attacks.get(&enemies.get("cultist").unwrap().weapon.opener).unwrap();
        assert!(bolt.phases.iter().any(|phase| phase.projectile.is_some()));
        assert!(enemies.get("skeleton").unwrap().patrol.is_some());
    }
}
