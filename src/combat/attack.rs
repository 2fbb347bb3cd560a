//! Attack definitions and the shared attack library.
//!
//! Definitions are authored in RON, validated once, and shared read-only
//! (`Arc`) between every wielder of the same weapon type.

use bevy::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::core::{ConfigError, Curve};

/// One timed segment of an attack.
#[derive(Debug, Clone, Deserialize)]
pub struct Phase {
    #[serde(default = "default_phase_name")]
    pub name: String,
    /// Seconds
    #[serde(default = "default_phase_duration")]
    pub duration: f32,
    /// Offset from the rest pose reached at the end of the phase
    #[serde(default)]
    pub position_offset: Vec3,
    /// Euler offset in degrees from the rest pose
    #[serde(default)]
    pub rotation_offset: Vec3,
    /// Normalized time -> blend weight
    #[serde(default)]
    pub interpolation: Curve,
    /// Hit volume is live for the whole phase
    #[serde(default)]
    pub damage_enabled: bool,
    /// Normalized time -> damage multiplier while `damage_enabled`
    #[serde(default = "default_damage_curve")]
    pub damage_curve: Curve,
    /// Named combo triggers are polled during this phase
    #[serde(default)]
    pub accepts_combo: bool,
    /// A queued combo cuts the attack short once this phase completes
    #[serde(default)]
    pub end_on_combo: bool,
    /// Fired once from the weapon model as the phase starts
    #[serde(default)]
    pub projectile: Option<ProjectileSpec>,
}

/// A bolt launched by a phase.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProjectileSpec {
    /// Metres per second
    pub speed: f32,
    pub radius: f32,
    /// Gone once it has travelled this far
    pub max_range: f32,
    /// Scales the wielder's base damage
    pub damage_scale: f32,
}

impl Default for ProjectileSpec {
    fn default() -> Self {
        Self {
            speed: 38.0,
            radius: 0.15,
            max_range: 60.0,
            damage_scale: 1.0,
        }
    }
}

fn default_phase_name() -> String {
    "Phase".to_string()
}

fn default_phase_duration() -> f32 {
    0.4
}

fn default_damage_curve() -> Curve {
    Curve::Constant(1.0)
}

impl Default for Phase {
    fn default() -> Self {
        Self {
            name: default_phase_name(),
            duration: default_phase_duration(),
            position_offset: Vec3::ZERO,
            rotation_offset: Vec3::ZERO,
            interpolation: Curve::Linear,
            damage_enabled: false,
            damage_curve: default_damage_curve(),
            accepts_combo: false,
            end_on_combo: false,
            projectile: None,
        }
    }
}

/// Named trigger routed to a follow-up attack.
#[derive(Debug, Clone, Deserialize)]
pub struct ComboLink {
    pub trigger: String,
    pub next: String,
}

/// An ordered list of phases plus its combo routes.
#[derive(Debug, Clone, Deserialize)]
pub struct AttackDefinition {
    pub name: String,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub combo_map: Vec<ComboLink>,
}

impl AttackDefinition {
    pub fn new(name: impl Into<String>, phases: Vec<Phase>) -> Self {
        Self {
            name: name.into(),
            phases,
            combo_map: Vec::new(),
        }
    }

    /// Add a combo route (builder style).
    pub fn with_combo(mut self, trigger: impl Into<String>, next: impl Into<String>) -> Self {
        self.combo_map.push(ComboLink {
            trigger: trigger.into(),
            next: next.into(),
        });
        self
    }

    /// Sum of all phase durations.
    pub fn total_duration(&self) -> f32 {
        self.phases.iter().map(|phase| phase.duration).sum()
    }
}

/// Resource holding every loaded attack, keyed by name.
#[derive(Resource, Default, Debug, Clone)]
pub struct AttackLibrary {
    attacks: HashMap<String, Arc<AttackDefinition>>,
}

impl AttackLibrary {
    /// Build a library and validate durations and combo routes.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = AttackDefinition>,
    ) -> Result<Self, ConfigError> {
        let mut library = Self::default();
        for definition in definitions {
            library.insert(definition);
        }
        library.validate()?;
        Ok(library)
    }

    /// Insert or replace a definition without validating it.
    pub fn insert(&mut self, definition: AttackDefinition) -> Arc<AttackDefinition> {
        let definition = Arc::new(definition);
        self.attacks
            .insert(definition.name.clone(), Arc::clone(&definition));
        definition
    }

    pub fn get(&self, name: &str) -> Option<Arc<AttackDefinition>> {
        self.attacks.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.attacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for definition in self.attacks.values() {
            for (index, phase) in definition.phases.iter().enumerate() {
                if !phase.duration.is_finite() || phase.duration < 0.0 {
                    return Err(ConfigError::InvalidPhaseDuration {
                        attack: definition.name.clone(),
                        index,
                        duration: phase.duration,
                    });
                }
                if let Some(spec) = &phase.projectile {
                    if !(spec.speed > 0.0 && spec.max_range > 0.0) {
                        return Err(ConfigError::InvalidProjectile {
                            attack: definition.name.clone(),
                            index,
                            speed: spec.speed,
                            max_range: spec.max_range,
                        });
                    }
                }
            }
            for link in &definition.combo_map {
                if !self.attacks.contains_key(&link.next) {
                    return Err(ConfigError::UnknownComboTarget {
                        attack: definition.name.clone(),
                        trigger: link.trigger.clone(),
                        next: link.next.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Parse a RON list of attack definitions.
pub fn parse_attack_file(path: &str, contents: &str) -> Result<Vec<AttackDefinition>, ConfigError> {
    ron::from_str::<Vec<AttackDefinition>>(contents).map_err(|e| ConfigError::ParseError {
        path: path.to_string(),
        details: e.to_string(),
    })
}

/// Load every `.ron` file in `dir` into one validated library.
pub fn load_attack_library(dir: &Path) -> Result<AttackLibrary, ConfigError> {
    if !dir.exists() {
        return Err(ConfigError::FileNotFound(dir.display().to_string()));
    }

    let entries = fs::read_dir(dir).map_err(|e| ConfigError::ReadError {
        path: dir.display().to_string(),
        details: e.to_string(),
    })?;

    let mut definitions = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "ron") {
            let display = path.display().to_string();
            let contents = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
                path: display.clone(),
                details: e.to_string(),
            })?;
            definitions.extend(parse_attack_file(&display, &contents)?);
        }
    }

    AttackLibrary::from_definitions(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWORD: &str = r#"[
        (
            name: "slash",
            phases: [
                (name: "windup", duration: 0.2, position_offset: (0.0, 0.3, 0.1)),
                (name: "swing", duration: 0.15, damage_enabled: true,
                 damage_curve: Keyframes([(0.0, 0.5), (1.0, 1.5)]), accepts_combo: true),
                (name: "recover", duration: 0.3, accepts_combo: true, end_on_combo: true),
            ],
            combo_map: [(trigger: "primary_attack", next: "thrust")],
        ),
        (
            name: "thrust",
            phases: [(duration: 0.25, damage_enabled: true)],
        ),
    ]"#;

    #[test]
    fn test_parse_and_validate_library() {
        let definitions = parse_attack_file("sword.ron", SWORD).unwrap();
        let library = AttackLibrary::from_definitions(definitions).unwrap();

        assert_eq!(library.len(), 2);
        let slash = library.get("slash").unwrap();
        assert_eq!(slash.phases.len(), 3);
        assert!((slash.total_duration() - 0.65).abs() < 1e-6);
        assert_eq!(slash.phases[0].position_offset, Vec3::new(0.0, 0.3, 0.1));
        assert_eq!(slash.phases[2].damage_curve, Curve::Constant(1.0));

        let thrust = library.get("thrust").unwrap();
        assert_eq!(thrust.phases[0].name, "Phase");
        assert_eq!(thrust.phases[0].interpolation, Curve::Linear);
    }

    #[test]
    fn test_unknown_combo_target_rejected() {
        let broken = AttackDefinition::new("jab", vec![Phase::default()])
            .with_combo("primary_attack", "missing");
        let err = AttackLibrary::from_definitions([broken]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownComboTarget { .. }));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let phase = Phase {
            duration: -1.0,
            ..default()
        };
        let err = AttackLibrary::from_definitions([AttackDefinition::new("bad", vec![phase])])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPhaseDuration { index: 0, .. }));
    }

    #[test]
    fn test_projectile_phase_parses_and_is_checked() {
        let wand = r#"[(
            name: "bolt",
            phases: [
                (name: "charge", duration: 0.4),
                (name: "release", duration: 0.2, projectile: Some((speed: 20.0))),
            ],
        )]"#;
        let library = AttackLibrary::from_definitions(parse_attack_file("wand.ron", wand).unwrap()).unwrap();
        let bolt = library.get("bolt").unwrap();
        assert_eq!(bolt.phases[0].projectile, None);
        let spec = bolt.phases[1].projectile.unwrap();
        assert_eq!(spec.speed, 20.0);
        assert_eq!(spec.max_range, 60.0);

        let stalled = Phase {
            projectile: Some(ProjectileSpec {
                speed: 0.0,
                ..default()
            }),
            ..default()
        };
        let err = AttackLibrary::from_definitions([AttackDefinition::new("dud", vec![stalled])])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProjectile { index: 0, .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = parse_attack_file("broken.ron", "[ (name: ").unwrap_err();
        assert!(err.to_string().contains("broken.ron"));
    }
}
