//! Behavior profiles: which behaviors an agent may run, how likely each is,
//! and the orchestrator tuning that goes with them.
//!
//! Profiles are authored as RON files (one profile per file), validated
//! once and shared read-only between every agent that uses them.

use bevy::prelude::*;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::behaviors::BehaviorKind;
use crate::core::ConfigError;

/// Index of an entry within its profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BehaviorId(pub usize);

/// Per-profile orchestrator tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Full horizontal cone, degrees
    pub view_angle: f32,
    pub view_distance: f32,
    /// Also require an unobstructed ray to the target
    pub require_line_of_sight: bool,
    pub eye_height: f32,
    /// Seconds out of sight before the target counts as lost
    pub loss_timeout: f32,
    /// Behavior forced when the target is lost
    pub fallback_search: Option<String>,
    /// Behavior forced when hit by something the agent cannot see
    pub investigate: Option<String>,
    /// Weight scale for aggressive behaviors after a whiffed attack
    pub aggression_multiplier: f32,
    pub retarget_radius: f32,
    /// Allies within this radius join in when this agent engages; 0 disables
    pub alert_radius: f32,
    pub engage_distance: f32,
    pub disengage_distance: Option<f32>,
    /// Degrees per second for smooth facing
    pub turn_rate: f32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            view_angle: 120.0,
            view_distance: 15.0,
            require_line_of_sight: true,
            eye_height: 0.6,
            loss_timeout: 3.0,
            fallback_search: Some("SearchState".to_string()),
            investigate: Some("InvestigateState".to_string()),
            aggression_multiplier: 1.5,
            retarget_radius: 12.0,
            alert_radius: 10.0,
            engage_distance: 5.0,
            disengage_distance: None,
            turn_rate: 360.0,
        }
    }
}

/// One selectable behavior and its weighting.
#[derive(Debug, Clone, Deserialize)]
pub struct WeightedBehavior {
    /// Name the behavior is enqueued and cooled down by
    pub name: String,
    pub weight: f32,
    /// May only follow one of these; empty means anything
    #[serde(default)]
    pub allowed_after: Vec<String>,
    /// Receives the aggression bonus. Defaults by kind (attack and rush).
    #[serde(default)]
    pub aggressive: Option<bool>,
    pub behavior: BehaviorKind,
}

impl WeightedBehavior {
    pub fn is_aggressive(&self) -> bool {
        self.aggressive
            .unwrap_or_else(|| self.behavior.is_aggressive())
    }

    /// Predecessor rule. The first selection (`None`) is unconstrained.
    pub fn may_follow(&self, previous: Option<&str>) -> bool {
        match previous {
            None => true,
            Some(previous) => {
                self.allowed_after.is_empty() || self.allowed_after.iter().any(|name| name == previous)
            }
        }
    }
}

/// Ordered set of weighted behaviors plus orchestrator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BehaviorProfile {
    pub name: String,
    #[serde(default)]
    pub settings: OrchestratorSettings,
    pub behaviors: Vec<WeightedBehavior>,
}

impl BehaviorProfile {
    pub fn new(name: impl Into<String>, behaviors: Vec<WeightedBehavior>) -> Self {
        Self {
            name: name.into(),
            settings: OrchestratorSettings::default(),
            behaviors,
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    pub fn entry(&self, id: BehaviorId) -> Option<&WeightedBehavior> {
        self.behaviors.get(id.0)
    }

    pub fn entries(&self) -> impl Iterator<Item = (BehaviorId, &WeightedBehavior)> {
        self.behaviors
            .iter()
            .enumerate()
            .map(|(index, entry)| (BehaviorId(index), entry))
    }

    pub fn id_of(&self, name: &str) -> Option<BehaviorId> {
        self.behaviors
            .iter()
            .position(|entry| entry.name == name)
            .map(BehaviorId)
    }

    pub fn name_of(&self, id: BehaviorId) -> &str {
        self.entry(id).map_or("<unknown>", |entry| entry.name.as_str())
    }

    /// Reject profiles the orchestrator could not run sensibly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.behaviors.is_empty() {
            return Err(ConfigError::EmptyProfile(self.name.clone()));
        }

        let mut names = HashSet::new();
        for entry in &self.behaviors {
            if !names.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateBehavior {
                    profile: self.name.clone(),
                    behavior: entry.name.clone(),
                });
            }
            if !entry.weight.is_finite() || entry.weight < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    profile: self.name.clone(),
                    behavior: entry.name.clone(),
                    weight: entry.weight,
                });
            }
        }

        let unknown = |referenced_by: &str, name: &str| ConfigError::UnknownBehavior {
            profile: self.name.clone(),
            referenced_by: referenced_by.to_string(),
            name: name.to_string(),
        };

        for entry in &self.behaviors {
            let references = entry
                .allowed_after
                .iter()
                .map(String::as_str)
                .chain(entry.behavior.referenced_behaviors());
            for name in references {
                if !names.contains(name) {
                    return Err(unknown(&entry.name, name));
                }
            }
        }

        for name in [&self.settings.fallback_search, &self.settings.investigate]
            .into_iter()
            .flatten()
        {
            if !names.contains(name.as_str()) {
                return Err(unknown("settings", name));
            }
        }

        Ok(())
    }
}

/// Resource holding every loaded behavior profile, keyed by name.
#[derive(Resource, Default, Debug)]
pub struct ProfileRegistry {
    profiles: HashMap<String, Arc<BehaviorProfile>>,
}

impl ProfileRegistry {
    /// Validate and register a profile, replacing one with the same name.
    pub fn insert(&mut self, profile: BehaviorProfile) -> Result<Arc<BehaviorProfile>, ConfigError> {
        profile.validate()?;
        let profile = Arc::new(profile);
        self.profiles
            .insert(profile.name.clone(), Arc::clone(&profile));
        Ok(profile)
    }

    pub fn get(&self, name: &str) -> Option<Arc<BehaviorProfile>> {
        self.profiles.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Parse one RON profile.
pub fn parse_profile(path: &str, contents: &str) -> Result<BehaviorProfile, ConfigError> {
    ron::from_str::<BehaviorProfile>(contents).map_err(|e| ConfigError::ParseError {
        path: path.to_string(),
        details: e.to_string(),
    })
}

/// Load every `.ron` profile in `dir`.
///
/// Files that fail to parse or validate are logged and skipped; only an
/// unreadable directory fails the whole load.
pub fn load_profile_registry(dir: &Path) -> Result<ProfileRegistry, ConfigError> {
    if !dir.exists() {
        return Err(ConfigError::FileNotFound(dir.display().to_string()));
    }

    let entries = fs::read_dir(dir).map_err(|e| ConfigError::ReadError {
        path: dir.display().to_string(),
        details: e.to_string(),
    })?;

    let mut registry = ProfileRegistry::default();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.extension().is_some_and(|ext| ext == "ron") {
            continue;
        }

        let path_str = path.display().to_string();
        let loaded = fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadError {
                path: path_str.clone(),
                details: e.to_string(),
            })
            .and_then(|contents| parse_profile(&path_str, &contents))
            .and_then(|profile| registry.insert(profile));

        match loaded {
            Ok(profile) => {
                info!(
                    "Loaded behavior profile: {} ({} behaviors)",
                    profile.name,
                    profile.len()
                );
            }
            Err(e) => {
                error!("Skipping behavior profile {}: {}", path_str, e);
            }
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKIRMISHER: &str = r#"(
        name: "skirmisher",
        settings: (loss_timeout: 2.0, disengage_distance: Some(20.0)),
        behaviors: [
            (name: "AttackState", weight: 2.0, behavior: Attack((desired_range: 1.2))),
            (name: "RushState", weight: 1.0, behavior: Rush((speed: 7.0))),
            (name: "RetreatState", weight: 1.0, allowed_after: ["AttackState"],
             behavior: Retreat((distance: 4.0))),
            (name: "StalkState", weight: 1.0, behavior: Stalk((handoff: "RushState"))),
            (name: "SearchState", weight: 0.0, behavior: Search((rotate_duration: 2.0))),
            (name: "InvestigateState", weight: 0.0, behavior: Investigate((search_duration: 2.0))),
        ],
    )"#;

    #[test]
    fn test_parse_profile_with_defaults() {
        let profile = parse_profile("skirmisher.ron", SKIRMISHER).unwrap();
        profile.validate().unwrap();

        assert_eq!(profile.len(), 6);
        assert_eq!(profile.settings.loss_timeout, 2.0);
        assert_eq!(profile.settings.disengage_distance, Some(20.0));
        assert_eq!(profile.settings.view_angle, 120.0);
        assert_eq!(profile.id_of("RushState"), Some(BehaviorId(1)));
        assert!(profile.entry(BehaviorId(1)).unwrap().is_aggressive());
        assert!(!profile.entry(BehaviorId(2)).unwrap().is_aggressive());

        let retreat = profile.entry(BehaviorId(2)).unwrap();
        assert!(retreat.may_follow(None));
        assert!(retreat.may_follow(Some("AttackState")));
        assert!(!retreat.may_follow(Some("StalkState")));
    }

    #[test]
    fn test_validation_catches_bad_references() {
        let mut profile = parse_profile("skirmisher.ron", SKIRMISHER).unwrap();
        profile.behaviors[2].allowed_after = vec!["Dance".to_string()];
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::UnknownBehavior { ref name, .. }) if name == "Dance"
        ));

        let mut profile = parse_profile("skirmisher.ron", SKIRMISHER).unwrap();
        profile.settings.fallback_search = Some("Nope".to_string());
        assert!(profile.validate().is_err());

        let mut profile = parse_profile("skirmisher.ron", SKIRMISHER).unwrap();
        profile.behaviors[0].weight = -1.0;
        assert!(matches!(profile.validate(), Err(ConfigError::InvalidWeight { .. })));

        let mut profile = parse_profile("skirmisher.ron", SKIRMISHER).unwrap();
        profile.behaviors[1].name = "AttackState".to_string();
        assert!(matches!(profile.validate(), Err(ConfigError::DuplicateBehavior { .. })));

        let empty = BehaviorProfile::new("empty", Vec::new());
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyProfile(_))));
    }

    #[test]
    fn test_stalk_handoff_must_exist() {
        let mut profile = parse_profile("skirmisher.ron", SKIRMISHER).unwrap();
        profile.behaviors.remove(1);
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::UnknownBehavior { ref referenced_by, .. }) if referenced_by == "StalkState"
        ));
    }

    #[test]
    fn test_registry_rejects_invalid_profiles() {
        let mut registry = ProfileRegistry::default();
        assert!(registry.insert(BehaviorProfile::new("empty", Vec::new())).is_err());
        assert!(registry.is_empty());

        let profile = parse_profile("skirmisher.ron", SKIRMISHER).unwrap();
        registry.insert(profile).unwrap();
        assert!(registry.get("skirmisher").is_some());
    }
}
