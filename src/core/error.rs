//! Error types for combat data loading and validation.

use thiserror::Error;

/// Errors that can occur when loading or validating attack and behavior data.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File or directory could not be found.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// File could not be read.
    #[error("Failed to read file '{path}': {details}")]
    ReadError { path: String, details: String },

    /// RON parsing failed.
    #[error("Parse error in '{path}': {details}")]
    ParseError { path: String, details: String },

    /// A behavior profile has no weighted entries.
    #[error("Behavior profile '{0}' has no weighted states")]
    EmptyProfile(String),

    /// Two entries in one profile share a name.
    #[error("Behavior profile '{profile}' lists '{behavior}' more than once")]
    DuplicateBehavior { profile: String, behavior: String },

    /// A name referenced by a profile is not registered in it.
    #[error("Behavior profile '{profile}': '{referenced_by}' refers to unknown behavior '{name}'")]
    UnknownBehavior {
        profile: String,
        referenced_by: String,
        name: String,
    },

    /// Weights must be finite and non-negative.
    #[error("Behavior profile '{profile}': '{behavior}' has invalid weight {weight}")]
    InvalidWeight {
        profile: String,
        behavior: String,
        weight: f32,
    },

    /// A combo link points to an attack that is not in the library.
    #[error("Attack '{attack}': combo trigger '{trigger}' routes to unknown attack '{next}'")]
    UnknownComboTarget {
        attack: String,
        trigger: String,
        next: String,
    },

    /// Phase durations must be finite and non-negative.
    #[error("Attack '{attack}': phase {index} has invalid duration {duration}")]
    InvalidPhaseDuration {
        attack: String,
        index: usize,
        duration: f32,
    },

    /// Projectiles need a positive speed and range.
    #[error("Attack '{attack}': phase {index} launches a projectile with speed {speed} and range {max_range}")]
    InvalidProjectile {
        attack: String,
        index: usize,
        speed: f32,
        max_range: f32,
    },
}
