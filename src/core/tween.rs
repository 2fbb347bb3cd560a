//! Time-normalized curves and pose interpolation.
//!
//! Attack phases drive weapon poses and damage scaling through [`Curve`]s
//! evaluated at a normalized progress `t` in `[0, 1]`.

use bevy::prelude::*;
use serde::Deserialize;

/// A mapping from normalized time to a weight.
///
/// Input is always clamped to `[0, 1]` before evaluation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum Curve {
    /// Same value everywhere.
    Constant(f32),
    /// `f(t) = t`
    Linear,
    /// Quadratic ease-in.
    EaseIn,
    /// Quadratic ease-out.
    EaseOut,
    /// Smoothstep.
    EaseInOut,
    /// Piecewise linear through `(time, value)` keys, held flat past either end.
    Keyframes(Vec<(f32, f32)>),
}

impl Default for Curve {
    fn default() -> Self {
        Curve::Linear
    }
}

impl Curve {
    /// Evaluate the curve at normalized time `t`.
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        match self {
            Curve::Constant(value) => *value,
            Curve::Linear => t,
            Curve::EaseIn => t * t,
            Curve::EaseOut => t * (2.0 - t),
            Curve::EaseInOut => t * t * (3.0 - 2.0 * t),
            Curve::Keyframes(keys) => evaluate_keys(keys, t),
        }
    }
}

fn evaluate_keys(keys: &[(f32, f32)], t: f32) -> f32 {
    let Some(&(first_time, first_value)) = keys.first() else {
        return 0.0;
    };
    if t <= first_time {
        return first_value;
    }

    for pair in keys.windows(2) {
        let (t0, v0) = pair[0];
        let (t1, v1) = pair[1];
        if t <= t1 {
            let span = t1 - t0;
            if span <= f32::EPSILON {
                return v1;
            }
            return v0 + (v1 - v0) * ((t - t0) / span);
        }
    }

    keys.last().map_or(first_value, |&(_, value)| value)
}

/// Local translation and rotation of a posed model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self { translation, rotation }
    }

    pub fn from_transform(transform: &Transform) -> Self {
        Self::new(transform.translation, transform.rotation)
    }

    /// This pose displaced by a position offset and an euler rotation offset
    /// (degrees, applied XYZ on top of this pose's own euler angles).
    pub fn offset(&self, position_offset: Vec3, rotation_offset_degrees: Vec3) -> Self {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            x + rotation_offset_degrees.x.to_radians(),
            y + rotation_offset_degrees.y.to_radians(),
            z + rotation_offset_degrees.z.to_radians(),
        );
        Self::new(self.translation + position_offset, rotation)
    }

    /// Linear position lerp and spherical rotation interpolation toward `to`.
    pub fn blend(&self, to: &Pose, weight: f32) -> Self {
        Self::new(
            self.translation.lerp(to.translation, weight),
            self.rotation.slerp(to.rotation, weight),
        )
    }

    /// Write this pose into a transform, leaving its scale alone.
    pub fn apply_to(&self, transform: &mut Transform) {
        transform.translation = self.translation;
        transform.rotation = self.rotation;
    }
}
