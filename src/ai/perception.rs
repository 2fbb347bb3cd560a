//! Engagement vision: can this agent currently perceive its target?

use bevy::prelude::*;

use super::facade::{Vision, OBSTACLE_MASK};
use super::profile::OrchestratorSettings;

/// Angle + distance test, plus a line-of-sight ray when required.
///
/// Only the agent's position and facing matter; whatever the agent is
/// currently doing has no influence.
pub fn in_combat_vision(
    agent: &Transform,
    target: Vec3,
    settings: &OrchestratorSettings,
    vision: &dyn Vision,
) -> bool {
    let to_target = target - agent.translation;
    let distance = to_target.length();
    if distance > settings.view_distance {
        return false;
    }

    let flat = to_target.with_y(0.0);
    if flat.length_squared() > 1e-6 {
        let forward = agent.forward().as_vec3().with_y(0.0);
        let angle = forward.angle_between(flat).to_degrees();
        if angle > settings.view_angle * 0.5 {
            return false;
        }
    }

    if settings.require_line_of_sight {
        let eye = agent.translation + Vec3::Y * settings.eye_height;
        let aim = target + Vec3::Y * settings.eye_height;
        let ray = aim - eye;
        let length = ray.length();
        if length > 1e-4 {
            if let Some(hit) = vision.raycast(eye, ray / length, length, OBSTACLE_MASK) {
                // Hits at the far end are the target's own surroundings.
                return hit >= length - 0.05;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::facade::testing::{OpenFloor, Walls};

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            view_angle: 90.0,
            view_distance: 10.0,
            ..default()
        }
    }

    #[test]
    fn test_cone_and_distance() {
        let agent = Transform::IDENTITY;
        let settings = settings();

        assert!(in_combat_vision(&agent, Vec3::new(0.0, 0.0, -5.0), &settings, &OpenFloor));
        // 40 degrees off-axis: inside a 90 degree cone
        let inside = Vec3::new(40f32.to_radians().sin(), 0.0, -40f32.to_radians().cos()) * 5.0;
        assert!(in_combat_vision(&agent, inside, &settings, &OpenFloor));
        // 50 degrees off-axis: outside
        let outside = Vec3::new(50f32.to_radians().sin(), 0.0, -50f32.to_radians().cos()) * 5.0;
        assert!(!in_combat_vision(&agent, outside, &settings, &OpenFloor));
        // Behind
        assert!(!in_combat_vision(&agent, Vec3::new(0.0, 0.0, 5.0), &settings, &OpenFloor));
        // Too far
        assert!(!in_combat_vision(&agent, Vec3::new(0.0, 0.0, -11.0), &settings, &OpenFloor));
    }

    #[test]
    fn test_facing_is_what_counts() {
        let settings = settings();
        let target = Vec3::new(5.0, 0.0, 0.0);
        let facing_away = Transform::IDENTITY;
        let facing_target = Transform::IDENTITY.looking_at(target, Vec3::Y);
        assert!(!in_combat_vision(&facing_away, target, &settings, &OpenFloor));
        assert!(in_combat_vision(&facing_target, target, &settings, &OpenFloor));
    }

    #[test]
    fn test_line_of_sight_optional() {
        let agent = Transform::IDENTITY;
        let target = Vec3::new(0.0, 0.0, -5.0);
        let mut settings = settings();
        assert!(!in_combat_vision(&agent, target, &settings, &Walls));

        settings.require_line_of_sight = false;
        assert!(in_combat_vision(&agent, target, &settings, &Walls));
    }
}
