//! What a behavior may ask of the world.
//!
//! Behaviors and the orchestrator only ever see the agent through an
//! [`AgentEnv`]: its transform, a [`Navigator`], a [`Vision`] raycaster, a
//! [`TargetScanner`] and (optionally) its weapon. Bevy systems build one of
//! these per agent per tick; tests build them from plain structs.

use bevy::prelude::*;

use crate::combat::AttackRuntime;

/// Collision groups the world's static geometry is split into.
pub const GROUND_MASK: u32 = 0b01;
pub const OBSTACLE_MASK: u32 = 0b11;

/// Point-to-point movement service.
pub trait Navigator {
    /// Movement is enabled and the agent stands on walkable space.
    fn is_ready(&self) -> bool;
    fn request_move(&mut self, destination: Vec3) -> bool;
    fn cancel_move(&mut self);
    fn remaining_distance(&self) -> f32;
    /// The last requested destination is reachable as asked.
    fn is_path_complete(&self) -> bool;
    /// Teleport onto `position` and resync. `false` if it is not walkable.
    fn warp(&mut self, position: Vec3) -> bool;
    fn set_speed(&mut self, speed: f32);
    /// Closest walkable point within `max_distance` of `point`.
    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3>;
}

/// Line-of-sight and ground probing.
pub trait Vision {
    /// Distance to the first hit within `max_distance`, if any.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, mask: u32) -> Option<f32>;
}

/// Proximity query for potential targets.
pub trait TargetScanner {
    /// Candidates within `radius`, nearest first.
    fn nearby_targets(&self, origin: Vec3, radius: f32) -> Vec<TargetView>;
    /// Current snapshot of one entity, wherever it is.
    fn find(&self, entity: Entity) -> Option<TargetView>;
}

/// Snapshot of a target for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetView {
    pub entity: Entity,
    pub position: Vec3,
    pub alive: bool,
}

/// Scanner that never finds anything.
pub struct NoTargets;

impl TargetScanner for NoTargets {
    fn nearby_targets(&self, _origin: Vec3, _radius: f32) -> Vec<TargetView> {
        Vec::new()
    }

    fn find(&self, _entity: Entity) -> Option<TargetView> {
        None
    }
}

/// Everything one agent can touch during one tick.
pub struct AgentEnv<'a> {
    pub entity: Entity,
    /// Simulation time in seconds
    pub now: f32,
    pub dt: f32,
    pub agent: &'a mut Transform,
    pub target: Option<TargetView>,
    pub nav: &'a mut dyn Navigator,
    pub vision: &'a dyn Vision,
    pub scanner: &'a dyn TargetScanner,
    pub weapon: Option<&'a mut AttackRuntime>,
}

impl AgentEnv<'_> {
    pub fn position(&self) -> Vec3 {
        self.agent.translation
    }

    /// Target if it is bound and alive.
    pub fn live_target(&self) -> Option<TargetView> {
        self.target.filter(|target| target.alive)
    }

    pub fn target_distance(&self) -> Option<f32> {
        self.live_target()
            .map(|target| self.position().distance(target.position))
    }

    /// Agent can act on a live target at all.
    pub fn can_act(&self) -> bool {
        self.nav.is_ready() && self.live_target().is_some()
    }

    /// Snap facing to the target (yaw only).
    pub fn face_target_locked(&mut self) {
        if let Some(target) = self.live_target() {
            if let Some(rotation) = yaw_towards(self.agent, target.position) {
                self.agent.rotation = rotation;
            }
        }
    }

    /// Turn towards the target at up to `turn_rate` degrees per second.
    pub fn face_target_smooth(&mut self, turn_rate: f32) {
        let Some(target) = self.live_target() else {
            return;
        };
        let Some(goal) = yaw_towards(self.agent, target.position) else {
            return;
        };
        let max_step = turn_rate.to_radians() * self.dt;
        let angle = self.agent.rotation.angle_between(goal);
        self.agent.rotation = if angle <= max_step || angle <= f32::EPSILON {
            goal
        } else {
            self.agent.rotation.slerp(goal, max_step / angle)
        };
    }

    /// Teleport agent and navigator together.
    pub fn warp(&mut self, position: Vec3) -> bool {
        if !self.nav.warp(position) {
            return false;
        }
        self.agent.translation = position;
        true
    }

    /// Start the weapon's current attack if it is idle.
    pub fn perform_attack(&mut self) -> bool {
        self.weapon
            .as_deref_mut()
            .is_some_and(|weapon| weapon.can_attack() && weapon.play_current())
    }

    pub fn weapon_busy(&self) -> bool {
        self.weapon
            .as_deref()
            .is_some_and(|weapon| weapon.is_attacking())
    }

    pub fn weapon_landed_hit(&self) -> bool {
        self.weapon
            .as_deref()
            .is_some_and(|weapon| weapon.last_hit().is_some())
    }
}

fn yaw_towards(agent: &Transform, point: Vec3) -> Option<Quat> {
    let flat = (point - agent.translation).with_y(0.0);
    if flat.length_squared() < 1e-6 {
        return None;
    }
    Some(Transform::IDENTITY.looking_to(flat, Vec3::Y).rotation)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_face_target_smooth_is_rate_limited() {
        let mut transform = Transform::IDENTITY;
        let mut nav = FakeNav::ready();
        let mut env = AgentEnv {
            entity: Entity::from_raw(1),
            now: 0.0,
            dt: 0.1,
            agent: &mut transform,
            // Directly behind the agent (forward is -Z)
            target: Some(target_at(0, Vec3::new(0.0, 0.0, 5.0))),
            nav: &mut nav,
            vision: &OpenFloor,
            scanner: &NoTargets,
            weapon: None,
        };

        env.face_target_smooth(90.0);
        let turned = env.agent.rotation.angle_between(Quat::IDENTITY).to_degrees();
        assert!((turned - 9.0).abs() < 0.1, "turned {turned}");

        env.face_target_locked();
        let forward = env.agent.forward().as_vec3();
        assert!(forward.distance(Vec3::Z) < 1e-4);
    }

    #[test]
    fn test_warp_moves_agent_only_when_accepted() {
        let mut transform = Transform::IDENTITY;
        let mut nav = FakeNav::default();
        let mut env = AgentEnv {
            entity: Entity::from_raw(1),
            now: 0.0,
            dt: 0.1,
            agent: &mut transform,
            target: None,
            nav: &mut nav,
            vision: &OpenFloor,
            scanner: &NoTargets,
            weapon: None,
        };
        assert!(!env.warp(Vec3::X));
        assert_eq!(env.position(), Vec3::ZERO);
    }
}
