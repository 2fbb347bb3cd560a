//! Time-boxed high-speed chase after a target that got away.

use bevy::prelude::*;
use serde::Deserialize;

use super::{BehaviorCtx, Directive, Step};
use crate::ai::facade::AgentEnv;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PursuitConfig {
    pub max_time: f32,
    pub speed: f32,
    /// Stop chasing once this close with a complete path
    pub exit_distance: f32,
    /// Moving less than this per tick counts as stuck
    pub stuck_distance: f32,
    pub stuck_time: f32,
    /// How far to look for walkable space to start from
    pub sample_radius: f32,
    /// Pause after the chase before the replanned behavior runs
    pub settle_buffer: f32,
}

impl Default for PursuitConfig {
    fn default() -> Self {
        Self {
            max_time: 3.0,
            speed: 9.0,
            exit_distance: 8.0,
            stuck_distance: 0.05,
            stuck_time: 0.75,
            sample_radius: 2.0,
            settle_buffer: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PursuitStage {
    /// Could not get onto walkable space; ends on the first step.
    Aborted,
    Chasing,
    Settling,
}

#[derive(Debug, Clone)]
pub struct PursuitProgress {
    pub stage: PursuitStage,
    timer: f32,
    stuck_for: f32,
    last_position: Vec3,
}

impl PursuitConfig {
    pub fn can_execute(&self, env: &AgentEnv) -> bool {
        env.can_act()
            && env
                .target_distance()
                .is_some_and(|distance| distance > self.exit_distance)
    }

    pub fn enter(&self, ctx: &mut BehaviorCtx) -> PursuitProgress {
        let position = ctx.env.position();
        let mut progress = PursuitProgress {
            stage: PursuitStage::Aborted,
            timer: 0.0,
            stuck_for: 0.0,
            last_position: position,
        };

        let Some(start) = ctx.env.nav.sample_position(position, self.sample_radius) else {
            warn!("{:?}: no walkable space near {:?}, pursuit aborted", ctx.env.entity, position);
            return progress;
        };
        if !ctx.env.warp(start) {
            warn!("{:?}: warp to {:?} refused, pursuit aborted", ctx.env.entity, start);
            return progress;
        }

        ctx.env.nav.set_speed(self.speed);
        progress.stage = PursuitStage::Chasing;
        progress.last_position = start;
        progress
    }

    pub fn step(&self, progress: &mut PursuitProgress, ctx: &mut BehaviorCtx) -> Step {
        let dt = ctx.env.dt;
        match progress.stage {
            PursuitStage::Aborted => return Step::Done,
            PursuitStage::Chasing => {
                progress.timer += dt;
                if self.chase_over(progress, ctx) {
                    ctx.env.nav.cancel_move();
                    ctx.push(Directive::InterruptAndReplan);
                    progress.stage = PursuitStage::Settling;
                    progress.timer = 0.0;
                }
            }
            PursuitStage::Settling => {
                progress.timer += dt;
                if progress.timer >= self.settle_buffer {
                    return Step::Done;
                }
            }
        }
        Step::Continue
    }

    fn chase_over(&self, progress: &mut PursuitProgress, ctx: &mut BehaviorCtx) -> bool {
        let Some(target) = ctx.env.live_target() else {
            return true;
        };
        if !ctx.env.nav.is_ready() {
            return true;
        }

        ctx.env.nav.request_move(target.position);
        let position = ctx.env.position();
        if position.distance(target.position) <= self.exit_distance && ctx.env.nav.is_path_complete() {
            return true;
        }

        if position.distance(progress.last_position) < self.stuck_distance {
            progress.stuck_for += ctx.env.dt;
            if progress.stuck_for > self.stuck_time {
                warn!("{:?}: stuck during pursuit", ctx.env.entity);
                return true;
            }
        } else {
            progress.stuck_for = 0.0;
        }
        progress.last_position = position;

        progress.timer >= self.max_time
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::BehaviorKind;
    use super::*;
    use crate::ai::facade::testing::OpenFloor;

    #[test]
    fn test_warps_then_gives_up_when_stuck() {
        let kind = BehaviorKind::Pursuit(PursuitConfig::default());
        let mut harness = Harness::with_target_at(Vec3::new(0.0, 0.0, -20.0));
        assert!(harness.eligible(&kind));

        // The fake navigator never moves the agent.
        let ticks = harness.run(&kind, &OpenFloor, 600).unwrap();
        let seconds = ticks as f32 * DT;
        assert!((0.75..1.0).contains(&seconds), "took {seconds}s");

        assert_eq!(harness.nav.warps, vec![Vec3::ZERO]);
        assert_eq!(harness.nav.speed, 9.0);
        assert_eq!(harness.directives, vec![Directive::InterruptAndReplan]);
    }

    #[test]
    fn test_close_target_with_complete_path_ends_chase() {
        let kind = BehaviorKind::Pursuit(PursuitConfig::default());
        let mut harness = Harness::with_target_at(Vec3::new(0.0, 0.0, -6.0));
        assert!(!harness.eligible(&kind));

        let ticks = harness.run(&kind, &OpenFloor, 600).unwrap();
        // One chase tick, then the settle buffer.
        assert!(ticks <= 8, "ticks {ticks}");
        assert_eq!(harness.directives, vec![Directive::InterruptAndReplan]);
    }

    #[test]
    fn test_no_walkable_space_aborts_without_replan() {
        let kind = BehaviorKind::Pursuit(PursuitConfig::default());
        let mut harness = Harness::with_target_at(Vec3::new(0.0, 0.0, -20.0));
        harness.nav.sample_ok = false;
        assert_eq!(harness.run(&kind, &OpenFloor, 600), Some(1));
        assert!(harness.directives.is_empty());
        assert!(harness.nav.warps.is_empty());
    }
}
