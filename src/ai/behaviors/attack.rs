//! Close in, wind up, swing once.

use bevy::prelude::*;
use serde::Deserialize;

use super::{jitter, BehaviorCtx, Directive, Step};
use crate::ai::facade::AgentEnv;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Eligible target distance range
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_approach_speed: f32,
    pub max_approach_speed: f32,
    /// Seconds from entry before the swing, drawn per run
    pub min_wait: f32,
    pub max_wait: f32,
    /// Stop approaching inside this distance
    pub desired_range: f32,
    /// Minimum time spent after the swing starts
    pub min_duration: f32,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            min_distance: 1.0,
            max_distance: 7.0,
            min_approach_speed: 2.0,
            max_approach_speed: 4.0,
            min_wait: 1.0,
            max_wait: 2.0,
            desired_range: 1.5,
            min_duration: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackStage {
    Approach,
    Windup,
    Recover,
}

#[derive(Debug, Clone)]
pub struct AttackProgress {
    pub stage: AttackStage,
    wait: f32,
    elapsed: f32,
    recover: f32,
    swung: bool,
}

impl AttackConfig {
    pub fn can_execute(&self, env: &AgentEnv) -> bool {
        env.can_act()
            && env
                .target_distance()
                .is_some_and(|distance| (self.min_distance..=self.max_distance).contains(&distance))
    }

    pub fn enter(&self, ctx: &mut BehaviorCtx) -> AttackProgress {
        let speed = jitter(ctx.rng, self.min_approach_speed, self.max_approach_speed);
        ctx.env.nav.set_speed(speed);
        AttackProgress {
            stage: AttackStage::Approach,
            wait: jitter(ctx.rng, self.min_wait, self.max_wait),
            elapsed: 0.0,
            recover: 0.0,
            swung: false,
        }
    }

    pub fn step(&self, progress: &mut AttackProgress, ctx: &mut BehaviorCtx) -> Step {
        let Some(target) = ctx.env.live_target() else {
            return Step::Done;
        };
        progress.elapsed += ctx.env.dt;

        match progress.stage {
            AttackStage::Approach => {
                if !ctx.env.nav.is_ready() {
                    warn!("{:?}: attack approach lost its navigator", ctx.env.entity);
                    return Step::Done;
                }
                if ctx.env.position().distance(target.position) > self.desired_range {
                    ctx.env.nav.request_move(target.position);
                    ctx.face_target();
                } else {
                    ctx.env.nav.cancel_move();
                    ctx.env.face_target_locked();
                    progress.stage = AttackStage::Windup;
                }
            }
            AttackStage::Windup => {
                ctx.env.face_target_locked();
                if progress.elapsed >= progress.wait {
                    progress.swung = ctx.env.perform_attack();
                    progress.stage = AttackStage::Recover;
                }
            }
            AttackStage::Recover => {
                progress.recover += ctx.env.dt;
                if progress.recover >= self.min_duration && !ctx.env.weapon_busy() {
                    if progress.swung {
                        let landed = ctx.env.weapon_landed_hit();
                        ctx.push(Directive::AttackResolved { landed });
                    }
                    return Step::Done;
                }
            }
        }
        Step::Continue
    }
}
