//! Look around for a lost target, then check near where it was last seen.

use bevy::prelude::*;
use rand::Rng;
use serde::Deserialize;
use std::f32::consts::TAU;

use super::{BehaviorCtx, Directive, Step};
use crate::ai::facade::AgentEnv;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub rotate_duration: f32,
    /// Degrees per second while scanning in place
    pub rotate_speed: f32,
    pub relocate_radius: f32,
    pub relocate_duration: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rotate_duration: 3.0,
            rotate_speed: 120.0,
            relocate_radius: 3.0,
            relocate_duration: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    Scanning,
    Relocating,
}

#[derive(Debug, Clone)]
pub struct SearchProgress {
    pub stage: SearchStage,
    timer: f32,
}

impl SearchConfig {
    pub fn can_execute(&self, env: &AgentEnv) -> bool {
        env.nav.is_ready()
    }

    pub fn enter(&self, _ctx: &mut BehaviorCtx) -> SearchProgress {
        SearchProgress {
            stage: SearchStage::Scanning,
            timer: 0.0,
        }
    }

    pub fn step(&self, progress: &mut SearchProgress, ctx: &mut BehaviorCtx) -> Step {
        if ctx.board.target_visible {
            info!("{:?} reacquired its target while searching", ctx.env.entity);
            ctx.push(Directive::TargetReacquired);
            return Step::Done;
        }

        let dt = ctx.env.dt;
        progress.timer += dt;

        match progress.stage {
            SearchStage::Scanning => {
                ctx.env.agent.rotate_y(self.rotate_speed.to_radians() * dt);
                if progress.timer >= self.rotate_duration {
                    self.relocate(ctx);
                    progress.stage = SearchStage::Relocating;
                    progress.timer = 0.0;
                }
            }
            SearchStage::Relocating => {
                if progress.timer >= self.relocate_duration {
                    info!("{:?} failed to locate its target", ctx.env.entity);
                    ctx.push(Directive::Disengage);
                    return Step::Done;
                }
            }
        }
        Step::Continue
    }

    /// Walk to a random point around the last known position.
    fn relocate(&self, ctx: &mut BehaviorCtx) {
        let center = ctx
            .board
            .last_known_target_position
            .unwrap_or_else(|| ctx.env.position());
        let angle = ctx.rng.gen_range(0.0..TAU);
        let distance = self.relocate_radius * ctx.rng.gen::<f32>().sqrt();
        let point = center + Vec3::new(angle.cos(), 0.0, angle.sin()) * distance;

        if let Some(point) = ctx.env.nav.sample_position(point, self.relocate_radius) {
            ctx.env.nav.request_move(point);
        }
    }
}
