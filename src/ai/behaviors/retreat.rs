//! Back off from a target that is too close, keeping it in view.

use bevy::prelude::*;
use serde::Deserialize;

use super::{BehaviorCtx, Step};
use crate::ai::facade::AgentEnv;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetreatConfig {
    pub speed: f32,
    pub distance: f32,
    pub duration: f32,
    pub min_duration: f32,
    /// Only retreat from targets at most this close
    pub max_distance: f32,
}

impl Default for RetreatConfig {
    fn default() -> Self {
        Self {
            speed: 4.0,
            distance: 3.0,
            duration: 1.0,
            min_duration: 0.5,
            max_distance: 4.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetreatProgress {
    elapsed: f32,
    pub destination: Option<Vec3>,
}

impl RetreatConfig {
    pub fn can_execute(&self, env: &AgentEnv) -> bool {
        env.can_act()
            && env
                .target_distance()
                .is_some_and(|distance| distance <= self.max_distance)
    }

    pub fn enter(&self, ctx: &mut BehaviorCtx) -> RetreatProgress {
        let position = ctx.env.position();
        let away = ctx
            .env
            .live_target()
            .map(|target| (position - target.position).with_y(0.0).normalize_or_zero())
            .filter(|away| *away != Vec3::ZERO)
            .unwrap_or_else(|| ctx.env.agent.back().as_vec3());

        let destination = ctx
            .env
            .nav
            .sample_position(position + away * self.distance, self.distance);
        if let Some(destination) = destination {
            ctx.env.nav.set_speed(self.speed);
            ctx.env.nav.request_move(destination);
        }
        RetreatProgress {
            elapsed: 0.0,
            destination,
        }
    }

    pub fn step(&self, progress: &mut RetreatProgress, ctx: &mut BehaviorCtx) -> Step {
        if !ctx.env.nav.is_ready() {
            return Step::Done;
        }
        progress.elapsed += ctx.env.dt;

        // Losing sight cuts the retreat short, but never below min_duration.
        if progress.elapsed < self.duration && ctx.board.target_visible {
            ctx.face_target();
            return Step::Continue;
        }

        ctx.env.nav.cancel_move();
        if progress.elapsed >= self.min_duration {
            Step::Done
        } else {
            Step::Continue
        }
    }
}
