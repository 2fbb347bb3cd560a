//! Circle the target at a drifting radius, then hand off to a charge.

use bevy::prelude::*;
use rand::Rng;
use serde::Deserialize;

use super::{jitter, BehaviorCtx, Directive, Step};
use crate::ai::facade::AgentEnv;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StalkConfig {
    pub radius: f32,
    pub speed: f32,
    /// Radians per second around the target
    pub orbit_speed: f32,
    /// Pause after orbiting before the hand-off
    pub exit_delay: f32,
    pub min_time: f32,
    pub max_time: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Keep stalking (and stay eligible) however far the target gets
    pub ignore_max_distance: bool,
    /// Radius change per second, drawn per run
    pub min_drift: f32,
    pub max_drift: f32,
    /// Chance the radius drifts inward
    pub inward_odds: f32,
    /// Snap orbit points to walkable space within this distance
    pub sample_radius: f32,
    /// Forced when the orbit ends or the target slips out of range
    pub handoff: String,
}

impl Default for StalkConfig {
    fn default() -> Self {
        Self {
            radius: 3.5,
            speed: 2.0,
            orbit_speed: 1.0,
            exit_delay: 0.5,
            min_time: 12.0,
            max_time: 12.0,
            min_distance: 7.0,
            max_distance: 12.0,
            ignore_max_distance: false,
            min_drift: 0.1,
            max_drift: 0.5,
            inward_odds: 0.5,
            sample_radius: 1.0,
            handoff: "RushState".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StalkProgress {
    duration: f32,
    timer: f32,
    /// +1 counter-clockwise, -1 clockwise
    direction: f32,
    drift: f32,
    angle: f32,
    pub radius: f32,
    exit_timer: f32,
    orbiting: bool,
}

impl StalkConfig {
    pub fn can_execute(&self, env: &AgentEnv) -> bool {
        env.can_act()
            && env.target_distance().is_some_and(|distance| {
                distance >= self.min_distance && (self.ignore_max_distance || distance <= self.max_distance)
            })
    }

    pub fn enter(&self, ctx: &mut BehaviorCtx) -> StalkProgress {
        let direction = if ctx.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let drift_speed = jitter(ctx.rng, self.min_drift, self.max_drift);
        let inward = ctx.rng.gen::<f32>() < self.inward_odds;
        let drift = if inward { -drift_speed } else { drift_speed };

        let angle = ctx
            .env
            .live_target()
            .map(|target| {
                let from_target = ctx.env.position() - target.position;
                from_target.z.atan2(from_target.x)
            })
            .unwrap_or(0.0);

        ctx.env.nav.set_speed(self.speed);
        StalkProgress {
            duration: jitter(ctx.rng, self.min_time, self.max_time),
            timer: 0.0,
            direction,
            drift,
            angle,
            radius: self.radius,
            exit_timer: 0.0,
            orbiting: true,
        }
    }

    pub fn step(&self, progress: &mut StalkProgress, ctx: &mut BehaviorCtx) -> Step {
        let Some(target) = ctx.env.live_target() else {
            return Step::Done;
        };
        let dt = ctx.env.dt;

        if !progress.orbiting {
            progress.exit_timer += dt;
            if progress.exit_timer >= self.exit_delay {
                debug!("{:?}: stalk finished, handing off to {}", ctx.env.entity, self.handoff);
                self.hand_off(ctx);
                return Step::Done;
            }
            return Step::Continue;
        }

        if !ctx.env.nav.is_ready() {
            return Step::Done;
        }

        let distance = ctx.env.position().distance(target.position);
        if !self.ignore_max_distance && distance > self.max_distance {
            debug!(
                "{:?}: target slipped out of stalk range ({:.1}), forcing {}",
                ctx.env.entity, distance, self.handoff
            );
            self.hand_off(ctx);
            return Step::Done;
        }

        progress.timer += dt;
        progress.angle += progress.direction * self.orbit_speed * dt;
        progress.radius = (progress.radius + progress.drift * dt).clamp(0.5, self.radius * 2.0);

        let offset = Vec3::new(progress.angle.cos(), 0.0, progress.angle.sin()) * progress.radius;
        if let Some(point) = ctx
            .env
            .nav
            .sample_position(target.position + offset, self.sample_radius)
        {
            ctx.env.nav.request_move(point);
        }
        ctx.face_target();

        if progress.timer >= progress.duration {
            ctx.env.nav.cancel_move();
            progress.orbiting = false;
        }
        Step::Continue
    }

    /// The hand-off target is usually out of its own eligible band, so the
    /// enqueue carries a one-shot eligibility override.
    fn hand_off(&self, ctx: &mut BehaviorCtx) {
        ctx.push(Directive::ForceState {
            name: self.handoff.clone(),
            override_eligibility: true,
        });
    }
}
