//! Sprint at a distant target and strike on arrival.
//!
//! `warm-up -> closing (ground probed every tick) -> strike delay -> post-strike -> settle`
//!
//! While closing, a fan of downward rays ahead of the agent checks there is
//! floor to run on. Too many misses for longer than the grace period aborts
//! the rush in favor of a weighted fallback.

use bevy::prelude::*;
use serde::Deserialize;

use super::{BehaviorCtx, Directive, Step};
use crate::ai::facade::{AgentEnv, GROUND_MASK};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RushConfig {
    pub speed: f32,
    /// Strike once inside this distance
    pub attack_range: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Face the target before breaking into a run
    pub warmup: f32,
    pub strike_delay: f32,
    pub post_strike: f32,
    pub min_settle: f32,
    /// Global gate applied once the rush completes
    pub cooldown_after: f32,
    pub probe_count: usize,
    pub probe_spacing: f32,
    /// Ray origins sit this far above the agent
    pub probe_height: f32,
    /// How far below the agent a probe still counts as ground
    pub probe_depth: f32,
    /// Misses (out of `probe_count`) that make the path unsafe
    pub unsafe_probe_threshold: usize,
    /// Seconds the path may stay unsafe before aborting
    pub unsafe_grace: f32,
    /// Enqueued by weight when the path is unsafe
    pub fallback: Vec<(String, f32)>,
}

impl Default for RushConfig {
    fn default() -> Self {
        Self {
            speed: 6.0,
            attack_range: 2.0,
            min_distance: 7.0,
            max_distance: 10.0,
            warmup: 0.15,
            strike_delay: 0.1,
            post_strike: 0.5,
            min_settle: 0.5,
            cooldown_after: 1.0,
            probe_count: 6,
            probe_spacing: 0.5,
            probe_height: 0.5,
            probe_depth: 1.5,
            unsafe_probe_threshold: 4,
            unsafe_grace: 0.25,
            fallback: vec![
                ("RetreatState".to_string(), 0.3),
                ("StalkState".to_string(), 0.7),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RushStage {
    Warmup,
    Closing,
    StrikeDelay,
    PostStrike,
    Settle,
}

#[derive(Debug, Clone)]
pub struct RushProgress {
    pub stage: RushStage,
    timer: f32,
    unsafe_for: f32,
    swung: bool,
}

impl RushProgress {
    fn advance(&mut self, stage: RushStage) {
        self.stage = stage;
        self.timer = 0.0;
    }
}

impl RushConfig {
    pub fn can_execute(&self, env: &AgentEnv) -> bool {
        env.can_act()
            && env
                .target_distance()
                .is_some_and(|distance| (self.min_distance..=self.max_distance).contains(&distance))
    }

    pub fn enter(&self, ctx: &mut BehaviorCtx) -> RushProgress {
        ctx.env.nav.set_speed(self.speed);
        RushProgress {
            stage: RushStage::Warmup,
            timer: 0.0,
            unsafe_for: 0.0,
            swung: false,
        }
    }

    pub fn step(&self, progress: &mut RushProgress, ctx: &mut BehaviorCtx) -> Step {
        let Some(target) = ctx.env.live_target() else {
            return Step::Done;
        };
        progress.timer += ctx.env.dt;

        match progress.stage {
            RushStage::Warmup => {
                ctx.face_target();
                if progress.timer >= self.warmup {
                    progress.advance(RushStage::Closing);
                }
            }
            RushStage::Closing => {
                if !ctx.env.nav.is_ready() {
                    warn!("{:?}: rush lost its navigator", ctx.env.entity);
                    return Step::Done;
                }
                if ctx.env.position().distance(target.position) <= self.attack_range {
                    ctx.env.nav.cancel_move();
                    ctx.face_target();
                    progress.advance(RushStage::StrikeDelay);
                    return Step::Continue;
                }

                let misses = self.probe_ground(ctx.env, target.position);
                if misses >= self.unsafe_probe_threshold {
                    progress.unsafe_for += ctx.env.dt;
                    if progress.unsafe_for >= self.unsafe_grace {
                        warn!(
                            "{:?}: rush aborted, {} of {} ground probes missed",
                            ctx.env.entity, misses, self.probe_count
                        );
                        ctx.env.nav.cancel_move();
                        ctx.push(Directive::WeightedFallback(self.fallback.clone()));
                        return Step::Done;
                    }
                } else {
                    progress.unsafe_for = 0.0;
                }

                ctx.env.nav.request_move(target.position);
                ctx.face_target();
            }
            RushStage::StrikeDelay => {
                ctx.face_target();
                if progress.timer >= self.strike_delay {
                    progress.swung = ctx.env.perform_attack();
                    progress.advance(RushStage::PostStrike);
                }
            }
            RushStage::PostStrike => {
                if progress.timer >= self.post_strike {
                    progress.advance(RushStage::Settle);
                }
            }
            RushStage::Settle => {
                if progress.timer >= self.min_settle && !ctx.env.weapon_busy() {
                    if progress.swung {
                        let landed = ctx.env.weapon_landed_hit();
                        ctx.push(Directive::AttackResolved { landed });
                    }
                    ctx.push(Directive::GlobalGate {
                        seconds: self.cooldown_after,
                    });
                    return Step::Done;
                }
            }
        }
        Step::Continue
    }

    /// Count downward probes ahead of the agent that find no ground.
    pub fn probe_ground(&self, env: &AgentEnv, toward: Vec3) -> usize {
        let position = env.position();
        let mut heading = (toward - position).with_y(0.0).normalize_or_zero();
        if heading == Vec3::ZERO {
            heading = env.agent.forward().as_vec3().with_y(0.0).normalize_or_zero();
        }

        let reach = self.probe_height + self.probe_depth;
        (1..=self.probe_count)
            .filter(|i| {
                let origin =
                    position + heading * (self.probe_spacing * *i as f32) + Vec3::Y * self.probe_height;
                env.vision
                    .raycast(origin, Vec3::NEG_Y, reach, GROUND_MASK)
                    .is_none()
            })
            .count()
    }
}
