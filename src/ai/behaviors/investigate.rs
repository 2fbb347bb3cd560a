//! Go to where a hit came from and look around.

use bevy::prelude::*;
use serde::Deserialize;

use super::{BehaviorCtx, Blackboard, Directive, Step};
use crate::ai::facade::AgentEnv;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvestigateConfig {
    pub speed: f32,
    /// Counts as arrived inside this distance
    pub arrival_radius: f32,
    /// Seconds spent at the point
    pub search_duration: f32,
    /// Give up on a point not reached within this many seconds
    pub max_travel_time: f32,
}

impl Default for InvestigateConfig {
    fn default() -> Self {
        Self {
            speed: 4.0,
            arrival_radius: 1.5,
            search_duration: 3.0,
            max_travel_time: 8.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvestigateProgress {
    pub point: Option<Vec3>,
    travel: f32,
    timer: f32,
}

impl InvestigateConfig {
    pub fn can_execute(&self, env: &AgentEnv, board: &Blackboard) -> bool {
        env.nav.is_ready() && board.investigate_point.is_some()
    }

    pub fn enter(&self, ctx: &mut BehaviorCtx) -> InvestigateProgress {
        let point = ctx.board.investigate_point;
        if let Some(point) = point {
            ctx.env.nav.set_speed(self.speed);
            ctx.env.nav.request_move(point);
        }
        InvestigateProgress {
            point,
            travel: 0.0,
            timer: 0.0,
        }
    }

    pub fn step(&self, progress: &mut InvestigateProgress, ctx: &mut BehaviorCtx) -> Step {
        if progress.point.is_none() {
            return Step::Done;
        }

        if ctx.board.target_visible {
            debug!("{:?} spotted its target while investigating", ctx.env.entity);
            ctx.push(Directive::TargetReacquired);
            ctx.push(Directive::ClearInvestigatePoint);
            return Step::Done;
        }

        if ctx.env.nav.remaining_distance() <= self.arrival_radius {
            progress.timer += ctx.env.dt;
        } else {
            progress.travel += ctx.env.dt;
            if !ctx.env.nav.is_ready() || progress.travel >= self.max_travel_time {
                debug!(
                    "{:?}: investigate point {:?} unreachable, giving up",
                    ctx.env.entity, progress.point
                );
                ctx.push(Directive::ClearInvestigatePoint);
                return Step::Done;
            }
        }

        if progress.timer >= self.search_duration {
            ctx.push(Directive::ClearInvestigatePoint);
            return Step::Done;
        }
        Step::Continue
    }
}
