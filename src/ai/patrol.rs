//! Out-of-combat waypoint loop.
//!
//! An agent with a [`Patrol`] walks its waypoints in order while its
//! orchestrator is disengaged, pausing at each one. Engaging suspends the
//! route in place; the route picks up again at the next waypoint once the
//! agent's [`CombatDisengagedEvent`] arrives.

use bevy::prelude::*;
use serde::Deserialize;

use super::facade::Navigator;
use super::nav::NavAgent;
use super::orchestrator::CombatOrchestrator;
use crate::combat::Dead;
use crate::core::CombatDisengagedEvent;

/// Patrol tuning as authored in an enemy definition.
#[derive(Deserialize, Clone, Debug)]
pub struct PatrolConfig {
    /// Offsets from the spawn point, walked in order and looped
    pub waypoints: Vec<(f32, f32, f32)>,
    #[serde(default = "default_patrol_speed")]
    pub speed: f32,
    /// Seconds spent standing at each waypoint
    #[serde(default = "default_wait_time")]
    pub wait_time: f32,
}

fn default_patrol_speed() -> f32 {
    2.5
}

fn default_wait_time() -> f32 {
    2.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Leg {
    /// Needs a move toward the next waypoint
    Departing,
    Walking,
    Waiting(f32),
}

/// Waypoint loop state for one agent.
#[derive(Component, Debug, Clone)]
pub struct Patrol {
    pub waypoints: Vec<Vec3>,
    pub speed: f32,
    pub wait_time: f32,
    /// Counts as arrived inside this distance
    pub arrival_radius: f32,
    next: usize,
    leg: Leg,
    suspended: bool,
}

impl Patrol {
    pub fn new(waypoints: Vec<Vec3>, speed: f32, wait_time: f32) -> Self {
        Self {
            waypoints,
            speed,
            wait_time,
            arrival_radius: 0.5,
            next: 0,
            leg: Leg::Departing,
            suspended: false,
        }
    }

    /// Build a route around `origin` from authored offsets.
    pub fn from_config(config: &PatrolConfig, origin: Vec3) -> Self {
        let waypoints = config
            .waypoints
            .iter()
            .map(|&(x, y, z)| origin + Vec3::new(x, y, z))
            .collect();
        Self::new(waypoints, config.speed, config.wait_time)
    }

    /// Index of the waypoint the next departure heads for.
    pub fn next_waypoint(&self) -> usize {
        self.next
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Stop walking and leave the navigator to combat. Idempotent.
    pub fn suspend(&mut self, nav: &mut dyn Navigator) {
        if self.suspended {
            return;
        }
        if self.leg == Leg::Walking {
            nav.cancel_move();
        }
        self.suspended = true;
        self.leg = Leg::Departing;
    }

    /// Head for the next waypoint on the following step.
    pub fn resume(&mut self) {
        self.suspended = false;
        self.leg = Leg::Departing;
    }

    /// Advance the loop by `dt` seconds.
    pub fn step(&mut self, nav: &mut dyn Navigator, dt: f32) {
        if self.suspended || self.waypoints.is_empty() || !nav.is_ready() {
            return;
        }

        match self.leg {
            Leg::Departing => {
                self.next %= self.waypoints.len();
                nav.set_speed(self.speed);
                if nav.request_move(self.waypoints[self.next]) {
                    self.next = (self.next + 1) % self.waypoints.len();
                    self.leg = Leg::Walking;
                }
            }
            Leg::Walking => {
                if nav.remaining_distance() <= self.arrival_radius {
                    nav.cancel_move();
                    self.leg = Leg::Waiting(0.0);
                }
            }
            Leg::Waiting(waited) => {
                let waited = waited + dt;
                self.leg = if waited >= self.wait_time {
                    Leg::Departing
                } else {
                    Leg::Waiting(waited)
                };
            }
        }
    }
}

/// Walk the routes of agents that are out of combat; suspend the rest.
pub fn walk_patrols(
    time: Res<Time>,
    mut agents: Query<(&Transform, &CombatOrchestrator, &mut NavAgent, &mut Patrol), Without<Dead>>,
) {
    let dt = time.delta_secs();
    for (transform, orchestrator, mut nav, mut patrol) in agents.iter_mut() {
        nav.sync(transform.translation);
        if orchestrator.is_engaged() {
            patrol.suspend(&mut *nav);
            continue;
        }
        patrol.step(&mut *nav, dt);
    }
}

/// Put agents back on their route when they leave combat.
pub fn resume_patrols(
    mut disengaged_events: EventReader<CombatDisengagedEvent>,
    mut patrols: Query<&mut Patrol, Without<Dead>>,
) {
    for event in disengaged_events.read() {
        if let Ok(mut patrol) = patrols.get_mut(event.agent) {
            info!(
                "{:?} back on patrol toward waypoint {}",
                event.agent,
                patrol.next_waypoint()
            );
            patrol.resume();
        }
    }
}
