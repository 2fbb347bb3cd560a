//! Combat behaviors.
//!
//! A behavior is a small immutable config ([`BehaviorKind`]) shared through
//! the profile, plus per-run progress ([`BehaviorProgress`]) owned by the
//! orchestrator that runs it. Every behavior follows the same lifecycle:
//!
//! `can_execute` (pure) -> `enter` (once) -> `step` (every tick until `Done`) -> `exit` (once)
//!
//! Behaviors never touch the orchestrator directly; they push [`Directive`]s
//! which the orchestrator applies after the step.

mod attack;
mod investigate;
mod pursuit;
mod retreat;
mod rush;
mod search;
mod stalk;

use bevy::prelude::*;
use rand::{Rng, RngCore};
use serde::Deserialize;

use super::facade::AgentEnv;

pub use attack::{AttackConfig, AttackProgress};
pub use investigate::{InvestigateConfig, InvestigateProgress};
pub use pursuit::{PursuitConfig, PursuitProgress};
pub use retreat::{RetreatConfig, RetreatProgress};
pub use rush::{RushConfig, RushProgress};
pub use search::{SearchConfig, SearchProgress};
pub use stalk::{StalkConfig, StalkProgress};

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Done,
}

/// Requests a behavior makes of its orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Enqueue `name` at the front, optionally skipping one eligibility check.
    ForceState { name: String, override_eligibility: bool },
    InterruptAndReplan,
    Cooldown { name: String, seconds: f32 },
    Ban { name: String, seconds: f32 },
    /// Hold every behavior back for `seconds`.
    GlobalGate { seconds: f32 },
    /// Draw one of these by weight and enqueue it.
    WeightedFallback(Vec<(String, f32)>),
    TargetReacquired,
    Disengage,
    /// A strike finished; `landed` if it hit anything.
    AttackResolved { landed: bool },
    ClearInvestigatePoint,
}

/// Orchestrator-owned facts a behavior may read.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blackboard {
    pub target_visible: bool,
    pub last_known_target_position: Option<Vec3>,
    pub investigate_point: Option<Vec3>,
    /// Degrees per second
    pub turn_rate: f32,
}

/// Everything `enter` and `step` get.
pub struct BehaviorCtx<'c, 'e> {
    pub env: &'c mut AgentEnv<'e>,
    pub board: &'c Blackboard,
    pub rng: &'c mut dyn RngCore,
    pub directives: &'c mut Vec<Directive>,
}

impl BehaviorCtx<'_, '_> {
    pub fn push(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    pub fn face_target(&mut self) {
        self.env.face_target_smooth(self.board.turn_rate);
    }
}

/// Every behavior the orchestrator can run, with its tuning.
#[derive(Debug, Clone, Deserialize)]
pub enum BehaviorKind {
    Attack(AttackConfig),
    Rush(RushConfig),
    Retreat(RetreatConfig),
    Stalk(StalkConfig),
    Pursuit(PursuitConfig),
    Search(SearchConfig),
    Investigate(InvestigateConfig),
}

/// Per-run state, one variant per [`BehaviorKind`].
#[derive(Debug, Clone)]
pub enum BehaviorProgress {
    Attack(AttackProgress),
    Rush(RushProgress),
    Retreat(RetreatProgress),
    Stalk(StalkProgress),
    Pursuit(PursuitProgress),
    Search(SearchProgress),
    Investigate(InvestigateProgress),
}

impl BehaviorKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Attack(_) => "attack",
            Self::Rush(_) => "rush",
            Self::Retreat(_) => "retreat",
            Self::Stalk(_) => "stalk",
            Self::Pursuit(_) => "pursuit",
            Self::Search(_) => "search",
            Self::Investigate(_) => "investigate",
        }
    }

    /// Attack-class behaviors get the aggression bonus by default.
    pub fn is_aggressive(&self) -> bool {
        matches!(self, Self::Attack(_) | Self::Rush(_))
    }

    /// Behaviors that exist to find a lost target keep running while it is unseen.
    pub fn tolerates_lost_target(&self) -> bool {
        matches!(self, Self::Search(_) | Self::Investigate(_))
    }

    /// Other behavior names this config hands off to.
    pub fn referenced_behaviors(&self) -> Vec<&str> {
        match self {
            Self::Rush(config) => config
                .fallback
                .iter()
                .map(|(name, _)| name.as_str())
                .collect(),
            Self::Stalk(config) => vec![config.handoff.as_str()],
            _ => Vec::new(),
        }
    }

    pub fn can_execute(&self, env: &AgentEnv, board: &Blackboard) -> bool {
        match self {
            Self::Attack(config) => config.can_execute(env),
            Self::Rush(config) => config.can_execute(env),
            Self::Retreat(config) => config.can_execute(env),
            Self::Stalk(config) => config.can_execute(env),
            Self::Pursuit(config) => config.can_execute(env),
            Self::Search(config) => config.can_execute(env),
            Self::Investigate(config) => config.can_execute(env, board),
        }
    }

    pub fn enter(&self, ctx: &mut BehaviorCtx) -> BehaviorProgress {
        match self {
            Self::Attack(config) => BehaviorProgress::Attack(config.enter(ctx)),
            Self::Rush(config) => BehaviorProgress::Rush(config.enter(ctx)),
            Self::Retreat(config) => BehaviorProgress::Retreat(config.enter(ctx)),
            Self::Stalk(config) => BehaviorProgress::Stalk(config.enter(ctx)),
            Self::Pursuit(config) => BehaviorProgress::Pursuit(config.enter(ctx)),
            Self::Search(config) => BehaviorProgress::Search(config.enter(ctx)),
            Self::Investigate(config) => BehaviorProgress::Investigate(config.enter(ctx)),
        }
    }

    pub fn step(&self, progress: &mut BehaviorProgress, ctx: &mut BehaviorCtx) -> Step {
        match (self, progress) {
            (Self::Attack(config), BehaviorProgress::Attack(progress)) => config.step(progress, ctx),
            (Self::Rush(config), BehaviorProgress::Rush(progress)) => config.step(progress, ctx),
            (Self::Retreat(config), BehaviorProgress::Retreat(progress)) => config.step(progress, ctx),
            (Self::Stalk(config), BehaviorProgress::Stalk(progress)) => config.step(progress, ctx),
            (Self::Pursuit(config), BehaviorProgress::Pursuit(progress)) => config.step(progress, ctx),
            (Self::Search(config), BehaviorProgress::Search(progress)) => config.step(progress, ctx),
            (Self::Investigate(config), BehaviorProgress::Investigate(progress)) => {
                config.step(progress, ctx)
            }
            _ => {
                warn!("{:?}: progress does not belong to {}", ctx.env.entity, self.label());
                Step::Done
            }
        }
    }

    /// Cleanup. Every behavior hands movement back idle.
    pub fn exit(&self, env: &mut AgentEnv) {
        env.nav.cancel_move();
    }
}

/// Uniform sample in `[min, max]`, tolerant of `min >= max`.
pub(crate) fn jitter(rng: &mut dyn RngCore, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..=max)
    } else {
        min
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::ai::facade::testing::OpenFloor;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_jitter_handles_degenerate_ranges() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(jitter(&mut rng, 2.0, 2.0), 2.0);
        assert_eq!(jitter(&mut rng, 3.0, 1.0), 3.0);
        for _ in 0..100 {
            let value = jitter(&mut rng, 1.0, 2.0);
            assert!((1.0..=2.0).contains(&value));
        }
    }

    #[test]
    fn test_mismatched_progress_ends_the_run() {
        let attack = BehaviorKind::Attack(AttackConfig::default());
        let retreat = BehaviorKind::Retreat(RetreatConfig::default());
        let mut harness = Harness::with_target_at(Vec3::new(0.0, 0.0, -3.0));

        let mut env = AgentEnv {
            entity: Entity::from_raw(1),
            now: 0.0,
            dt: DT,
            agent: &mut harness.transform,
            target: harness.target,
            nav: &mut harness.nav,
            vision: &OpenFloor,
            scanner: &crate::ai::facade::NoTargets,
            weapon: None,
        };
        let mut ctx = BehaviorCtx {
            env: &mut env,
            board: &harness.board,
            rng: &mut harness.rng,
            directives: &mut harness.directives,
        };
        let mut progress = retreat.enter(&mut ctx);
        assert_eq!(attack.step(&mut progress, &mut ctx), Step::Done);
    }

    #[test]
    fn test_kind_classification() {
        assert!(BehaviorKind::Rush(default()).is_aggressive());
        assert!(!BehaviorKind::Stalk(default()).is_aggressive());
        assert!(BehaviorKind::Search(default()).tolerates_lost_target());
        assert!(!BehaviorKind::Pursuit(default()).tolerates_lost_target());
        assert_eq!(
            BehaviorKind::Rush(default()).referenced_behaviors(),
            vec!["RetreatState", "StalkState"]
        );
    }
}
