//! Per-agent combat loop.
//!
//! A [`CombatOrchestrator`] owns everything one agent needs to fight: the
//! bound target, a queue of pending behaviors, cooldowns and bans, the
//! vision-loss timer and the currently running behavior. It is advanced once
//! per fixed tick through [`CombatOrchestrator::tick`]; a running behavior is
//! stepped exactly once per tick and never blocks another agent.
//!
//! Stopping a behavior for any reason (completion, vision loss, disengage)
//! always runs its exit hook before anything else is entered.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;

use super::behaviors::{BehaviorCtx, BehaviorProgress, Blackboard, Directive, Step};
use super::facade::AgentEnv;
use super::perception::in_combat_vision;
use super::profile::{BehaviorId, BehaviorProfile, OrchestratorSettings};
use super::selector::{choose_weighted, select_behavior};

/// Why an enqueue was refused. The queue is left untouched in every case.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnqueueError {
    #[error("no behavior named {0} in this profile")]
    UnknownBehavior(String),

    #[error("{0} is cooling down")]
    CoolingDown(String),

    #[error("{0} is banned")]
    Banned(String),

    #[error("{0} cannot execute right now")]
    Ineligible(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Completed,
    LostTarget,
    Disengaged,
}

/// Things that happened during a tick, for systems to forward as events.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Engaged { target: Entity },
    Disengaged,
    /// Allies within `radius` should join against `target`.
    AllyAlert { target: Entity, radius: f32 },
    BehaviorStarted(String),
    BehaviorEnded { name: String, reason: EndReason },
}

#[derive(Debug)]
struct ActiveRun {
    id: BehaviorId,
    progress: BehaviorProgress,
}

#[derive(Component, Debug)]
pub struct CombatOrchestrator {
    profile: Arc<BehaviorProfile>,
    engaged: bool,
    loop_alive: bool,
    target: Option<Entity>,
    now: f32,

    target_visible: bool,
    last_known_target_position: Option<Vec3>,
    time_since_seen: f32,
    loss_handled: bool,

    queue: VecDeque<BehaviorId>,
    active: Option<ActiveRun>,
    last_executed: Option<BehaviorId>,
    /// Stop the loop once the active run ends
    stop_after_active: bool,

    /// Expiry times, keyed by behavior name
    cooldowns: HashMap<String, f32>,
    bans: HashMap<String, f32>,
    next_available_at: f32,

    recently_failed_attack: bool,
    eligibility_override: bool,
    investigate_point: Option<Vec3>,
    pending_damage: Vec<(Entity, Vec3)>,

    rng: StdRng,
    notices: Vec<Notice>,
}

impl CombatOrchestrator {
    pub fn new(profile: Arc<BehaviorProfile>, seed: u64) -> Self {
        Self {
            profile,
            engaged: false,
            loop_alive: false,
            target: None,
            now: 0.0,
            target_visible: false,
            last_known_target_position: None,
            time_since_seen: 0.0,
            loss_handled: false,
            queue: VecDeque::new(),
            active: None,
            last_executed: None,
            stop_after_active: false,
            cooldowns: HashMap::new(),
            bans: HashMap::new(),
            next_available_at: 0.0,
            recently_failed_attack: false,
            eligibility_override: false,
            investigate_point: None,
            pending_damage: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            notices: Vec::new(),
        }
    }

    pub fn profile(&self) -> &BehaviorProfile {
        &self.profile
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.profile.settings
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Engaged and the loop is still deciding.
    pub fn is_running(&self) -> bool {
        self.engaged && self.loop_alive
    }

    pub fn target(&self) -> Option<Entity> {
        self.target
    }

    pub fn pending(&self) -> Vec<&str> {
        self.queue
            .iter()
            .map(|id| self.profile.name_of(*id))
            .collect()
    }

    pub fn last_executed(&self) -> Option<&str> {
        self.last_executed.map(|id| self.profile.name_of(id))
    }

    pub fn active_behavior(&self) -> Option<&str> {
        self.active.as_ref().map(|run| self.profile.name_of(run.id))
    }

    pub fn time_since_target_seen(&self) -> f32 {
        self.time_since_seen
    }

    pub fn last_known_target_position(&self) -> Option<Vec3> {
        self.last_known_target_position
    }

    pub fn investigate_point(&self) -> Option<Vec3> {
        self.investigate_point
    }

    pub fn recently_failed_attack(&self) -> bool {
        self.recently_failed_attack
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Bind `target` and start the loop. No-op while already running.
    ///
    /// With `broadcast`, allies within the profile's alert radius are asked
    /// to join.
    pub fn enter_combat(&mut self, target: Entity, broadcast: bool) -> bool {
        if self.is_running() {
            return false;
        }

        self.target = Some(target);
        self.engaged = true;
        self.loop_alive = true;
        self.stop_after_active = false;
        self.reset_loss_tracking();

        self.notices.push(Notice::Engaged { target });
        let radius = self.profile.settings.alert_radius;
        if broadcast && radius > 0.0 {
            self.notices.push(Notice::AllyAlert { target, radius });
        }
        true
    }

    /// Stop everything. Safe to call in any state.
    pub fn disengage(&mut self, env: &mut AgentEnv) {
        self.end_active(env, EndReason::Disengaged);
        self.queue.clear();

        let was_engaged = self.engaged;
        self.engaged = false;
        self.loop_alive = false;
        self.target = None;
        self.stop_after_active = false;
        self.recently_failed_attack = false;
        self.eligibility_override = false;
        self.reset_loss_tracking();

        if was_engaged {
            info!("{:?} disengaged", env.entity);
            self.notices.push(Notice::Disengaged);
        }
    }

    /// Drop all state without running exit hooks. For agents that died.
    pub fn shutdown(&mut self) {
        self.active = None;
        self.queue.clear();
        self.pending_damage.clear();
        self.engaged = false;
        self.loop_alive = false;
        self.target = None;
    }

    /// Validate and append `name` to the pending queue.
    pub fn enqueue_state(&mut self, name: &str, env: &AgentEnv) -> Result<(), EnqueueError> {
        let id = self.admit(name, env)?;
        self.queue.push_back(id);
        Ok(())
    }

    /// Validate `name` and put it at the front of the queue, ahead of
    /// anything the selector picked.
    pub fn enqueue_force_state(&mut self, name: &str, env: &AgentEnv) -> Result<(), EnqueueError> {
        let id = self.admit(name, env)?;
        self.queue.push_front(id);
        Ok(())
    }

    /// Let the very next enqueue skip its eligibility check.
    pub fn override_next_eligibility_check(&mut self) {
        self.eligibility_override = true;
    }

    pub fn set_state_cooldown(&mut self, name: &str, seconds: f32) {
        self.cooldowns.insert(name.to_string(), self.now + seconds);
    }

    pub fn ban_state_for_seconds(&mut self, name: &str, seconds: f32) {
        self.bans.insert(name.to_string(), self.now + seconds);
    }

    /// Throw away pending work and pick again right now.
    pub fn request_interrupt_and_replan(&mut self, env: &AgentEnv) {
        self.queue.clear();
        if let Some(id) = self.select(env) {
            debug!("{:?}: replanned to {}", env.entity, self.profile.name_of(id));
            self.queue.push_back(id);
        }
    }

    /// Queue a hit for the next tick.
    pub fn notify_damaged(&mut self, source: Entity, hit_point: Vec3) {
        self.pending_damage.push((source, hit_point));
    }

    /// Join an ally's fight. Never re-broadcast.
    pub fn receive_ally_alert(&mut self, caller: Entity, target: Entity) -> bool {
        if self.is_running() {
            return false;
        }
        debug!("joining {:?} against {:?}", caller, target);
        self.enter_combat(target, false)
    }

    /// Advance the loop by one tick.
    pub fn tick(&mut self, env: &mut AgentEnv) {
        self.now = env.now;
        self.process_damage(env);
        if !self.is_running() {
            return;
        }

        self.resolve_target(env);
        if env.live_target().is_none() && !self.retarget(env) {
            info!("{:?}: target gone and nothing nearby", env.entity);
            self.disengage(env);
            return;
        }

        if let (Some(limit), Some(distance)) = (
            self.profile.settings.disengage_distance,
            env.target_distance(),
        ) {
            if distance > limit {
                info!("{:?}: target out of reach ({:.1})", env.entity, distance);
                self.disengage(env);
                return;
            }
        }

        self.update_vision(env);

        if self.active.is_some() {
            // Step first, then judge the loss against what is still running.
            self.run_active(env);
            let intolerant = self.active.as_ref().is_some_and(|run| {
                !self
                    .profile
                    .entry(run.id)
                    .is_some_and(|entry| entry.behavior.tolerates_lost_target())
            });
            if intolerant && self.is_running() && self.target_lost() {
                self.end_active(env, EndReason::LostTarget);
                self.handle_target_loss(env);
            }
            return;
        }

        if self.target_lost() && !self.loss_handled {
            self.handle_target_loss(env);
            if !self.is_running() {
                return;
            }
        }

        if self.queue.is_empty() {
            self.plan(env);
            if !self.is_running() {
                return;
            }
        }

        if self.now < self.next_available_at {
            return;
        }
        if let Some(id) = self.queue.pop_front() {
            self.start(id, env);
            if self.active.is_some() {
                self.run_active(env);
            }
        }
    }

    fn admit(&mut self, name: &str, env: &AgentEnv) -> Result<BehaviorId, EnqueueError> {
        // Single use: whatever the outcome, the next enqueue is checked again.
        let override_eligibility = std::mem::take(&mut self.eligibility_override);

        let Some(id) = self.profile.id_of(name) else {
            return Err(EnqueueError::UnknownBehavior(name.to_string()));
        };
        if expired_after(&self.cooldowns, name, self.now) {
            return Err(EnqueueError::CoolingDown(name.to_string()));
        }
        if expired_after(&self.bans, name, self.now) {
            return Err(EnqueueError::Banned(name.to_string()));
        }
        if override_eligibility {
            debug!("{:?}: {} skips its eligibility check", env.entity, name);
            return Ok(id);
        }

        let board = self.blackboard();
        let eligible = self
            .profile
            .entry(id)
            .is_some_and(|entry| entry.behavior.can_execute(env, &board));
        if !eligible {
            return Err(EnqueueError::Ineligible(name.to_string()));
        }
        Ok(id)
    }

    fn select(&mut self, env: &AgentEnv) -> Option<BehaviorId> {
        let board = self.blackboard();
        let now = self.now;
        let cooldowns = &self.cooldowns;
        let bans = &self.bans;
        // A replan from inside a run follows that run, not the one before it.
        let predecessor = self.active.as_ref().map(|run| run.id).or(self.last_executed);
        select_behavior(
            &self.profile,
            predecessor,
            self.recently_failed_attack,
            self.profile.settings.aggression_multiplier,
            |_, entry| {
                !expired_after(cooldowns, &entry.name, now)
                    && !expired_after(bans, &entry.name, now)
                    && entry.behavior.can_execute(env, &board)
            },
            &mut self.rng,
        )
    }

    /// Queue is empty: select, retarget, search once, or give up.
    fn plan(&mut self, env: &mut AgentEnv) {
        if let Some(id) = self.select(env) {
            debug!("{:?}: selected {}", env.entity, self.profile.name_of(id));
            self.queue.push_back(id);
            return;
        }

        if self.retarget(env) {
            return;
        }

        if let Some(name) = self.profile.settings.fallback_search.clone() {
            match self.enqueue_force_state(&name, env) {
                Ok(()) => {
                    info!("{:?}: nothing to do, searching once with {}", env.entity, name);
                    self.stop_after_active = true;
                    return;
                }
                Err(e) => warn!("{:?}: fallback search refused: {}", env.entity, e),
            }
        }

        warn!("{:?}: no behavior could be selected", env.entity);
        self.disengage(env);
    }

    /// Bind the first live candidate other than the current target.
    fn retarget(&mut self, env: &mut AgentEnv) -> bool {
        let current = self.target;
        let found = env
            .scanner
            .nearby_targets(env.position(), self.profile.settings.retarget_radius)
            .into_iter()
            .find(|candidate| {
                candidate.alive && candidate.entity != env.entity && Some(candidate.entity) != current
            });
        let Some(view) = found else {
            return false;
        };

        info!("{:?}: retargeting to {:?}", env.entity, view.entity);
        self.target = Some(view.entity);
        env.target = Some(view);
        self.last_known_target_position = Some(view.position);
        self.reset_loss_tracking();
        true
    }

    /// Keep the environment's target snapshot in step with the bound target.
    fn resolve_target(&self, env: &mut AgentEnv) {
        if env.target.map(|view| view.entity) != self.target {
            env.target = self.target.and_then(|entity| env.scanner.find(entity));
        }
    }

    fn update_vision(&mut self, env: &AgentEnv) {
        let settings = &self.profile.settings;
        let seen = env
            .live_target()
            .filter(|target| in_combat_vision(&*env.agent, target.position, settings, env.vision));

        self.target_visible = seen.is_some();
        match seen {
            Some(target) => {
                self.last_known_target_position = Some(target.position);
                self.time_since_seen = 0.0;
                self.loss_handled = false;
            }
            None => self.time_since_seen += env.dt,
        }
    }

    fn target_lost(&self) -> bool {
        self.time_since_seen >= self.profile.settings.loss_timeout
    }

    fn reset_loss_tracking(&mut self) {
        self.time_since_seen = 0.0;
        self.loss_handled = false;
    }

    /// Clear pending work, then search or give up. Never both.
    fn handle_target_loss(&mut self, env: &mut AgentEnv) {
        self.loss_handled = true;
        self.queue.clear();

        let Some(name) = self.profile.settings.fallback_search.clone() else {
            info!("{:?}: lost its target", env.entity);
            self.disengage(env);
            return;
        };
        match self.enqueue_force_state(&name, env) {
            Ok(()) => info!("{:?}: lost its target, falling back to {}", env.entity, name),
            Err(e) => {
                warn!("{:?}: lost its target and cannot search: {}", env.entity, e);
                self.disengage(env);
            }
        }
    }

    fn process_damage(&mut self, env: &mut AgentEnv) {
        for (source, hit_point) in std::mem::take(&mut self.pending_damage) {
            let sees_source = self.is_running() && self.target == Some(source) && self.target_visible;
            if sees_source {
                continue;
            }

            info!(
                "{:?}: hit by {:?} it cannot see, investigating {:?}",
                env.entity, source, hit_point
            );
            self.investigate_point = Some(hit_point);
            if self.is_running() {
                if self.target != Some(source) {
                    self.target = Some(source);
                    self.reset_loss_tracking();
                }
            } else {
                self.enter_combat(source, true);
            }
            self.resolve_target(env);

            if let Some(name) = self.profile.settings.investigate.clone() {
                if let Err(e) = self.enqueue_force_state(&name, env) {
                    debug!("{:?}: {}", env.entity, e);
                }
            }
        }
    }

    fn blackboard(&self) -> Blackboard {
        Blackboard {
            target_visible: self.target_visible,
            last_known_target_position: self.last_known_target_position,
            investigate_point: self.investigate_point,
            turn_rate: self.profile.settings.turn_rate,
        }
    }

    fn start(&mut self, id: BehaviorId, env: &mut AgentEnv) {
        let profile = Arc::clone(&self.profile);
        let Some(entry) = profile.entry(id) else {
            return;
        };
        debug!("{:?}: entering {}", env.entity, entry.name);

        let board = self.blackboard();
        let mut directives = Vec::new();
        let progress = {
            let mut ctx = BehaviorCtx {
                env: &mut *env,
                board: &board,
                rng: &mut self.rng,
                directives: &mut directives,
            };
            entry.behavior.enter(&mut ctx)
        };

        self.notices.push(Notice::BehaviorStarted(entry.name.clone()));
        self.active = Some(ActiveRun { id, progress });
        self.apply_directives(directives, env);
    }

    /// Step the active run once; exit it if it is done.
    fn run_active(&mut self, env: &mut AgentEnv) {
        let Some(mut run) = self.active.take() else {
            return;
        };
        let profile = Arc::clone(&self.profile);
        let Some(entry) = profile.entry(run.id) else {
            return;
        };

        let board = self.blackboard();
        let mut directives = Vec::new();
        let step = {
            let mut ctx = BehaviorCtx {
                env: &mut *env,
                board: &board,
                rng: &mut self.rng,
                directives: &mut directives,
            };
            entry.behavior.step(&mut run.progress, &mut ctx)
        };

        let finished = step == Step::Done || directives.contains(&Directive::Disengage);
        let stop_loop = finished && self.stop_after_active;
        if finished {
            entry.behavior.exit(env);
            debug!("{:?}: {} finished", env.entity, entry.name);
            self.last_executed = Some(run.id);
            self.notices.push(Notice::BehaviorEnded {
                name: entry.name.clone(),
                reason: EndReason::Completed,
            });
        } else {
            self.active = Some(run);
        }

        self.apply_directives(directives, env);

        if stop_loop && self.is_running() {
            debug!("{:?}: loop stopped after {}", env.entity, entry.name);
            self.loop_alive = false;
            self.stop_after_active = false;
            self.queue.clear();
        }
    }

    /// Exit the active run, if any.
    fn end_active(&mut self, env: &mut AgentEnv, reason: EndReason) {
        let Some(run) = self.active.take() else {
            return;
        };
        let profile = Arc::clone(&self.profile);
        if let Some(entry) = profile.entry(run.id) {
            entry.behavior.exit(env);
            debug!("{:?}: {} ended ({:?})", env.entity, entry.name, reason);
            self.notices.push(Notice::BehaviorEnded {
                name: entry.name.clone(),
                reason,
            });
        }
        self.last_executed = Some(run.id);
    }

    fn apply_directives(&mut self, directives: Vec<Directive>, env: &mut AgentEnv) {
        for directive in directives {
            if !self.engaged {
                break;
            }
            match directive {
                Directive::ForceState {
                    name,
                    override_eligibility,
                } => {
                    if override_eligibility {
                        self.eligibility_override = true;
                    }
                    if let Err(e) = self.enqueue_force_state(&name, env) {
                        debug!("{:?}: forced behavior refused: {}", env.entity, e);
                    }
                }
                Directive::InterruptAndReplan => self.request_interrupt_and_replan(env),
                Directive::Cooldown { name, seconds } => self.set_state_cooldown(&name, seconds),
                Directive::Ban { name, seconds } => self.ban_state_for_seconds(&name, seconds),
                Directive::GlobalGate { seconds } => {
                    self.next_available_at = self.next_available_at.max(self.now + seconds);
                }
                Directive::WeightedFallback(options) => {
                    let Some(name) = choose_weighted(&options, &mut self.rng).cloned() else {
                        continue;
                    };
                    match self.enqueue_state(&name, env) {
                        Ok(()) => debug!("{:?}: falling back to {}", env.entity, name),
                        Err(e) => debug!("{:?}: fallback refused: {}", env.entity, e),
                    }
                }
                Directive::TargetReacquired => self.reset_loss_tracking(),
                Directive::Disengage => self.disengage(env),
                Directive::AttackResolved { landed } => self.recently_failed_attack = !landed,
                Directive::ClearInvestigatePoint => self.investigate_point = None,
            }
        }
    }
}

/// `name` has an expiry in `map` that is still in the future.
fn expired_after(map: &HashMap<String, f32>, name: &str, now: f32) -> bool {
    map.get(name).is_some_and(|expiry| *expiry > now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::behaviors::{
        AttackConfig, BehaviorKind, InvestigateConfig, PursuitConfig, RetreatConfig, RushConfig,
        SearchConfig, StalkConfig,
    };
    use crate::ai::facade::testing::*;
    use crate::ai::facade::{TargetView, Vision};
    use crate::ai::profile::WeightedBehavior;

    const DT: f32 = 1.0 / 60.0;

    fn entry(name: &str, weight: f32, behavior: BehaviorKind) -> WeightedBehavior {
        WeightedBehavior {
            name: name.to_string(),
            weight,
            allowed_after: Vec::new(),
            aggressive: None,
            behavior,
        }
    }

    fn support_entries() -> Vec<WeightedBehavior> {
        vec![
            entry("SearchState", 0.0, BehaviorKind::Search(SearchConfig::default())),
            entry(
                "InvestigateState",
                0.0,
                BehaviorKind::Investigate(InvestigateConfig::default()),
            ),
        ]
    }

    fn profile_of(mut behaviors: Vec<WeightedBehavior>, settings: OrchestratorSettings) -> Arc<BehaviorProfile> {
        behaviors.extend(support_entries());
        let profile = BehaviorProfile::new("test", behaviors).with_settings(settings);
        Arc::new(profile)
    }

    /// The world one orchestrator sees: an agent at the origin facing -Z.
    struct Stage {
        transform: Transform,
        nav: FakeNav,
        target: TargetView,
        scanner: FixedScanner,
        now: f32,
    }

    impl Stage {
        fn with_target_at(position: Vec3) -> Self {
            let target = target_at(0, position);
            Self {
                transform: Transform::IDENTITY,
                nav: FakeNav::ready(),
                target,
                scanner: FixedScanner(vec![target]),
                now: 0.0,
            }
        }

        fn env<'a>(&'a mut self, vision: &'a dyn Vision) -> AgentEnv<'a> {
            AgentEnv {
                entity: Entity::from_raw(1),
                now: self.now,
                dt: DT,
                agent: &mut self.transform,
                target: Some(self.target),
                nav: &mut self.nav,
                vision,
                scanner: &self.scanner,
                weapon: None,
            }
        }

        fn tick(&mut self, orchestrator: &mut CombatOrchestrator, vision: &dyn Vision) {
            self.now += DT;
            orchestrator.tick(&mut self.env(vision));
        }

        fn run(
            &mut self,
            orchestrator: &mut CombatOrchestrator,
            vision: &dyn Vision,
            ticks: usize,
        ) -> Vec<Notice> {
            let mut notices = Vec::new();
            for _ in 0..ticks {
                self.tick(orchestrator, vision);
                notices.extend(orchestrator.drain_notices());
            }
            notices
        }
    }

    fn ended(notices: &[Notice], name: &str) -> Vec<EndReason> {
        notices
            .iter()
            .filter_map(|notice| match notice {
                Notice::BehaviorEnded { name: which, reason } if which == name => Some(*reason),
                _ => None,
            })
            .collect()
    }

    fn started(notices: &[Notice]) -> Vec<String> {
        notices
            .iter()
            .filter_map(|notice| match notice {
                Notice::BehaviorStarted(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_cooldown_and_ban_leave_queue_unchanged() {
        let profile = profile_of(
            vec![
                entry("AttackState", 1.0, BehaviorKind::Attack(AttackConfig::default())),
                entry("RetreatState", 1.0, BehaviorKind::Retreat(RetreatConfig::default())),
            ],
            default(),
        );
        let mut orchestrator = CombatOrchestrator::new(profile, 1);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -3.0));

        orchestrator.set_state_cooldown("AttackState", 2.0);
        orchestrator.ban_state_for_seconds("RetreatState", 2.0);
        {
            let env = stage.env(&OpenFloor);
            assert_eq!(
                orchestrator.enqueue_state("AttackState", &env),
                Err(EnqueueError::CoolingDown("AttackState".to_string()))
            );
            assert_eq!(
                orchestrator.enqueue_force_state("RetreatState", &env),
                Err(EnqueueError::Banned("RetreatState".to_string()))
            );
            assert_eq!(
                orchestrator.enqueue_state("DanceState", &env),
                Err(EnqueueError::UnknownBehavior("DanceState".to_string()))
            );
        }
        assert!(orchestrator.pending().is_empty());

        // Not engaged: ticking only advances the clock.
        stage.run(&mut orchestrator, &OpenFloor, 150);
        let env = stage.env(&OpenFloor);
        assert_eq!(orchestrator.enqueue_state("AttackState", &env), Ok(()));
        assert_eq!(orchestrator.enqueue_state("RetreatState", &env), Ok(()));
        assert_eq!(orchestrator.pending(), vec!["AttackState", "RetreatState"]);
    }

    #[test]
    fn test_ineligible_rejected_unless_overridden_once() {
        let profile = profile_of(
            vec![entry("RushState", 1.0, BehaviorKind::Rush(RushConfig::default()))],
            default(),
        );
        let mut orchestrator = CombatOrchestrator::new(profile, 1);
        // Far beyond the rush band
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -20.0));
        let env = stage.env(&OpenFloor);

        assert_eq!(
            orchestrator.enqueue_state("RushState", &env),
            Err(EnqueueError::Ineligible("RushState".to_string()))
        );

        orchestrator.override_next_eligibility_check();
        assert_eq!(orchestrator.enqueue_force_state("RushState", &env), Ok(()));
        assert_eq!(
            orchestrator.enqueue_force_state("RushState", &env),
            Err(EnqueueError::Ineligible("RushState".to_string()))
        );
        assert_eq!(orchestrator.pending().len(), 1);
    }

    #[test]
    fn test_vision_loss_exits_once_then_searches() {
        let settings = OrchestratorSettings {
            loss_timeout: 0.5,
            ..default()
        };
        let profile = profile_of(
            vec![entry("AttackState", 1.0, BehaviorKind::Attack(AttackConfig::default()))],
            settings,
        );
        let mut orchestrator = CombatOrchestrator::new(profile, 2);
        // Out of reach; the fake navigator never closes the gap.
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -4.0));

        assert!(orchestrator.enter_combat(stage.target.entity, false));
        stage.run(&mut orchestrator, &OpenFloor, 5);
        assert_eq!(orchestrator.active_behavior(), Some("AttackState"));
        assert!(stage.nav.destination.is_some());

        let notices = stage.run(&mut orchestrator, &Walls, 40);
        assert_eq!(ended(&notices, "AttackState"), vec![EndReason::LostTarget]);
        assert!(stage.nav.destination.is_none());
        assert!(orchestrator.is_engaged());
        assert!(!notices.contains(&Notice::Disengaged));
        // Search tolerates the missing target and is now running.
        assert_eq!(orchestrator.active_behavior(), Some("SearchState"));
        assert!(orchestrator.pending().is_empty());
    }

    #[test]
    fn test_vision_loss_without_fallback_disengages() {
        let settings = OrchestratorSettings {
            loss_timeout: 0.5,
            fallback_search: None,
            ..default()
        };
        let profile = profile_of(
            vec![entry("AttackState", 1.0, BehaviorKind::Attack(AttackConfig::default()))],
            settings,
        );
        let mut orchestrator = CombatOrchestrator::new(profile, 2);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -4.0));

        orchestrator.enter_combat(stage.target.entity, false);
        stage.run(&mut orchestrator, &OpenFloor, 5);
        let notices = stage.run(&mut orchestrator, &Walls, 40);

        assert_eq!(ended(&notices, "AttackState"), vec![EndReason::LostTarget]);
        assert_eq!(
            notices.iter().filter(|n| **n == Notice::Disengaged).count(),
            1
        );
        assert!(!orchestrator.is_engaged());
        assert!(orchestrator.pending().is_empty());
        assert_eq!(orchestrator.active_behavior(), None);
    }

    #[test]
    fn test_behavior_ending_on_the_loss_tick_completes() {
        let settings = OrchestratorSettings {
            loss_timeout: 0.5,
            ..default()
        };
        let profile = profile_of(
            vec![entry("RetreatState", 1.0, BehaviorKind::Retreat(RetreatConfig::default()))],
            settings,
        );
        let mut orchestrator = CombatOrchestrator::new(profile, 2);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -2.0));

        // Unseen from the start: the retreat holds for its 0.5s floor, the
        // same tick the loss timeout runs out.
        orchestrator.enter_combat(stage.target.entity, false);
        let mut notices = Vec::new();
        for _ in 0..120 {
            stage.tick(&mut orchestrator, &Walls);
            notices.extend(orchestrator.drain_notices());
            if !ended(&notices, "RetreatState").is_empty() {
                break;
            }
        }
        assert_eq!(ended(&notices, "RetreatState"), vec![EndReason::Completed]);
        assert_eq!(orchestrator.active_behavior(), None);

        // The loss is still handled, on the next tick.
        stage.tick(&mut orchestrator, &Walls);
        assert_eq!(orchestrator.active_behavior(), Some("SearchState"));
    }

    #[test]
    fn test_global_gate_holds_the_next_start() {
        let profile = profile_of(
            vec![entry("AttackState", 1.0, BehaviorKind::Attack(AttackConfig::default()))],
            default(),
        );
        let mut orchestrator = CombatOrchestrator::new(profile, 6);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -3.0));

        orchestrator.enter_combat(stage.target.entity, false);
        orchestrator.apply_directives(
            vec![
                Directive::GlobalGate { seconds: 1.0 },
                // Shorter gates never cut a longer one short.
                Directive::GlobalGate { seconds: 0.2 },
            ],
            &mut stage.env(&OpenFloor),
        );

        let notices = stage.run(&mut orchestrator, &OpenFloor, 54);
        assert!(started(&notices).is_empty(), "{notices:?}");
        assert_eq!(orchestrator.pending(), vec!["AttackState"]);

        let notices = stage.run(&mut orchestrator, &OpenFloor, 12);
        assert_eq!(started(&notices), vec!["AttackState".to_string()]);
    }

    #[test]
    fn test_replan_replaces_the_whole_queue() {
        let profile = profile_of(
            vec![
                entry("AttackState", 1.0, BehaviorKind::Attack(AttackConfig::default())),
                entry("RetreatState", 0.0, BehaviorKind::Retreat(RetreatConfig::default())),
            ],
            default(),
        );
        let mut orchestrator = CombatOrchestrator::new(profile, 6);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -3.0));
        let env = stage.env(&OpenFloor);

        assert_eq!(orchestrator.enqueue_state("RetreatState", &env), Ok(()));
        assert_eq!(orchestrator.enqueue_state("RetreatState", &env), Ok(()));
        orchestrator.request_interrupt_and_replan(&env);
        assert_eq!(orchestrator.pending(), vec!["AttackState"]);

        // Nothing selectable: the queue still empties.
        assert_eq!(orchestrator.enqueue_state("RetreatState", &env), Ok(()));
        orchestrator.set_state_cooldown("AttackState", 5.0);
        orchestrator.request_interrupt_and_replan(&env);
        assert!(orchestrator.pending().is_empty());
    }

    #[test]
    fn test_whiffed_attack_skews_selection_until_a_hit_lands() {
        let settings = OrchestratorSettings {
            aggression_multiplier: 9.0,
            ..default()
        };
        let profile = profile_of(
            vec![
                entry("AttackState", 1.0, BehaviorKind::Attack(AttackConfig::default())),
                entry("RetreatState", 1.0, BehaviorKind::Retreat(RetreatConfig::default())),
            ],
            settings,
        );
        let attack = profile.id_of("AttackState");
        let mut orchestrator = CombatOrchestrator::new(profile, 11);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -3.0));
        orchestrator.enter_combat(stage.target.entity, false);

        let trials = 4_000;
        let attack_share = |orchestrator: &mut CombatOrchestrator, stage: &mut Stage| {
            let env = stage.env(&OpenFloor);
            let picks = (0..trials)
                .filter(|_| orchestrator.select(&env) == attack)
                .count();
            picks as f32 / trials as f32
        };

        let even = attack_share(&mut orchestrator, &mut stage);
        assert!((even - 0.5).abs() < 0.05, "share {even}");

        orchestrator.apply_directives(
            vec![Directive::AttackResolved { landed: false }],
            &mut stage.env(&OpenFloor),
        );
        assert!(orchestrator.recently_failed_attack);
        let boosted = attack_share(&mut orchestrator, &mut stage);
        assert!((boosted - 0.9).abs() < 0.05, "share {boosted}");

        orchestrator.apply_directives(
            vec![Directive::AttackResolved { landed: true }],
            &mut stage.env(&OpenFloor),
        );
        assert!(!orchestrator.recently_failed_attack);
        let settled = attack_share(&mut orchestrator, &mut stage);
        assert!((settled - 0.5).abs() < 0.05, "share {settled}");
    }

    #[test]
    fn test_replan_from_inside_a_run_follows_that_run() {
        let settings = OrchestratorSettings {
            view_distance: 30.0,
            ..default()
        };
        let stalk = StalkConfig {
            ignore_max_distance: true,
            ..default()
        };
        let mut loyal = entry("StalkState", 1000.0, BehaviorKind::Stalk(stalk));
        loyal.allowed_after = vec!["StalkState".to_string()];
        let profile = profile_of(
            vec![
                entry("PursuitState", 1.0, BehaviorKind::Pursuit(PursuitConfig::default())),
                loyal,
            ],
            settings,
        );
        let stalk_id = profile.id_of("StalkState");
        let mut orchestrator = CombatOrchestrator::new(profile, 8);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -20.0));

        // An earlier stalk is on record; the pursuit is forced in after it.
        orchestrator.enter_combat(stage.target.entity, false);
        orchestrator.last_executed = stalk_id;
        orchestrator
            .enqueue_force_state("PursuitState", &stage.env(&OpenFloor))
            .unwrap();

        // The fake navigator never moves, so the chase stalls and replans.
        let mut notices = Vec::new();
        for _ in 0..120 {
            stage.tick(&mut orchestrator, &OpenFloor);
            notices.extend(orchestrator.drain_notices());
            if !ended(&notices, "PursuitState").is_empty() {
                break;
            }
        }
        assert_eq!(ended(&notices, "PursuitState"), vec![EndReason::Completed]);
        assert_eq!(started(&notices), vec!["PursuitState".to_string()]);
        assert_eq!(orchestrator.pending(), vec!["PursuitState"]);
    }

    #[test]
    fn test_engagement_is_idempotent_and_predecessors_respected() {
        let mut attack = entry("AttackState", 1.0, BehaviorKind::Attack(AttackConfig::default()));
        attack.allowed_after = vec!["RetreatState".to_string()];
        let mut retreat = entry("RetreatState", 1.0, BehaviorKind::Retreat(RetreatConfig::default()));
        retreat.allowed_after = vec!["AttackState".to_string()];

        let mut orchestrator = CombatOrchestrator::new(profile_of(vec![attack, retreat], default()), 9);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -1.2));

        let target = stage.target.entity;
        assert!(orchestrator.enter_combat(target, true));
        assert!(!orchestrator.enter_combat(target, true));
        let engaged = orchestrator.drain_notices();
        assert_eq!(
            engaged,
            vec![
                Notice::Engaged { target },
                Notice::AllyAlert {
                    target,
                    radius: 10.0
                }
            ]
        );

        // First pick is unconstrained; after that the two must alternate.
        assert_eq!(orchestrator.last_executed(), None);
        let notices = stage.run(&mut orchestrator, &OpenFloor, 900);
        let order = started(&notices);
        assert!(order.len() >= 3, "{order:?}");
        for pair in order.windows(2) {
            assert_ne!(pair[0], pair[1], "{order:?}");
        }
        assert!(orchestrator.last_executed().is_some());
    }

    #[test]
    fn test_rush_over_cliff_falls_back_by_weight() {
        let retreat = RetreatConfig {
            max_distance: 20.0,
            ..default()
        };
        let profile = profile_of(
            vec![
                entry("RushState", 1.0, BehaviorKind::Rush(RushConfig::default())),
                entry("RetreatState", 0.0, BehaviorKind::Retreat(retreat)),
                entry("StalkState", 0.0, BehaviorKind::Stalk(StalkConfig::default())),
            ],
            default(),
        );
        let mut orchestrator = CombatOrchestrator::new(profile, 4);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -8.0));
        let cliff = Cliff { edge_z: -0.5 };

        orchestrator.enter_combat(stage.target.entity, false);
        let mut notices = Vec::new();
        for _ in 0..120 {
            stage.tick(&mut orchestrator, &cliff);
            notices.extend(orchestrator.drain_notices());
            if !ended(&notices, "RushState").is_empty() {
                break;
            }
        }

        assert_eq!(ended(&notices, "RushState"), vec![EndReason::Completed]);
        let pending = orchestrator.pending();
        assert_eq!(pending.len(), 1);
        assert!(
            pending[0] == "RetreatState" || pending[0] == "StalkState",
            "{pending:?}"
        );
    }

    #[test]
    fn test_unseen_hit_engages_and_investigates() {
        let profile = profile_of(
            vec![entry("AttackState", 1.0, BehaviorKind::Attack(AttackConfig::default()))],
            default(),
        );
        let mut orchestrator = CombatOrchestrator::new(profile, 3);
        // Behind the agent
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, 6.0));
        let hit_point = Vec3::new(0.0, 1.0, 0.5);

        orchestrator.notify_damaged(stage.target.entity, hit_point);
        let notices = stage.run(&mut orchestrator, &OpenFloor, 1);

        assert!(orchestrator.is_engaged());
        assert_eq!(orchestrator.target(), Some(stage.target.entity));
        assert_eq!(orchestrator.investigate_point(), Some(hit_point));
        assert_eq!(orchestrator.active_behavior(), Some("InvestigateState"));
        assert!(notices.contains(&Notice::Engaged {
            target: stage.target.entity
        }));
        assert!(notices
            .iter()
            .any(|notice| matches!(notice, Notice::AllyAlert { .. })));
        assert_eq!(stage.nav.destination, Some(hit_point));
    }

    #[test]
    fn test_ally_alert_joins_without_rebroadcast() {
        let profile = profile_of(Vec::new(), default());
        let mut orchestrator = CombatOrchestrator::new(profile, 3);
        let caller = Entity::from_raw(7);
        let target = Entity::from_raw(8);

        assert!(orchestrator.receive_ally_alert(caller, target));
        assert!(!orchestrator.receive_ally_alert(caller, target));
        assert_eq!(orchestrator.drain_notices(), vec![Notice::Engaged { target }]);
    }

    #[test]
    fn test_dead_target_retargets_or_disengages() {
        let profile = profile_of(
            vec![entry("AttackState", 1.0, BehaviorKind::Attack(AttackConfig::default()))],
            default(),
        );
        let mut orchestrator = CombatOrchestrator::new(profile.clone(), 3);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -3.0));
        let other = target_at(1, Vec3::new(2.0, 0.0, -3.0));
        stage.target.alive = false;
        stage.scanner = FixedScanner(vec![stage.target, other]);

        orchestrator.enter_combat(stage.target.entity, false);
        stage.tick(&mut orchestrator, &OpenFloor);
        assert_eq!(orchestrator.target(), Some(other.entity));
        assert!(orchestrator.is_running());

        let mut lonely = CombatOrchestrator::new(profile, 3);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -3.0));
        stage.target.alive = false;
        stage.scanner = FixedScanner(vec![stage.target]);
        lonely.enter_combat(stage.target.entity, false);
        let notices = stage.run(&mut lonely, &OpenFloor, 1);
        assert!(!lonely.is_engaged());
        assert!(notices.contains(&Notice::Disengaged));
    }

    #[test]
    fn test_disengage_distance() {
        let settings = OrchestratorSettings {
            disengage_distance: Some(10.0),
            ..default()
        };
        let profile = profile_of(
            vec![entry("AttackState", 1.0, BehaviorKind::Attack(AttackConfig::default()))],
            settings,
        );
        let mut orchestrator = CombatOrchestrator::new(profile, 3);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -12.0));

        orchestrator.enter_combat(stage.target.entity, false);
        stage.tick(&mut orchestrator, &OpenFloor);
        assert!(!orchestrator.is_engaged());
    }

    #[test]
    fn test_nothing_eligible_searches_once_then_stops() {
        let settings = OrchestratorSettings {
            view_distance: 30.0,
            ..default()
        };
        let profile = profile_of(
            vec![entry("AttackState", 1.0, BehaviorKind::Attack(AttackConfig::default()))],
            settings,
        );
        let mut orchestrator = CombatOrchestrator::new(profile, 3);
        // Visible, but outside the attack band
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -20.0));

        orchestrator.enter_combat(stage.target.entity, false);
        let notices = stage.run(&mut orchestrator, &OpenFloor, 30);

        assert_eq!(started(&notices), vec!["SearchState".to_string()]);
        assert!(orchestrator.is_engaged());
        assert!(!orchestrator.is_running());

        // A stopped loop can be restarted.
        assert!(orchestrator.enter_combat(stage.target.entity, false));
    }

    #[test]
    fn test_disengage_is_always_safe() {
        let profile = profile_of(Vec::new(), default());
        let mut orchestrator = CombatOrchestrator::new(profile, 3);
        let mut stage = Stage::with_target_at(Vec3::new(0.0, 0.0, -3.0));

        orchestrator.disengage(&mut stage.env(&OpenFloor));
        assert!(orchestrator.drain_notices().is_empty());

        orchestrator.enter_combat(stage.target.entity, false);
        orchestrator.disengage(&mut stage.env(&OpenFloor));
        orchestrator.disengage(&mut stage.env(&OpenFloor));
        assert_eq!(
            orchestrator.drain_notices(),
            vec![
                Notice::Engaged {
                    target: stage.target.entity
                },
                Notice::Disengaged
            ]
        );
    }
}
