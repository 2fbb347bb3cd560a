//! Attack timeline engine.
//!
//! Every weapon wielder (player or enemy) owns exactly one [`AttackRuntime`].
//! It plays an [`AttackDefinition`] phase by phase, strictly by elapsed time:
//!
//! `Idle -> Executing(phase) -> { Executing(phase + 1) | Executing(chained, 0) | Idle }`
//!
//! Entering `Idle` restores the configured opener as the current attack.
//! Time left over when a phase completes inside a tick carries into the next
//! phase, so an attack always runs for exactly the sum of the phase
//! durations it executed.

use bevy::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use super::attack::{AttackDefinition, AttackLibrary, ProjectileSpec};
use crate::core::Pose;

/// Source of named discrete triggers polled for combo input.
pub trait TriggerSource {
    fn triggered(&self, trigger: &str) -> bool;
}

/// Trigger source that never fires. Used for AI wielders.
pub struct NoTriggers;

impl TriggerSource for NoTriggers {
    fn triggered(&self, _trigger: &str) -> bool {
        false
    }
}

impl<const N: usize> TriggerSource for [&str; N] {
    fn triggered(&self, trigger: &str) -> bool {
        self.contains(&trigger)
    }
}

/// Named triggers that fired during the current frame.
#[derive(Resource, Default, Debug)]
pub struct ComboTriggers {
    active: HashSet<String>,
}

impl ComboTriggers {
    pub fn press(&mut self, trigger: impl Into<String>) {
        self.active.insert(trigger.into());
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Take one trigger out of this frame's set. `true` if it was pressed.
    pub fn consume(&mut self, trigger: &str) -> bool {
        self.active.remove(trigger)
    }
}

impl TriggerSource for ComboTriggers {
    fn triggered(&self, trigger: &str) -> bool {
        self.active.contains(trigger)
    }
}

/// Where the timeline is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineState {
    Idle,
    Executing { phase: usize, elapsed: f32 },
}

/// Things that happened since the last drain, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    PhaseStarted { attack: String, phase: usize },
    HitVolumeEnabled,
    HitVolumeDisabled,
    ProjectileLaunched { attack: String, spec: ProjectileSpec },
    ComboQueued { trigger: String, next: String },
    /// An in-flight attack was replaced by a new `play`.
    Cancelled { attack: String },
    Chained { from: String, to: String },
    Finished {
        attack: String,
        /// Sum of the phase durations that actually ran
        duration: f32,
        truncated: bool,
    },
}

/// Per-wielder attack state.
#[derive(Component, Debug)]
pub struct AttackRuntime {
    opener: Option<Arc<AttackDefinition>>,
    current: Option<Arc<AttackDefinition>>,
    state: TimelineState,
    queued: Option<Arc<AttackDefinition>>,
    last_hit: Option<Entity>,
    model: Option<Entity>,
    rest_pose: Pose,
    phase_start_pose: Pose,
    pose: Pose,
    progress: f32,
    attack_elapsed: f32,
    hit_volume: bool,
    chained_this_tick: bool,
    serial: u32,
    events: Vec<TimelineEvent>,
}

impl AttackRuntime {
    /// A runtime posing `model` around `rest_pose`, opening with `opener`.
    pub fn new(model: Option<Entity>, rest_pose: Pose, opener: Option<Arc<AttackDefinition>>) -> Self {
        Self {
            current: opener.clone(),
            opener,
            state: TimelineState::Idle,
            queued: None,
            last_hit: None,
            model,
            rest_pose,
            phase_start_pose: rest_pose,
            pose: rest_pose,
            progress: 0.0,
            attack_elapsed: 0.0,
            hit_volume: false,
            chained_this_tick: false,
            serial: 0,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> TimelineState {
        self.state
    }

    pub fn is_attacking(&self) -> bool {
        matches!(self.state, TimelineState::Executing { .. })
    }

    /// Idle with a model and something to swing.
    pub fn can_attack(&self) -> bool {
        !self.is_attacking() && self.model.is_some() && self.current.is_some()
    }

    /// Attack currently playing, or the opener while idle.
    pub fn current(&self) -> Option<&Arc<AttackDefinition>> {
        self.current.as_ref()
    }

    pub fn opener(&self) -> Option<&Arc<AttackDefinition>> {
        self.opener.as_ref()
    }

    pub fn set_opener(&mut self, opener: Option<Arc<AttackDefinition>>) {
        if !self.is_attacking() {
            self.current = opener.clone();
        }
        self.opener = opener;
    }

    pub fn queued(&self) -> Option<&Arc<AttackDefinition>> {
        self.queued.as_ref()
    }

    pub fn model(&self) -> Option<Entity> {
        self.model
    }

    pub fn set_model(&mut self, model: Option<Entity>) {
        self.model = model;
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn rest_pose(&self) -> Pose {
        self.rest_pose
    }

    pub fn hit_volume_enabled(&self) -> bool {
        self.hit_volume
    }

    /// Increments every time an attack begins, chained or not.
    pub fn attack_serial(&self) -> u32 {
        self.serial
    }

    pub fn last_hit(&self) -> Option<Entity> {
        self.last_hit
    }

    /// Record a contact made by this wielder's hit volume.
    pub fn register_hit(&mut self, target: Entity) {
        self.last_hit = Some(target);
    }

    /// Damage scale at this instant: the active phase's damage curve while a
    /// damage window is open, 1.0 otherwise.
    pub fn damage_multiplier(&self) -> f32 {
        let TimelineState::Executing { phase, .. } = self.state else {
            return 1.0;
        };
        self.current
            .as_ref()
            .and_then(|definition| definition.phases.get(phase))
            .filter(|phase| phase.damage_enabled)
            .map_or(1.0, |phase| phase.damage_curve.evaluate(self.progress))
    }

    /// Start `definition` from phase 0, replacing anything in flight.
    ///
    /// Returns `false` (and changes nothing) when there is no model to pose
    /// or the definition has no phases. Pose is not reset on replacement.
    pub fn play(&mut self, definition: Arc<AttackDefinition>) -> bool {
        if self.model.is_none() || definition.phases.is_empty() {
            return false;
        }

        if self.is_attacking() {
            if let Some(current) = &self.current {
                self.events.push(TimelineEvent::Cancelled {
                    attack: current.name.clone(),
                });
            }
        }

        self.begin(definition);
        true
    }

    /// Play the current attack (the opener when idle).
    pub fn play_current(&mut self) -> bool {
        match self.current.clone() {
            Some(definition) if !self.is_attacking() => self.play(definition),
            _ => false,
        }
    }

    /// Latch a follow-up unless one is already pending.
    pub fn queue_follow_up(&mut self, definition: Arc<AttackDefinition>) -> bool {
        if self.queued.is_some() || !self.is_attacking() {
            return false;
        }
        self.queued = Some(definition);
        true
    }

    pub fn clear_queued(&mut self) {
        self.queued = None;
    }

    /// Abort whatever is playing and go idle.
    pub fn cancel(&mut self) {
        if !self.is_attacking() {
            return;
        }
        if let Some(current) = &self.current {
            self.events.push(TimelineEvent::Cancelled {
                attack: current.name.clone(),
            });
        }
        self.set_hit_volume(false);
        self.queued = None;
        self.enter_idle();
    }

    /// Snap the pose back to rest.
    pub fn return_to_rest(&mut self) {
        self.pose = self.rest_pose;
        self.phase_start_pose = self.rest_pose;
    }

    /// Advance by `dt` seconds and return everything that happened since the
    /// previous call, including events raised by `play`/`cancel`.
    pub fn tick(
        &mut self,
        dt: f32,
        library: &AttackLibrary,
        triggers: &dyn TriggerSource,
    ) -> Vec<TimelineEvent> {
        let mut remaining = dt.max(0.0);
        self.chained_this_tick = false;

        while let TimelineState::Executing { phase: index, elapsed } = self.state {
            let Some(definition) = self.current.clone() else {
                self.state = TimelineState::Idle;
                break;
            };
            let Some(phase) = definition.phases.get(index) else {
                self.finish_attack(false);
                continue;
            };

            if phase.accepts_combo && self.queued.is_none() && !self.chained_this_tick {
                self.poll_combo(&definition, library, triggers);
            }

            let left = (phase.duration - elapsed).max(0.0);
            let completes = remaining >= left;
            let elapsed = if completes {
                remaining = (remaining - left).max(0.0);
                phase.duration
            } else {
                let elapsed = elapsed + remaining;
                remaining = 0.0;
                elapsed
            };

            self.progress = if completes || phase.duration <= 0.0 {
                1.0
            } else {
                (elapsed / phase.duration).clamp(0.0, 1.0)
            };
            let target = self
                .rest_pose
                .offset(phase.position_offset, phase.rotation_offset);
            let weight = phase.interpolation.evaluate(self.progress);
            self.pose = self.phase_start_pose.blend(&target, weight);

            if !completes {
                self.state = TimelineState::Executing { phase: index, elapsed };
                break;
            }

            self.attack_elapsed += phase.duration;
            let truncate = phase.end_on_combo && self.queued.is_some();
            if truncate || index + 1 >= definition.phases.len() {
                self.finish_attack(truncate);
            } else {
                self.state = TimelineState::Executing {
                    phase: index + 1,
                    elapsed: 0.0,
                };
                self.enter_phase(&definition, index + 1);
            }
        }

        std::mem::take(&mut self.events)
    }

    fn begin(&mut self, definition: Arc<AttackDefinition>) {
        self.set_hit_volume(false);
        self.queued = None;
        self.last_hit = None;
        self.attack_elapsed = 0.0;
        self.serial = self.serial.wrapping_add(1);
        self.current = Some(Arc::clone(&definition));
        self.state = TimelineState::Executing {
            phase: 0,
            elapsed: 0.0,
        };
        self.enter_phase(&definition, 0);
    }

    fn enter_phase(&mut self, definition: &AttackDefinition, index: usize) {
        self.phase_start_pose = self.pose;
        self.progress = 0.0;
        self.events.push(TimelineEvent::PhaseStarted {
            attack: definition.name.clone(),
            phase: index,
        });
        let Some(phase) = definition.phases.get(index) else {
            self.set_hit_volume(false);
            return;
        };
        self.set_hit_volume(phase.damage_enabled);
        if let Some(spec) = phase.projectile {
            self.events.push(TimelineEvent::ProjectileLaunched {
                attack: definition.name.clone(),
                spec,
            });
        }
    }

    fn poll_combo(
        &mut self,
        definition: &AttackDefinition,
        library: &AttackLibrary,
        triggers: &dyn TriggerSource,
    ) {
        for link in &definition.combo_map {
            if !triggers.triggered(&link.trigger) {
                continue;
            }
            match library.get(&link.next) {
                Some(next) => {
                    debug!(
                        "Combo '{}' latched on {}: next is {}",
                        link.trigger, definition.name, link.next
                    );
                    self.events.push(TimelineEvent::ComboQueued {
                        trigger: link.trigger.clone(),
                        next: link.next.clone(),
                    });
                    self.queued = Some(next);
                    return;
                }
                None => {
                    warn!(
                        "Combo '{}' on {} routes to unknown attack '{}'",
                        link.trigger, definition.name, link.next
                    );
                }
            }
        }
    }

    fn finish_attack(&mut self, truncated: bool) {
        let name = self
            .current
            .as_ref()
            .map(|definition| definition.name.clone())
            .unwrap_or_default();
        self.events.push(TimelineEvent::Finished {
            attack: name.clone(),
            duration: self.attack_elapsed,
            truncated,
        });
        self.set_hit_volume(false);

        if let Some(next) = self.queued.take() {
            debug!("Chaining {} into {}", name, next.name);
            self.events.push(TimelineEvent::Chained {
                from: name,
                to: next.name.clone(),
            });
            self.chained_this_tick = true;
            self.begin(next);
        } else {
            self.enter_idle();
        }
    }

    fn enter_idle(&mut self) {
        self.state = TimelineState::Idle;
        self.progress = 0.0;
        self.attack_elapsed = 0.0;
        self.current = self.opener.clone();
    }

    fn set_hit_volume(&mut self, enabled: bool) {
        if self.hit_volume == enabled {
            return;
        }
        self.hit_volume = enabled;
        self.events.push(if enabled {
            TimelineEvent::HitVolumeEnabled
        } else {
            TimelineEvent::HitVolumeDisabled
        });
    }
}
