//! AI systems - thin adapters between the ECS and the orchestrators.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use std::path::Path;

use super::components::{Enemy, Targetable};
use super::data::{load_enemy_registry, EnemyRegistry};
use super::facade::{AgentEnv, Navigator, TargetScanner, TargetView, Vision};
use super::nav::NavAgent;
use super::orchestrator::{CombatOrchestrator, Notice};
use super::profile::{load_profile_registry, ProfileRegistry};
use crate::combat::{AttackRuntime, Dead};
use crate::core::{AllyAlertEvent, CombatDataPaths, CombatDisengagedEvent, CombatEngagedEvent, DamagedEvent};

/// Raycasts against static geometry only, filtered by collision group.
pub struct RapierVision<'a> {
    pub context: Option<&'a RapierContext>,
}

impl Vision for RapierVision<'_> {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, mask: u32) -> Option<f32> {
        let context = self.context?;
        let filter = QueryFilter::only_fixed()
            .groups(CollisionGroups::new(Group::ALL, Group::from_bits_truncate(mask)));
        context
            .cast_ray(origin, direction, max_distance, true, filter)
            .map(|(_, distance)| distance)
    }
}

/// Snapshot of every targetable entity for one tick.
pub struct WorldScanner {
    targets: Vec<TargetView>,
}

impl WorldScanner {
    pub fn snapshot(targets: impl IntoIterator<Item = TargetView>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
        }
    }
}

impl TargetScanner for WorldScanner {
    fn nearby_targets(&self, origin: Vec3, radius: f32) -> Vec<TargetView> {
        let mut nearby: Vec<TargetView> = self
            .targets
            .iter()
            .copied()
            .filter(|target| target.position.distance(origin) <= radius)
            .collect();
        nearby.sort_by(|a, b| {
            a.position
                .distance_squared(origin)
                .total_cmp(&b.position.distance_squared(origin))
        });
        nearby
    }

    fn find(&self, entity: Entity) -> Option<TargetView> {
        self.targets.iter().copied().find(|target| target.entity == entity)
    }
}

fn scan_targets<'a>(
    targets: impl IntoIterator<Item = (Entity, &'a Transform, bool)>,
) -> WorldScanner {
    WorldScanner::snapshot(targets.into_iter().map(|(entity, transform, dead)| TargetView {
        entity,
        position: transform.translation,
        alive: !dead,
    }))
}

/// Load `assets/data/behavior_profiles` into the [`ProfileRegistry`].
pub fn load_profiles(paths: Res<CombatDataPaths>, mut registry: ResMut<ProfileRegistry>) {
    match load_profile_registry(Path::new(&paths.profiles_dir)) {
        Ok(loaded) => {
            info!("Loaded {} behavior profiles", loaded.len());
            *registry = loaded;
        }
        Err(e) => {
            error!("Failed to load behavior profiles: {}", e);
        }
    }
}

/// Load `assets/data/enemies` into the [`EnemyRegistry`].
pub fn load_enemies(paths: Res<CombatDataPaths>, mut registry: ResMut<EnemyRegistry>) {
    match load_enemy_registry(Path::new(&paths.enemies_dir)) {
        Ok(loaded) => {
            info!("Loaded {} enemy definitions", loaded.len());
            *registry = loaded;
        }
        Err(e) => {
            error!("Failed to load enemy definitions: {}", e);
        }
    }
}

/// Stop dead agents in place. No exit hooks run for them.
pub fn halt_dead_agents(
    mut query: Query<(Entity, &mut CombatOrchestrator, Option<&mut NavAgent>), Added<Dead>>,
) {
    for (entity, mut orchestrator, nav) in query.iter_mut() {
        orchestrator.shutdown();
        if let Some(mut nav) = nav {
            nav.cancel_move();
            nav.enabled = false;
        }
        debug!("{:?}: combat loop halted", entity);
    }
}

/// Hand damage reports to the victim's orchestrator.
pub fn investigate_on_damage(
    mut damaged_events: EventReader<DamagedEvent>,
    mut orchestrators: Query<&mut CombatOrchestrator, Without<Dead>>,
    enemies: Query<(), With<Enemy>>,
) {
    for event in damaged_events.read() {
        // Friendly fire does not start fights.
        if enemies.get(event.source).is_ok() {
            continue;
        }
        if let Ok(mut orchestrator) = orchestrators.get_mut(event.target) {
            orchestrator.notify_damaged(event.source, event.hit_point);
        }
    }
}

/// Deliver alerts to idle allies in range. Callers never hear their own.
pub fn deliver_ally_alerts(
    mut alerts: EventReader<AllyAlertEvent>,
    mut agents: Query<(Entity, &Transform, &mut CombatOrchestrator), Without<Dead>>,
) {
    for alert in alerts.read() {
        for (entity, transform, mut orchestrator) in agents.iter_mut() {
            if entity == alert.caller || transform.translation.distance(alert.origin) > alert.radius {
                continue;
            }
            if orchestrator.receive_ally_alert(alert.caller, alert.target) {
                info!("{:?} answered {:?}'s alert", entity, alert.caller);
            }
        }
    }
}

/// Engage the nearest live target inside an idle agent's engage distance.
pub fn detect_engagement(
    targets: Query<(Entity, &Transform, Has<Dead>), With<Targetable>>,
    mut agents: Query<
        (Entity, &Transform, &mut CombatOrchestrator),
        (With<Enemy>, Without<Dead>, Without<Targetable>),
    >,
) {
    let scanner = scan_targets(targets.iter());

    for (entity, transform, mut orchestrator) in agents.iter_mut() {
        if orchestrator.is_running() {
            continue;
        }
        let engage_distance = orchestrator.settings().engage_distance;
        let nearest = scanner
            .nearby_targets(transform.translation, engage_distance)
            .into_iter()
            .find(|target| target.alive && target.entity != entity);

        if let Some(target) = nearest {
            if orchestrator.enter_combat(target.entity, true) {
                info!("{:?} engaged {:?}", entity, target.entity);
            }
        }
    }
}

/// Run one orchestrator tick per agent.
pub fn drive_orchestrators(
    time: Res<Time>,
    rapier_context: Query<&RapierContext>,
    targets: Query<(Entity, &Transform, Has<Dead>), With<Targetable>>,
    mut agents: Query<
        (
            Entity,
            &mut Transform,
            &mut CombatOrchestrator,
            &mut NavAgent,
            Option<&mut AttackRuntime>,
        ),
        (With<Enemy>, Without<Dead>, Without<Targetable>),
    >,
) {
    let scanner = scan_targets(targets.iter());
    let vision = RapierVision {
        context: rapier_context.get_single().ok(),
    };
    let now = time.elapsed_secs();
    let dt = time.delta_secs();

    for (entity, mut transform, mut orchestrator, mut nav, mut weapon) in agents.iter_mut() {
        nav.sync(transform.translation);
        let target = orchestrator.target().and_then(|target| scanner.find(target));

        let mut env = AgentEnv {
            entity,
            now,
            dt,
            agent: &mut *transform,
            target,
            nav: &mut *nav,
            vision: &vision,
            scanner: &scanner,
            weapon: weapon.as_deref_mut(),
        };
        orchestrator.tick(&mut env);
    }
}

/// Turn orchestrator notices into events.
pub fn forward_notices(
    mut agents: Query<(Entity, &Transform, &mut CombatOrchestrator)>,
    mut engaged_events: EventWriter<CombatEngagedEvent>,
    mut disengaged_events: EventWriter<CombatDisengagedEvent>,
    mut alert_events: EventWriter<AllyAlertEvent>,
) {
    for (agent, transform, mut orchestrator) in agents.iter_mut() {
        for notice in orchestrator.drain_notices() {
            match notice {
                Notice::Engaged { target } => {
                    engaged_events.send(CombatEngagedEvent { agent, target });
                }
                Notice::Disengaged => {
                    disengaged_events.send(CombatDisengagedEvent { agent });
                }
                Notice::AllyAlert { target, radius } => {
                    alert_events.send(AllyAlertEvent {
                        caller: agent,
                        target,
                        origin: transform.translation,
                        radius,
                    });
                }
                Notice::BehaviorStarted(name) => {
                    debug!("{:?} -> {}", agent, name);
                }
                Notice::BehaviorEnded { name, reason } => {
                    debug!("{:?} <- {} ({:?})", agent, name, reason);
                }
            }
        }
    }
}

/// Move every navigation agent and write the result to its transform.
pub fn move_nav_agents(time: Res<Time>, mut query: Query<(&mut Transform, &mut NavAgent), Without<Dead>>) {
    let dt = time.delta_secs();
    for (mut transform, mut nav) in query.iter_mut() {
        nav.sync(transform.translation);
        transform.translation = nav.advance(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::facade::testing::target_at;

    #[test]
    fn test_world_scanner_sorts_and_filters() {
        let scanner = WorldScanner::snapshot([
            target_at(0, Vec3::new(6.0, 0.0, 0.0)),
            target_at(1, Vec3::new(2.0, 0.0, 0.0)),
            target_at(2, Vec3::new(20.0, 0.0, 0.0)),
        ]);

        let nearby = scanner.nearby_targets(Vec3::ZERO, 10.0);
        let entities: Vec<Entity> = nearby.iter().map(|target| target.entity).collect();
        assert_eq!(entities, vec![Entity::from_raw(101), Entity::from_raw(100)]);

        assert!(scanner.find(Entity::from_raw(102)).is_some());
        assert!(scanner.find(Entity::from_raw(7)).is_none());
    }

    #[test]
    fn test_vision_without_physics_sees_nothing() {
        let vision = RapierVision { context: None };
        assert_eq!(vision.raycast(Vec3::ZERO, Vec3::NEG_Y, 5.0, 0b1), None);
    }
}
