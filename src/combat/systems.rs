//! Combat systems - timelines, hit volumes, damage and death.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use std::collections::HashSet;

use super::attack::{load_attack_library, AttackLibrary};
use super::components::*;
use super::projectile::ProjectileLaunchEvent;
use super::timeline::{AttackRuntime, ComboTriggers, NoTriggers, TimelineEvent};
use crate::core::CombatDataPaths;
use crate::player::Player;

/// Load `assets/data/attacks` into the [`AttackLibrary`] resource.
///
/// A broken or missing directory leaves the library empty; wielders then
/// simply have nothing to swing.
pub fn load_attacks(paths: Res<CombatDataPaths>, mut library: ResMut<AttackLibrary>) {
    match load_attack_library(std::path::Path::new(&paths.attacks_dir)) {
        Ok(loaded) => {
            info!("Loaded {} attack definitions", loaded.len());
            *library = loaded;
        }
        Err(e) => {
            error!("Failed to load attack definitions: {}", e);
        }
    }
}

/// Advance every attack timeline and pose its weapon model.
///
/// The player's timeline polls the frame's combo triggers; AI wielders
/// never receive combo input.
pub fn advance_attack_timelines(
    time: Res<Time>,
    library: Res<AttackLibrary>,
    mut triggers: ResMut<ComboTriggers>,
    mut launches: EventWriter<ProjectileLaunchEvent>,
    mut wielders: Query<(Entity, &mut AttackRuntime, Has<Player>), Without<Dead>>,
    mut models: Query<&mut Transform, With<WeaponModel>>,
) {
    let dt = time.delta_secs();

    for (entity, mut runtime, is_player) in wielders.iter_mut() {
        let events = if is_player {
            runtime.tick(dt, &library, &*triggers)
        } else {
            runtime.tick(dt, &library, &NoTriggers)
        };

        for event in &events {
            match event {
                TimelineEvent::Finished {
                    attack,
                    duration,
                    truncated,
                } => {
                    debug!(
                        "{:?} finished {} after {:.2}s (truncated: {})",
                        entity, attack, duration, truncated
                    );
                }
                TimelineEvent::Chained { from, to } => {
                    debug!("{:?} chained {} -> {}", entity, from, to);
                }
                TimelineEvent::ProjectileLaunched { spec, .. } => {
                    launches.send(ProjectileLaunchEvent {
                        owner: entity,
                        spec: *spec,
                    });
                }
                _ => {}
            }
        }

        let settled = !runtime.is_attacking()
            && events
                .iter()
                .any(|event| matches!(event, TimelineEvent::Finished { .. } | TimelineEvent::Cancelled { .. }));
        if settled {
            runtime.return_to_rest();
        }

        if let Some(mut transform) = runtime.model().and_then(|model| models.get_mut(model).ok()) {
            runtime.pose().apply_to(&mut transform);
        }
    }

    // A press is consumed by exactly one fixed tick.
    triggers.clear();
}

/// Mirror each owner's hit-volume flag onto its sensor collider.
pub fn sync_hit_volumes(
    mut commands: Commands,
    runtimes: Query<&AttackRuntime>,
    mut volumes: Query<(Entity, &mut WeaponHitVolume, Has<ColliderDisabled>)>,
) {
    for (entity, mut volume, disabled) in volumes.iter_mut() {
        let (enabled, serial) = runtimes
            .get(volume.owner)
            .map_or((false, volume.attack_serial), |runtime| {
                (runtime.hit_volume_enabled(), runtime.attack_serial())
            });

        if serial != volume.attack_serial {
            volume.attack_serial = serial;
            volume.struck.clear();
        }

        if enabled && disabled {
            commands.entity(entity).remove::<ColliderDisabled>();
        } else if !enabled && !disabled {
            volume.struck.clear();
            commands.entity(entity).insert(ColliderDisabled);
        }
    }
}

/// Turn sensor contacts into damage, once per target per attack.
pub fn detect_weapon_hits(
    mut collisions: EventReader<CollisionEvent>,
    mut volumes: Query<(&mut WeaponHitVolume, &GlobalTransform)>,
    mut wielders: Query<(&mut AttackRuntime, &Weapon, &GlobalTransform)>,
    targets: Query<&GlobalTransform, (With<Health>, Without<Dead>)>,
    mut damage_events: EventWriter<DamageEvent>,
) {
    for collision in collisions.read() {
        let CollisionEvent::Started(a, b, _) = collision else {
            continue;
        };

        for (volume_entity, other) in [(*a, *b), (*b, *a)] {
            let Ok((mut volume, volume_transform)) = volumes.get_mut(volume_entity) else {
                continue;
            };
            if other == volume.owner || volume.struck.contains(&other) {
                continue;
            }
            let Ok(target_transform) = targets.get(other) else {
                continue;
            };
            let Ok((mut runtime, weapon, owner_transform)) = wielders.get_mut(volume.owner) else {
                continue;
            };
            if !runtime.hit_volume_enabled() {
                continue;
            }

            volume.struck.insert(other);
            runtime.register_hit(other);

            let direction = (target_transform.translation() - owner_transform.translation())
                .with_y(0.0)
                .normalize_or_zero();
            damage_events.send(DamageEvent {
                target: other,
                source: volume.owner,
                amount: weapon.base_damage * runtime.damage_multiplier(),
                element: weapon.element,
                hit_point: volume_transform.translation(),
                knockback: direction * 2.0,
            });
        }
    }
}

/// Apply damage to entities.
pub fn apply_damage(
    mut commands: Commands,
    mut damage_events: EventReader<DamageEvent>,
    mut health_query: Query<(&mut Health, Option<&Resistances>, Has<Dead>)>,
    mut damaged_events: EventWriter<DamagedEvent>,
    mut death_events: EventWriter<DeathEvent>,
) {
    // Track entities that died this tick to avoid duplicate death events
    let mut died_this_tick = HashSet::new();

    for event in damage_events.read() {
        if died_this_tick.contains(&event.target) {
            continue;
        }

        let Ok((mut health, resistances, dead)) = health_query.get_mut(event.target) else {
            continue;
        };
        if dead {
            continue;
        }

        let resistance = resistances.map_or(0.0, |r| r.get(event.element));
        let dealt = health.take_damage(event.amount * (1.0 - resistance));

        if health.is_dead() {
            died_this_tick.insert(event.target);
            commands.entity(event.target).insert(Dead);
            death_events.send(DeathEvent {
                entity: event.target,
                killed_by: Some(event.source),
            });
        } else {
            damaged_events.send(DamagedEvent {
                target: event.target,
                source: event.source,
                amount: dealt,
                hit_point: event.hit_point,
            });
        }
    }
}

/// React to deaths: stop the weapon, schedule despawn for non-players.
pub fn check_deaths(
    mut commands: Commands,
    mut death_events: EventReader<DeathEvent>,
    mut runtimes: Query<&mut AttackRuntime>,
    player_query: Query<(), With<Player>>,
) {
    for event in death_events.read() {
        if let Ok(mut runtime) = runtimes.get_mut(event.entity) {
            runtime.cancel();
        }

        if player_query.get(event.entity).is_ok() {
            info!("Player died");
        } else {
            info!("{:?} died (killed by {:?})", event.entity, event.killed_by);
            commands.entity(event.entity).insert(DeathTimer::default());
        }
    }
}

/// Despawn corpses once their timer runs out.
pub fn despawn_dead(mut commands: Commands, time: Res<Time>, mut query: Query<(Entity, &mut DeathTimer)>) {
    for (entity, mut timer) in query.iter_mut() {
        timer.0.tick(time.delta());
        if timer.0.finished() {
            commands.entity(entity).despawn_recursive();
        }
    }
}
