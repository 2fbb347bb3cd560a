//! Enemy spawning from spawn points.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use std::sync::Arc;

use super::components::{Enemy, EnemySpawnPoint, EnemyType};
use super::data::{EnemyDefinition, EnemyRegistry};
use super::nav::{NavAgent, NavArea};
use super::orchestrator::CombatOrchestrator;
use super::patrol::Patrol;
use super::profile::{BehaviorProfile, ProfileRegistry};
use crate::combat::{
    weapon_hit_volume, AttackDefinition, AttackLibrary, AttackRuntime, Health, Resistances, WeaponModel,
};
use crate::core::Pose;

/// Replace every [`EnemySpawnPoint`] with the enemy it names.
///
/// Points naming an unknown enemy type or behavior profile are dropped with
/// a warning.
pub fn spawn_enemies_at_points(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    enemies: Res<EnemyRegistry>,
    profiles: Res<ProfileRegistry>,
    attacks: Res<AttackLibrary>,
    area: Res<NavArea>,
    mut spawned: Local<u64>,
    points: Query<(Entity, &EnemySpawnPoint, &Transform)>,
) {
    for (point, spawn, transform) in points.iter() {
        commands.entity(point).despawn_recursive();

        let Some(definition) = enemies.get(&spawn.kind) else {
            warn!("Unknown enemy type at spawn point: {}", spawn.kind);
            continue;
        };
        let Some(profile) = profiles.get(&definition.profile) else {
            warn!(
                "{}: unknown behavior profile '{}', not spawned",
                definition.name, definition.profile
            );
            continue;
        };
        let opener = attacks.get(&definition.weapon.opener);
        if opener.is_none() {
            warn!(
                "{}: unknown opener attack '{}', it will not swing",
                definition.name, definition.weapon.opener
            );
        }

        *spawned += 1;
        let enemy = spawn_enemy(
            &mut commands,
            &mut meshes,
            &mut materials,
            definition,
            profile,
            opener,
            transform.translation,
            *area,
            *spawned,
        );
        info!("Spawned {} ({:?}) at {}", definition.name, enemy, transform.translation);
    }
}

/// Spawn one enemy with its weapon model, hit volume and patrol route.
#[allow(clippy::too_many_arguments)]
pub fn spawn_enemy(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    definition: &EnemyDefinition,
    profile: Arc<BehaviorProfile>,
    opener: Option<Arc<AttackDefinition>>,
    position: Vec3,
    area: NavArea,
    seed: u64,
) -> Entity {
    let collider = definition.collider.clone().unwrap_or_default();
    let (r, g, b) = definition.color;

    let mut nav = NavAgent::new(area, definition.move_speed);
    nav.sync(position);

    let enemy = commands
        .spawn((
            Enemy,
            EnemyType(definition.name.clone()),
            Health::new(definition.max_health),
            Resistances::default(),
            definition.weapon.to_weapon(),
            CombatOrchestrator::new(profile, seed),
            nav,
            Mesh3d(meshes.add(Capsule3d::new(collider.radius, collider.half_height * 2.0))),
            MeshMaterial3d(materials.add(Color::srgb(r, g, b))),
            Transform::from_translation(position),
            RigidBody::KinematicPositionBased,
            Collider::capsule_y(collider.half_height, collider.radius),
        ))
        .id();

    // Held out to the right, blade pointing forward
    let rest = Transform::from_xyz(collider.radius + 0.1, 0.1, -0.3);
    let model = commands
        .spawn((
            WeaponModel,
            Mesh3d(meshes.add(Cuboid::new(0.08, 0.08, 0.9))),
            MeshMaterial3d(materials.add(Color::srgb(0.75, 0.75, 0.8))),
            rest,
        ))
        .set_parent(enemy)
        .id();
    commands
        .spawn(weapon_hit_volume(enemy, Vec3::new(0.1, 0.1, 0.45)))
        .set_parent(model);

    commands
        .entity(enemy)
        .insert(AttackRuntime::new(Some(model), Pose::from_transform(&rest), opener));
    if let Some(route) = &definition.patrol {
        commands.entity(enemy).insert(Patrol::from_config(route, position));
    }

    enemy
}
