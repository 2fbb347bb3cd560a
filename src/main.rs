//! Crawler Combat - demo arena.
//!
//! Controls:
//! - WASD: Move
//! - Mouse: Look around
//! - Shift: Sprint
//! - Left click: Attack (again during the swing to chain)
//! - Escape: Pause/Unpause

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crawler_combat::ai::{EnemySpawnPoint, NavArea};
use crawler_combat::combat::AttackLibrary;
use crawler_combat::player::{spawn_player, PlayerConfig};

const ARENA_HALF_SIZE: f32 = 15.0;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Crawler Combat".to_string(),
                resolution: (1280.0, 720.0).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
        .add_plugins(crawler_combat::CrawlerCombatPlugin)
        .insert_resource(NavArea::new(
            Vec2::splat(-ARENA_HALF_SIZE + 1.0),
            Vec2::splat(ARENA_HALF_SIZE - 1.0),
        ))
        .add_systems(Startup, setup_arena)
        .run();
}

fn setup_arena(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    attacks: Res<AttackLibrary>,
    config: Res<PlayerConfig>,
) {
    // Floor (ground group)
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(ARENA_HALF_SIZE * 2.0, 0.2, ARENA_HALF_SIZE * 2.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.3, 0.28, 0.25))),
        Transform::from_xyz(0.0, -0.1, 0.0),
        RigidBody::Fixed,
        Collider::cuboid(ARENA_HALF_SIZE, 0.1, ARENA_HALF_SIZE),
        CollisionGroups::new(Group::GROUP_1, Group::ALL),
    ));

    // Outer walls plus a pillar to break line of sight
    let wall_material = materials.add(Color::srgb(0.4, 0.38, 0.35));
    let walls = [
        (Vec3::new(0.0, 1.5, -ARENA_HALF_SIZE), Vec3::new(ARENA_HALF_SIZE, 1.5, 0.25)),
        (Vec3::new(0.0, 1.5, ARENA_HALF_SIZE), Vec3::new(ARENA_HALF_SIZE, 1.5, 0.25)),
        (Vec3::new(-ARENA_HALF_SIZE, 1.5, 0.0), Vec3::new(0.25, 1.5, ARENA_HALF_SIZE)),
        (Vec3::new(ARENA_HALF_SIZE, 1.5, 0.0), Vec3::new(0.25, 1.5, ARENA_HALF_SIZE)),
        (Vec3::new(3.0, 1.5, -4.0), Vec3::new(1.0, 1.5, 1.0)),
    ];
    for (center, half) in walls {
        commands.spawn((
            Mesh3d(meshes.add(Cuboid::new(half.x * 2.0, half.y * 2.0, half.z * 2.0))),
            MeshMaterial3d(wall_material.clone()),
            Transform::from_translation(center),
            RigidBody::Fixed,
            Collider::cuboid(half.x, half.y, half.z),
            CollisionGroups::new(Group::GROUP_2, Group::ALL),
        ));
    }

    commands.spawn((
        PointLight {
            intensity: 2_000_000.0,
            range: 40.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(0.0, 8.0, 0.0),
    ));

    spawn_player(
        &mut commands,
        &mut meshes,
        &mut materials,
        &config,
        Vec3::new(0.0, 1.0, 8.0),
        attacks.get(&config.opener),
    );

    for (kind, position) in [
        ("skeleton", Vec3::new(-4.0, 0.8, -6.0)),
        ("skeleton", Vec3::new(5.0, 0.8, -9.0)),
        ("lurker", Vec3::new(0.0, 0.8, -12.0)),
        ("cultist", Vec3::new(9.0, 0.8, -3.0)),
    ] {
        commands.spawn((EnemySpawnPoint::new(kind), Transform::from_translation(position)));
    }
}
